// Build script to embed the crate version in the binary
// and optionally override the patch version from the CI/CD pipeline

use std::env;

fn main() {
    let version = env::var("CARGO_PKG_VERSION").expect("CARGO_PKG_VERSION not set");

    let mut parts = version.splitn(3, '.');
    let (Some(major), Some(minor), Some(patch)) = (parts.next(), parts.next(), parts.next())
    else {
        panic!("Invalid version format in Cargo.toml: {}", version);
    };

    // Release builds stamp the pipeline run number into the patch segment
    let patch = env::var("SPIDER_PATCH_VERSION").unwrap_or_else(|_| patch.to_string());

    println!("cargo:rustc-env=SPIDER_VERSION={}.{}.{}", major, minor, patch);
    println!("cargo:rerun-if-changed=Cargo.toml");
    // sqlx::migrate! embeds these at compile time
    println!("cargo:rerun-if-changed=migrations");
    println!("cargo:rerun-if-env-changed=SPIDER_PATCH_VERSION");
}
