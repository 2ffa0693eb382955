// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! HTML helpers built on the `scraper` crate.

use scraper::{Html, Selector};
use url::Url;

const NON_TEXT_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

/// Canonical frontier key for a URL: http(s) only, host required, fragment
/// dropped, serialized by `Url` (so `http://site.test` becomes
/// `http://site.test/`).
pub fn normalize_link(link: &str) -> Option<Url> {
    let mut url = Url::parse(link.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}

/// Extract all links from HTML content.
///
/// Relative hrefs are resolved against `base_url`, protocol-relative ones
/// take the base's scheme. Order is preserved and duplicates are kept.
/// Blank hrefs and hrefs that do not resolve to a URL are skipped.
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| base.join(href).ok())
        .map(String::from)
        .collect()
}

/// Visible text of the document with whitespace collapsed
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(content) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|element| NON_TEXT_ELEMENTS.contains(&element.name()));
        if !hidden {
            text.push(' ');
            text.push_str(content);
        }
    }

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of `<title>`, falling back to the first `<h1>`
pub fn extract_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    ["title", "h1"].into_iter().find_map(|tag| {
        let selector = Selector::parse(tag).ok()?;
        let element = document.select(&selector).next()?;
        let title = element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        (!title.is_empty()).then_some(title)
    })
}
