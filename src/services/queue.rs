// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

//! Bounded multi-producer multi-consumer URL queue with quiescence detection.
//!
//! Every pushed item is counted as pending until a consumer calls
//! [`WorkQueue::complete`] for it. Consumers push an item's children before
//! completing it, so the count reaches zero only when the queue is empty and
//! nothing in flight can add more work. At that point the shared `drained`
//! signal fires and every waiting consumer stops.

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct WorkQueue {
    sender: mpsc::Sender<String>,
    receiver: Mutex<mpsc::Receiver<String>>,
    pending: AtomicUsize,
    drained: CancellationToken,
    cancel: CancellationToken,
}

impl WorkQueue {
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        Self {
            sender,
            receiver: Mutex::new(receiver),
            pending: AtomicUsize::new(0),
            drained: CancellationToken::new(),
            cancel,
        }
    }

    /// Enqueue `url`, waiting while the queue is full.
    ///
    /// Returns false if the run was cancelled before the item got in.
    pub async fn push(&self, url: String) -> bool {
        self.hold();
        if self.cancel.is_cancelled() {
            self.complete();
            return false;
        }
        let url = match self.sender.try_send(url) {
            Ok(()) => return true,
            Err(mpsc::error::TrySendError::Full(url)) => url,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.complete();
                return false;
            }
        };

        // Every producer is also a consumer, so this can stall the pool
        tracing::warn!(
            capacity = self.sender.max_capacity(),
            pending = self.pending(),
            "work queue full, waiting for space"
        );
        let sent = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            result = self.sender.send(url) => result.is_ok(),
        };
        if !sent {
            self.complete();
        }
        sent
    }

    /// Next item, or `None` once the queue is drained or the run cancelled
    pub async fn pop(&self) -> Option<String> {
        let mut receiver = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return None,
            _ = self.drained.cancelled() => return None,
            guard = self.receiver.lock() => guard,
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            _ = self.drained.cancelled() => None,
            item = receiver.recv() => item,
        }
    }

    /// Count one unit of outstanding work that is not a queued item.
    ///
    /// Used while seeding so the queue cannot drain between seeds.
    pub fn hold(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark one popped item (or one [`hold`](Self::hold)) as finished
    pub fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.cancel();
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_drained(&self) -> bool {
        self.drained.is_cancelled()
    }
}
