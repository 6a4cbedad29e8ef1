// SPDX-License-Identifier: GPL-3.0-only
//! Debounced request gate
//!
//! Coalesces bursts of instant external requests (slider drags) into the
//! most recent value, handed to the write queue at most once per window.
//! Applies only to the instant external path: smooth ramps pace
//! themselves, and the internal panel reflects every request immediately.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::serializer::WriteQueue;

pub struct DebounceGate {
    tx: watch::Sender<f32>,
    task: JoinHandle<()>,
}

impl DebounceGate {
    pub fn spawn(queue: Arc<WriteQueue>, window: Duration) -> Self {
        let (tx, mut rx) = watch::channel(0.0f32);
        rx.mark_unchanged();

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                // Let the burst accumulate, then forward only the last
                // value seen.
                tokio::time::sleep(window).await;
                let value = *rx.borrow_and_update();
                queue.submit(value).await;
            }
        });

        Self { tx, task }
    }

    /// Record a request. The latest value within the window wins.
    pub fn request(&self, value: f32) {
        self.tx.send_replace(value);
    }
}

impl Drop for DebounceGate {
    fn drop(&mut self) {
        self.task.abort();
    }
}
