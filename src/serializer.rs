// SPDX-License-Identifier: GPL-3.0-only
//! Per-display write serialization
//!
//! Many external controllers corrupt or silently drop writes that arrive
//! concurrently or in rapid succession. Every external write therefore
//! goes through exactly one queue task per display: single in-flight
//! write, a fixed post-write delay before the next may issue, and no
//! automatic retry (a failed write is logged; the requested value lives on
//! in the software model until the next attempt or sync).
//!
//! Exclusion is scoped per display. Queues for different displays never
//! block each other.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::model::DisplayId;
use crate::registry::SharedLink;

/// Bounded depth: ramp ticks are droppable under contention, and anything
/// deeper than this is stale by the time the controller would accept it.
const QUEUE_DEPTH: usize = 8;

pub struct WriteQueue {
    tx: mpsc::Sender<f32>,
    task: JoinHandle<()>,
}

impl WriteQueue {
    /// Spawn the single-writer task for one display.
    pub fn spawn(id: DisplayId, link: SharedLink, write_gap: Duration) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<f32>(QUEUE_DEPTH);

        let task = tokio::spawn(async move {
            while let Some(value) = rx.recv().await {
                let link = link.clone();
                let write = tokio::task::spawn_blocking(move || {
                    let mut driver = link.blocking_lock();
                    driver.write(value)
                })
                .await;

                match write {
                    Ok(Ok(())) => {
                        debug!("wrote {value:.3} to {id}");
                    }
                    Ok(Err(err)) => {
                        warn!("write of {value:.3} to {id} failed: {err}");
                    }
                    Err(err) => {
                        error!("write task for {id} panicked: {err}");
                    }
                }

                // Controllers need quiet time after every write, success
                // or not.
                tokio::time::sleep(write_gap).await;
            }
        });

        Arc::new(Self { tx, task })
    }

    /// Enqueue a write that must not be lost (instant requests, final ramp
    /// ticks).
    pub async fn submit(&self, value: f32) {
        if self.tx.send(value).await.is_err() {
            debug!("write queue closed, dropping {value:.3}");
        }
    }

    /// Enqueue a ramp tick. Dropped when the queue is saturated; the final
    /// tick at progress 1.0 is authoritative and goes through
    /// [`WriteQueue::submit`].
    pub fn offer(&self, value: f32) {
        let _ = self.tx.try_send(value);
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        // A write already handed to the blocking pool still completes
        // naturally; only the queue task stops.
        self.task.abort();
    }
}
