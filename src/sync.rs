// SPDX-License-Identifier: GPL-3.0-only
//! Two-way hardware synchronization
//!
//! Detects and absorbs brightness changes made outside the software path:
//! hardware resets on wake, firmware auto-dimming, the monitor's own OSD
//! controls. Updates are applied as instantaneous model corrections, never
//! ramps — they represent ground truth, not a user intent to transition.
//!
//! Runs immediately after every discovery pass, again after a fixed delay
//! (some external controllers refuse control-channel traffic for 1-2s
//! after wake even though discovery already succeeded), and on demand.

use std::sync::Arc;

use crate::engine::Shared;

pub(crate) async fn sync_all(shared: &Arc<Shared>) {
    let links = shared.registry.read().await.links();
    if links.is_empty() {
        return;
    }
    debug!("syncing {} display(s) from hardware", links.len());

    let mut reads = Vec::new();
    for (id, _kind, link) in links {
        reads.push(tokio::task::spawn_blocking(move || {
            let result = link.blocking_lock().read();
            (id, result)
        }));
    }

    for task in reads {
        let Ok((id, result)) = task.await else {
            continue;
        };
        match result {
            Ok(value) => apply(shared, &id, value).await,
            Err(err) => {
                // Best-effort: a failed or ambiguous read never corrupts
                // the model for this cycle.
                debug!("sync read for {id} skipped: {err}");
            }
        }
    }
}

async fn apply(shared: &Arc<Shared>, id: &str, value: f32) {
    // Refresh the issued-value cache first so the next ramp starts from
    // hardware truth, not a stale value.
    shared.issued.lock().unwrap().insert(id.to_string(), value);

    let mut model = shared.model.write().await;
    let Some(current) = model.get(id).map(|d| d.brightness) else {
        return;
    };
    if (current - value).abs() > shared.config.sync_jitter {
        info!("sync: {id} corrected {current:.3} -> {value:.3}");
        model.set_brightness(id, value);
        shared.cache.set(id, value);
    }
}
