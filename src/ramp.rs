// SPDX-License-Identifier: GPL-3.0-only
//! Smooth brightness ramps
//!
//! A ramp turns a target-brightness request into a time-based sequence of
//! interpolated hardware writes. Interpolation is driven by elapsed wall
//! clock, not fixed steps, so a delayed tick lands on the right value
//! instead of drifting. At most one session exists per display; starting a
//! new one aborts and replaces the old (last-writer-wins), and the new
//! session starts from the last *issued* value so there is no visible
//! jump.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::IssuedCache;
use crate::model::{DisplayId, DisplayKind};
use crate::registry::SharedLink;
use crate::serializer::WriteQueue;

/// Quadratic ease-out, `f(t) = t(2 - t)`. Used on the internal path where
/// the high tick rate makes the curve visible.
pub fn ease_out(t: f32) -> f32 {
    t * (2.0 - t)
}

pub(crate) struct RampSpec {
    pub id: DisplayId,
    pub kind: DisplayKind,
    pub start: f32,
    pub target: f32,
    pub duration: Duration,
    pub tick_hz: f32,
}

/// Handle to one in-flight ramp. Aborting is how supersession works: a
/// superseded session's pending tick simply never runs.
pub(crate) struct RampSession {
    task: JoinHandle<()>,
}

impl RampSession {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

/// Start a ramp session. The caller has already applied the near-equal
/// epsilon check and resolved the start value from the issued-value cache.
///
/// `queue` carries external writes and is always present for external
/// sessions; only internal writes go straight through the link. The final
/// tick at progress 1.0 writes the exact target and is never dropped.
pub(crate) fn spawn(
    spec: RampSpec,
    link: SharedLink,
    queue: Option<Arc<WriteQueue>>,
    issued: IssuedCache,
) -> RampSession {
    let task = tokio::spawn(async move {
        let period = Duration::from_secs_f32(1.0 / spec.tick_hz);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let started = tokio::time::Instant::now();
        let duration = spec.duration.as_secs_f32().max(f32::EPSILON);

        loop {
            interval.tick().await;

            let progress = (started.elapsed().as_secs_f32() / duration).clamp(0.0, 1.0);
            let eased = match spec.kind {
                DisplayKind::Internal => ease_out(progress),
                // Linear: no benefit to easing at 30Hz against a
                // quantized hardware scale.
                DisplayKind::External => progress,
            };
            let value = spec.start + (spec.target - spec.start) * eased;
            let last = progress >= 1.0;

            issued.lock().unwrap().insert(spec.id.clone(), value);

            match &queue {
                Some(queue) => {
                    if last {
                        queue.submit(value).await;
                    } else {
                        queue.offer(value);
                    }
                }
                None => {
                    // Internal path: fast vendor call, safe inline.
                    if let Err(err) = link.lock().await.write(value) {
                        debug!("ramp tick for {} failed: {err}", spec.id);
                    }
                }
            }

            if last {
                break;
            }
        }
    });

    RampSession { task }
}
