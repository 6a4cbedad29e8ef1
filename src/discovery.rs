// SPDX-License-Identifier: GPL-3.0-only
//! Display discovery
//!
//! Enumeration and hardware matching are I/O-bound and blocking; the
//! engine always runs them on a blocking worker, never on the model task.
//! The platform side sits behind [`DisplayEnumerator`] so the engine can
//! run against fakes in tests.

use crate::model::DisplayId;
use crate::protocols::ddc_ci::DdcCiChannel;
use crate::protocols::{ExternalLink, InternalBacklight, LinkDriver};

/// One display as reported by a single enumeration pass.
pub struct DiscoveredDisplay {
    pub id: DisplayId,
    /// Hardware-reported name; the engine falls back to `"Display <id>"`.
    pub name: Option<String>,
    pub link: LinkDriver,
}

/// Platform display enumeration, consumed at the interface boundary.
pub trait DisplayEnumerator: Send + Sync + 'static {
    /// Enumerate active displays. Blocking.
    fn enumerate(&self) -> Vec<DiscoveredDisplay>;
}

/// Production enumerator: sysfs/logind probe for the internal panel plus
/// DDC/CI enumeration for external monitors. Control-channel identifiers
/// are external by construction; the built-in panel is internal by the
/// platform's own classification.
pub struct PlatformEnumerator;

impl DisplayEnumerator for PlatformEnumerator {
    fn enumerate(&self) -> Vec<DiscoveredDisplay> {
        let mut displays = Vec::new();

        if let Some(backlight) = InternalBacklight::probe() {
            let id = format!("internal-{}", backlight.device_name());
            info!("found internal panel: {id}");
            displays.push(DiscoveredDisplay {
                id,
                name: Some("Built-in Display".to_string()),
                link: LinkDriver::Internal(Box::new(backlight)),
            });
        }

        for (id, name, channel) in DdcCiChannel::enumerate() {
            info!(
                "found external display: {id} ({})",
                name.as_deref().unwrap_or("unnamed")
            );
            displays.push(DiscoveredDisplay {
                id,
                name,
                link: LinkDriver::External(Some(ExternalLink::new(Box::new(channel)))),
            });
        }

        info!("enumeration complete: {} display(s)", displays.len());
        displays
    }
}
