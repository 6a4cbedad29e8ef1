/// Display hot-plug detection using udev
///
/// Watches the DRM subsystem for connector changes (plug/unplug, lid
/// open/close) and hands events to the engine through a channel, never
/// blocking the delivering thread. The watcher is an owned subscription
/// object with deterministic teardown.
mod subscription;
mod udev_monitor;

pub use subscription::HotplugSubscription;
