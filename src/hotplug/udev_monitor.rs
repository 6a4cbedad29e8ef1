use std::os::fd::AsRawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Poll granularity. The loop wakes this often to check the stop flag, so
/// teardown is bounded by one interval.
const POLL_TIMEOUT_MS: i32 = 500;

/// Monitors udev for display hot-plug events
///
/// Runs on a dedicated blocking thread because udev's MonitorSocket is not
/// Send. Uses libc::poll() to wait for events on the udev socket.
pub struct UdevMonitor {
    socket: udev::MonitorSocket,
}

impl UdevMonitor {
    /// Create a new udev monitor for display events
    ///
    /// Monitors the DRM subsystem with a device-type filter for
    /// connectors, which cuts most false positives from other DRM events.
    pub fn new() -> Result<Self, std::io::Error> {
        let socket = udev::MonitorBuilder::new()?
            .match_subsystem_devtype("drm", "drm_minor")?
            .listen()?;

        Ok(Self { socket })
    }

    /// Run the monitoring loop until `stop` is set or the callback asks to
    /// quit. The callback returns true to continue.
    pub fn run<F>(self, stop: &Arc<AtomicBool>, mut callback: F)
    where
        F: FnMut() -> bool,
    {
        info!("display hot-plug monitoring started (drm subsystem, connector filter)");

        let fd = self.socket.as_raw_fd();

        while !stop.load(Ordering::Relaxed) {
            let mut poll_fd = libc::pollfd {
                fd,
                events: libc::POLLIN,
                revents: 0,
            };

            let poll_result = unsafe { libc::poll(&mut poll_fd, 1, POLL_TIMEOUT_MS) };

            if poll_result < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                error!("hot-plug poll error: {err}");
                return;
            }

            if poll_result == 0 {
                // Timeout; loop around and re-check the stop flag.
                continue;
            }

            if let Some(event) = self.socket.iter().next() {
                match event.event_type() {
                    udev::EventType::Add | udev::EventType::Remove | udev::EventType::Change => {
                        debug!(
                            "display event: {:?} at {:?}",
                            event.event_type(),
                            event.syspath()
                        );
                        if !callback() {
                            info!("hot-plug monitoring stopped by callback");
                            return;
                        }
                    }
                    _ => {}
                }
            }
        }

        info!("hot-plug monitoring stopped");
    }
}
