use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

use super::udev_monitor::UdevMonitor;

/// Owned handle to the hot-plug watcher thread.
///
/// Events arrive on the receiver returned by [`HotplugSubscription::start`];
/// the subscription itself only manages the watcher's lifetime. Dropping it
/// signals the thread to stop; [`HotplugSubscription::shutdown`] stops it
/// and joins.
pub struct HotplugSubscription {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl HotplugSubscription {
    /// Spawn the watcher thread. The socket is created on that thread
    /// (udev's MonitorSocket is not Send); creation errors are reported
    /// back here before returning.
    pub fn start() -> std::io::Result<(Self, mpsc::Receiver<()>)> {
        let stop = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel(16);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let thread_stop = stop.clone();
        let thread = std::thread::spawn(move || {
            let monitor = match UdevMonitor::new() {
                Ok(monitor) => {
                    let _ = ready_tx.send(Ok(()));
                    monitor
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            monitor.run(&thread_stop, || {
                // Never block the delivering thread; a full channel just
                // means a burst is already pending.
                match event_tx.try_send(()) {
                    Ok(()) => true,
                    Err(mpsc::error::TrySendError::Full(())) => true,
                    Err(mpsc::error::TrySendError::Closed(())) => false,
                }
            });
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok((
                Self {
                    stop,
                    thread: Some(thread),
                },
                event_rx,
            )),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(std::io::Error::other("hot-plug watcher thread died during startup")),
        }
    }

    /// Stop the watcher and wait for the thread to exit.
    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for HotplugSubscription {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
