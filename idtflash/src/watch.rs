//! Background detection of download-mode devices.
//!
//! The watcher polls serial port enumeration on its own thread and reports
//! changes over a channel. It never opens a port, so it can run alongside a
//! front end without touching the device; the port name it reports is handed
//! to [`FlashSession`](crate::session::FlashSession) afterwards.

use crate::config::ProtocolConfig;
use crate::device::is_idt_port;
use crate::error::Result;
use crate::port::PortInfo;
use log::{debug, trace};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Change in the set of attached download-mode devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A device appeared. Devices already attached when watching starts are
    /// reported as arrivals on the first poll.
    Arrived(PortInfo),
    /// The device on this port went away.
    Departed(String),
}

/// Polls for download-mode devices until dropped.
pub struct PresenceWatcher {
    events: Receiver<PresenceEvent>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PresenceWatcher {
    /// Watch the host's serial ports every `interval`.
    #[cfg(feature = "native")]
    pub fn spawn(interval: Duration, config: ProtocolConfig) -> Self {
        use crate::port::{NativePortEnumerator, PortEnumerator};

        Self::spawn_with(interval, config, NativePortEnumerator::list_ports)
    }

    /// Watch the ports returned by `probe` every `interval`.
    pub fn spawn_with<F>(interval: Duration, config: ProtocolConfig, mut probe: F) -> Self
    where
        F: FnMut() -> Result<Vec<PortInfo>> + Send + 'static,
    {
        let (tx, events) = mpsc::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();

        let handle = thread::spawn(move || {
            let mut present = BTreeSet::new();

            while !stop_thread.load(Ordering::Relaxed) {
                match probe() {
                    Ok(ports) => {
                        let current: Vec<PortInfo> =
                            ports.into_iter().filter(|p| is_idt_port(p, &config)).collect();

                        for port in &current {
                            if present.insert(port.name.clone()) {
                                debug!("Device arrived on {}", port.name);
                                if tx.send(PresenceEvent::Arrived(port.clone())).is_err() {
                                    return;
                                }
                            }
                        }

                        let gone: Vec<String> = present
                            .iter()
                            .filter(|name| !current.iter().any(|p| &p.name == *name))
                            .cloned()
                            .collect();
                        for name in gone {
                            present.remove(&name);
                            debug!("Device departed from {name}");
                            if tx.send(PresenceEvent::Departed(name)).is_err() {
                                return;
                            }
                        }
                    },
                    Err(e) => trace!("Port enumeration failed: {e}"),
                }
                thread::sleep(interval);
            }
        });

        Self {
            events,
            stop,
            handle: Some(handle),
        }
    }

    /// Receiver for presence events.
    pub fn events(&self) -> &Receiver<PresenceEvent> {
        &self.events
    }

    /// Block until a device arrives.
    ///
    /// Returns `None` when `cancelled` becomes set or the watcher thread
    /// has stopped.
    pub fn wait_for_arrival(&self, cancelled: &AtomicBool) -> Option<PortInfo> {
        while !cancelled.load(Ordering::Relaxed) {
            match self.events.recv_timeout(Duration::from_millis(100)) {
                Ok(PresenceEvent::Arrived(port)) => return Some(port),
                Ok(PresenceEvent::Departed(_)) | Err(RecvTimeoutError::Timeout) => {},
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }
}

impl Drop for PresenceWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
