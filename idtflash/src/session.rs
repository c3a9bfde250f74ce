//! Connection lifetime for one download-mode device.
//!
//! A [`FlashSession`] exists only while its serial port is open, so there is
//! no way to send a frame through a session that is not connected. The port
//! is closed when the session is dropped, on success and on error alike.

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::flasher::ImageFlasher;
use crate::image::Image;
use crate::port::Port;
use log::{debug, warn};

/// An open connection to a download-mode device.
pub struct FlashSession<P: Port> {
    flasher: ImageFlasher<P>,
    port_name: String,
    closed: bool,
}

impl<P: Port> FlashSession<P> {
    /// Wrap an already opened port.
    pub fn new(port: P, config: ProtocolConfig) -> Self {
        let port_name = port.name().to_string();
        debug!("Session opened on {port_name}");
        Self {
            flasher: ImageFlasher::new(port, config),
            port_name,
            closed: false,
        }
    }

    /// Name of the port this session holds.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Protocol configuration in use.
    pub fn config(&self) -> &ProtocolConfig {
        self.flasher.config()
    }

    /// Probe the device with the start frame.
    pub fn send_start_frame(&mut self) -> Result<()> {
        self.flasher.send_start_frame()
    }

    /// Upload an in-memory payload to `address`.
    pub fn upload<F: FnMut(u8)>(&mut self, address: u32, payload: &[u8], progress: F) -> Result<()> {
        self.flasher.upload(address, payload, progress)
    }

    /// Upload an image to its load address.
    pub fn upload_image<F: FnMut(u8)>(&mut self, image: &Image, progress: F) -> Result<()> {
        self.flasher.upload_image(image, progress)
    }

    /// Access the flasher driving this session.
    pub fn flasher_mut(&mut self) -> &mut ImageFlasher<P> {
        &mut self.flasher
    }

    /// Close the port now, reporting any error.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flasher.port_mut().close()
    }
}

#[cfg(feature = "native")]
impl FlashSession<crate::port::NativePort> {
    /// Locate a download-mode device and open its serial port.
    ///
    /// When `explicit` is `None` the device is auto-selected by USB id; see
    /// [`crate::device::locate`].
    pub fn connect(explicit: Option<&str>, config: &ProtocolConfig) -> Result<Self> {
        use crate::port::{NativePort, SerialConfig};

        let path = crate::device::locate(explicit, config)?;
        log::info!("Connecting to {path}");
        let port = NativePort::open(&SerialConfig::idt(&path, config))?;
        Ok(Self::new(port, config.clone()))
    }
}

impl<P: Port> Drop for FlashSession<P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flasher.port_mut().close() {
            warn!("Failed to close {}: {e}", self.port_name);
        } else {
            debug!("Session on {} closed", self.port_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::port::mock::MockPort;
    use std::time::Duration;

    fn fast_config() -> ProtocolConfig {
        ProtocolConfig::default().with_settle(Duration::ZERO, Duration::ZERO)
    }

    #[test]
    fn test_drop_closes_port() {
        let port = MockPort::acking();
        {
            let mut session = FlashSession::new(port.clone(), fast_config());
            session.send_start_frame().unwrap();
            assert!(!port.state().closed);
        }
        assert!(port.state().closed);
    }

    #[test]
    fn test_drop_closes_port_after_failure() {
        let port = MockPort::silent();
        {
            let mut session = FlashSession::new(port.clone(), fast_config());
            let err = session.upload(0, &[1, 2, 3], |_| {}).unwrap_err();
            assert!(matches!(err, Error::TransportFailure { .. }));
        }
        assert!(port.state().closed);
    }

    #[test]
    fn test_explicit_close() {
        let port = MockPort::acking();
        let session = FlashSession::new(port.clone(), fast_config());
        assert_eq!(session.port_name(), "mock");
        session.close().unwrap();
        assert!(port.state().closed);
    }
}
