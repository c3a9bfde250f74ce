//! Port abstraction for serial communication.
//!
//! The protocol engine talks to the device through the [`Port`] trait so the
//! frame and transfer logic stay independent of the serial backend:
//!
//! ```text
//! +------------------------------+
//! | FrameTransport / ImageFlasher|
//! +--------------+---------------+
//!                |
//!                v
//! +--------------+---------------+
//! |          Port trait          |
//! +--------------+---------------+
//!                |
//!                v
//! +--------------+---------------+
//! |  NativePort (serialport)     |
//! +------------------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

#[cfg(test)]
pub(crate) mod mock;

use std::io::{Read, Write};
use std::time::Duration;

use crate::config::ProtocolConfig;
use crate::error::Result;

/// Settings for opening the download-mode serial interface.
///
/// The port is always opened 8N1 with RTS/CTS flow control and DTR asserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub port_name: String,
    /// Baud rate.
    pub baud_rate: u32,
    /// Timeout in effect until the first frame sets its own.
    pub timeout: Duration,
}

impl SerialConfig {
    /// Settings for `port_name` taken from the protocol configuration.
    pub fn idt(port_name: impl Into<String>, protocol: &ProtocolConfig) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: protocol.baud_rate,
            timeout: protocol.connect_timeout,
        }
    }
}

/// Serial port information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name/path.
    pub name: String,
    /// USB vendor ID (if available).
    pub vid: Option<u16>,
    /// USB product ID (if available).
    pub pid: Option<u16>,
    /// Manufacturer string (if available).
    pub manufacturer: Option<String>,
    /// Product string (if available).
    pub product: Option<String>,
    /// Serial number (if available).
    pub serial_number: Option<String>,
}

impl PortInfo {
    /// Port info without USB metadata.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
            serial_number: None,
        }
    }

    /// Port info for a USB device.
    pub fn usb(name: impl Into<String>, vid: u16, pid: u16) -> Self {
        Self {
            vid: Some(vid),
            pid: Some(pid),
            ..Self::named(name)
        }
    }
}

/// Byte stream to a device plus the few controls the transport needs.
pub trait Port: Read + Write + Send {
    /// Set the read/write timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Discard buffered input and output.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Get the port name/path.
    fn name(&self) -> &str;

    /// Close the port and release resources.
    ///
    /// Later reads and writes fail with `NotConnected`.
    fn close(&mut self) -> Result<()>;
}

/// Trait for listing available serial ports.
///
/// This is separated from `Port` because it's a static operation that
/// doesn't require an open port instance.
pub trait PortEnumerator {
    /// List all available serial ports.
    fn list_ports() -> Result<Vec<PortInfo>>;
}

#[cfg(feature = "native")]
pub use native::{NativePort, NativePortEnumerator};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_idt() {
        let config = SerialConfig::idt("/dev/ttyUSB0", &ProtocolConfig::default());
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.port_name, "/dev/ttyUSB0");
        assert_eq!(config.timeout, Duration::from_secs(1));

        let fast = ProtocolConfig {
            baud_rate: 921_600,
            ..ProtocolConfig::default()
        };
        assert_eq!(SerialConfig::idt("COM3", &fast).baud_rate, 921_600);
    }

    #[test]
    fn test_port_info_constructors() {
        let plain = PortInfo::named("/dev/ttyS0");
        assert_eq!(plain.vid, None);

        let usb = PortInfo::usb("/dev/ttyUSB0", 0x12D1, 0x3609);
        assert_eq!(usb.vid, Some(0x12D1));
        assert_eq!(usb.pid, Some(0x3609));
        assert_eq!(usb.name, "/dev/ttyUSB0");
    }
}
