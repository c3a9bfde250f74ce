//! Serial backend on the `serialport` crate.

use {
    crate::{
        error::{Error, Result},
        port::{Port, PortEnumerator, PortInfo, SerialConfig},
    },
    log::trace,
    serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits},
    std::{
        io::{self, ErrorKind, Read, Write},
        time::Duration,
    },
};

/// Download-mode serial interface opened through `serialport`.
///
/// The handle is dropped on [`Port::close`]; any I/O after that fails with
/// `NotConnected`.
pub struct NativePort {
    handle: Option<Box<dyn SerialPort>>,
    name: String,
}

impl NativePort {
    /// Open `config.port_name` with hardware handshakes on both lines.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let mut handle = serialport::new(&config.port_name, config.baud_rate)
            .timeout(config.timeout)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::Hardware)
            .open()?;
        handle.write_data_terminal_ready(true)?;
        trace!("Opened {} at {} baud", config.port_name, config.baud_rate);

        Ok(Self {
            handle: Some(handle),
            name: config.port_name.clone(),
        })
    }

    fn handle(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.handle
            .as_mut()
            .ok_or_else(|| io::Error::new(ErrorKind::NotConnected, "port closed"))
    }
}

impl Port for NativePort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.handle()?.set_timeout(timeout)?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        self.handle()?.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        if self.handle.take().is_some() {
            trace!("Closed {}", self.name);
        }
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.handle()?.read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.handle()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle()?.flush()
    }
}

fn port_info(port: serialport::SerialPortInfo) -> PortInfo {
    match port.port_type {
        SerialPortType::UsbPort(usb) => PortInfo {
            name: port.port_name,
            vid: Some(usb.vid),
            pid: Some(usb.pid),
            manufacturer: usb.manufacturer,
            product: usb.product,
            serial_number: usb.serial_number,
        },
        _ => PortInfo::named(port.port_name),
    }
}

/// Enumerates the host's serial ports.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports().map_err(Error::Serial)?;
        Ok(ports.into_iter().map(port_info).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use serialport::{SerialPortInfo, UsbPortInfo};

    #[test]
    fn test_port_info_from_usb() {
        let info = port_info(SerialPortInfo {
            port_name: "/dev/ttyUSB0".to_string(),
            port_type: SerialPortType::UsbPort(UsbPortInfo {
                vid: 0x12D1,
                pid: 0x3609,
                serial_number: Some("0123".to_string()),
                manufacturer: Some("HUAWEI".to_string()),
                product: Some("USB SER".to_string()),
            }),
        });
        assert_eq!(info.vid, Some(0x12D1));
        assert_eq!(info.pid, Some(0x3609));
        assert_eq!(info.product.as_deref(), Some("USB SER"));
    }

    #[test]
    fn test_port_info_without_usb() {
        let info = port_info(SerialPortInfo {
            port_name: "/dev/ttyS0".to_string(),
            port_type: SerialPortType::Unknown,
        });
        assert_eq!(info, PortInfo::named("/dev/ttyS0"));
    }

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialConfig::idt("/nonexistent/idtflash-port", &ProtocolConfig::default());
        assert!(NativePort::open(&config).is_err());
    }
}
