//! Download-mode device discovery.
//!
//! A chipset in download (IDT) mode enumerates as a USB serial interface
//! with a fixed vendor/product id pair. Auto-selection only succeeds when
//! exactly one such interface is present; anything else must be resolved by
//! naming the port explicitly.

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::port::PortInfo;
use log::{debug, warn};

/// Check whether an enumerated port is a download-mode device.
pub fn is_idt_port(port: &PortInfo, config: &ProtocolConfig) -> bool {
    config.matches_usb(port.vid, port.pid)
}

/// Pick the single download-mode device out of `ports`.
pub fn select_idt_port(ports: &[PortInfo], config: &ProtocolConfig) -> Result<PortInfo> {
    let mut matching: Vec<&PortInfo> = ports.iter().filter(|p| is_idt_port(p, config)).collect();
    debug!(
        "{} of {} serial ports match {:04X}:{:04X}",
        matching.len(),
        ports.len(),
        config.vid,
        config.pid
    );

    match matching.len() {
        0 => Err(Error::DeviceNotFound),
        1 => {
            let port = matching.remove(0).clone();
            warn!("Autoselecting {}", port.name);
            Ok(port)
        },
        _ => Err(Error::DeviceAmbiguous(
            matching.into_iter().map(|p| p.name.clone()).collect(),
        )),
    }
}

/// Resolve the port path to open, given an optional explicit choice and a
/// snapshot of enumerated ports.
pub fn locate_in(
    ports: &[PortInfo],
    explicit: Option<&str>,
    config: &ProtocolConfig,
) -> Result<String> {
    let path = match explicit {
        Some(path) => path.to_string(),
        None => select_idt_port(ports, config)?.name,
    };
    Ok(normalize_port_path(&path))
}

/// Resolve the port path to open by enumerating the host's serial ports.
///
/// Enumeration is skipped entirely when `explicit` is given.
#[cfg(feature = "native")]
pub fn locate(explicit: Option<&str>, config: &ProtocolConfig) -> Result<String> {
    use crate::port::{NativePortEnumerator, PortEnumerator};

    if explicit.is_some() {
        return locate_in(&[], explicit, config);
    }
    let ports = NativePortEnumerator::list_ports()?;
    locate_in(&ports, None, config)
}

/// Rewrite a port path into the form the serial backend expects.
#[cfg(windows)]
pub fn normalize_port_path(path: &str) -> String {
    extended_com_path(path)
}

/// Rewrite a port path into the form the serial backend expects.
#[cfg(not(windows))]
pub fn normalize_port_path(path: &str) -> String {
    path.to_string()
}

/// `COMn` names need the `\\.\` device namespace prefix above `COM9`.
#[cfg_attr(not(windows), allow(dead_code))]
fn extended_com_path(path: &str) -> String {
    let is_com = path
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("COM"));
    if is_com {
        format!(r"\\.\{path}")
    } else {
        path.to_string()
    }
}

/// Format a list of ports for display, marking download-mode devices.
pub fn format_port_list(ports: &[PortInfo], config: &ProtocolConfig) -> Vec<String> {
    let mut result = Vec::new();

    for port in ports {
        let device_info = if is_idt_port(port, config) {
            " [IDT]".to_string()
        } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" [VID:{vid:04X} PID:{pid:04X}]")
        } else {
            String::new()
        };

        let product_info = port
            .product
            .as_ref()
            .map(|p| format!(" - {p}"))
            .unwrap_or_default();

        result.push(format!("{}{}{}", port.name, device_info, product_info));
    }

    result
}
