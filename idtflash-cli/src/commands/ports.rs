//! Device and profile discovery commands.

use anyhow::{Context, Result};
use console::style;
use idtflash::{
    NativePortEnumerator, PortEnumerator, PortInfo, ProtocolConfig, is_idt_port, list_chipsets,
};
use std::path::Path;

use crate::serial::wait_for_device;
use crate::{Cli, CliError};

fn port_json(port: &PortInfo, protocol: &ProtocolConfig) -> serde_json::Value {
    serde_json::json!({
        "name": port.name,
        "idt": is_idt_port(port, protocol),
        "vid": port.vid,
        "pid": port.pid,
        "manufacturer": port.manufacturer,
        "product": port.product,
        "serial": port.serial_number,
    })
}

/// The download-mode port an upload would pick without prompting, if any.
///
/// Listing is read-only, so this does not go through the logged selection.
fn sole_idt_port<'a>(ports: &'a [PortInfo], protocol: &ProtocolConfig) -> Option<&'a PortInfo> {
    let mut idt = ports.iter().filter(|p| is_idt_port(p, protocol));
    match (idt.next(), idt.next()) {
        (Some(port), None) => Some(port),
        _ => None,
    }
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let protocol = ProtocolConfig::default();
    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;

    if json {
        let values: Vec<serde_json::Value> = ports.iter().map(|p| port_json(p, &protocol)).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
        return Ok(());
    }

    eprintln!("{}", style("Serial ports").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let device_type = if is_idt_port(port, &protocol) {
            format!(" [{}]", style("IDT").yellow())
        } else {
            String::new()
        };

        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };

        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        println!(
            "  {} {}{}{}{}",
            style("•").green(),
            style(&port.name).cyan(),
            device_type,
            vid_pid,
            product
        );
    }

    if let Some(auto_port) = sole_idt_port(&ports, &protocol) {
        eprintln!(
            "\n{} Auto-selected device: {}",
            style("→").green().bold(),
            style(&auto_port.name).cyan().bold()
        );
    }

    Ok(())
}

/// List chipset profiles under the loader directory.
pub(crate) fn cmd_list_chipsets(loaders: &Path) -> Result<()> {
    let chipsets = list_chipsets(loaders).map_err(|e| {
        CliError::Config(format!(
            "Cannot read loader directory {}: {e}",
            loaders.display()
        ))
    })?;

    if chipsets.is_empty() {
        eprintln!(
            "{}",
            style(format!("No chipset profiles in {}", loaders.display())).dim()
        );
    }
    for name in chipsets {
        println!("{name}");
    }
    Ok(())
}

/// Wait for a device and print its port name.
pub(crate) fn cmd_wait(cli: &Cli) -> Result<()> {
    let port = wait_for_device(&ProtocolConfig::default(), cli.quiet)?;
    println!("{port}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_json_marks_idt() {
        let protocol = ProtocolConfig::default();
        let value = port_json(&PortInfo::usb("/dev/ttyUSB0", 0x12D1, 0x3609), &protocol);
        assert_eq!(value["idt"], true);
        assert_eq!(value["vid"], 0x12D1);

        let value = port_json(&PortInfo::named("/dev/ttyS0"), &protocol);
        assert_eq!(value["idt"], false);
        assert!(value["vid"].is_null());
    }

    #[test]
    fn test_sole_idt_port() {
        let protocol = ProtocolConfig::default();
        let serial = PortInfo::named("/dev/ttyS0");
        let first = PortInfo::usb("/dev/ttyUSB0", 0x12D1, 0x3609);
        let second = PortInfo::usb("/dev/ttyUSB1", 0x12D1, 0x3609);

        assert_eq!(sole_idt_port(&[serial.clone()], &protocol), None);
        assert_eq!(
            sole_idt_port(&[serial.clone(), first.clone()], &protocol),
            Some(&first)
        );
        assert_eq!(sole_idt_port(&[first, serial, second], &protocol), None);
    }
}
