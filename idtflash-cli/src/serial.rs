//! Serial port selection.
//!
//! The port for a session is resolved in this order:
//! - `--port` / `IDTFLASH_PORT`
//! - `[connection] port` from the configuration file
//! - with `--wait`, the first device to arrive in download mode
//! - the single attached download-mode device
//!
//! When several devices are attached, the user picks one interactively;
//! in non-interactive mode that is an error.

use {
    crate::{
        CliError,
        interrupt::{self, CANCELLED, Phase},
        prompt, use_fancy_output,
    },
    anyhow::Result,
    console::style,
    idtflash::{
        Error, NativePortEnumerator, PortEnumerator, PresenceWatcher, ProtocolConfig,
        format_port_list, select_idt_port,
    },
    indicatif::{ProgressBar, ProgressStyle},
    log::{debug, info},
    std::{sync::atomic::Ordering, time::Duration},
};

/// Interval between enumeration polls while waiting for a device.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub(crate) struct SerialOptions {
    /// Explicit port specified via CLI or environment.
    pub port: Option<String>,
    /// Port from the configuration file.
    pub config_port: Option<String>,
    /// Wait for a device instead of failing when none is attached.
    pub wait: bool,
    /// Non-interactive mode (fail if multiple devices).
    pub non_interactive: bool,
    /// Suppress status output.
    pub quiet: bool,
}

/// Resolve the port to open.
pub(crate) fn select_serial_port(options: &SerialOptions, protocol: &ProtocolConfig) -> Result<String> {
    if let Some(port) = &options.port {
        return Ok(port.clone());
    }

    if let Some(port) = &options.config_port {
        debug!("Using port from config: {port}");
        return Ok(port.clone());
    }

    if options.wait {
        return wait_for_device(protocol, options.quiet);
    }

    let ports = NativePortEnumerator::list_ports()?;
    match select_idt_port(&ports, protocol) {
        Ok(port) => Ok(port.name),
        Err(Error::DeviceAmbiguous(names)) if !options.non_interactive => {
            prompt::ensure_interactive_terminal("Choosing between several devices")?;
            let candidates: Vec<_> = ports
                .into_iter()
                .filter(|p| names.contains(&p.name))
                .collect();
            let labels = format_port_list(&candidates, protocol);
            let index = prompt::select_one("Select the device to use", &labels)?;
            Ok(candidates[index].name.clone())
        },
        Err(e) => Err(e.into()),
    }
}

/// Block until a download-mode device is attached and return its port.
///
/// Ctrl-C cancels the wait.
pub(crate) fn wait_for_device(protocol: &ProtocolConfig, quiet: bool) -> Result<String> {
    let spinner = if quiet || !use_fancy_output() {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        #[allow(clippy::unwrap_used)] // Static template string
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
        pb.set_message("Waiting for a device in download mode (Ctrl-C to cancel)...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    };
    if !quiet && !use_fancy_output() {
        eprintln!("Waiting for a device in download mode...");
    }

    let watcher = PresenceWatcher::spawn(POLL_INTERVAL, protocol.clone());
    let arrived = {
        let _phase = interrupt::enter(Phase::Waiting);
        watcher.wait_for_arrival(&CANCELLED)
    };
    spinner.finish_and_clear();

    match arrived {
        Some(port) => {
            info!("Device detected on {}", port.name);
            if !quiet {
                eprintln!("{} Device on {}", style("✓").green(), style(&port.name).cyan());
            }
            Ok(port.name)
        },
        None if CANCELLED.load(Ordering::SeqCst) => {
            Err(CliError::Cancelled("Waiting for device cancelled".to_string()).into())
        },
        None => Err(CliError::Device("Device watcher stopped unexpectedly".to_string()).into()),
    }
}
