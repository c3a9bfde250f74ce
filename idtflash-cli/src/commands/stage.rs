//! Upload, unlock, and FRP wipe command implementations.
//!
//! All three run stage 0 (loader upload). `unlock` and `wipe-frp` then wait
//! for the device to reboot and continue over the fastboot command channel.

use anyhow::{Context, Result};
use console::style;
use idtflash::{
    FastbootTool, FlashSession, LoaderDir, ProtocolConfig, Role, StageSequencer, UnlockOutcome,
    list_chipsets, unlock, wipe_frp,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::interrupt::{self, Phase};
use crate::serial::{SerialOptions, select_serial_port};
use crate::{Cli, CliError, prompt, use_fancy_output};

/// Renders per-role upload progress.
///
/// A progress bar per role on a terminal, `<role>: NN%` lines otherwise.
struct StageProgress {
    quiet: bool,
    fancy: bool,
    current: Option<(Role, ProgressBar)>,
}

impl StageProgress {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            fancy: use_fancy_output(),
            current: None,
        }
    }

    fn update(&mut self, role: Role, percent: u8) {
        if self.quiet {
            return;
        }
        if !self.fancy {
            eprintln!("{role}: {percent}%");
            return;
        }

        if self.current.as_ref().is_none_or(|(r, _)| *r != role) {
            self.finish();
            let pb = ProgressBar::new(100);
            #[allow(clippy::unwrap_used)] // Static template string
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{prefix:>9.bold} [{bar:40.cyan/blue}] {pos:>3}%")
                    .unwrap()
                    .progress_chars("#>-"),
            );
            pb.set_prefix(role.to_string());
            self.current = Some((role, pb));
        }
        if let Some((_, pb)) = &self.current {
            pb.set_position(u64::from(percent));
        }
    }

    fn finish(&mut self) {
        if let Some((_, pb)) = self.current.take() {
            pb.finish();
        }
    }
}

/// Resolve the chipset profile, prompting when none was given.
fn resolve_chipset(cli: &Cli, loaders: &Path, chipset: Option<&str>) -> Result<String> {
    if let Some(name) = chipset {
        return Ok(name.to_string());
    }
    if cli.non_interactive {
        return Err(CliError::Usage(
            "No chipset given (required in non-interactive mode)".to_string(),
        )
        .into());
    }

    let chipsets = list_chipsets(loaders).map_err(|e| {
        CliError::Config(format!(
            "Cannot read loader directory {}: {e}",
            loaders.display()
        ))
    })?;
    if chipsets.is_empty() {
        return Err(CliError::Config(format!(
            "No chipset profiles in {}",
            loaders.display()
        ))
        .into());
    }

    prompt::ensure_interactive_terminal("Choosing a chipset")?;
    let index = prompt::select_one("Select the chipset", &chipsets)?;
    Ok(chipsets[index].clone())
}

/// Stage 0: upload the loader chain of `chipset`.
fn run_stage0(cli: &Cli, config: &Config, chipset: Option<&str>, wait: bool) -> Result<()> {
    let protocol = ProtocolConfig::default();
    let root = cli.loaders_dir(config);
    let chipset = resolve_chipset(cli, &root, chipset)?;
    let loaders = LoaderDir::new(&root, &chipset);

    // Everything on disk is checked before any device access.
    let images = StageSequencer::load_images(&loaders)
        .with_context(|| format!("Cannot prepare loaders for {chipset}"))?;

    if !cli.quiet {
        eprintln!(
            "{} Uploading images for chipset {}",
            style("📦").cyan(),
            style(&chipset).bold()
        );
        for image in &images {
            eprintln!(
                "    {} {} @ 0x{:08X} ({} bytes)",
                style("•").dim(),
                image.role,
                image.address,
                image.len()
            );
        }
    }

    let options = SerialOptions {
        port: cli.port.clone(),
        config_port: config.connection.port.clone(),
        wait,
        non_interactive: cli.non_interactive,
        quiet: cli.quiet,
    };
    let port = select_serial_port(&options, &protocol)?;
    if !cli.quiet {
        eprintln!("{} Using port {}", style("🔌").cyan(), style(&port).cyan());
    }

    let sequencer = StageSequencer::new(protocol.clone());
    let mut progress = StageProgress::new(cli.quiet);
    let result = {
        let _phase = interrupt::enter(Phase::Uploading);
        sequencer.upload_all(
            &images,
            || FlashSession::connect(Some(&port), &protocol),
            |role, percent| progress.update(role, percent),
        )
    };
    progress.finish();
    result.context("Upload failed")?;

    if !cli.quiet {
        eprintln!("{} Upload complete", style("✓").green());
    }
    sequencer.settle();
    Ok(())
}

fn fastboot_tool(cli: &Cli, config: &Config) -> FastbootTool {
    let program = cli
        .fastboot
        .clone()
        .or_else(|| config.fastboot.program.clone())
        .unwrap_or_else(|| PathBuf::from("fastboot"));
    FastbootTool::new(program)
}

/// Write the keys next to each other in `dir`.
fn save_keys(dir: &Path, outcome: &UnlockOutcome) -> Result<()> {
    if let Some(stock) = &outcome.stock_key {
        let path = dir.join("stock_key.txt");
        fs::write(&path, format!("{stock}\n"))
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    let path = dir.join("new_key.txt");
    fs::write(&path, format!("{}\n", outcome.new_key))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Upload command implementation.
pub(crate) fn cmd_upload(cli: &Cli, config: &Config, chipset: Option<&str>, wait: bool) -> Result<()> {
    run_stage0(cli, config, chipset, wait)
}

/// Unlock command implementation.
pub(crate) fn cmd_unlock(
    cli: &Cli,
    config: &Config,
    chipset: Option<&str>,
    wait: bool,
    key_dir: &Path,
) -> Result<()> {
    run_stage0(cli, config, chipset, wait)?;

    let mut tool = fastboot_tool(cli, config);
    let outcome = unlock(&mut tool, &mut rand::thread_rng()).context("Unlock failed")?;
    save_keys(key_dir, &outcome)?;

    match &outcome.stock_key {
        Some(stock) => println!("stock key: {stock}"),
        None => println!("stock key: none"),
    }
    println!("new key: {}", outcome.new_key);

    if !cli.quiet {
        if outcome.stock_key.is_some() {
            eprintln!(
                "{} Old key saved to {}",
                style("✓").green(),
                key_dir.join("stock_key.txt").display()
            );
        }
        eprintln!(
            "{} New key saved to {}",
            style("✓").green(),
            key_dir.join("new_key.txt").display()
        );
    }
    Ok(())
}

/// FRP wipe command implementation.
pub(crate) fn cmd_wipe_frp(
    cli: &Cli,
    config: &Config,
    chipset: Option<&str>,
    wait: bool,
    yes: bool,
) -> Result<()> {
    if !yes {
        if cli.non_interactive {
            return Err(CliError::Usage(
                "Wiping FRP requires --yes in non-interactive mode".to_string(),
            )
            .into());
        }
        prompt::ensure_interactive_terminal("Confirming the FRP wipe")?;
        if !prompt::confirm("This erases factory reset protection data. Continue?")? {
            return Err(CliError::Cancelled("FRP wipe cancelled".to_string()).into());
        }
    }

    run_stage0(cli, config, chipset, wait)?;

    let mut tool = fastboot_tool(cli, config);
    wipe_frp(&mut tool).context("FRP wipe failed")?;

    if !cli.quiet {
        eprintln!("{} Done", style("✓").green());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_keys() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = UnlockOutcome {
            stock_key: Some("0123456789ABCDEF".to_string()),
            new_key: "FEDCBA9876543210".to_string(),
        };

        save_keys(dir.path(), &outcome).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("stock_key.txt")).unwrap(),
            "0123456789ABCDEF\n"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("new_key.txt")).unwrap(),
            "FEDCBA9876543210\n"
        );
    }

    #[test]
    fn test_save_keys_without_stock_key() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = UnlockOutcome {
            stock_key: None,
            new_key: "FEDCBA9876543210".to_string(),
        };

        save_keys(dir.path(), &outcome).unwrap();

        assert!(!dir.path().join("stock_key.txt").exists());
        assert!(dir.path().join("new_key.txt").exists());
    }
}
