//! idtflash CLI - Command-line tool for HiSilicon Kirin devices in download mode.
//!
//! ## Features
//!
//! - Upload the loader chain of a chipset profile (stage 0)
//! - Replace the bootloader unlock code
//! - Wipe factory reset protection data
//! - Wait for a device to enter download mode
//! - Shell completion generation
//! - Environment variable and configuration file support

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod interrupt;
mod prompt;
mod serial;

use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Check if emoji/animations should be used (TTY and colors enabled).
pub(crate) fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

/// Failures with a dedicated exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Invalid invocation (exit code 2).
    #[error("{0}")]
    Usage(String),
    /// Missing or invalid configuration or loader files (exit code 3).
    #[error("{0}")]
    Config(String),
    /// Device could not be found or opened (exit code 4).
    #[error("{0}")]
    Device(String),
    /// Cancelled by the user (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::Device(_) => 4,
            Self::Cancelled(_) => 130,
        }
    }
}

/// Exit code for an error, from the first classified cause in its chain.
fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return cli_err.exit_code();
        }
        if let Some(lib_err) = cause.downcast_ref::<idtflash::Error>() {
            return match lib_err {
                idtflash::Error::DeviceNotFound
                | idtflash::Error::DeviceAmbiguous(_)
                | idtflash::Error::Serial(_) => 4,
                idtflash::Error::MissingRole(_)
                | idtflash::Error::Manifest(_)
                | idtflash::Error::LoaderImage { .. } => 3,
                _ => 1,
            };
        }
    }
    1
}

/// idtflash - Unlock HiSilicon Kirin devices through download (IDT) mode.
///
/// Environment variables:
///   IDTFLASH_PORT              - Serial port of the device
///   IDTFLASH_LOADERS           - Loader directory (default: loaders)
///   IDTFLASH_FASTBOOT          - Fastboot executable (default: fastboot)
///   IDTFLASH_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "idtflash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub(crate) struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "IDTFLASH_PORT")]
    pub port: Option<String>,

    /// Directory with one loader profile per chipset [default: loaders].
    #[arg(short, long, global = true, env = "IDTFLASH_LOADERS", value_name = "DIR")]
    pub loaders: Option<PathBuf>,

    /// Fastboot executable for the command channel [default: fastboot].
    #[arg(long, global = true, env = "IDTFLASH_FASTBOOT", value_name = "PROGRAM")]
    pub fastboot: Option<PathBuf>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "IDTFLASH_NON_INTERACTIVE")]
    pub non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Loader directory from the command line, configuration, or default.
    pub(crate) fn loaders_dir(&self, config: &Config) -> PathBuf {
        self.loaders
            .clone()
            .or_else(|| config.loaders.dir.clone())
            .unwrap_or_else(|| PathBuf::from("loaders"))
    }
}

/// Available commands.
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Upload the loader images of a chipset (stage 0 only).
    Upload {
        /// Chipset profile (prompted for if omitted).
        chipset: Option<String>,

        /// Wait for the device to enter download mode.
        #[arg(long)]
        wait: bool,
    },

    /// Upload loaders, then replace the bootloader unlock code.
    Unlock {
        /// Chipset profile (prompted for if omitted).
        chipset: Option<String>,

        /// Wait for the device to enter download mode.
        #[arg(long)]
        wait: bool,

        /// Directory for stock_key.txt and new_key.txt.
        #[arg(long, default_value = ".", value_name = "DIR")]
        key_dir: PathBuf,
    },

    /// Upload loaders, then erase factory reset protection data.
    WipeFrp {
        /// Chipset profile (prompted for if omitted).
        chipset: Option<String>,

        /// Wait for the device to enter download mode.
        #[arg(long)]
        wait: bool,

        /// Do not ask for confirmation.
        #[arg(short, long)]
        yes: bool,
    },

    /// Wait for a device in download mode and print its port.
    Wait,

    /// List available serial ports.
    ListPorts {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },

    /// List chipset profiles in the loader directory.
    ListChipsets,

    /// Generate shell completion scripts.
    Completions {
        /// Shell type (auto-detected if omitted).
        #[arg(value_enum)]
        shell: Option<Shell>,
    },
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Upload { chipset, wait } => {
            commands::stage::cmd_upload(cli, &config, chipset.as_deref(), *wait)
        },
        Commands::Unlock {
            chipset,
            wait,
            key_dir,
        } => commands::stage::cmd_unlock(cli, &config, chipset.as_deref(), *wait, key_dir),
        Commands::WipeFrp { chipset, wait, yes } => {
            commands::stage::cmd_wipe_frp(cli, &config, chipset.as_deref(), *wait, *yes)
        },
        Commands::Wait => commands::ports::cmd_wait(cli),
        Commands::ListPorts { json } => commands::ports::cmd_list_ports(*json),
        Commands::ListChipsets => commands::ports::cmd_list_chipsets(&cli.loaders_dir(&config)),
        Commands::Completions { shell } => commands::completions::cmd_completions(*shell),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "idtflash v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    interrupt::install_handler();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", style("Error:").red().bold());
            ExitCode::from(exit_code(&err))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    // ---- clap validation ----

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_upload() {
        let cli = Cli::try_parse_from(["idtflash", "--port", "/dev/ttyUSB0", "upload", "kirin970"])
            .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        match cli.command {
            Commands::Upload { chipset, wait } => {
                assert_eq!(chipset.as_deref(), Some("kirin970"));
                assert!(!wait);
            },
            _ => panic!("expected upload"),
        }
    }

    #[test]
    fn test_cli_parse_unlock() {
        let cli = Cli::try_parse_from(["idtflash", "unlock", "--wait", "--key-dir", "/tmp/keys"])
            .unwrap();
        match cli.command {
            Commands::Unlock {
                chipset,
                wait,
                key_dir,
            } => {
                assert!(chipset.is_none());
                assert!(wait);
                assert_eq!(key_dir, PathBuf::from("/tmp/keys"));
            },
            _ => panic!("expected unlock"),
        }
    }

    #[test]
    fn test_cli_parse_unlock_default_key_dir() {
        let cli = Cli::try_parse_from(["idtflash", "unlock", "hi3660"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Unlock { ref key_dir, .. } if key_dir == &PathBuf::from(".")
        ));
    }

    #[test]
    fn test_cli_parse_wipe_frp() {
        let cli = Cli::try_parse_from(["idtflash", "wipe-frp", "kirin970", "-y"]).unwrap();
        assert!(matches!(cli.command, Commands::WipeFrp { yes: true, .. }));
    }

    #[test]
    fn test_cli_parse_list_ports_json() {
        let cli = Cli::try_parse_from(["idtflash", "list-ports", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::ListPorts { json: true }));
    }

    #[test]
    fn test_cli_parse_completions() {
        let cli = Cli::try_parse_from(["idtflash", "completions", "zsh"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions {
                shell: Some(Shell::Zsh)
            }
        ));
    }

    #[test]
    fn test_cli_global_options() {
        let cli = Cli::try_parse_from([
            "idtflash",
            "--loaders",
            "/srv/loaders",
            "--fastboot",
            "/opt/fastboot",
            "-vv",
            "--quiet",
            "--non-interactive",
            "--config",
            "/tmp/config.toml",
            "list-chipsets",
        ])
        .unwrap();
        assert_eq!(cli.loaders, Some(PathBuf::from("/srv/loaders")));
        assert_eq!(cli.fastboot, Some(PathBuf::from("/opt/fastboot")));
        assert_eq!(cli.verbose, 2);
        assert!(cli.quiet);
        assert!(cli.non_interactive);
        assert_eq!(cli.config_path, Some(PathBuf::from("/tmp/config.toml")));
    }

    #[test]
    fn test_cli_missing_subcommand() {
        assert!(Cli::try_parse_from(["idtflash"]).is_err());
    }

    #[test]
    fn test_loaders_dir_precedence() {
        let mut config = Config::default();
        let cli = Cli::try_parse_from(["idtflash", "list-chipsets"]).unwrap();
        if cli.loaders.is_none() {
            assert_eq!(cli.loaders_dir(&config), PathBuf::from("loaders"));
            config.loaders.dir = Some(PathBuf::from("/cfg/loaders"));
            assert_eq!(cli.loaders_dir(&config), PathBuf::from("/cfg/loaders"));
        }

        let cli = Cli::try_parse_from(["idtflash", "-l", "/cli/loaders", "list-chipsets"]).unwrap();
        assert_eq!(cli.loaders_dir(&config), PathBuf::from("/cli/loaders"));
    }

    // ---- exit codes ----

    #[test]
    fn test_exit_code_cli_errors() {
        assert_eq!(exit_code(&CliError::Usage(String::new()).into()), 2);
        assert_eq!(exit_code(&CliError::Config(String::new()).into()), 3);
        assert_eq!(exit_code(&CliError::Device(String::new()).into()), 4);
        assert_eq!(exit_code(&CliError::Cancelled(String::new()).into()), 130);
    }

    #[test]
    fn test_exit_code_library_errors_through_context() {
        let err = anyhow::Error::new(idtflash::Error::DeviceNotFound).context("Upload failed");
        assert_eq!(exit_code(&err), 4);

        let err = anyhow::Error::new(idtflash::Error::MissingRole(idtflash::Role::Xloader))
            .context("Cannot prepare loaders");
        assert_eq!(exit_code(&err), 3);

        let err = anyhow::Error::new(idtflash::Error::LoaderImage {
            role: idtflash::Role::Uce,
            path: PathBuf::from("loaders/kirin970/uce.img"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(exit_code(&err), 3);

        let err = anyhow::Error::new(idtflash::Error::TransferTimeout { sent: 1, total: 3 });
        assert_eq!(exit_code(&err), 1);

        assert_eq!(exit_code(&anyhow::anyhow!("other")), 1);
    }
}
