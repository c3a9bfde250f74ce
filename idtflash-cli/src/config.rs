//! Configuration file support for idtflash.
//!
//! Configuration is loaded from multiple sources with the following priority (highest first):
//! 1. Command-line arguments
//! 2. Environment variables (IDTFLASH_*)
//! 3. Local config file (./idtflash.toml)
//! 4. Global config file (~/.config/idtflash/config.toml)
//!
//! ```toml
//! [connection]
//! port = "/dev/ttyUSB0"
//!
//! [loaders]
//! dir = "/opt/idtflash/loaders"
//!
//! [fastboot]
//! program = "/usr/bin/fastboot"
//! ```

use directories::ProjectDirs;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Preferred serial port (e.g., "/dev/ttyUSB0" or "COM3").
    pub port: Option<String>,
}

/// Loader image location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadersConfig {
    /// Directory holding one subdirectory per chipset.
    pub dir: Option<PathBuf>,
}

/// Command channel tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FastbootConfig {
    /// Fastboot-compatible executable.
    pub program: Option<PathBuf>,
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection configuration.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Loader configuration.
    #[serde(default)]
    pub loaders: LoadersConfig,
    /// Fastboot configuration.
    #[serde(default)]
    pub fastboot: FastbootConfig,
}

impl Config {
    /// Load configuration from all available sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        // Load global config
        if let Some(global_path) = Self::global_config_path() {
            if let Some(global_config) = Self::load_from_file(&global_path) {
                debug!("Loaded global config from {}", global_path.display());
                config.merge(global_config);
            }
        }

        // Load local config (overrides global)
        if let Some(local_config) = Self::load_from_file(Path::new("idtflash.toml")) {
            debug!("Loaded local config from idtflash.toml");
            config.merge(local_config);
        }

        config
    }

    /// Load configuration from a specific file path (--config flag).
    pub fn load_from_path(path: &Path) -> Self {
        if let Some(config) = Self::load_from_file(path) {
            debug!("Loaded config from {}", path.display());
            config
        } else {
            warn!(
                "Could not load config from {}, using defaults",
                path.display()
            );
            Self::default()
        }
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    None
                },
            },
            Err(e) => {
                warn!("Failed to read config file {}: {}", path.display(), e);
                None
            },
        }
    }

    /// Get the global configuration directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "idtflash").map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the global configuration file path.
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Merge another config into this one.
    fn merge(&mut self, other: Self) {
        if other.connection.port.is_some() {
            self.connection.port = other.connection.port;
        }
        if other.loaders.dir.is_some() {
            self.loaders.dir = other.loaders.dir;
        }
        if other.fastboot.program.is_some() {
            self.fastboot.program = other.fastboot.program;
        }
    }
}
