//! Command channel to the fastboot loader.
//!
//! Once the loader chain is running, device variables are read and written
//! with plain-text commands through an external fastboot-compatible tool.
//! Only the invocation boundary lives here; the fastboot wire protocol is
//! the tool's business.

use crate::error::{Error, Result};
use log::{debug, info};
use std::ffi::OsString;
use std::process::Command;

/// Runs textual commands against the device and returns their output.
pub trait CommandChannel {
    /// Run `command` (e.g. `getvar:nve:WVLOCK`) and return everything the
    /// channel printed.
    fn run(&mut self, command: &str) -> Result<String>;
}

/// [`CommandChannel`] backed by an external `fastboot` executable.
#[derive(Debug, Clone)]
pub struct FastbootTool {
    program: OsString,
}

impl Default for FastbootTool {
    fn default() -> Self {
        Self::new("fastboot")
    }
}

impl FastbootTool {
    /// Use `program` as the fastboot executable.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Executable in use.
    pub fn program(&self) -> &OsString {
        &self.program
    }
}

impl CommandChannel for FastbootTool {
    fn run(&mut self, command: &str) -> Result<String> {
        info!("[FASTBOOT] {command}");
        let output = Command::new(&self.program)
            .args(command.split_whitespace())
            .output()
            .map_err(|e| {
                Error::CommandChannel(format!(
                    "Failed to run {}: {e}",
                    self.program.to_string_lossy()
                ))
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("fastboot exited with {}", output.status);
        Ok(text)
    }
}
