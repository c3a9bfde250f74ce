//! Error types for idtflash.

use crate::image::Role;
use crate::protocol::FrameKind;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for idtflash operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for idtflash operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Rejected input (empty payload, oversized image, bad parameter).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No serial interface in download mode was found.
    #[error("No IDT mode device found")]
    DeviceNotFound,

    /// More than one serial interface in download mode was found.
    #[error("Multiple IDT devices found ({}). Specify the port manually", .0.join(", "))]
    DeviceAmbiguous(Vec<String>),

    /// A frame could not be delivered within its attempt budget.
    ///
    /// `source` is the most recent failure observed.
    #[error("Failed to send {frame} frame after {attempts} attempts: {source}")]
    TransportFailure {
        /// Kind of frame being sent.
        frame: FrameKind,
        /// Number of attempts made.
        attempts: u32,
        /// Last recorded transport failure.
        #[source]
        source: io::Error,
    },

    /// The upload budget elapsed before all data frames were sent.
    #[error("Upload timeout exceeded after {sent} of {total} data frames")]
    TransferTimeout {
        /// Data frames delivered before the deadline.
        sent: usize,
        /// Data frames the image needed.
        total: usize,
    },

    /// A mandatory image role is absent from the manifest.
    #[error("Manifest has no address for mandatory role '{0}'")]
    MissingRole(Role),

    /// A loader image named by the manifest cannot be read.
    #[error("Cannot read {role} image {}: {source}", .path.display())]
    LoaderImage {
        /// Role the image was loaded for.
        role: Role,
        /// Expected image file.
        path: PathBuf,
        /// Underlying read failure.
        #[source]
        source: io::Error,
    },

    /// Malformed or unreadable manifest.
    #[error("Invalid manifest: {0}")]
    Manifest(String),

    /// The external command-channel tool failed.
    #[error("Command channel error: {0}")]
    CommandChannel(String),
}
