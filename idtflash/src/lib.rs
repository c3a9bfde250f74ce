//! # idtflash
//!
//! A library for uploading loader images to HiSilicon Kirin chipsets in
//! download (IDT) mode.
//!
//! A chipset in download mode enumerates as a USB serial interface
//! (`12D1:3609`) and accepts images through a small framed protocol:
//!
//! - a start frame probing for the device
//! - per image, a header frame (length and load address), 1 KiB data
//!   frames and a tail frame
//! - a CRC-16 trailer on every frame, one response byte per frame
//!
//! On top of the protocol engine the crate reads per-chipset loader
//! manifests, sequences the `xloader` / `uce` / `fastboot` stages, and
//! drives the fastboot command channel for bootloader unlock and FRP wipe.
//!
//! ## Features
//!
//! - `native` (default): serial port support via the `serialport` crate
//!
//! ## Example
//!
//! ```rust,no_run
//! use idtflash::{FlashSession, LoaderDir, ProtocolConfig, StageSequencer};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProtocolConfig::default();
//!     let loaders = LoaderDir::new("loaders", "kirin970");
//!
//!     #[cfg(feature = "native")]
//!     StageSequencer::new(config.clone()).run(
//!         &loaders,
//!         || FlashSession::connect(None, &config),
//!         |role, percent| println!("{role}: {percent}%"),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod device;
pub mod error;
pub mod fastboot;
pub mod flasher;
pub mod image;
pub mod port;
pub mod protocol;
pub mod sequencer;
pub mod session;
pub mod transport;
pub mod unlock;
pub mod watch;

// Re-exports for convenience
#[cfg(feature = "native")]
pub use port::{NativePort, NativePortEnumerator};
pub use {
    config::{PhaseTiming, ProtocolConfig},
    device::{format_port_list, is_idt_port, locate_in, normalize_port_path, select_idt_port},
    error::{Error, Result},
    fastboot::{CommandChannel, FastbootTool},
    flasher::ImageFlasher,
    image::{Image, LoaderDir, Role, RoleTable, list_chipsets},
    port::{Port, PortEnumerator, PortInfo, SerialConfig},
    protocol::{FrameKind, checksum},
    sequencer::StageSequencer,
    session::FlashSession,
    transport::FrameTransport,
    unlock::{UnlockOutcome, unlock, wipe_frp},
    watch::{PresenceEvent, PresenceWatcher},
};

#[cfg(feature = "native")]
pub use device::locate;
