//! Protocol configuration.
//!
//! All constants of the IDT download protocol are collected in one
//! immutable [`ProtocolConfig`] handed to the engine at construction. The
//! defaults are the values the device firmware expects; the per-phase
//! timings in particular encode device-side processing latency and are part
//! of the protocol contract.

use crate::protocol::{FrameKind, MAX_DATA_LEN};
use std::time::Duration;

/// USB vendor id of a chipset enumerated in download mode.
pub const IDT_VID: u16 = 0x12D1;

/// USB product id of a chipset enumerated in download mode.
pub const IDT_PID: u16 = 0x3609;

/// Baud rate of the download-mode serial interface.
pub const IDT_BAUD: u32 = 115_200;

/// Response timeout and attempt budget for one frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTiming {
    /// Read timeout for the single response byte.
    pub timeout: Duration,
    /// Number of send attempts before giving up.
    pub attempts: u32,
}

impl PhaseTiming {
    /// Create a timing entry.
    pub const fn new(timeout: Duration, attempts: u32) -> Self {
        Self { timeout, attempts }
    }
}

/// Immutable protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// USB vendor id used for device selection.
    pub vid: u16,
    /// USB product id used for device selection.
    pub pid: u16,
    /// Serial baud rate.
    pub baud_rate: u32,
    /// Connection-level timeout before any phase timing is applied.
    pub connect_timeout: Duration,
    /// Payload bytes per data frame.
    pub chunk_size: usize,
    /// Wall-clock budget for the data frames of one image.
    pub upload_timeout: Duration,
    /// Pause after a tail frame before the connection is reused.
    pub tail_settle: Duration,
    /// Pause after all images are uploaded, before command-channel use.
    pub post_upload_settle: Duration,
    /// Timing for the start frame.
    pub start: PhaseTiming,
    /// Timing for header frames.
    pub header: PhaseTiming,
    /// Timing for data frames.
    pub data: PhaseTiming,
    /// Timing for tail frames.
    pub tail: PhaseTiming,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            vid: IDT_VID,
            pid: IDT_PID,
            baud_rate: IDT_BAUD,
            connect_timeout: Duration::from_secs(1),
            chunk_size: MAX_DATA_LEN,
            upload_timeout: Duration::from_secs(50),
            tail_settle: Duration::from_millis(500),
            post_upload_settle: Duration::from_secs(5),
            start: PhaseTiming::new(Duration::from_millis(30), 10_000),
            header: PhaseTiming::new(Duration::from_millis(90), 10),
            data: PhaseTiming::new(Duration::from_millis(450), 40),
            tail: PhaseTiming::new(Duration::from_millis(10), 10),
        }
    }
}

impl ProtocolConfig {
    /// Timing for the given frame kind.
    #[must_use]
    pub fn phase(&self, kind: FrameKind) -> PhaseTiming {
        match kind {
            FrameKind::Start => self.start,
            FrameKind::Header => self.header,
            FrameKind::Data => self.data,
            FrameKind::Tail => self.tail,
        }
    }

    /// Override the timing of one frame kind.
    #[must_use]
    pub fn with_phase(mut self, kind: FrameKind, timing: PhaseTiming) -> Self {
        match kind {
            FrameKind::Start => self.start = timing,
            FrameKind::Header => self.header = timing,
            FrameKind::Data => self.data = timing,
            FrameKind::Tail => self.tail = timing,
        }
        self
    }

    /// Set the upload budget.
    #[must_use]
    pub fn with_upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = timeout;
        self
    }

    /// Set both settle delays.
    #[must_use]
    pub fn with_settle(mut self, tail: Duration, post_upload: Duration) -> Self {
        self.tail_settle = tail;
        self.post_upload_settle = post_upload;
        self
    }

    /// Set the payload size per data frame.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Whether a USB vendor/product pair identifies a download-mode device.
    pub fn matches_usb(&self, vid: Option<u16>, pid: Option<u16>) -> bool {
        vid == Some(self.vid) && pid == Some(self.pid)
    }
}
