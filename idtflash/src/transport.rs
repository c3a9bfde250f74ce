//! Frame delivery with per-phase timeouts and retries.
//!
//! Each frame is written after discarding any buffered bytes, then exactly
//! one response byte is read under the timeout configured for the frame's
//! kind. A send succeeds as soon as that byte arrives; its value is only
//! logged when it differs from [`ACK`]. Write errors, read errors and read
//! timeouts all consume one attempt. When the budget runs out, the most
//! recent failure is returned.

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::port::Port;
use crate::protocol::FrameKind;
use crate::protocol::frame::ACK;
use log::trace;
use std::io;

/// Owns the open port and delivers one frame at a time.
pub struct FrameTransport<P: Port> {
    port: P,
    config: ProtocolConfig,
}

impl<P: Port> FrameTransport<P> {
    /// Wrap an opened port.
    pub fn new(port: P, config: ProtocolConfig) -> Self {
        Self { port, config }
    }

    /// Protocol configuration in use.
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Send an encoded frame of the given kind.
    pub fn send_frame(&mut self, kind: FrameKind, frame: &[u8]) -> Result<()> {
        let timing = self.config.phase(kind);
        if timing.attempts == 0 {
            return Err(Error::InvalidInput(format!(
                "attempt budget for {kind} frames is zero"
            )));
        }

        self.port.set_timeout(timing.timeout)?;

        let mut last_failure = None;
        for attempt in 1..=timing.attempts {
            match self.try_send(frame) {
                Ok(response) => {
                    if response != ACK {
                        trace!("{kind} frame answered with 0x{response:02X}");
                    }
                    if attempt > 1 {
                        trace!("{kind} frame delivered on attempt {attempt}");
                    }
                    return Ok(());
                },
                Err(e) => {
                    trace!(
                        "{kind} frame attempt {attempt}/{} failed: {e}",
                        timing.attempts
                    );
                    last_failure = Some(e);
                },
            }
        }

        Err(Error::TransportFailure {
            frame: kind,
            attempts: timing.attempts,
            source: last_failure.unwrap_or_else(|| io::Error::other("no attempt made")),
        })
    }

    /// Single attempt: clear, write, read one byte.
    fn try_send(&mut self, frame: &[u8]) -> io::Result<u8> {
        self.port.clear_buffers().map_err(io::Error::other)?;
        self.port.write_all(frame)?;
        self.port.flush()?;

        let mut response = [0u8; 1];
        self.port.read_exact(&mut response)?;
        Ok(response[0])
    }
}
