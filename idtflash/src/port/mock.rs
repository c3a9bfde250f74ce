//! Scripted in-memory port for protocol tests.

use crate::error::Result;
use crate::port::Port;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Observable state of a [`MockPort`].
#[derive(Debug, Default)]
pub(crate) struct MockState {
    /// Every flushed write, one entry per frame.
    pub frames: Vec<Vec<u8>>,
    /// Timeouts applied through `set_timeout`, in order.
    pub timeouts: Vec<Duration>,
    /// Scripted read outcomes; `None` means a read timeout.
    pub replies: VecDeque<Option<u8>>,
    /// Number of upcoming writes that fail.
    pub failing_writes: usize,
    /// Reply once the script is exhausted; `None` means time out forever.
    pub default_reply: Option<u8>,
    /// Delay applied to each write.
    pub write_delay: Duration,
    /// Number of buffer clears.
    pub clears: usize,
    /// Number of failed write attempts seen.
    pub write_failures: usize,
    /// Whether `close` was called.
    pub closed: bool,
    /// Bytes written since the last flush.
    pub pending: Vec<u8>,
}

/// In-memory port that acknowledges frames according to a script.
#[derive(Debug, Clone)]
pub(crate) struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    /// A port that acknowledges every frame with `0xAA`.
    pub fn acking() -> Self {
        Self::with_state(MockState {
            default_reply: Some(crate::protocol::frame::ACK),
            ..MockState::default()
        })
    }

    /// A port that never answers.
    pub fn silent() -> Self {
        Self::with_state(MockState::default())
    }

    pub fn with_state(state: MockState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Sent frames whose first byte equals `tag`.
    pub fn frames_tagged(&self, tag: u8) -> Vec<Vec<u8>> {
        self.state()
            .frames
            .iter()
            .filter(|f| f.first() == Some(&tag))
            .cloned()
            .collect()
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state();
        let reply = match state.replies.pop_front() {
            Some(reply) => reply,
            None => state.default_reply,
        };
        match reply {
            Some(byte) if !buf.is_empty() => {
                buf[0] = byte;
                Ok(1)
            },
            Some(_) => Ok(0),
            None => Err(io::Error::new(ErrorKind::TimedOut, "no data")),
        }
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let delay = self.state().write_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        let mut state = self.state();
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            state.write_failures += 1;
            return Err(io::Error::new(ErrorKind::BrokenPipe, "write failed"));
        }
        state.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut state = self.state();
        let frame = std::mem::take(&mut state.pending);
        if !frame.is_empty() {
            state.frames.push(frame);
        }
        Ok(())
    }
}

impl Port for MockPort {
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.state().timeouts.push(timeout);
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        let mut state = self.state();
        state.clears += 1;
        state.pending.clear();
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn close(&mut self) -> Result<()> {
        self.state().closed = true;
        Ok(())
    }
}
