//! Image upload over the IDT download protocol.
//!
//! An upload is a header frame carrying length and load address, one data
//! frame per chunk of payload, and a tail frame carrying the data frame
//! count:
//!
//! ```text
//! host                                device
//!  | -- header (len, addr) ------------> |
//!  | <------------------------- 1 byte - |
//!  | -- data #1 ------------------------> |
//!  | <------------------------- 1 byte - |
//!  |    ...                              |
//!  | -- data #n ------------------------> |
//!  | <------------------------- 1 byte - |
//!  | -- tail (n) ----------------------> |
//!  | <------------------------- 1 byte - |
//! ```
//!
//! Data frames must all go out within the upload budget measured from the
//! header frame; otherwise the transfer is abandoned without a tail frame
//! and the device has to be power cycled.

use crate::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::port::Port;
use crate::protocol::frame::{self, MAX_DATA_LEN, frames_needed};
use crate::protocol::FrameKind;
use crate::transport::FrameTransport;
use log::{debug, info};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::thread;
use std::time::Instant;

/// Emits whole percentages, each value at most once and never decreasing.
#[derive(Debug)]
struct ProgressReporter {
    total: usize,
    last: Option<u8>,
}

impl ProgressReporter {
    fn new(total: usize) -> Self {
        Self { total, last: None }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn advance<F: FnMut(u8)>(&mut self, done: usize, progress: &mut F) {
        // done <= total, so the quotient is at most 100
        let percent = (done * 100 / self.total) as u8;
        if self.last.is_none_or(|last| percent > last) {
            self.last = Some(percent);
            progress(percent);
        }
    }
}

/// Uploads images to a device in download mode.
///
/// Generic over the port type `P`, which must implement the `Port` trait.
pub struct ImageFlasher<P: Port> {
    transport: FrameTransport<P>,
}

impl<P: Port> ImageFlasher<P> {
    /// Create a flasher on an opened port.
    pub fn new(port: P, config: ProtocolConfig) -> Self {
        Self {
            transport: FrameTransport::new(port, config),
        }
    }

    /// Protocol configuration in use.
    pub fn config(&self) -> &ProtocolConfig {
        self.transport.config()
    }

    /// Get a mutable reference to the underlying port.
    pub fn port_mut(&mut self) -> &mut P {
        self.transport.port_mut()
    }

    /// Probe for the device with the start frame.
    ///
    /// The attempt budget is large because the device may still be booting
    /// into download mode.
    pub fn send_start_frame(&mut self) -> Result<()> {
        info!("Sending start frame");
        self.transport
            .send_frame(FrameKind::Start, &frame::start_frame())
    }

    /// Upload an in-memory payload to `address`.
    ///
    /// `progress` receives the completed percentage after each data frame.
    pub fn upload<F>(&mut self, address: u32, payload: &[u8], progress: F) -> Result<()>
    where
        F: FnMut(u8),
    {
        self.upload_from_reader(payload, payload.len(), address, progress)
    }

    /// Upload an [`Image`] to its load address.
    pub fn upload_image<F>(&mut self, image: &Image, progress: F) -> Result<()>
    where
        F: FnMut(u8),
    {
        debug!(
            "Uploading {} ({} bytes) to 0x{:08X}",
            image.role,
            image.len(),
            image.address
        );
        self.upload(image.address, &image.data, progress)
    }

    /// Upload a file from disk, streaming it chunk by chunk.
    pub fn upload_file<F>(&mut self, path: &Path, address: u32, progress: F) -> Result<()>
    where
        F: FnMut(u8),
    {
        let file = File::open(path)?;
        let length = usize::try_from(file.metadata()?.len())
            .map_err(|_| Error::InvalidInput(format!("{} is too large", path.display())))?;
        debug!("Streaming {} ({length} bytes)", path.display());
        self.upload_from_reader(BufReader::new(file), length, address, progress)
    }

    /// Upload `length` bytes read from `source` to `address`.
    pub fn upload_from_reader<R, F>(
        &mut self,
        mut source: R,
        length: usize,
        address: u32,
        mut progress: F,
    ) -> Result<()>
    where
        R: Read,
        F: FnMut(u8),
    {
        if length == 0 {
            return Err(Error::InvalidInput("No data to upload".into()));
        }
        let wire_length = u32::try_from(length)
            .map_err(|_| Error::InvalidInput(format!("Invalid data length {length}")))?;

        let chunk_size = self.config().chunk_size;
        if chunk_size == 0 || chunk_size > MAX_DATA_LEN {
            return Err(Error::InvalidInput(format!(
                "Chunk size must be between 1 and {MAX_DATA_LEN}, got {chunk_size}"
            )));
        }
        let total = frames_needed(length, chunk_size);
        let budget = self.config().upload_timeout;

        info!("Sending header frame");
        self.transport
            .send_frame(FrameKind::Header, &frame::header_frame(wire_length, address))?;

        let start = Instant::now();
        let mut reporter = ProgressReporter::new(total);
        let mut chunk = vec![0u8; chunk_size];
        let mut remaining = length;

        for index in 1..=total {
            if start.elapsed() > budget {
                return Err(Error::TransferTimeout {
                    sent: index - 1,
                    total,
                });
            }

            let len = remaining.min(chunk_size);
            source
                .read_exact(&mut chunk[..len])
                .map_err(|e| match e.kind() {
                    ErrorKind::UnexpectedEof => Error::InvalidInput(format!(
                        "Image ended after {} of {length} bytes",
                        length - remaining
                    )),
                    _ => Error::Io(e),
                })?;

            self.transport
                .send_frame(FrameKind::Data, &frame::data_frame(index, &chunk[..len]))?;
            remaining -= len;
            reporter.advance(index, &mut progress);
        }

        info!("Sending tail frame");
        self.transport
            .send_frame(FrameKind::Tail, &frame::tail_frame(total))?;

        thread::sleep(self.config().tail_settle);
        Ok(())
    }
}
