//! IDT download frame builders.
//!
//! ## Frame Formats
//!
//! Every frame ends with the 2-byte big-endian checksum from
//! [`checksum`](super::checksum), computed over all preceding bytes.
//!
//! ```text
//! Start:  FE 00 FF 01 00 00 00 04 00 00 02 01                  | CRC16 |
//! Header: FE 00 FF 01 | LEN (u32 BE) | ADDR (u32 BE)            | CRC16 |
//! Data:   DA | SEQ | ~SEQ | payload (<= 1024 bytes)             | CRC16 |
//! Tail:   ED | CNT | ~CNT                                       | CRC16 |
//! ```
//!
//! `SEQ` is the 1-based data frame index modulo 256 and `CNT` the number of
//! data frames modulo 256.

use super::checksum::{TRAILER_LEN, append_trailer};
use byteorder::{BigEndian, WriteBytesExt};
use std::fmt;

/// Start (presence probe) frame body.
pub const START_FRAME: [u8; 12] = [
    0xFE, 0x00, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x02, 0x01,
];

/// Header frame prefix (first four bytes of the start frame).
pub const HEADER_PREFIX: [u8; 4] = [0xFE, 0x00, 0xFF, 0x01];

/// Data frame tag.
pub const DATA_TAG: u8 = 0xDA;

/// Tail frame tag.
pub const TAIL_TAG: u8 = 0xED;

/// Acknowledge byte returned by the device.
pub const ACK: u8 = 0xAA;

/// Maximum payload carried by one data frame.
pub const MAX_DATA_LEN: usize = 0x400;

/// Frame kinds, each with its own response timeout and attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Presence probe sent once per session.
    Start,
    /// Announces length and load address of an image.
    Header,
    /// One chunk of image payload.
    Data,
    /// Closes an image transfer.
    Tail,
}

impl FrameKind {
    /// Lowercase name used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Header => "header",
            Self::Data => "data",
            Self::Tail => "tail",
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the start frame.
pub fn start_frame() -> Vec<u8> {
    let mut frame = Vec::with_capacity(START_FRAME.len() + TRAILER_LEN);
    frame.extend_from_slice(&START_FRAME);
    append_trailer(&mut frame);
    frame
}

/// Build a header frame announcing `length` bytes to load at `address`.
#[allow(clippy::unwrap_used)] // Writing to Vec<u8> cannot fail
pub fn header_frame(length: u32, address: u32) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_PREFIX.len() + 8 + TRAILER_LEN);
    frame.extend_from_slice(&HEADER_PREFIX);
    frame.write_u32::<BigEndian>(length).unwrap();
    frame.write_u32::<BigEndian>(address).unwrap();
    append_trailer(&mut frame);
    frame
}

/// Build the data frame for 1-based frame `index` carrying `chunk`.
///
/// `chunk` must not exceed [`MAX_DATA_LEN`].
#[allow(clippy::cast_possible_truncation)]
pub fn data_frame(index: usize, chunk: &[u8]) -> Vec<u8> {
    debug_assert!(chunk.len() <= MAX_DATA_LEN);
    let seq = index as u8;
    let mut frame = Vec::with_capacity(3 + chunk.len() + TRAILER_LEN);
    frame.push(DATA_TAG);
    frame.push(seq);
    frame.push(!seq);
    frame.extend_from_slice(chunk);
    append_trailer(&mut frame);
    frame
}

/// Build the tail frame closing a transfer of `total_frames` data frames.
#[allow(clippy::cast_possible_truncation)]
pub fn tail_frame(total_frames: usize) -> Vec<u8> {
    let count = total_frames as u8;
    let mut frame = Vec::with_capacity(3 + TRAILER_LEN);
    frame.push(TAIL_TAG);
    frame.push(count);
    frame.push(!count);
    append_trailer(&mut frame);
    frame
}

/// Number of data frames needed for a payload of `length` bytes.
pub fn frames_needed(length: usize, chunk_size: usize) -> usize {
    length.div_ceil(chunk_size)
}
