//! Frame checksum used by the IDT download protocol.
//!
//! The device verifies every frame with a 16-bit register fed one byte at a
//! time through a CRC-16/CCITT table (polynomial `0x1021`, init `0`). After
//! the frame bytes, two zero bytes are shifted through the register so the
//! result covers the full width of the 2-byte trailer. The register is
//! neither reflected nor complemented.

use crc::{CRC_16_XMODEM, Crc};

/// Table-driven CRC-16/CCITT with a zero initial value.
const CCITT: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Number of zero bytes flushed through the register after the data.
const FLUSH_BYTES: usize = 2;

/// Size of the checksum trailer appended to every frame.
pub const TRAILER_LEN: usize = 2;

#[inline]
fn step(register: u16, byte: u8) -> u16 {
    let [high, _] = register.to_be_bytes();
    ((register << 8) | u16::from(byte)) ^ CCITT.checksum(&[high])
}

/// Compute the frame checksum over `data`.
pub fn checksum(data: &[u8]) -> u16 {
    let register = data.iter().fold(0u16, |reg, &b| step(reg, b));
    (0..FLUSH_BYTES).fold(register, |reg, _| step(reg, 0))
}

/// Append the big-endian checksum trailer to `frame`.
pub fn append_trailer(frame: &mut Vec<u8>) {
    let sum = checksum(frame);
    frame.extend_from_slice(&sum.to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(checksum(&[]), 0x0000);
    }

    #[test]
    fn test_checksum_check_string() {
        // Augmenting with two zero bytes gives the plain CRC-16/XMODEM value.
        assert_eq!(checksum(b"123456789"), 0x31C3);
        assert_eq!(checksum(b"123456789"), CCITT.checksum(b"123456789"));
    }

    #[test]
    fn test_checksum_single_byte() {
        assert_eq!(checksum(&[0x01]), 0x1021);
    }

    #[test]
    fn test_checksum_is_repeatable() {
        let data: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
        let first = checksum(&data);
        for _ in 0..10 {
            assert_eq!(checksum(&data), first);
        }
    }

    #[test]
    fn test_checksum_known_frames() {
        let start = [
            0xFE, 0x00, 0xFF, 0x01, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x02, 0x01,
        ];
        assert_eq!(checksum(&start), 0x47E5);
        assert_eq!(checksum(&[0xED, 0x03, 0xFC]), 0x99A0);
    }

    #[test]
    fn test_append_trailer_big_endian() {
        let mut frame = vec![0xED, 0x03, 0xFC];
        append_trailer(&mut frame);
        assert_eq!(frame, vec![0xED, 0x03, 0xFC, 0x99, 0xA0]);
    }
}
