//! IDT download protocol: checksum and frame layout.

pub mod checksum;
pub mod frame;

// Re-export common types
pub use checksum::checksum;
pub use frame::{FrameKind, MAX_DATA_LEN};
