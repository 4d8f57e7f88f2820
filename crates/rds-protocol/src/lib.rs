//! RDS Tuner Protocol Library
//!
//! This crate provides the pure, I/O-free pieces of the RDS tuner server:
//!
//! - **Blocks**: framing of the raw 3-byte records produced by a V4L2 radio
//!   device (payload LSB, payload MSB, status)
//! - **Groups**: the block stream decoder that reassembles aligned 4-block
//!   RDS groups, resynchronizing on out-of-order blocks
//! - **Commands**: the line-oriented client command language and the
//!   `% `-prefixed reply lines
//! - **Frequency**: the FM band limits and the device scale factor
//!
//! # Architecture
//!
//! Both inbound byte streams (device and client) go through a streaming
//! [`FrameCodec`]: bytes are pushed as they arrive and complete frames are
//! pulled out, so partial reads never lose data.
//!
//! # Example
//!
//! ```rust
//! use rds_protocol::{BlockCodec, FrameCodec, GroupDecoder};
//!
//! let mut codec = BlockCodec::new();
//! let mut decoder = GroupDecoder::new();
//!
//! // Four clean blocks, positions A, B, C, D
//! codec.push_bytes(&[
//!     0x34, 0x12, 0x00, 0x78, 0x56, 0x01, 0xBC, 0x9A, 0x02, 0xF0, 0xDE, 0x03,
//! ]);
//!
//! let mut groups = Vec::new();
//! while let Some(block) = codec.next_frame() {
//!     if let Some(group) = decoder.consume_block(block) {
//!         groups.push(group.to_string());
//!     }
//! }
//! assert_eq!(groups, vec!["1234 5678 9ABC DEF0 "]);
//! ```

pub mod block;
pub mod command;
pub mod error;
pub mod frequency;
pub mod group;

pub use block::{BlockCodec, BlockPosition, BlockQuality, RawBlock, BLOCK_LEN};
pub use command::{Command, LineCodec, Reply, REPLY_MARKER};
pub use error::{CommandError, FrequencyError};
pub use frequency::{
    step_wrapping, Frequency, FREQUENCY_MAX, FREQUENCY_MIN, FREQUENCY_SCALE, FREQUENCY_STEP,
};
pub use group::{BlockSlot, DecoderStats, Group, GroupDecoder, UNRECOVERABLE_MARKER};

/// Tuning direction for seek and single-step commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// Towards higher frequencies
    #[default]
    Up,
    /// Towards lower frequencies
    Down,
}

impl Direction {
    /// Returns a human-readable name for the direction
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

/// Trait for streaming codecs that split an incoming byte stream into frames
pub trait FrameCodec {
    /// The frame type produced by this codec
    type Frame;

    /// Push raw bytes into the codec's buffer
    fn push_bytes(&mut self, data: &[u8]);

    /// Try to extract the next complete frame from the buffer
    fn next_frame(&mut self) -> Option<Self::Frame>;

    /// Clear the internal buffer
    fn clear(&mut self);
}
