//! Raw RDS block framing
//!
//! A V4L2 radio device delivers RDS data as a stream of 3-byte records
//! (`struct v4l2_rds_data`):
//!
//! | Byte | Content |
//! |------|---------|
//! | 0 | payload LSB |
//! | 1 | payload MSB |
//! | 2 | status: bits 0-2 block position, bits 6-7 error correction level |
//!
//! Position 4 is the C' offset word used by type B groups and occupies the
//! same slot as C. Positions 5-7 never belong to a group.

use crate::FrameCodec;

/// Length of one raw block record in bytes
pub const BLOCK_LEN: usize = 3;

const POSITION_MASK: u8 = 0x07;
const ERROR_MASK: u8 = 0xC0;
const CORRECTED: u8 = 0x40;
const UNCORRECTABLE: u8 = 0x80;

/// Block position as reported in the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockPosition {
    A,
    B,
    C,
    /// C' offset word, same slot as C
    CPrime,
    D,
    /// Position code outside 0-4
    Invalid(u8),
}

impl BlockPosition {
    /// Decode the position bits of a status byte
    pub fn from_status(status: u8) -> Self {
        match status & POSITION_MASK {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            3 => Self::D,
            4 => Self::CPrime,
            other => Self::Invalid(other),
        }
    }

    /// Slot index within a group (0-3), with C' normalized to C
    pub fn slot(self) -> Option<usize> {
        match self {
            Self::A => Some(0),
            Self::B => Some(1),
            Self::C | Self::CPrime => Some(2),
            Self::D => Some(3),
            Self::Invalid(_) => None,
        }
    }

    /// Position bits for encoding a status byte
    pub fn status_bits(self) -> u8 {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::CPrime => 4,
            Self::Invalid(code) => code & POSITION_MASK,
        }
    }
}

/// Error correction level reported in the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockQuality {
    /// Received without correction
    Clean,
    /// Errors were corrected by the receiver
    Corrected,
    /// Errors could not be corrected
    Uncorrectable,
}

impl BlockQuality {
    /// Decode the error bits of a status byte
    pub fn from_status(status: u8) -> Self {
        let bits = status & ERROR_MASK;
        if bits == 0 {
            Self::Clean
        } else if bits & UNCORRECTABLE != 0 {
            Self::Uncorrectable
        } else {
            Self::Corrected
        }
    }

    /// Error bits for encoding a status byte
    pub fn status_bits(self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::Corrected => CORRECTED,
            Self::Uncorrectable => UNCORRECTABLE,
        }
    }

    pub fn is_clean(self) -> bool {
        self == Self::Clean
    }
}

/// One 3-byte block record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawBlock {
    bytes: [u8; BLOCK_LEN],
}

impl RawBlock {
    /// Wrap a record exactly as read from the device
    pub fn from_bytes(bytes: [u8; BLOCK_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a record from its decoded parts
    pub fn new(payload: u16, position: BlockPosition, quality: BlockQuality) -> Self {
        let [lsb, msb] = payload.to_le_bytes();
        Self {
            bytes: [lsb, msb, position.status_bits() | quality.status_bits()],
        }
    }

    /// 16-bit payload (MSB from byte 1, LSB from byte 0)
    pub fn payload(&self) -> u16 {
        u16::from_le_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn status(&self) -> u8 {
        self.bytes[2]
    }

    pub fn position(&self) -> BlockPosition {
        BlockPosition::from_status(self.status())
    }

    pub fn quality(&self) -> BlockQuality {
        BlockQuality::from_status(self.status())
    }

    /// The record in device byte order
    pub fn to_bytes(&self) -> [u8; BLOCK_LEN] {
        self.bytes
    }
}

/// Streaming codec that splits device bytes into [`RawBlock`]s
///
/// Reads from the device are not guaranteed to end on a record boundary;
/// leftover bytes stay buffered until the rest of the record arrives.
#[derive(Debug, Default)]
pub struct BlockCodec {
    buffer: Vec<u8>,
}

impl BlockCodec {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(BLOCK_LEN * 16),
        }
    }

    /// Number of buffered bytes not yet forming a whole block
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl FrameCodec for BlockCodec {
    type Frame = RawBlock;

    fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn next_frame(&mut self) -> Option<RawBlock> {
        if self.buffer.len() < BLOCK_LEN {
            return None;
        }

        let mut bytes = [0u8; BLOCK_LEN];
        bytes.copy_from_slice(&self.buffer[..BLOCK_LEN]);
        self.buffer.drain(..BLOCK_LEN);
        Some(RawBlock::from_bytes(bytes))
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_byte_order() {
        let block = RawBlock::from_bytes([0x34, 0x12, 0x00]);
        assert_eq!(block.payload(), 0x1234);
    }

    #[test]
    fn test_position_decoding() {
        assert_eq!(BlockPosition::from_status(0x00), BlockPosition::A);
        assert_eq!(BlockPosition::from_status(0x03), BlockPosition::D);
        assert_eq!(BlockPosition::from_status(0x04), BlockPosition::CPrime);
        assert_eq!(BlockPosition::from_status(0x07), BlockPosition::Invalid(7));
        // Error bits do not disturb the position
        assert_eq!(BlockPosition::from_status(0xC1), BlockPosition::B);
    }

    #[test]
    fn test_c_prime_normalizes_to_c_slot() {
        assert_eq!(BlockPosition::CPrime.slot(), Some(2));
        assert_eq!(BlockPosition::C.slot(), Some(2));
        assert_eq!(BlockPosition::Invalid(5).slot(), None);
    }

    #[test]
    fn test_quality_decoding() {
        assert_eq!(BlockQuality::from_status(0x02), BlockQuality::Clean);
        assert_eq!(BlockQuality::from_status(0x42), BlockQuality::Corrected);
        assert_eq!(BlockQuality::from_status(0x82), BlockQuality::Uncorrectable);
        assert_eq!(BlockQuality::from_status(0xC2), BlockQuality::Uncorrectable);
    }

    #[test]
    fn test_new_matches_device_layout() {
        let block = RawBlock::new(0xABCD, BlockPosition::CPrime, BlockQuality::Corrected);
        assert_eq!(block.to_bytes(), [0xCD, 0xAB, 0x44]);
    }

    #[test]
    fn test_codec_buffers_partial_records() {
        let mut codec = BlockCodec::new();
        codec.push_bytes(&[0x01, 0x02]);
        assert!(codec.next_frame().is_none());
        assert_eq!(codec.pending(), 2);

        codec.push_bytes(&[0x03, 0x04]);
        let block = codec.next_frame().unwrap();
        assert_eq!(block.to_bytes(), [0x01, 0x02, 0x03]);
        assert!(codec.next_frame().is_none());
        assert_eq!(codec.pending(), 1);
    }

    #[test]
    fn test_codec_yields_multiple_blocks() {
        let mut codec = BlockCodec::new();
        codec.push_bytes(&[0, 0, 0, 1, 1, 1, 2, 2, 2]);
        assert_eq!(std::iter::from_fn(|| codec.next_frame()).count(), 3);

        codec.push_bytes(&[9]);
        codec.clear();
        assert_eq!(codec.pending(), 0);
    }
}
