//! RDS group encoding
//!
//! Generates type 0A groups (basic tuning and switching information) that
//! carry a station's PI code and programme service name, two characters per
//! group, as raw device records.

use rds_protocol::{BlockPosition, BlockQuality, RawBlock, BLOCK_LEN};

use crate::tuner::VirtualStation;

/// PS name length on air
const PS_LEN: usize = 8;

/// Block C of a 0A group without alternative frequencies: "no AF" + filler
const NO_AF_WORD: u16 = 0xE0CD;

/// Music/speech flag set (music)
const MS_BIT: u16 = 0x0008;

/// Encoder for one station's type 0A group sequence
#[derive(Debug, Clone)]
pub struct GroupEncoder {
    pi: u16,
    pty: u8,
    ps: [u8; PS_LEN],
    segment: u8,
    corrupt_every: Option<u32>,
    block_count: u32,
}

impl GroupEncoder {
    /// Create an encoder for a station
    pub fn new(station: &VirtualStation) -> Self {
        let mut ps = [b' '; PS_LEN];
        for (dst, src) in ps.iter_mut().zip(station.ps.bytes().filter(u8::is_ascii)) {
            *dst = src;
        }

        Self {
            pi: station.pi,
            pty: station.pty & 0x1F,
            ps,
            segment: 0,
            corrupt_every: None,
            block_count: 0,
        }
    }

    /// Flag every `n`th block as uncorrectable (`None` or 0 disables)
    pub fn with_corruption(mut self, every: Option<u32>) -> Self {
        self.corrupt_every = every.filter(|&n| n > 0);
        self
    }

    pub fn pi(&self) -> u16 {
        self.pi
    }

    /// Information words of the next group, advancing the PS segment
    pub fn next_words(&mut self) -> [u16; 4] {
        let segment = self.segment;
        self.segment = (self.segment + 1) % 4;

        let block_b = (u16::from(self.pty) << 5) | MS_BIT | u16::from(segment);
        let offset = usize::from(segment) * 2;
        let block_d = u16::from_be_bytes([self.ps[offset], self.ps[offset + 1]]);

        [self.pi, block_b, NO_AF_WORD, block_d]
    }

    /// Raw records of the next group
    pub fn next_blocks(&mut self) -> [RawBlock; 4] {
        let words = self.next_words();
        let positions = [
            BlockPosition::A,
            BlockPosition::B,
            BlockPosition::C,
            BlockPosition::D,
        ];

        let mut blocks = [RawBlock::from_bytes([0; BLOCK_LEN]); 4];
        for (i, (word, position)) in words.into_iter().zip(positions).enumerate() {
            self.block_count = self.block_count.wrapping_add(1);
            let quality = match self.corrupt_every {
                Some(n) if self.block_count % n == 0 => BlockQuality::Uncorrectable,
                _ => BlockQuality::Clean,
            };
            blocks[i] = RawBlock::new(word, position, quality);
        }
        blocks
    }

    /// Device bytes of the next group
    pub fn next_bytes(&mut self) -> Vec<u8> {
        blocks_to_bytes(&self.next_blocks())
    }
}

/// Serialize blocks in device byte order
pub fn blocks_to_bytes(blocks: &[RawBlock]) -> Vec<u8> {
    blocks.iter().flat_map(|b| b.to_bytes()).collect()
}
