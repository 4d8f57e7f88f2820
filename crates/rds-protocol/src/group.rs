//! RDS group reassembly
//!
//! The decoder favors alignment over completeness: a block arriving at any
//! position other than the expected one throws away the whole group in
//! progress. Corrected and uncorrectable blocks keep their slot as a
//! placeholder so every emitted group still has four entries.

use std::fmt;

use tracing::{debug, trace};

use crate::block::{BlockQuality, RawBlock};

/// Token printed in place of a block that needed error correction
pub const UNRECOVERABLE_MARKER: &str = "----";

/// Number of blocks in a group
const GROUP_LEN: usize = 4;

/// One slot of a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockSlot {
    /// Clean payload
    Data(u16),
    /// Block received but not usable
    Corrupted,
}

impl BlockSlot {
    pub fn payload(&self) -> Option<u16> {
        match self {
            Self::Data(word) => Some(*word),
            Self::Corrupted => None,
        }
    }
}

impl fmt::Display for BlockSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(word) => write!(f, "{:04X}", word),
            Self::Corrupted => f.write_str(UNRECOVERABLE_MARKER),
        }
    }
}

/// A complete RDS group: blocks A, B, C (or C'), D in order
///
/// Displays as the client data line, e.g. `F201 0408 E20D 2020 `, each token
/// followed by a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    blocks: [BlockSlot; GROUP_LEN],
}

impl Group {
    pub fn new(blocks: [BlockSlot; GROUP_LEN]) -> Self {
        Self { blocks }
    }

    pub fn blocks(&self) -> &[BlockSlot; GROUP_LEN] {
        &self.blocks
    }

    /// Number of placeholder slots in this group
    pub fn corrupted_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|slot| matches!(slot, BlockSlot::Corrupted))
            .count()
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Every token carries its separator, the last one included
        for slot in &self.blocks {
            write!(f, "{} ", slot)?;
        }
        Ok(())
    }
}

/// Running counters for one decoder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Blocks consumed
    pub blocks: u64,
    /// Groups emitted
    pub groups: u64,
    /// Blocks dropped because they arrived at an unexpected position
    pub resyncs: u64,
    /// Accepted blocks flagged as corrected
    pub corrected: u64,
    /// Accepted blocks flagged as uncorrectable
    pub uncorrectable: u64,
}

/// Block stream decoder state machine
///
/// Owned by a single connection; never shared.
#[derive(Debug, Default)]
pub struct GroupDecoder {
    expected: usize,
    partial: Vec<BlockSlot>,
    stats: DecoderStats,
}

impl GroupDecoder {
    pub fn new() -> Self {
        Self {
            expected: 0,
            partial: Vec::with_capacity(GROUP_LEN),
            stats: DecoderStats::default(),
        }
    }

    /// Slot index the next block must carry (0-3)
    pub fn expected_position(&self) -> usize {
        self.expected
    }

    /// Whether a group is partially assembled
    pub fn is_assembling(&self) -> bool {
        !self.partial.is_empty()
    }

    pub fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Drop any partial group and wait for block A again
    pub fn reset(&mut self) {
        self.expected = 0;
        self.partial.clear();
    }

    /// Feed one block; returns a group when block D completes it
    pub fn consume_block(&mut self, block: RawBlock) -> Option<Group> {
        self.stats.blocks += 1;

        let position = block.position();
        if position.slot() != Some(self.expected) {
            debug!(
                "Skip block at position {:?}, expecting {}",
                position, self.expected
            );
            self.stats.resyncs += 1;
            self.reset();
            return None;
        }

        let quality = block.quality();
        let slot = match quality {
            BlockQuality::Clean => BlockSlot::Data(block.payload()),
            BlockQuality::Corrected => {
                self.stats.corrected += 1;
                BlockSlot::Corrupted
            }
            BlockQuality::Uncorrectable => {
                self.stats.uncorrectable += 1;
                BlockSlot::Corrupted
            }
        };
        self.partial.push(slot);

        if self.expected == GROUP_LEN - 1 {
            let mut blocks = [BlockSlot::Corrupted; GROUP_LEN];
            blocks.copy_from_slice(&self.partial);
            self.reset();
            self.stats.groups += 1;

            let group = Group::new(blocks);
            trace!("Group complete: {}", group);
            return Some(group);
        }

        self.expected += 1;
        None
    }
}
