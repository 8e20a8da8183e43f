use std::io::Read;

use bytes::Bytes;

use crate::budget::MemoryBudget;
use crate::compression::GzipCodec;
use crate::io::read_up_to;
use crate::types::{Block, Direction, FramingMode};
use crate::{GzparError, Result};

use super::{frame_member, frame_tagged, read_member, read_tagged};

/// Knobs shared by all framer variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerSettings {
    /// Codec applied to every block.
    pub codec: GzipCodec,
    /// Raw bytes per block on the compression side.
    pub block_size: usize,
    /// Declared record lengths at or above this value are rejected.
    pub alloc_limit: u64,
    /// Whether index-tagged compression writes blocks in index order.
    pub ordered_tagged_output: bool,
}

impl FramerSettings {
    /// Derives block size and allocation ceiling from a memory budget.
    pub fn from_budget(budget: &MemoryBudget, codec: GzipCodec) -> Self {
        Self {
            codec,
            block_size: budget.block_size(),
            alloc_limit: budget.alloc_limit(),
            ordered_tagged_output: true,
        }
    }
}

/// Encode/decode logic for one direction of one wire layout.
///
/// Selected once per run and held by the orchestrator; each worker calls
/// [`BlockFramer::transform`] on its own blocks, the reader calls
/// [`BlockFramer::decode_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockFramer {
    SequentialCompress(FramerSettings),
    SequentialDecompress(FramerSettings),
    TaggedCompress(FramerSettings),
    TaggedDecompress(FramerSettings),
}

impl BlockFramer {
    pub fn new(direction: Direction, mode: FramingMode, settings: FramerSettings) -> Self {
        match (direction, mode) {
            (Direction::Compress, FramingMode::Sequential) => Self::SequentialCompress(settings),
            (Direction::Decompress, FramingMode::Sequential) => {
                Self::SequentialDecompress(settings)
            }
            (Direction::Compress, FramingMode::IndexTagged) => Self::TaggedCompress(settings),
            (Direction::Decompress, FramingMode::IndexTagged) => Self::TaggedDecompress(settings),
        }
    }

    /// Picks a framer by format name (`gz` or `agz`).
    ///
    /// # Errors
    /// Returns a configuration error for an unknown name.
    pub fn resolve(direction: Direction, name: &str, settings: FramerSettings) -> Result<Self> {
        let mode = FramingMode::from_name(name).ok_or_else(|| {
            GzparError::Config(format!("unknown format `{name}` (expected gz or agz)"))
        })?;
        Ok(Self::new(direction, mode, settings))
    }

    pub fn settings(&self) -> &FramerSettings {
        match self {
            Self::SequentialCompress(settings)
            | Self::SequentialDecompress(settings)
            | Self::TaggedCompress(settings)
            | Self::TaggedDecompress(settings) => settings,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::SequentialCompress(_) | Self::TaggedCompress(_) => Direction::Compress,
            Self::SequentialDecompress(_) | Self::TaggedDecompress(_) => Direction::Decompress,
        }
    }

    pub fn mode(&self) -> FramingMode {
        match self {
            Self::SequentialCompress(_) | Self::SequentialDecompress(_) => FramingMode::Sequential,
            Self::TaggedCompress(_) | Self::TaggedDecompress(_) => FramingMode::IndexTagged,
        }
    }

    pub fn name(&self) -> &'static str {
        self.mode().name()
    }

    /// Whether the write queue must deliver blocks in index order.
    ///
    /// Sequential output carries no index, so it is always ordered. Tagged
    /// output is ordered unless the settings opt out on the compression side.
    pub fn requires_ordered_output(&self) -> bool {
        match self {
            Self::TaggedCompress(settings) => settings.ordered_tagged_output,
            Self::SequentialCompress(_)
            | Self::SequentialDecompress(_)
            | Self::TaggedDecompress(_) => true,
        }
    }

    /// Reads the next block from `source`.
    ///
    /// Compressors cut raw data into `block_size` chunks; decompressors read one
    /// framed record. `expected_index` is the read-order counter; the tagged
    /// decompressor ignores it in favour of the index stored on the wire.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn decode_next<R: Read + ?Sized>(
        &self,
        source: &mut R,
        expected_index: u32,
    ) -> Result<Option<Block>> {
        match self {
            Self::SequentialCompress(settings) | Self::TaggedCompress(settings) => {
                read_raw_block(source, settings.block_size, expected_index)
            }
            Self::SequentialDecompress(settings) => Ok(read_member(source, settings.alloc_limit)?
                .map(|record| Block::new(expected_index, record))),
            Self::TaggedDecompress(settings) => Ok(read_tagged(source, settings.alloc_limit)?
                .map(|(index, record)| Block::new(index, record))),
        }
    }

    /// Runs the codec over the block's input and stores the framed output.
    pub fn transform(&self, mut block: Block) -> Result<Block> {
        let output = self
            .encode(&block)
            .map_err(|err| err.with_context(format!("block {}", block.sequence_index)))?;
        block.set_output(output)?;
        Ok(block)
    }

    fn encode(&self, block: &Block) -> Result<Vec<u8>> {
        match self {
            Self::SequentialCompress(settings) => {
                frame_member(settings.codec.compress(&block.input_payload)?)
            }
            Self::TaggedCompress(settings) => frame_tagged(
                &settings.codec.compress(&block.input_payload)?,
                block.sequence_index,
            ),
            Self::SequentialDecompress(settings) | Self::TaggedDecompress(settings) => {
                settings.codec.decompress(&block.input_payload)
            }
        }
    }
}

fn read_raw_block<R: Read + ?Sized>(
    source: &mut R,
    block_size: usize,
    index: u32,
) -> Result<Option<Block>> {
    let mut buffer = vec![0u8; block_size.max(1)];
    let filled = read_up_to(source, &mut buffer)?;
    if filled == 0 {
        return Ok(None);
    }
    buffer.truncate(filled);
    Ok(Some(Block::new(index, Bytes::from(buffer))))
}
