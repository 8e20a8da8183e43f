use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::GzparError;

pub type Result<T> = std::result::Result<T, GzparError>;

/// Items that carry their position in the original stream.
///
/// Ordered queues use this index to restore delivery order.
pub trait Sequenced {
    fn sequence_index(&self) -> u32;
}

/// A unit of work moving through the pipeline.
///
/// Blocks are created by the reader, transformed exactly once by a worker and
/// consumed by the writer. Ownership moves through the queues, so no two tasks
/// ever hold the same block.
#[derive(Debug, Clone)]
pub struct Block {
    pub sequence_index: u32,
    pub input_payload: Bytes,
    output_payload: Option<Vec<u8>>,
}

impl Block {
    /// Creates an untransformed block.
    ///
    /// # Arguments
    /// * `sequence_index` - Position of the block in the logical stream
    /// * `input_payload` - Bytes to hand to the codec
    pub fn new(sequence_index: u32, input_payload: impl Into<Bytes>) -> Self {
        Self {
            sequence_index,
            input_payload: input_payload.into(),
            output_payload: None,
        }
    }

    pub fn input_len(&self) -> usize {
        self.input_payload.len()
    }

    /// Returns the transformed bytes, if a worker has already run.
    pub fn output(&self) -> Option<&[u8]> {
        self.output_payload.as_deref()
    }

    pub fn is_transformed(&self) -> bool {
        self.output_payload.is_some()
    }

    /// Stores the transformed bytes and releases the input payload.
    ///
    /// # Errors
    /// Fails if the block was already transformed.
    pub fn set_output(&mut self, output: Vec<u8>) -> Result<()> {
        if self.output_payload.is_some() {
            return Err(GzparError::Format("block output already set"));
        }
        self.output_payload = Some(output);
        self.input_payload = Bytes::new();
        Ok(())
    }

    /// Consumes the block, returning its transformed bytes.
    pub fn into_output(self) -> Option<Vec<u8>> {
        self.output_payload
    }
}

impl Sequenced for Block {
    fn sequence_index(&self) -> u32 {
        self.sequence_index
    }
}

/// Whether a run packs raw data or restores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Compress,
    Decompress,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compress => f.write_str("compress"),
            Self::Decompress => f.write_str("decompress"),
        }
    }
}

/// Wire layout of the compressed side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramingMode {
    /// Plain concatenated gzip members with the MTIME field holding the member length.
    Sequential,
    /// Members prefixed by a big-endian block index in place of the gzip magic.
    IndexTagged,
}

impl FramingMode {
    /// File extension and command-line name of the format.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sequential => "gz",
            Self::IndexTagged => "agz",
        }
    }

    /// Looks a format up by its name (`gz` or `agz`, case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "gz" => Some(Self::Sequential),
            "agz" => Some(Self::IndexTagged),
            _ => None,
        }
    }
}

/// Converts a duration to microseconds, clamped to `u64::MAX`.
#[inline]
pub fn duration_to_us(duration: Duration) -> u64 {
    duration.as_micros().min(u64::MAX as u128) as u64
}
