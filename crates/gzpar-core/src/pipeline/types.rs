use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::budget::DEFAULT_BLOCK_SIZE;
use crate::compression::gzip::DEFAULT_LEVEL;
use crate::core::{PoolRuntimeSnapshot, QueueStats};
use crate::types::{Direction, FramingMode};

/// Format used when none is named.
pub const DEFAULT_FORMAT: &str = "agz";
/// Extension given to restored files when no destination is named.
pub const RESTORED_EXTENSION: &str = "file";

/// Construction config for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// File to read.
    pub source: PathBuf,
    /// File to create; inferred from `source` when `None`.
    pub destination: Option<PathBuf>,
    /// Compress or decompress.
    pub direction: Direction,
    /// Format name, `gz` or `agz`.
    pub format: String,
    /// Raw bytes per block when compressing.
    pub block_size: usize,
    /// Number of worker threads.
    pub workers: usize,
    /// Deflate level (0-9).
    pub compression_level: u32,
    /// Whether index-tagged compression writes blocks in index order.
    pub ordered_tagged_output: bool,
    /// Available memory override in bytes; sampled from the host when `None`.
    pub available_memory: Option<u64>,
}

impl PipelineConfig {
    /// Creates a configuration with default block size, worker count and format.
    pub fn new(direction: Direction, source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: None,
            direction,
            format: DEFAULT_FORMAT.to_string(),
            block_size: DEFAULT_BLOCK_SIZE,
            workers: num_cpus::get(),
            compression_level: DEFAULT_LEVEL,
            ordered_tagged_output: true,
            available_memory: None,
        }
    }

    pub fn with_destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level;
        self
    }

    /// Lets index-tagged compression write blocks as soon as they are ready.
    pub fn with_unordered_tagged_output(mut self) -> Self {
        self.ordered_tagged_output = false;
        self
    }

    pub fn with_available_memory(mut self, bytes: u64) -> Self {
        self.available_memory = Some(bytes);
        self
    }
}

/// Infers a destination path from the source path.
///
/// Compression appends the format name (`data.bin` becomes `data.bin.agz`);
/// decompression swaps the last extension for `.file`. Both stay in the
/// source's directory.
pub fn default_destination(source: &Path, direction: Direction, mode: FramingMode) -> PathBuf {
    match direction {
        Direction::Compress => {
            let mut name = source.as_os_str().to_os_string();
            name.push(".");
            name.push(mode.name());
            PathBuf::from(name)
        }
        Direction::Decompress => source.with_extension(RESTORED_EXTENSION),
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every block was read, transformed and written.
    Completed,
    /// A task failed; output written so far is left in place.
    Aborted,
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub direction: Direction,
    pub mode: FramingMode,
    pub elapsed: Duration,
    /// Bytes consumed from the source.
    pub input_bytes: u64,
    /// Bytes appended to the destination.
    pub output_bytes: u64,
    pub blocks_read: u64,
    pub blocks_written: u64,
    /// Message of the first task failure, if any.
    pub error: Option<String>,
    pub read_queue: QueueStats,
    pub write_queue: QueueStats,
    pub workers: PoolRuntimeSnapshot,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}
