pub mod budget;
pub mod compression;
pub mod core;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod telemetry;
pub mod types;

pub use budget::{DEFAULT_BLOCK_SIZE, MemoryBudget};
pub use compression::GzipCodec;
pub use crate::core::{
    BoundedOrderedQueue, PoolRuntimeSnapshot, QueueStats, ReorderBuffer, WorkerPool,
};
pub use error::GzparError;
pub use format::{BlockFramer, FramerSettings};
pub use io::CountingReader;
pub use pipeline::{
    NoProgress, Pipeline, PipelineConfig, ProgressSink, RunOutcome, RunReport, default_destination,
};
pub use types::{Block, Direction, FramingMode, Result, Sequenced};
