use serde::{Deserialize, Serialize};

use crate::telemetry::memory::sample_host_memory;

/// Default size of one raw block on the compression side.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;

/// Allocation cap for 64-bit processes.
pub const ALLOC_CAP_64BIT: u64 = 2_097_152_000;
/// Allocation cap for 32-bit processes.
pub const ALLOC_CAP_32BIT: u64 = 524_288_000;

/// Memory figures sampled once per run.
///
/// The budget sizes the queue backpressure threshold and bounds the record
/// lengths a decoder is willing to allocate for. It is advisory: exceeding the
/// queue capacity only throttles producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBudget {
    available_bytes: u64,
    block_size: usize,
}

impl MemoryBudget {
    /// Samples available physical memory from the host.
    ///
    /// Falls back to the platform allocation cap when the host does not report it.
    pub fn detect(block_size: usize) -> Self {
        let available_bytes = sample_host_memory()
            .available_bytes
            .unwrap_or_else(platform_alloc_cap);
        Self::fixed(available_bytes, block_size)
    }

    /// Builds a budget from known figures.
    pub fn fixed(available_bytes: u64, block_size: usize) -> Self {
        Self {
            available_bytes,
            block_size: block_size.max(1),
        }
    }

    pub fn available_bytes(&self) -> u64 {
        self.available_bytes
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Largest single allocation a decoder may make for one record.
    pub fn alloc_limit(&self) -> u64 {
        self.available_bytes.min(platform_alloc_cap())
    }

    /// Number of FIFO-resident blocks above which producers wait.
    pub fn queue_capacity(&self) -> u64 {
        self.alloc_limit() / self.block_size as u64
    }
}

/// Per-process allocation cap for the current target width.
pub fn platform_alloc_cap() -> u64 {
    if cfg!(target_pointer_width = "64") {
        ALLOC_CAP_64BIT
    } else {
        ALLOC_CAP_32BIT
    }
}
