pub mod memory;
pub mod tags;

pub use memory::{HostMemorySample, parse_meminfo, sample_host_memory};
