/// Tracing target for orchestrator lifecycle events.
pub const TARGET_PIPELINE: &str = "gzpar.pipeline";
/// Tracing target for bounded queue events.
pub const TARGET_QUEUE: &str = "gzpar.queue";
/// Tracing target for block framing events.
pub const TARGET_FORMAT: &str = "gzpar.format";
