/// Receives read-side progress after every block.
///
/// Calls come from the reader thread and must return quickly; a sink never
/// slows down or fails the pipeline.
pub trait ProgressSink: Send + Sync {
    fn report(&self, bytes_done: u64, bytes_total: u64, block_index: u32);
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _bytes_done: u64, _bytes_total: u64, _block_index: u32) {}
}

impl<F> ProgressSink for F
where
    F: Fn(u64, u64, u32) + Send + Sync,
{
    fn report(&self, bytes_done: u64, bytes_total: u64, block_index: u32) {
        self(bytes_done, bytes_total, block_index)
    }
}
