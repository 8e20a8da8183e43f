//! Reader / worker pool / writer orchestration for one compression run.

mod progress;
mod types;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

pub use progress::{NoProgress, ProgressSink};
pub use types::{
    DEFAULT_FORMAT, PipelineConfig, RESTORED_EXTENSION, RunOutcome, RunReport,
    default_destination,
};

use crate::budget::MemoryBudget;
use crate::compression::GzipCodec;
use crate::core::worker_pool::panic_message;
use crate::core::{BoundedOrderedQueue, PoolRuntimeSnapshot, WorkerPool};
use crate::format::{BlockFramer, FramerSettings};
use crate::io::CountingReader;
use crate::telemetry::tags;
use crate::types::{Block, FramingMode};
use crate::{GzparError, Result};

/// A validated, ready-to-run compression or decompression job.
///
/// Construction resolves the framer, the destination path and the memory
/// budget; nothing touches the destination until [`Pipeline::run`].
pub struct Pipeline {
    source: PathBuf,
    destination: PathBuf,
    framer: BlockFramer,
    budget: MemoryBudget,
    workers: usize,
    progress: Arc<dyn ProgressSink>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("framer", &self.framer)
            .field("budget", &self.budget)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Validates `config` and prepares a run.
    ///
    /// # Errors
    /// Returns [`GzparError::Config`] when the format name is unknown, the
    /// source is missing or not a regular file, the block size is zero, or the
    /// destination resolves to the source itself.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mode = FramingMode::from_name(&config.format).ok_or_else(|| {
            GzparError::Config(format!(
                "unknown format `{}` (expected gz or agz)",
                config.format
            ))
        })?;

        match fs::metadata(&config.source) {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                return Err(GzparError::Config(format!(
                    "source `{}` is not a regular file",
                    config.source.display()
                )));
            }
            Err(err) => {
                return Err(GzparError::Config(format!(
                    "source `{}` cannot be opened: {err}",
                    config.source.display()
                )));
            }
        }

        if config.block_size == 0 {
            return Err(GzparError::Config("block size must be positive".to_string()));
        }

        let destination = config
            .destination
            .clone()
            .unwrap_or_else(|| default_destination(&config.source, config.direction, mode));
        if same_path(&config.source, &destination) {
            return Err(GzparError::Config(format!(
                "destination `{}` is the source file",
                destination.display()
            )));
        }

        let budget = match config.available_memory {
            Some(bytes) => MemoryBudget::fixed(bytes, config.block_size),
            None => MemoryBudget::detect(config.block_size),
        };
        let settings = FramerSettings {
            ordered_tagged_output: config.ordered_tagged_output,
            ..FramerSettings::from_budget(&budget, GzipCodec::new(config.compression_level))
        };

        Ok(Self {
            source: config.source,
            destination,
            framer: BlockFramer::new(config.direction, mode, settings),
            budget,
            workers: config.workers.max(1),
            progress: Arc::new(NoProgress),
        })
    }

    /// Replaces the progress sink, which defaults to [`NoProgress`].
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn framer(&self) -> &BlockFramer {
        &self.framer
    }

    pub fn budget(&self) -> &MemoryBudget {
        &self.budget
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs the job from the source file into the destination file.
    ///
    /// The destination is created (or truncated) by the writer thread. On
    /// abort, whatever was written so far stays on disk.
    pub fn run(&self) -> RunReport {
        let source = self.source.clone();
        let destination = self.destination.clone();
        let (report, _) = self.execute(
            move || {
                let file = File::open(&source)
                    .map_err(|err| GzparError::from(err).with_context("opening source"))?;
                let total = file.metadata()?.len();
                Ok((file, total))
            },
            move || {
                File::create(&destination)
                    .map_err(|err| GzparError::from(err).with_context("creating destination"))
            },
        );
        report
    }

    /// Runs the job over arbitrary streams instead of the configured paths.
    ///
    /// `total_len` is only used for progress reports. The destination is
    /// handed back flushed unless the writer itself failed.
    pub fn run_streams<R, W>(
        &self,
        source: R,
        total_len: u64,
        destination: W,
    ) -> (RunReport, Option<W>)
    where
        R: Read + Send,
        W: Write + Send,
    {
        self.execute(move || Ok((source, total_len)), move || Ok(destination))
    }

    fn execute<R, W, OR, OW>(
        &self,
        open_source: OR,
        open_destination: OW,
    ) -> (RunReport, Option<W>)
    where
        R: Read,
        W: Write + Send,
        OR: FnOnce() -> Result<(R, u64)> + Send,
        OW: FnOnce() -> Result<W> + Send,
    {
        let started = Instant::now();
        let capacity = self.budget.queue_capacity();
        let read_queue = BoundedOrderedQueue::with_label("read", capacity, false);
        let ordered_output = self.framer.requires_ordered_output();
        let write_queue = BoundedOrderedQueue::with_label("write", capacity, ordered_output);
        let shared = Shared::new(&read_queue, &write_queue);

        tracing::info!(
            target: tags::TARGET_PIPELINE,
            source = %self.source.display(),
            destination = %self.destination.display(),
            format = self.framer.name(),
            direction = %self.framer.direction(),
            workers = self.workers,
            available_memory = self.budget.available_bytes(),
            queue_limit = capacity,
            "run started"
        );

        let (pool, sink) = thread::scope(|scope| {
            let reader = thread::Builder::new()
                .name("gzpar-reader".to_string())
                .spawn_scoped(scope, || {
                    let _guard = AbortOnPanic::new(&shared, "reader");
                    if let Err(err) = self.read_blocks(open_source, &shared) {
                        shared.fail("reader", err);
                    }
                    shared.read_queue.close();
                });
            let reader = match reader {
                Ok(handle) => Some(handle),
                Err(err) => {
                    shared.fail("reader", GzparError::from(err).with_context("spawning reader"));
                    None
                }
            };

            let writer = thread::Builder::new()
                .name("gzpar-writer".to_string())
                .spawn_scoped(scope, || {
                    let _guard = AbortOnPanic::new(&shared, "writer");
                    match self.write_blocks(open_destination, &shared) {
                        Ok(sink) => Some(sink),
                        Err(err) => {
                            shared.fail("writer", err);
                            None
                        }
                    }
                });
            let writer = match writer {
                Ok(handle) => Some(handle),
                Err(err) => {
                    shared.fail("writer", GzparError::from(err).with_context("spawning writer"));
                    None
                }
            };

            let pool = WorkerPool::new(self.workers);
            let pool = match pool.spawn(scope, |ctx| {
                let _guard = AbortOnPanic::new(&shared, "worker");
                while !shared.is_aborted() {
                    let Some(block) = shared.read_queue.pop() else {
                        break;
                    };
                    let index = block.sequence_index;
                    let task_started = Instant::now();
                    let block = match self.framer.transform(block) {
                        Ok(block) => block,
                        Err(err) => {
                            shared.fail("worker", err);
                            break;
                        }
                    };
                    ctx.record_task(task_started.elapsed());
                    tracing::debug!(
                        target: tags::TARGET_PIPELINE,
                        worker_id = ctx.worker_id(),
                        index,
                        "block transformed"
                    );
                    match shared.write_queue.push(block) {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(err) => {
                            shared.fail("worker", err);
                            break;
                        }
                    }
                }
            }) {
                Ok(handle) => handle.join(),
                Err(err) => Err(err),
            };
            let pool = pool.unwrap_or_else(|err| {
                shared.fail("worker", err);
                PoolRuntimeSnapshot::default()
            });

            shared.write_queue.close();

            if let Some(Err(payload)) = reader.map(|handle| handle.join()) {
                shared.fail(
                    "reader",
                    GzparError::Other(anyhow::anyhow!(
                        "reader thread panicked: {}",
                        panic_message(payload.as_ref())
                    )),
                );
            }
            let sink = match writer.map(|handle| handle.join()) {
                Some(Ok(sink)) => sink,
                Some(Err(payload)) => {
                    shared.fail(
                        "writer",
                        GzparError::Other(anyhow::anyhow!(
                            "writer thread panicked: {}",
                            panic_message(payload.as_ref())
                        )),
                    );
                    None
                }
                None => None,
            };
            (pool, sink)
        });

        if !shared.is_aborted() && write_queue.pending_len() > 0 {
            let missing = write_queue.next_expected();
            shared.fail(
                "writer",
                GzparError::Format("index-tagged stream is missing a block")
                    .with_context(format!("block {missing} never arrived")),
            );
        }

        let report = RunReport {
            outcome: if shared.is_aborted() {
                RunOutcome::Aborted
            } else {
                RunOutcome::Completed
            },
            direction: self.framer.direction(),
            mode: self.framer.mode(),
            elapsed: started.elapsed(),
            input_bytes: shared.input_bytes.load(Ordering::Acquire),
            output_bytes: shared.output_bytes.load(Ordering::Acquire),
            blocks_read: shared.blocks_read.load(Ordering::Acquire),
            blocks_written: shared.blocks_written.load(Ordering::Acquire),
            error: shared.first_error(),
            read_queue: read_queue.stats(),
            write_queue: write_queue.stats(),
            workers: pool,
        };

        tracing::info!(
            target: tags::TARGET_PIPELINE,
            outcome = ?report.outcome,
            elapsed_ms = report.elapsed.as_millis() as u64,
            blocks_read = report.blocks_read,
            blocks_written = report.blocks_written,
            input_bytes = report.input_bytes,
            output_bytes = report.output_bytes,
            read_queue_peak = report.read_queue.peak_resident,
            write_queue_peak = report.write_queue.peak_resident,
            reorder_peak = report.write_queue.peak_pending,
            "run finished"
        );

        (report, sink)
    }

    fn read_blocks<R, OR>(&self, open_source: OR, shared: &Shared<'_>) -> Result<()>
    where
        R: Read,
        OR: FnOnce() -> Result<(R, u64)>,
    {
        let (source, total) = open_source()?;
        let mut reader = CountingReader::new(BufReader::new(source));
        let mut read_count: u64 = 0;

        while !shared.is_aborted() {
            let expected = u32::try_from(read_count)
                .map_err(|_| GzparError::Format("block count exceeds the index range"))?;
            let block = self.framer.decode_next(&mut reader, expected);
            shared.input_bytes.store(reader.consumed(), Ordering::Release);
            let Some(block) = block? else {
                break;
            };

            let index = block.sequence_index;
            read_count += 1;
            shared.blocks_read.fetch_add(1, Ordering::AcqRel);
            if !shared.read_queue.push(block)? {
                break;
            }
            self.progress.report(reader.consumed(), total, index);
        }

        tracing::debug!(
            target: tags::TARGET_PIPELINE,
            blocks = read_count,
            bytes = reader.consumed(),
            "reader finished"
        );
        Ok(())
    }

    fn write_blocks<W, OW>(&self, open_destination: OW, shared: &Shared<'_>) -> Result<W>
    where
        W: Write,
        OW: FnOnce() -> Result<W>,
    {
        let mut writer = BufWriter::new(open_destination()?);

        while !shared.is_aborted() {
            let Some(block) = shared.write_queue.pop() else {
                break;
            };
            let index = block.sequence_index;
            let output = block.into_output().ok_or_else(|| {
                GzparError::Other(anyhow::anyhow!("block {index} reached the writer untransformed"))
            })?;
            writer.write_all(&output).map_err(|err| {
                GzparError::from(err).with_context(format!("writing block {index}"))
            })?;
            shared.output_bytes.fetch_add(output.len() as u64, Ordering::AcqRel);
            shared.blocks_written.fetch_add(1, Ordering::AcqRel);
        }

        writer.flush()?;
        writer
            .into_inner()
            .map_err(|err| GzparError::from(err.into_error()))
    }
}

/// State every task of one run can see.
struct Shared<'q> {
    read_queue: &'q BoundedOrderedQueue<Block>,
    write_queue: &'q BoundedOrderedQueue<Block>,
    aborted: AtomicBool,
    first_error: Mutex<Option<String>>,
    input_bytes: AtomicU64,
    output_bytes: AtomicU64,
    blocks_read: AtomicU64,
    blocks_written: AtomicU64,
}

impl<'q> Shared<'q> {
    fn new(
        read_queue: &'q BoundedOrderedQueue<Block>,
        write_queue: &'q BoundedOrderedQueue<Block>,
    ) -> Self {
        Self {
            read_queue,
            write_queue,
            aborted: AtomicBool::new(false),
            first_error: Mutex::new(None),
            input_bytes: AtomicU64::new(0),
            output_bytes: AtomicU64::new(0),
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
        }
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Raises the abort flag and closes both queues so blocked tasks wake up.
    ///
    /// Only the first failure is recorded; later ones are logged at debug.
    fn fail(&self, stage: &'static str, err: GzparError) {
        if self
            .aborted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::error!(
                target: tags::TARGET_PIPELINE,
                stage,
                error = %err,
                "task failed, aborting run"
            );
            let mut first = match self.first_error.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            *first = Some(err.to_string());
        } else {
            tracing::debug!(
                target: tags::TARGET_PIPELINE,
                stage,
                error = %err,
                "task failed after abort"
            );
        }
        self.read_queue.close();
        self.write_queue.close();
    }

    fn first_error(&self) -> Option<String> {
        match self.first_error.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Aborts the run if the owning thread unwinds.
struct AbortOnPanic<'a, 'q> {
    shared: &'a Shared<'q>,
    stage: &'static str,
}

impl<'a, 'q> AbortOnPanic<'a, 'q> {
    fn new(shared: &'a Shared<'q>, stage: &'static str) -> Self {
        Self { shared, stage }
    }
}

impl Drop for AbortOnPanic<'_, '_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.fail(
                self.stage,
                GzparError::Other(anyhow::anyhow!("{} thread panicked", self.stage)),
            );
        }
    }
}

fn same_path(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => left == right,
    }
}
