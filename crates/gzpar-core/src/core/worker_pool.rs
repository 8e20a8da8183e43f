use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, Scope, ScopedJoinHandle};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::telemetry::tags;
use crate::types::duration_to_us;
use crate::{GzparError, Result};

/// Fixed-size set of worker threads spawned inside a thread scope.
///
/// The pool only owns lifecycle and bookkeeping; what a worker does is the
/// closure handed to [`WorkerPool::spawn`].
#[derive(Debug)]
pub struct WorkerPool {
    num_workers: usize,
    state: Arc<WorkerPoolState>,
}

impl WorkerPool {
    /// Creates a pool of `num_workers` threads (at least one).
    pub fn new(num_workers: usize) -> Self {
        let workers = num_workers.max(1);
        Self {
            num_workers: workers,
            state: Arc::new(WorkerPoolState::new(workers)),
        }
    }

    /// Number of workers configured in this pool.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Spawns one named thread per worker, each running `task` once.
    ///
    /// A panicking task is caught and reported by [`WorkerPoolHandle::join`].
    ///
    /// # Errors
    /// Fails if the OS refuses to create a thread. Workers spawned before the
    /// failure keep running and are joined when the scope ends.
    pub fn spawn<'scope, 'env, F>(
        &self,
        scope: &'scope Scope<'scope, 'env>,
        task: F,
    ) -> Result<WorkerPoolHandle<'scope>>
    where
        F: Fn(WorkerContext<'_>) + Send + Sync + 'scope,
    {
        let task = Arc::new(task);
        let mut handles = Vec::with_capacity(self.num_workers);

        for worker_id in 0..self.num_workers {
            let worker_state = Arc::clone(&self.state);
            let worker_task = Arc::clone(&task);
            let handle = thread::Builder::new()
                .name(format!("gzpar-worker-{worker_id}"))
                .spawn_scoped(scope, move || {
                    run_worker(worker_id, &worker_state, worker_task.as_ref());
                })
                .map_err(|err| GzparError::from(err).with_context("spawning worker thread"))?;
            handles.push(handle);
        }

        Ok(WorkerPoolHandle {
            state: Arc::clone(&self.state),
            handles,
        })
    }
}

#[derive(Debug)]
struct WorkerPoolState {
    started_at: Instant,
    task_counts: Vec<AtomicUsize>,
    busy_us: Vec<AtomicU64>,
    panics: Mutex<Vec<String>>,
}

impl WorkerPoolState {
    fn new(num_workers: usize) -> Self {
        Self {
            started_at: Instant::now(),
            task_counts: (0..num_workers).map(|_| AtomicUsize::new(0)).collect(),
            busy_us: (0..num_workers).map(|_| AtomicU64::new(0)).collect(),
            panics: Mutex::new(Vec::new()),
        }
    }

    fn record_panic(&self, message: String) {
        let mut panics = match self.panics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        panics.push(message);
    }

    fn take_first_panic(&self) -> Option<String> {
        let mut panics = match self.panics.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if panics.is_empty() {
            None
        } else {
            Some(panics.swap_remove(0))
        }
    }
}

/// Handle given to each worker for identifying itself and recording work.
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    worker_id: usize,
    state: &'a WorkerPoolState,
}

impl WorkerContext<'_> {
    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    /// Counts one finished task and the time spent on it.
    pub fn record_task(&self, elapsed: Duration) {
        self.state.task_counts[self.worker_id].fetch_add(1, Ordering::AcqRel);
        self.state.busy_us[self.worker_id].fetch_add(duration_to_us(elapsed), Ordering::AcqRel);
    }
}

/// Per-worker runtime metrics captured by the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerRuntimeSnapshot {
    pub worker_id: usize,
    pub tasks_completed: usize,
    pub busy: Duration,
    pub utilization: f64,
}

/// Runtime metrics snapshot for the worker pool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolRuntimeSnapshot {
    pub elapsed: Duration,
    pub tasks_completed: usize,
    pub workers: Vec<WorkerRuntimeSnapshot>,
}

/// Join handle for a spawned worker pool.
#[derive(Debug)]
pub struct WorkerPoolHandle<'scope> {
    state: Arc<WorkerPoolState>,
    handles: Vec<ScopedJoinHandle<'scope, ()>>,
}

impl WorkerPoolHandle<'_> {
    /// Waits for every worker to return.
    ///
    /// # Errors
    /// Returns the first worker panic, after all workers have been joined.
    pub fn join(self) -> Result<PoolRuntimeSnapshot> {
        let mut first_error = None;
        for handle in self.handles {
            if let Err(payload) = handle.join() {
                first_error.get_or_insert_with(|| panic_message(payload.as_ref()));
            }
        }
        if let Some(message) = first_error.or_else(|| self.state.take_first_panic()) {
            return Err(GzparError::Other(anyhow::anyhow!(
                "worker thread panicked: {message}"
            )));
        }

        Ok(snapshot(&self.state))
    }
}

fn run_worker<F>(worker_id: usize, state: &WorkerPoolState, task: &F)
where
    F: Fn(WorkerContext<'_>) + Send + Sync,
{
    tracing::debug!(target: tags::TARGET_PIPELINE, worker_id, "worker started");
    let context = WorkerContext { worker_id, state };

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task(context))) {
        let message = panic_message(payload.as_ref());
        tracing::error!(target: tags::TARGET_PIPELINE, worker_id, %message, "worker panicked");
        state.record_panic(message);
    }

    tracing::debug!(
        target: tags::TARGET_PIPELINE,
        worker_id,
        tasks = state.task_counts[worker_id].load(Ordering::Acquire),
        "worker stopped"
    );
}

fn snapshot(state: &WorkerPoolState) -> PoolRuntimeSnapshot {
    let elapsed = state.started_at.elapsed();
    let elapsed_us = duration_to_us(elapsed);

    let workers: Vec<_> = (0..state.task_counts.len())
        .map(|worker_id| {
            let busy_us = state.busy_us[worker_id].load(Ordering::Acquire).min(elapsed_us);
            let utilization = if elapsed_us == 0 {
                0.0
            } else {
                busy_us as f64 / elapsed_us as f64
            };
            WorkerRuntimeSnapshot {
                worker_id,
                tasks_completed: state.task_counts[worker_id].load(Ordering::Acquire),
                busy: Duration::from_micros(busy_us),
                utilization,
            }
        })
        .collect();

    PoolRuntimeSnapshot {
        elapsed,
        tasks_completed: workers.iter().map(|worker| worker.tasks_completed).sum(),
        workers,
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
