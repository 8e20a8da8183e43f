use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::core::reorder::ReorderBuffer;
use crate::telemetry::tags;
use crate::types::Sequenced;

/// Occupancy figures for one queue, captured for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Backpressure threshold in FIFO-resident items.
    pub capacity: u64,
    /// Whether the queue restores index order.
    pub ordered: bool,
    /// Items accepted by `push`.
    pub pushed: u64,
    /// Items handed out by `pop`.
    pub popped: u64,
    /// Highest FIFO residency observed.
    pub peak_resident: usize,
    /// Highest reorder-buffer occupancy observed.
    pub peak_pending: usize,
    /// Items still waiting in the reorder buffer.
    pub pending: usize,
}

#[derive(Debug)]
struct QueueState<T> {
    fifo: VecDeque<T>,
    reorder: ReorderBuffer<T>,
    closed: bool,
    pushed: u64,
    popped: u64,
    peak_resident: usize,
}

/// Blocking FIFO between two pipeline stages.
///
/// Producers wait while more than `capacity` items sit in the FIFO; consumers
/// wait while it is empty and the queue is still open. In ordered mode, items
/// are released to the FIFO strictly by increasing [`Sequenced::sequence_index`]
/// starting at 0, early arrivals parking in a reorder buffer that does not count
/// against `capacity`.
///
/// All state lives behind one mutex; every state change wakes every waiter.
#[derive(Debug)]
pub struct BoundedOrderedQueue<T> {
    label: &'static str,
    capacity: u64,
    ordered: bool,
    state: Mutex<QueueState<T>>,
    changed: Condvar,
}

impl<T: Sequenced> BoundedOrderedQueue<T> {
    pub fn new(capacity: u64, ordered: bool) -> Self {
        Self::with_label("queue", capacity, ordered)
    }

    /// Creates a queue whose log lines carry `label`.
    pub fn with_label(label: &'static str, capacity: u64, ordered: bool) -> Self {
        Self {
            label,
            capacity,
            ordered,
            state: Mutex::new(QueueState {
                fifo: VecDeque::new(),
                reorder: ReorderBuffer::new(),
                closed: false,
                pushed: 0,
                popped: 0,
                peak_resident: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Hands an item to the queue, waiting while the FIFO is over capacity.
    ///
    /// Returns `Ok(false)` without enqueuing if the queue is closed, which
    /// only happens while the pipeline is shutting down.
    ///
    /// # Errors
    /// In ordered mode, fails if the item's index was already delivered or is
    /// already waiting in the reorder buffer.
    pub fn push(&self, item: T) -> Result<bool> {
        let mut state = self.lock();
        while state.fifo.len() as u64 > self.capacity && !state.closed {
            state = self.wait(state);
        }
        if state.closed {
            return Ok(false);
        }

        if self.ordered {
            let QueueState { fifo, reorder, .. } = &mut *state;
            reorder.push(item.sequence_index(), item, fifo)?;
        } else {
            state.fifo.push_back(item);
        }
        state.pushed += 1;
        state.peak_resident = state.peak_resident.max(state.fifo.len());

        drop(state);
        self.changed.notify_all();
        Ok(true)
    }

    /// Takes the head item, waiting while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and drained; items queued
    /// before `close` are always delivered first.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.fifo.pop_front() {
                state.popped += 1;
                drop(state);
                self.changed.notify_all();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.wait(state);
        }
    }

    /// Stops accepting items and wakes every waiter. Safe to call repeatedly.
    pub fn close(&self) {
        let mut state = self.lock();
        if !state.closed {
            state.closed = true;
            tracing::debug!(
                target: tags::TARGET_QUEUE,
                queue = self.label,
                pushed = state.pushed,
                peak_resident = state.peak_resident,
                peak_pending = state.reorder.peak_pending(),
                "queue closed"
            );
        }
        drop(state);
        self.changed.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Items currently in the FIFO.
    pub fn len(&self) -> usize {
        self.lock().fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items parked in the reorder buffer.
    pub fn pending_len(&self) -> usize {
        self.lock().reorder.pending_len()
    }

    /// Next index the reorder buffer is waiting for.
    pub fn next_expected(&self) -> u32 {
        self.lock().reorder.next_expected()
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.lock();
        QueueStats {
            capacity: self.capacity,
            ordered: self.ordered,
            pushed: state.pushed,
            popped: state.popped,
            peak_resident: state.peak_resident,
            peak_pending: state.reorder.peak_pending(),
            pending: state.reorder.pending_len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, QueueState<T>>) -> MutexGuard<'a, QueueState<T>> {
        match self.changed.wait(guard) {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
