use std::collections::BTreeMap;

use crate::{GzparError, Result};

/// Restores a monotonic index sequence from out-of-order arrivals.
///
/// Early items wait in a `BTreeMap` until every lower index has been pushed,
/// at which point the contiguous run starting at the next expected index is
/// released. The map is unbounded; it only grows by as many items as workers
/// run ahead of the slowest block.
#[derive(Debug)]
pub struct ReorderBuffer<T> {
    next_index: u32,
    pending: BTreeMap<u32, T>,
    peak_pending: usize,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next_index: 0,
            pending: BTreeMap::new(),
            peak_pending: 0,
        }
    }

    /// Accepts an item and appends every item that is now in order to `ready`.
    ///
    /// # Errors
    /// Returns an error if `index` was already released or is already pending.
    pub fn push<E: Extend<T>>(&mut self, index: u32, item: T, ready: &mut E) -> Result<()> {
        if index < self.next_index {
            return Err(GzparError::InvalidBlockId {
                expected: self.next_index,
                actual: index,
            });
        }

        if index != self.next_index {
            if self.pending.contains_key(&index) {
                return Err(GzparError::Format("duplicate block index"));
            }
            self.pending.insert(index, item);
            self.peak_pending = self.peak_pending.max(self.pending.len());
            return Ok(());
        }

        ready.extend(Some(item));
        self.next_index = self.next_index.wrapping_add(1);
        while let Some(item) = self.pending.remove(&self.next_index) {
            ready.extend(Some(item));
            self.next_index = self.next_index.wrapping_add(1);
        }
        Ok(())
    }

    /// Returns the next index eligible for release.
    pub fn next_expected(&self) -> u32 {
        self.next_index
    }

    /// Returns the number of items waiting for a lower index.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lowest index still waiting, if any.
    pub fn first_pending(&self) -> Option<u32> {
        self.pending.keys().next().copied()
    }

    /// Highest number of items ever waiting at once.
    pub fn peak_pending(&self) -> usize {
        self.peak_pending
    }
}
