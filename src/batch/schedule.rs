// src/batch/schedule.rs

//! Batch schedule derived from `(count, step)`.
//!
//! `count / step` processes run in each of `step` batches; the remaining
//! `count % step` processes form one extra batch, placed according to
//! [`RemainderOrder`]. When `step` exceeds `count` the schedule collapses to
//! a single batch of `count`.
//!
//! Sizes are computed on demand, never materialised, so a run with a huge
//! `step` costs nothing until its batches are actually launched.

use crate::types::RemainderOrder;

/// Ordered list of batch sizes. Every entry is >= 1 and the sizes add up to
/// the requested count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    count: usize,
    batch_size: usize,
    steps: usize,
    remainder: usize,
    order: RemainderOrder,
}

impl Schedule {
    pub fn compute(count: usize, step: usize, order: RemainderOrder) -> Self {
        let (batch_size, steps, remainder) = match (count, step) {
            (0, _) => (0, 0, 0),
            (_, 0) => (count, 1, 0),
            (_, step) if step > count => (count, 1, 0),
            (_, step) => (count / step, step, count % step),
        };

        Self {
            count,
            batch_size,
            steps,
            remainder,
            order,
        }
    }

    /// Batch sizes in launch order.
    pub fn sizes(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.len()).filter_map(|index| self.batch(index))
    }

    pub fn len(&self) -> usize {
        self.steps + usize::from(self.remainder > 0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remainder_index(&self) -> Option<usize> {
        if self.remainder == 0 {
            return None;
        }
        match self.order {
            RemainderOrder::First => Some(0),
            RemainderOrder::Last => Some(self.steps),
        }
    }

    /// Size of the batch at `index`, if scheduled.
    pub fn batch(&self, index: usize) -> Option<usize> {
        if index >= self.len() {
            None
        } else if self.remainder_index() == Some(index) {
            Some(self.remainder)
        } else {
            Some(self.batch_size)
        }
    }

    /// Total number of processes across all batches.
    pub fn total(&self) -> usize {
        self.count
    }

    /// 1-based slot of the first process in batch `index`.
    ///
    /// Slots keep increasing across batches so no two processes in one run
    /// share a slot.
    pub fn first_slot(&self, index: usize) -> usize {
        match self.remainder_index() {
            Some(0) if index > 0 => 1 + self.remainder + (index - 1) * self.batch_size,
            _ => 1 + index * self.batch_size,
        }
    }
}
