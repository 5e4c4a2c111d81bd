//! Batch planning for data larger than one device transfer
//!
//! Splitting `total` units into batches of `batch` units yields offsets
//! `0, batch, 2·batch, …`; the final batch holds `total mod batch` units when
//! that remainder is non-zero. A batch size of 0 means "no batching" and
//! produces a single batch covering everything.

use serde::{Deserialize, Serialize};

/// One slice of a batched range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: u64,
    pub offset: u64,
    pub size: u64,
}

impl Batch {
    /// Exclusive end of the slice
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Partition of `[0, total)` into consecutive batches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchPlan {
    total: u64,
    batch: u64,
}

impl BatchPlan {
    pub fn new(total: u64, batch: u64) -> Self {
        let batch = if batch == 0 || batch > total { total } else { batch };
        Self { total, batch }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Units per full batch
    pub fn batch_size(&self) -> u64 {
        self.batch
    }

    pub fn num_batches(&self) -> u64 {
        if self.total == 0 {
            0
        } else {
            self.total.div_ceil(self.batch)
        }
    }

    /// Size of the final batch
    pub fn last_batch_size(&self) -> u64 {
        match self.total.checked_rem(self.batch) {
            Some(0) => self.batch,
            Some(rem) => rem,
            None => 0,
        }
    }

    pub fn is_batched(&self) -> bool {
        self.num_batches() > 1
    }

    pub fn iter(&self) -> Batches {
        Batches { plan: *self, next: 0 }
    }
}

impl IntoIterator for BatchPlan {
    type Item = Batch;
    type IntoIter = Batches;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the batches of a [`BatchPlan`]
#[derive(Debug, Clone)]
pub struct Batches {
    plan: BatchPlan,
    next: u64,
}

impl Iterator for Batches {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        if self.next >= self.plan.num_batches() {
            return None;
        }
        let index = self.next;
        let offset = index * self.plan.batch;
        let size = self.plan.batch.min(self.plan.total - offset);
        self.next += 1;
        Some(Batch { index, offset, size })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.plan.num_batches() - self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Batches {}
