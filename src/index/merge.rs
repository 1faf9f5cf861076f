//! Bounded merges from the pending buffer into the inverted index

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use super::inverted::InvertedIndex;
use super::pending::PendingBuffer;

/// Outcome of applying one batch of staged records
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Records drained and applied
    pub records: usize,
    pub upserted: usize,
    pub removed: usize,
    /// Deletes for documents that were never committed
    pub missing: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: MergeReport) {
        self.records += other.records;
        self.upserted += other.upserted;
        self.removed += other.removed;
        self.missing += other.missing;
    }
}

/// Single-flight merge coordinator
///
/// Only one merge runs at a time, so batches are applied in the order they
/// were staged.
#[derive(Debug, Default)]
pub struct BatchMerger {
    lock: Mutex<()>,
    merges: AtomicU64,
    merged_records: AtomicU64,
}

impl BatchMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain and apply up to `max_records`, waiting for any running merge
    pub fn merge(
        &self,
        index: &InvertedIndex,
        pending: &PendingBuffer,
        max_records: usize,
    ) -> MergeReport {
        let _guard = self.lock.lock();
        self.merge_locked(index, pending, max_records)
    }

    /// Like [`BatchMerger::merge`], but gives up if a merge is already running
    pub fn try_merge(
        &self,
        index: &InvertedIndex,
        pending: &PendingBuffer,
        max_records: usize,
    ) -> Option<MergeReport> {
        let _guard = self.lock.try_lock()?;
        Some(self.merge_locked(index, pending, max_records))
    }

    /// Hold the merge lock, simulating a merge in flight
    #[cfg(test)]
    pub(crate) fn hold(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.lock.lock()
    }

    /// Total merges that applied at least one record
    pub fn merge_count(&self) -> u64 {
        self.merges.load(Ordering::Relaxed)
    }

    pub fn merged_records(&self) -> u64 {
        self.merged_records.load(Ordering::Relaxed)
    }

    fn merge_locked(
        &self,
        index: &InvertedIndex,
        pending: &PendingBuffer,
        max_records: usize,
    ) -> MergeReport {
        let records = pending.drain_for_merge(max_records);
        if records.is_empty() {
            return MergeReport::default();
        }

        let report = index.merge_batch(&records);
        // Only now may the records stop shadowing committed postings
        pending.complete(&records);

        self.merges.fetch_add(1, Ordering::Relaxed);
        self.merged_records
            .fetch_add(report.records as u64, Ordering::Relaxed);

        debug!(
            records = report.records,
            upserted = report.upserted,
            removed = report.removed,
            remaining = pending.len(),
            "merged pending records"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocumentVector;
    use crate::models::{OperationKind, WeightClass};
    use crate::tokenizer::Token;

    fn vector(term: &str) -> DocumentVector {
        DocumentVector::from_tokens(vec![Token {
            term: term.to_string(),
            position: 0,
            class: WeightClass::Body,
        }])
    }

    #[test]
    fn test_merge_is_bounded() {
        let index = InvertedIndex::new(4, 4);
        let pending = PendingBuffer::new(1_000);
        let merger = BatchMerger::new();
        for id in 0..10 {
            pending.stage(id, vector("shared"), OperationKind::Insert);
        }

        let report = merger.merge(&index, &pending, 4);
        assert_eq!(report.records, 4);
        assert_eq!(pending.len(), 6);
        assert_eq!(index.doc_count(), 4);
        assert_eq!(merger.merge_count(), 1);

        // Merged records no longer shadow the index
        assert!(pending.latest(0).is_none());
        assert!(pending.latest(9).is_some());
    }

    #[test]
    fn test_empty_merge_is_not_counted() {
        let index = InvertedIndex::new(4, 4);
        let pending = PendingBuffer::new(1_000);
        let merger = BatchMerger::new();

        assert!(merger.merge(&index, &pending, 10).is_empty());
        assert_eq!(merger.merge_count(), 0);
    }

    #[test]
    fn test_try_merge_skips_when_busy() {
        let index = InvertedIndex::new(4, 4);
        let pending = PendingBuffer::new(1_000);
        let merger = BatchMerger::new();
        pending.stage(1, vector("alpha"), OperationKind::Insert);

        let guard = merger.hold();
        assert!(merger.try_merge(&index, &pending, 10).is_none());
        drop(guard);

        let report = merger.try_merge(&index, &pending, 10).unwrap();
        assert_eq!(report.upserted, 1);
        assert_eq!(merger.merged_records(), 1);
    }

    #[test]
    fn test_report_absorb() {
        let mut total = MergeReport::default();
        total.absorb(MergeReport {
            records: 3,
            upserted: 2,
            removed: 1,
            missing: 0,
        });
        total.absorb(MergeReport {
            records: 1,
            upserted: 0,
            removed: 0,
            missing: 1,
        });
        assert_eq!(total.records, 4);
        assert_eq!(total.missing, 1);
    }
}
