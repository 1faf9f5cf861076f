//! Pending buffer for staged writes
//!
//! Staging is an append onto a lock-free FIFO plus a point update of the
//! per-document "latest record" map, so writers never wait on a merge.
//! Drained records stay visible through the latest map until the merge that
//! consumed them calls [`PendingBuffer::complete`].

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crossbeam::queue::SegQueue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::vector::DocumentVector;
use crate::models::{DocumentId, OperationKind};

/// A staged change not yet merged into the inverted index
#[derive(Debug)]
pub struct PendingRecord {
    /// Stage order, unique per buffer
    pub seq: u64,
    pub doc_id: DocumentId,
    pub kind: OperationKind,
    /// Empty for deletes
    pub vector: DocumentVector,
    /// Terms whose results this record changes: the new version's terms
    /// plus the terms of the version it replaces
    pub affected_terms: Vec<String>,
    pub staged_at: Instant,
}

/// Outcome of a stage call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageSignal {
    Accepted,
    /// The backlog passed the high-water mark; a merge should run soon
    MergeRequested,
}

/// Append-only staging area for documents awaiting merge
#[derive(Debug)]
pub struct PendingBuffer {
    queue: SegQueue<Arc<PendingRecord>>,
    /// Newest record per document, including drained but unmerged ones
    latest: DashMap<DocumentId, Arc<PendingRecord>>,
    /// Queued records per term (estimate)
    term_counts: DashMap<String, usize>,
    len: AtomicUsize,
    next_seq: AtomicU64,
    high_water_mark: usize,
}

impl PendingBuffer {
    pub fn new(high_water_mark: usize) -> Self {
        Self {
            queue: SegQueue::new(),
            latest: DashMap::new(),
            term_counts: DashMap::new(),
            len: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            high_water_mark,
        }
    }

    /// Stage a change with no committed version to replace
    pub fn stage(
        &self,
        doc_id: DocumentId,
        vector: DocumentVector,
        kind: OperationKind,
    ) -> StageSignal {
        self.stage_replacing(doc_id, vector, kind, Vec::new())
    }

    /// Stage a change; immediately visible through [`PendingBuffer::latest`]
    ///
    /// `replaced_terms` are the committed terms of the version being
    /// updated or deleted. Together with the terms of any earlier pending
    /// version they count towards [`PendingBuffer::pending_count_for_term`],
    /// so a delete still marks the terms it removes as busy.
    ///
    /// Callers serialize stages of the same document; records for one
    /// document are queued in stage order.
    pub fn stage_replacing(
        &self,
        doc_id: DocumentId,
        vector: DocumentVector,
        kind: OperationKind,
        replaced_terms: impl IntoIterator<Item = String>,
    ) -> StageSignal {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);

        let mut affected: BTreeSet<String> = vector.terms().cloned().collect();
        affected.extend(replaced_terms);
        if let Some(previous) = self.latest(doc_id) {
            affected.extend(previous.vector.terms().cloned());
        }
        let affected_terms: Vec<String> = affected.into_iter().collect();
        for term in &affected_terms {
            *self.term_counts.entry(term.clone()).or_insert(0) += 1;
        }

        let record = Arc::new(PendingRecord {
            seq,
            doc_id,
            kind,
            vector,
            affected_terms,
            staged_at: Instant::now(),
        });

        match self.latest.entry(doc_id) {
            Entry::Occupied(mut e) => {
                if e.get().seq < seq {
                    e.insert(record.clone());
                }
            }
            Entry::Vacant(e) => {
                e.insert(record.clone());
            }
        }

        // Count before pushing so a concurrent drain never sees more
        // records than the counter
        let len = self.len.fetch_add(1, Ordering::SeqCst) + 1;
        self.queue.push(record);

        if len > self.high_water_mark {
            StageSignal::MergeRequested
        } else {
            StageSignal::Accepted
        }
    }

    /// Remove up to `max_records` of the oldest queued records
    ///
    /// Records staged concurrently either make this cut or stay queued for
    /// the next one.
    pub fn drain_for_merge(&self, max_records: usize) -> Vec<Arc<PendingRecord>> {
        let mut drained = Vec::with_capacity(max_records.min(self.len()));
        while drained.len() < max_records {
            match self.queue.pop() {
                Some(record) => drained.push(record),
                None => break,
            }
        }

        if !drained.is_empty() {
            self.len.fetch_sub(drained.len(), Ordering::SeqCst);
            for record in &drained {
                for term in &record.affected_terms {
                    if let Entry::Occupied(mut e) = self.term_counts.entry(term.clone()) {
                        if *e.get() <= 1 {
                            e.remove();
                        } else {
                            *e.get_mut() -= 1;
                        }
                    }
                }
            }
        }

        drained
    }

    /// Retire merged records from the latest map
    ///
    /// A record is only retired if no newer record for its document was
    /// staged in the meantime.
    pub fn complete(&self, records: &[Arc<PendingRecord>]) {
        for record in records {
            self.latest
                .remove_if(&record.doc_id, |_, current| current.seq == record.seq);
        }
    }

    /// Cheap estimate of queued records touching a term
    pub fn pending_count_for_term(&self, term: &str) -> usize {
        self.term_counts.get(term).map(|c| *c).unwrap_or(0)
    }

    /// Newest unmerged record for a document
    pub fn latest(&self, doc_id: DocumentId) -> Option<Arc<PendingRecord>> {
        self.latest.get(&doc_id).map(|r| r.value().clone())
    }

    /// Copy of the newest record per document, for overlaying onto a query
    pub fn overlay_snapshot(&self) -> HashMap<DocumentId, Arc<PendingRecord>> {
        self.latest
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Number of queued records
    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Documents with an unmerged record
    pub fn visible_count(&self) -> usize {
        self.latest.len()
    }

    pub fn over_high_water_mark(&self) -> bool {
        self.len() > self.high_water_mark
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water_mark
    }
}
