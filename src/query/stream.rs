//! Lazy candidate stream over committed postings plus the pending overlay
//!
//! The stream is defined over a probe sequence of known length. With
//! required terms, each committed position is one entry of the shortest
//! required list; the remaining required lists are checked by binary search.
//! Without required terms, positions walk the optional lists back to back and
//! a document is accepted only at its first list. Positions after the
//! committed ones probe pending records. Every matching document is accepted
//! at exactly one position, which lets the ranker sample positions uniformly
//! and skip without materializing anything.

use std::collections::HashSet;
use std::sync::Arc;

use super::types::{Clause, Query};
use crate::index::{ClassCounts, PendingRecord, PostingsEntry, PostingsList};
use crate::models::DocumentId;

/// Where a candidate's data came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CandidateSource {
    Committed,
    Pending,
}

/// Occurrences of one query term in a candidate
#[derive(Clone, Debug, PartialEq)]
pub struct TermMatch {
    /// Index into the query's terms
    pub term_index: usize,
    pub clause: Clause,
    pub frequency: u32,
    pub classes: ClassCounts,
}

/// A document that satisfies the query, with what ranking needs
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub doc_id: DocumentId,
    pub doc_lengths: ClassCounts,
    pub matches: Vec<TermMatch>,
    pub source: CandidateSource,
}

struct StreamTerm {
    clause: Clause,
    term: String,
    list: Arc<PostingsList>,
}

/// One-pass candidate stream for a single query
pub struct CandidateStream {
    terms: Vec<StreamTerm>,
    /// Index of the driving required term, if any
    driver: Option<usize>,
    /// Optional-only queries: start position of each term's list
    offsets: Vec<usize>,
    committed_len: usize,
    /// Pending inserts and updates, probed after the committed positions
    overlay: Vec<Arc<PendingRecord>>,
    /// Documents whose committed postings are shadowed by a pending record
    shadowed: HashSet<DocumentId>,
    cursor: usize,
}

impl CandidateStream {
    /// Build a stream from committed lists (in query term order) and the
    /// pending overlay
    pub fn new(
        query: &Query,
        lists: Vec<Arc<PostingsList>>,
        overlay: impl IntoIterator<Item = Arc<PendingRecord>>,
    ) -> Self {
        let terms: Vec<StreamTerm> = query
            .terms()
            .iter()
            .zip(lists)
            .map(|(qt, list)| StreamTerm {
                clause: qt.clause,
                term: qt.term.clone(),
                list,
            })
            .collect();

        let driver = terms
            .iter()
            .enumerate()
            .filter(|(_, t)| t.clause.is_required())
            .min_by_key(|(_, t)| t.list.len())
            .map(|(i, _)| i);

        let mut offsets = Vec::new();
        let committed_len = match driver {
            Some(d) => terms[d].list.len(),
            None => {
                let mut total = 0;
                for term in &terms {
                    offsets.push(total);
                    total += term.list.len();
                }
                total
            }
        };

        let mut shadowed = HashSet::new();
        let mut live = Vec::new();
        for record in overlay {
            shadowed.insert(record.doc_id);
            if !record.kind.is_delete() {
                live.push(record);
            }
        }
        // Deterministic probe order regardless of map iteration order
        live.sort_by_key(|r| r.doc_id);

        Self {
            terms,
            driver,
            offsets,
            committed_len,
            overlay: live,
            shadowed,
            cursor: 0,
        }
    }

    /// A stream that yields nothing
    pub fn empty() -> Self {
        Self {
            terms: Vec::new(),
            driver: None,
            offsets: Vec::new(),
            committed_len: 0,
            overlay: Vec::new(),
            shadowed: HashSet::new(),
            cursor: 0,
        }
    }

    /// Length of the probe sequence
    pub fn probe_len(&self) -> usize {
        self.committed_len + self.overlay.len()
    }

    /// Upper bound on the number of candidates
    pub fn estimated_len(&self) -> usize {
        self.probe_len()
    }

    /// Number of pending records overlaid on this query
    pub fn overlay_len(&self) -> usize {
        self.overlay.len()
    }

    /// Next probe position the iterator will visit
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn remaining_positions(&self) -> usize {
        self.probe_len().saturating_sub(self.cursor)
    }

    /// Advance past `n` positions without probing them
    pub fn skip_positions(&mut self, n: usize) {
        self.cursor = self.cursor.saturating_add(n).min(self.probe_len());
    }

    /// Evaluate one probe position; `None` if it accepts no document
    pub fn probe(&self, pos: usize) -> Option<Candidate> {
        if pos < self.committed_len {
            self.probe_committed(pos)
        } else {
            self.overlay
                .get(pos - self.committed_len)
                .and_then(|record| self.probe_pending(record))
        }
    }

    fn probe_committed(&self, pos: usize) -> Option<Candidate> {
        let (doc_id, doc_lengths) = match self.driver {
            Some(d) => {
                let entry = self.terms[d].list.entry_at(pos)?;
                (entry.doc_id, entry.doc_lengths)
            }
            None => {
                // Last list whose start offset is <= pos
                let idx = self.offsets.partition_point(|&start| start <= pos) - 1;
                let entry = self.terms[idx].list.entry_at(pos - self.offsets[idx])?;
                if self.terms[..idx].iter().any(|t| t.list.contains(entry.doc_id)) {
                    return None;
                }
                (entry.doc_id, entry.doc_lengths)
            }
        };

        if self.shadowed.contains(&doc_id) {
            return None;
        }

        let mut matches = Vec::new();
        for (i, term) in self.terms.iter().enumerate() {
            match term.list.get(doc_id) {
                Some(entry) => matches.push(committed_match(i, term.clause, entry)),
                None if term.clause.is_required() => return None,
                None => {}
            }
        }

        Some(Candidate {
            doc_id,
            doc_lengths,
            matches,
            source: CandidateSource::Committed,
        })
    }

    fn probe_pending(&self, record: &PendingRecord) -> Option<Candidate> {
        let mut matches = Vec::new();
        for (i, term) in self.terms.iter().enumerate() {
            let frequency = record.vector.frequency(&term.term);
            if frequency > 0 {
                matches.push(TermMatch {
                    term_index: i,
                    clause: term.clause,
                    frequency,
                    classes: record.vector.class_counts(&term.term),
                });
            } else if term.clause.is_required() {
                return None;
            }
        }

        if matches.is_empty() {
            return None;
        }

        Some(Candidate {
            doc_id: record.doc_id,
            doc_lengths: record.vector.lengths(),
            matches,
            source: CandidateSource::Pending,
        })
    }
}

fn committed_match(term_index: usize, clause: Clause, entry: &PostingsEntry) -> TermMatch {
    TermMatch {
        term_index,
        clause,
        frequency: entry.term_frequency,
        classes: entry.classes,
    }
}

impl Iterator for CandidateStream {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while self.cursor < self.probe_len() {
            let pos = self.cursor;
            self.cursor += 1;
            if let Some(candidate) = self.probe(pos) {
                return Some(candidate);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining_positions()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DocumentVector;
    use crate::models::{OperationKind, WeightClass};
    use crate::tokenizer::Token;
    use std::time::Instant;

    fn vector(terms: &[&str]) -> DocumentVector {
        DocumentVector::from_tokens(terms.iter().enumerate().map(|(i, t)| Token {
            term: t.to_string(),
            position: i as u32,
            class: WeightClass::Body,
        }))
    }

    fn list(docs: &[(DocumentId, &[&str])], term: &str) -> Arc<PostingsList> {
        let entries = docs
            .iter()
            .filter_map(|(id, terms)| {
                let v = vector(terms);
                let entry = v.postings(*id).find(|(t, _)| t.as_str() == term).map(|(_, e)| e);
                entry
            })
            .collect();
        Arc::new(PostingsList::from_entries(entries))
    }

    fn record(doc_id: DocumentId, kind: OperationKind, terms: &[&str]) -> Arc<PendingRecord> {
        Arc::new(PendingRecord {
            seq: doc_id,
            doc_id,
            kind,
            vector: vector(terms),
            affected_terms: terms.iter().map(|t| t.to_string()).collect(),
            staged_at: Instant::now(),
        })
    }

    const CORPUS: &[(DocumentId, &[&str])] = &[
        (1, &["postgres", "fts", "tuning"]),
        (2, &["ruby", "programming"]),
        (3, &["postgres", "indexing", "basics"]),
        (4, &["ruby", "basics"]),
    ];

    fn stream(query: &Query, overlay: Vec<Arc<PendingRecord>>) -> CandidateStream {
        let lists = query.terms().iter().map(|t| list(CORPUS, &t.term)).collect();
        CandidateStream::new(query, lists, overlay)
    }

    #[test]
    fn test_required_intersection() {
        let query = Query::new(["postgres", "basics"], Vec::<String>::new());
        let docs: Vec<_> = stream(&query, vec![]).map(|c| c.doc_id).collect();
        assert_eq!(docs, vec![3]);
    }

    #[test]
    fn test_optional_terms_are_gathered() {
        let query = Query::new(["postgres"], ["tuning"]);
        let candidates: Vec<_> = stream(&query, vec![]).collect();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].doc_id, 1);
        assert_eq!(candidates[0].matches.len(), 2);
        assert_eq!(candidates[1].matches.len(), 1);
    }

    #[test]
    fn test_optional_only_union_has_no_duplicates() {
        let query = Query::new(Vec::<String>::new(), ["basics", "ruby"]);
        let s = stream(&query, vec![]);
        // basics: 3, 4; ruby: 2, 4
        assert_eq!(s.probe_len(), 4);
        let mut docs: Vec<_> = s.map(|c| c.doc_id).collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![2, 3, 4]);
    }

    #[test]
    fn test_overlay_shadows_and_adds() {
        let query = Query::new(["postgres"], Vec::<String>::new());
        let overlay = vec![
            record(1, OperationKind::Update, &["ruby", "basics"]),
            record(3, OperationKind::Delete, &[]),
            record(7, OperationKind::Insert, &["postgres", "tips"]),
        ];
        let s = stream(&query, overlay);
        assert_eq!(s.overlay_len(), 2);

        let candidates: Vec<_> = s.collect();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].doc_id, 7);
        assert_eq!(candidates[0].source, CandidateSource::Pending);
    }

    #[test]
    fn test_skip_and_probe() {
        let query = Query::new(Vec::<String>::new(), ["basics", "ruby"]);
        let mut s = stream(&query, vec![]);
        s.skip_positions(3);
        assert_eq!(s.remaining_positions(), 1);
        // Position 3 is doc 4 in the ruby list, already accepted under basics
        assert!(s.probe(3).is_none());
        assert!(s.next().is_none());

        s.skip_positions(100);
        assert_eq!(s.cursor(), s.probe_len());
    }

    #[test]
    fn test_missing_required_term_yields_nothing() {
        let query = Query::new(["postgres", "absent"], Vec::<String>::new());
        let s = stream(&query, vec![]);
        assert_eq!(s.probe_len(), 0);
        assert_eq!(s.count(), 0);
        assert_eq!(CandidateStream::empty().count(), 0);
    }
}
