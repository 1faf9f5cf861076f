//! Invariant checking framework for index correctness
//!
//! Invariants are checked against an [`IndexView`], a captured copy of the
//! committed index. Capture it while no writer is running.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::index::{CorpusStatistics, DocumentFootprint, InvertedIndex, PostingsEntry};
use crate::models::{DocumentId, WeightClass};

/// A violation of an invariant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub invariant: String,
    pub description: String,
    pub doc_ids: Vec<DocumentId>,
    pub context: HashMap<String, String>,
}

impl Violation {
    fn new(invariant: &str, description: impl Into<String>) -> Self {
        Self {
            invariant: invariant.to_string(),
            description: description.into(),
            doc_ids: Vec::new(),
            context: HashMap::new(),
        }
    }

    fn with_doc(mut self, doc_id: DocumentId) -> Self {
        self.doc_ids.push(doc_id);
        self
    }

    fn with_context(mut self, key: &str, value: impl ToString) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "INVARIANT VIOLATION: {}", self.invariant)?;
        writeln!(f, "  Description: {}", self.description)?;
        writeln!(f, "  Documents: {:?}", self.doc_ids)?;
        if !self.context.is_empty() {
            writeln!(f, "  Context:")?;
            for (key, value) in &self.context {
                writeln!(f, "    {}: {}", key, value)?;
            }
        }
        Ok(())
    }
}

/// Captured committed state of an index
#[derive(Debug, Clone)]
pub struct IndexView {
    pub postings: Vec<(String, Vec<PostingsEntry>)>,
    pub footprints: BTreeMap<DocumentId, DocumentFootprint>,
    pub statistics: CorpusStatistics,
}

impl IndexView {
    pub fn capture(index: &InvertedIndex) -> Self {
        Self {
            postings: index.snapshot().postings,
            footprints: index.footprints().into_iter().collect(),
            statistics: index.statistics(),
        }
    }
}

/// Trait for invariant checkers
pub trait Invariant: Send + Sync {
    /// Name of the invariant
    fn name(&self) -> &str;

    /// Check the invariant against a captured index
    fn check(&self, view: &IndexView) -> Result<(), Violation>;

    /// Human-readable description
    fn description(&self) -> &str {
        "No description provided"
    }
}

/// Check all invariants and return violations
pub fn check_all_invariants(view: &IndexView, invariants: &[Box<dyn Invariant>]) -> Vec<Violation> {
    invariants
        .iter()
        .filter_map(|invariant| invariant.check(view).err())
        .collect()
}

/// Capture an index and run the default invariants against it
pub fn check_index(index: &InvertedIndex) -> Vec<Violation> {
    check_all_invariants(&IndexView::capture(index), &default_invariants())
}

pub fn default_invariants() -> Vec<Box<dyn Invariant>> {
    vec![
        Box::new(SinglePostingPerDocument),
        Box::new(PositionsAscending),
        Box::new(ForwardIndexConsistent),
        Box::new(StatisticsConsistent),
    ]
}

/// Invariant: at most one postings entry per (term, document)
///
/// Lists must also be ordered by document id and never empty.
pub struct SinglePostingPerDocument;

impl Invariant for SinglePostingPerDocument {
    fn name(&self) -> &str {
        "SinglePostingPerDocument"
    }

    fn description(&self) -> &str {
        "Each postings list holds at most one entry per document, in document id order"
    }

    fn check(&self, view: &IndexView) -> Result<(), Violation> {
        for (term, entries) in &view.postings {
            if entries.is_empty() {
                return Err(Violation::new(self.name(), "empty postings list kept")
                    .with_context("term", term));
            }
            for pair in entries.windows(2) {
                if pair[0].doc_id >= pair[1].doc_id {
                    return Err(Violation::new(self.name(), "duplicate or unordered document")
                        .with_doc(pair[1].doc_id)
                        .with_context("term", term));
                }
            }
        }
        Ok(())
    }
}

/// Invariant: positions are strictly ascending and agree with the counts
pub struct PositionsAscending;

impl Invariant for PositionsAscending {
    fn name(&self) -> &str {
        "PositionsAscending"
    }

    fn description(&self) -> &str {
        "Positions in an entry are strictly ascending and match its frequency and class counts"
    }

    fn check(&self, view: &IndexView) -> Result<(), Violation> {
        for (term, entries) in &view.postings {
            for entry in entries {
                let ascending = entry.positions.windows(2).all(|w| w[0] < w[1]);
                let counted = entry.positions.len() == entry.term_frequency as usize
                    && entry.classes.total() == entry.term_frequency;
                if !ascending || !counted {
                    return Err(Violation::new(self.name(), "malformed postings entry")
                        .with_doc(entry.doc_id)
                        .with_context("term", term)
                        .with_context("positions", format!("{:?}", entry.positions))
                        .with_context("term_frequency", entry.term_frequency));
                }
            }
        }
        Ok(())
    }
}

/// Invariant: postings and the per-document footprints describe the same
/// documents
///
/// Every entry's document has a footprint listing the term and the same
/// lengths, and every footprint term has an entry. This is what makes stale
/// entries removable on update.
pub struct ForwardIndexConsistent;

impl Invariant for ForwardIndexConsistent {
    fn name(&self) -> &str {
        "ForwardIndexConsistent"
    }

    fn description(&self) -> &str {
        "Every postings entry is recorded in its document's footprint and vice versa"
    }

    fn check(&self, view: &IndexView) -> Result<(), Violation> {
        let mut seen: BTreeMap<DocumentId, BTreeSet<&str>> = BTreeMap::new();

        for (term, entries) in &view.postings {
            for entry in entries {
                let footprint = match view.footprints.get(&entry.doc_id) {
                    Some(f) => f,
                    None => {
                        return Err(Violation::new(self.name(), "entry for unknown document")
                            .with_doc(entry.doc_id)
                            .with_context("term", term));
                    }
                };
                if footprint.lengths != entry.doc_lengths {
                    return Err(Violation::new(self.name(), "entry lengths differ from footprint")
                        .with_doc(entry.doc_id)
                        .with_context("term", term));
                }
                seen.entry(entry.doc_id).or_default().insert(term.as_str());
            }
        }

        for (doc_id, footprint) in &view.footprints {
            let recorded: BTreeSet<&str> = footprint.terms.iter().map(String::as_str).collect();
            let indexed = seen.remove(doc_id).unwrap_or_default();
            if recorded != indexed {
                return Err(Violation::new(self.name(), "footprint terms differ from postings")
                    .with_doc(*doc_id)
                    .with_context("footprint", format!("{:?}", recorded))
                    .with_context("postings", format!("{:?}", indexed)));
            }
        }

        Ok(())
    }
}

/// Invariant: corpus statistics equal the sum over committed documents
pub struct StatisticsConsistent;

impl Invariant for StatisticsConsistent {
    fn name(&self) -> &str {
        "StatisticsConsistent"
    }

    fn description(&self) -> &str {
        "Document count and per-class length totals match the committed documents"
    }

    fn check(&self, view: &IndexView) -> Result<(), Violation> {
        let stats = &view.statistics;
        if stats.doc_count != view.footprints.len() as u64 {
            return Err(Violation::new(self.name(), "document count drifted")
                .with_context("statistics", stats.doc_count)
                .with_context("footprints", view.footprints.len()));
        }

        for class in WeightClass::ALL {
            let expected: u64 = view
                .footprints
                .values()
                .map(|f| f.lengths.get(class) as u64)
                .sum();
            if stats.class_total(class) != expected {
                return Err(Violation::new(self.name(), "class length total drifted")
                    .with_context("class", class)
                    .with_context("statistics", stats.class_total(class))
                    .with_context("expected", expected));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{ClassCounts, DocumentVector};
    use crate::tokenizer::Token;

    fn vector(terms: &[&str]) -> DocumentVector {
        DocumentVector::from_tokens(terms.iter().enumerate().map(|(i, t)| Token {
            term: t.to_string(),
            position: i as u32,
            class: WeightClass::Body,
        }))
    }

    #[test]
    fn test_healthy_index_passes() {
        let index = InvertedIndex::new(4, 4);
        index.upsert(1, &vector(&["alpha", "beta", "alpha"]));
        index.upsert(2, &vector(&["beta"]));
        index.upsert(1, &vector(&["gamma"]));
        index.remove(2);

        let violations = check_index(&index);
        assert!(violations.is_empty(), "{:?}", violations);
    }

    #[test]
    fn test_duplicate_posting_detected() {
        let index = InvertedIndex::new(4, 4);
        index.upsert(1, &vector(&["alpha"]));
        let mut view = IndexView::capture(&index);
        let dup = view.postings[0].1[0].clone();
        view.postings[0].1.push(dup);

        assert!(SinglePostingPerDocument.check(&view).is_err());
    }

    #[test]
    fn test_stale_entry_detected() {
        let index = InvertedIndex::new(4, 4);
        index.upsert(1, &vector(&["alpha"]));
        let mut view = IndexView::capture(&index);
        let stale = PostingsEntry::from_occurrences(1, &[], ClassCounts::new());
        view.postings.push(("stale".to_string(), vec![stale]));

        let violation = ForwardIndexConsistent.check(&view).unwrap_err();
        assert_eq!(violation.doc_ids, vec![1]);
        assert!(violation.to_string().contains("ForwardIndexConsistent"));
    }

    #[test]
    fn test_statistics_drift_detected() {
        let index = InvertedIndex::new(4, 4);
        index.upsert(1, &vector(&["alpha"]));
        let mut view = IndexView::capture(&index);
        view.statistics.doc_count += 1;

        assert!(StatisticsConsistent.check(&view).is_err());
    }
}
