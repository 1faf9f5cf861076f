//! Core types for the inverted index

use serde::{Deserialize, Serialize};

use crate::config::WeightBiases;
use crate::models::{DocumentId, WeightClass};

/// Occurrence counts broken down by weight class
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassCounts([u32; WeightClass::COUNT]);

impl ClassCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: WeightClass) -> u32 {
        self.0[class.index()]
    }

    pub fn increment(&mut self, class: WeightClass) {
        self.0[class.index()] += 1;
    }

    pub fn add(&mut self, class: WeightClass, n: u32) {
        self.0[class.index()] += n;
    }

    /// Total occurrences across all classes
    pub fn total(&self) -> u32 {
        self.0.iter().sum()
    }

    /// Occurrences weighted by class bias
    pub fn weighted(&self, biases: &WeightBiases) -> f32 {
        WeightClass::ALL
            .iter()
            .map(|&class| self.get(class) as f32 * biases.get(class))
            .sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (WeightClass, u32)> + '_ {
        WeightClass::ALL.iter().map(move |&class| (class, self.get(class)))
    }
}

/// One term occurrence inside a document vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Occurrence {
    pub position: u32,
    pub class: WeightClass,
}

/// A single postings entry: one per (term, document)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostingsEntry {
    pub doc_id: DocumentId,
    /// Term frequency in this document
    pub term_frequency: u32,
    /// Ascending positions of the occurrences
    pub positions: Vec<u32>,
    /// Occurrences of this term per weight class
    pub classes: ClassCounts,
    /// Length of the whole document per weight class, for normalization
    pub doc_lengths: ClassCounts,
}

impl PostingsEntry {
    pub fn from_occurrences(
        doc_id: DocumentId,
        occurrences: &[Occurrence],
        doc_lengths: ClassCounts,
    ) -> Self {
        let mut classes = ClassCounts::new();
        let mut positions = Vec::with_capacity(occurrences.len());
        for occ in occurrences {
            classes.increment(occ.class);
            positions.push(occ.position);
        }

        Self {
            doc_id,
            term_frequency: occurrences.len() as u32,
            positions,
            classes,
            doc_lengths,
        }
    }
}

/// Postings list for one term, ordered by document id
///
/// Holds at most one entry per document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingsList {
    entries: Vec<PostingsEntry>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary entries; later duplicates replace earlier ones
    pub fn from_entries(entries: Vec<PostingsEntry>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            list.upsert(entry);
        }
        list
    }

    /// Insert or replace the entry for `entry.doc_id`
    ///
    /// Returns true if an existing entry was replaced.
    pub fn upsert(&mut self, entry: PostingsEntry) -> bool {
        match self.position_of(entry.doc_id) {
            Ok(idx) => {
                self.entries[idx] = entry;
                true
            }
            Err(idx) => {
                self.entries.insert(idx, entry);
                false
            }
        }
    }

    pub fn remove(&mut self, doc_id: DocumentId) -> Option<PostingsEntry> {
        self.position_of(doc_id)
            .ok()
            .map(|idx| self.entries.remove(idx))
    }

    pub fn get(&self, doc_id: DocumentId) -> Option<&PostingsEntry> {
        self.position_of(doc_id).ok().map(|idx| &self.entries[idx])
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.position_of(doc_id).is_ok()
    }

    /// Entry at a rank within the list
    pub fn entry_at(&self, idx: usize) -> Option<&PostingsEntry> {
        self.entries.get(idx)
    }

    /// Document frequency
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PostingsEntry> {
        self.entries.iter()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.entries.iter().map(|e| e.doc_id)
    }

    pub fn entries(&self) -> &[PostingsEntry] {
        &self.entries
    }

    fn position_of(&self, doc_id: DocumentId) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by_key(&doc_id, |e| e.doc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(doc_id: DocumentId, tf: u32) -> PostingsEntry {
        let occurrences: Vec<Occurrence> = (0..tf)
            .map(|p| Occurrence {
                position: p,
                class: WeightClass::Body,
            })
            .collect();
        let mut lengths = ClassCounts::new();
        lengths.add(WeightClass::Body, 10);
        PostingsEntry::from_occurrences(doc_id, &occurrences, lengths)
    }

    #[test]
    fn test_class_counts() {
        let mut counts = ClassCounts::new();
        counts.increment(WeightClass::Title);
        counts.add(WeightClass::Body, 4);

        assert_eq!(counts.get(WeightClass::Title), 1);
        assert_eq!(counts.get(WeightClass::Heading), 0);
        assert_eq!(counts.total(), 5);

        let biases = WeightBiases::default();
        assert!((counts.weighted(&biases) - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_entry_from_occurrences() {
        let occurrences = [
            Occurrence {
                position: 0,
                class: WeightClass::Title,
            },
            Occurrence {
                position: 7,
                class: WeightClass::Body,
            },
        ];
        let e = PostingsEntry::from_occurrences(3, &occurrences, ClassCounts::new());

        assert_eq!(e.term_frequency, 2);
        assert_eq!(e.positions, vec![0, 7]);
        assert_eq!(e.classes.get(WeightClass::Title), 1);
        assert_eq!(e.classes.get(WeightClass::Body), 1);
    }

    #[test]
    fn test_postings_list_keeps_order_and_uniqueness() {
        let mut list = PostingsList::new();
        assert!(!list.upsert(entry(5, 1)));
        assert!(!list.upsert(entry(1, 1)));
        assert!(!list.upsert(entry(3, 1)));
        assert!(list.upsert(entry(3, 4)));

        assert_eq!(list.len(), 3);
        assert_eq!(list.doc_ids().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(list.get(3).map(|e| e.term_frequency), Some(4));
    }

    #[test]
    fn test_postings_list_remove() {
        let mut list = PostingsList::from_entries(vec![entry(1, 1), entry(2, 2), entry(1, 3)]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).map(|e| e.term_frequency), Some(3));

        assert!(list.remove(1).is_some());
        assert!(list.remove(1).is_none());
        assert!(!list.contains(1));
        assert_eq!(list.entry_at(0).map(|e| e.doc_id), Some(2));
    }
}
