use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::types::PostingsEntry;
use crate::error::Result;

/// Snapshot version for compatibility checking
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serialized form of the inverted index: (term, postings) pairs
///
/// This is the checkpoint contract with the storage layer. Pending records
/// are not part of it; flush before taking a snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub postings: Vec<(String, Vec<PostingsEntry>)>,
}

impl IndexSnapshot {
    /// Create a new snapshot with the current version
    pub fn new(postings: Vec<(String, Vec<PostingsEntry>)>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            postings,
        }
    }

    /// Serialize snapshot to bytes
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize snapshot from bytes
    pub fn from_bytes(data: &[u8]) -> std::result::Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }

    /// Check if this snapshot version is compatible
    pub fn is_compatible(&self) -> bool {
        self.version <= SNAPSHOT_VERSION
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_bytes(&data)?)
    }

    pub fn term_count(&self) -> usize {
        self.postings.len()
    }

    /// Distinct documents referenced by the snapshot
    pub fn doc_count(&self) -> usize {
        self.postings
            .iter()
            .flat_map(|(_, entries)| entries.iter().map(|e| e.doc_id))
            .collect::<HashSet<_>>()
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::types::{ClassCounts, Occurrence};
    use crate::models::WeightClass;
    use tempfile::TempDir;

    fn sample() -> IndexSnapshot {
        let occ = [Occurrence {
            position: 0,
            class: WeightClass::Title,
        }];
        IndexSnapshot::new(vec![
            (
                "alpha".to_string(),
                vec![
                    PostingsEntry::from_occurrences(1, &occ, ClassCounts::new()),
                    PostingsEntry::from_occurrences(2, &occ, ClassCounts::new()),
                ],
            ),
            (
                "beta".to_string(),
                vec![PostingsEntry::from_occurrences(2, &occ, ClassCounts::new())],
            ),
        ])
    }

    #[test]
    fn test_snapshot_serialization_roundtrip() {
        let snapshot = sample();
        let bytes = snapshot.to_bytes().unwrap();
        let restored = IndexSnapshot::from_bytes(&bytes).unwrap();

        assert_eq!(restored, snapshot);
        assert_eq!(restored.term_count(), 2);
        assert_eq!(restored.doc_count(), 2);
    }

    #[test]
    fn test_snapshot_compatibility() {
        let mut snapshot = sample();
        assert!(snapshot.is_compatible());
        snapshot.version = SNAPSHOT_VERSION + 1;
        assert!(!snapshot.is_compatible());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.snapshot");

        sample().save(&path).unwrap();
        let loaded = IndexSnapshot::load(&path).unwrap();
        assert_eq!(loaded, sample());
    }
}
