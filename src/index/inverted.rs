//! Sharded inverted index
//!
//! Postings lists are spread over lock shards by term hash. A document
//! update write-locks every shard it touches, in ascending shard order, so a
//! reader holding read locks on its query's shards sees each document either
//! entirely before or entirely after the update.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock, RwLockWriteGuard};

use super::merge::MergeReport;
use super::pending::PendingRecord;
use super::snapshot::IndexSnapshot;
use super::statistics::CorpusStatistics;
use super::types::{ClassCounts, PostingsList};
use super::vector::DocumentVector;
use crate::config::EngineConfig;
use crate::error::{QuarryError, Result};
use crate::models::{DocumentId, OperationKind};

type ShardMap = HashMap<String, Arc<PostingsList>>;

/// What the index remembers about a committed document
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentFootprint {
    /// Every term the document has a postings entry under
    pub terms: Vec<String>,
    pub lengths: ClassCounts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Write guards over a sorted set of shards
struct ShardWriteSet<'a> {
    guards: Vec<(usize, RwLockWriteGuard<'a, ShardMap>)>,
}

impl<'a> ShardWriteSet<'a> {
    fn map_mut(&mut self, shard: usize) -> Option<&mut ShardMap> {
        let pos = self.guards.binary_search_by_key(&shard, |(id, _)| *id).ok()?;
        Some(&mut *self.guards[pos].1)
    }
}

/// Term -> postings list mapping holding committed documents only
pub struct InvertedIndex {
    shards: Vec<RwLock<ShardMap>>,
    footprints: DashMap<DocumentId, DocumentFootprint>,
    doc_locks: Vec<Mutex<()>>,
    stats: RwLock<CorpusStatistics>,
}

impl InvertedIndex {
    pub fn new(shard_count: usize, lock_stripes: usize) -> Self {
        Self {
            shards: (0..shard_count.max(1))
                .map(|_| RwLock::new(HashMap::new()))
                .collect(),
            footprints: DashMap::new(),
            doc_locks: (0..lock_stripes.max(1)).map(|_| Mutex::new(())).collect(),
            stats: RwLock::new(CorpusStatistics::new()),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.shard_count, config.doc_lock_stripes)
    }

    /// Rebuild an index from a snapshot
    pub fn from_snapshot(
        snapshot: IndexSnapshot,
        shard_count: usize,
        lock_stripes: usize,
    ) -> Result<Self> {
        if !snapshot.is_compatible() {
            return Err(QuarryError::IncompatibleSnapshot {
                expected: super::snapshot::SNAPSHOT_VERSION,
                actual: snapshot.version,
            });
        }

        let mut index = Self::new(shard_count, lock_stripes);
        let mut footprints: HashMap<DocumentId, DocumentFootprint> = HashMap::new();

        for (term, entries) in snapshot.postings {
            for entry in &entries {
                footprints
                    .entry(entry.doc_id)
                    .or_insert_with(|| DocumentFootprint {
                        terms: Vec::new(),
                        lengths: entry.doc_lengths,
                    })
                    .terms
                    .push(term.clone());
            }

            let list = PostingsList::from_entries(entries);
            if !list.is_empty() {
                let shard = index.shard_of(&term);
                index.shards[shard].get_mut().insert(term, Arc::new(list));
            }
        }

        let stats = index.stats.get_mut();
        for footprint in footprints.values() {
            stats.add_document(&footprint.lengths);
        }
        for (doc_id, footprint) in footprints {
            index.footprints.insert(doc_id, footprint);
        }

        Ok(index)
    }

    /// Replace all postings of a document with those of `vector`
    ///
    /// Entries under terms the new vector no longer contains are removed.
    pub fn upsert(&self, doc_id: DocumentId, vector: &DocumentVector) -> UpsertOutcome {
        let _doc = self.doc_lock(doc_id).lock();
        self.apply_upsert(doc_id, vector)
    }

    /// Remove every postings entry of a document
    ///
    /// Returns false if the document was not in the index.
    pub fn remove(&self, doc_id: DocumentId) -> bool {
        let _doc = self.doc_lock(doc_id).lock();
        self.apply_remove(doc_id)
    }

    /// Apply staged records in order
    pub fn merge_batch(&self, records: &[Arc<PendingRecord>]) -> MergeReport {
        let mut report = MergeReport {
            records: records.len(),
            ..Default::default()
        };

        for record in records {
            let _doc = self.doc_lock(record.doc_id).lock();
            match record.kind {
                OperationKind::Insert | OperationKind::Update => {
                    self.apply_upsert(record.doc_id, &record.vector);
                    report.upserted += 1;
                }
                OperationKind::Delete => {
                    if self.apply_remove(record.doc_id) {
                        report.removed += 1;
                    } else {
                        report.missing += 1;
                    }
                }
            }
        }

        report
    }

    /// Committed postings for a term (empty if the term is unknown)
    pub fn lookup(&self, term: &str) -> Arc<PostingsList> {
        self.shards[self.shard_of(term)]
            .read()
            .get(term)
            .cloned()
            .unwrap_or_default()
    }

    /// Committed postings for several terms, read as one consistent snapshot
    pub fn lookup_many(&self, terms: &[String]) -> Vec<Arc<PostingsList>> {
        let shard_ids = self.shard_set(terms.iter().map(String::as_str));
        let guards: Vec<_> = shard_ids
            .iter()
            .map(|&id| (id, self.shards[id].read()))
            .collect();

        terms
            .iter()
            .map(|term| {
                let shard = self.shard_of(term);
                guards
                    .binary_search_by_key(&shard, |(id, _)| *id)
                    .ok()
                    .and_then(|pos| guards[pos].1.get(term.as_str()).cloned())
                    .unwrap_or_default()
            })
            .collect()
    }

    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.footprints.contains_key(&doc_id)
    }

    pub fn footprint(&self, doc_id: DocumentId) -> Option<DocumentFootprint> {
        self.footprints.get(&doc_id).map(|f| f.value().clone())
    }

    /// All committed documents with their footprints
    pub fn footprints(&self) -> Vec<(DocumentId, DocumentFootprint)> {
        self.footprints
            .iter()
            .map(|f| (*f.key(), f.value().clone()))
            .collect()
    }

    /// Number of committed documents
    pub fn doc_count(&self) -> usize {
        self.footprints.len()
    }

    /// Number of distinct terms with at least one posting
    pub fn term_count(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn statistics(&self) -> CorpusStatistics {
        self.stats.read().clone()
    }

    /// Serialize every postings list, sorted by term
    pub fn snapshot(&self) -> IndexSnapshot {
        // All shards, ascending, so the snapshot is one consistent cut
        let guards: Vec<_> = self.shards.iter().map(|s| s.read()).collect();
        let mut postings: Vec<_> = guards
            .iter()
            .flat_map(|shard| {
                shard
                    .iter()
                    .map(|(term, list)| (term.clone(), list.entries().to_vec()))
            })
            .collect();
        drop(guards);

        postings.sort_by(|a, b| a.0.cmp(&b.0));
        IndexSnapshot::new(postings)
    }

    fn apply_upsert(&self, doc_id: DocumentId, vector: &DocumentVector) -> UpsertOutcome {
        let old = self.footprint(doc_id);
        let stale: Vec<&str> = old
            .iter()
            .flat_map(|f| f.terms.iter())
            .filter(|term| !vector.contains_term(term))
            .map(String::as_str)
            .collect();

        let shard_ids = self.shard_set(
            vector
                .terms()
                .map(String::as_str)
                .chain(stale.iter().copied()),
        );
        let mut shards = self.write_shards(&shard_ids);

        for term in &stale {
            if let Some(map) = shards.map_mut(self.shard_of(term)) {
                remove_posting(map, term, doc_id);
            }
        }

        for (term, entry) in vector.postings(doc_id) {
            if let Some(map) = shards.map_mut(self.shard_of(term)) {
                match map.get_mut(term.as_str()) {
                    Some(list) => {
                        Arc::make_mut(list).upsert(entry);
                    }
                    None => {
                        map.insert(term.clone(), Arc::new(PostingsList::from_entries(vec![entry])));
                    }
                }
            }
        }

        {
            let mut stats = self.stats.write();
            if let Some(old) = &old {
                stats.remove_document(&old.lengths);
            }
            stats.add_document(&vector.lengths());
        }

        self.footprints.insert(
            doc_id,
            DocumentFootprint {
                terms: vector.terms().cloned().collect(),
                lengths: vector.lengths(),
            },
        );
        drop(shards);

        if old.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        }
    }

    fn apply_remove(&self, doc_id: DocumentId) -> bool {
        let old = match self.footprint(doc_id) {
            Some(old) => old,
            None => return false,
        };

        let shard_ids = self.shard_set(old.terms.iter().map(String::as_str));
        let mut shards = self.write_shards(&shard_ids);

        for term in &old.terms {
            if let Some(map) = shards.map_mut(self.shard_of(term)) {
                remove_posting(map, term, doc_id);
            }
        }

        self.stats.write().remove_document(&old.lengths);
        self.footprints.remove(&doc_id);
        drop(shards);
        true
    }

    fn shard_of(&self, term: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        term.hash(&mut hasher);
        (hasher.finish() % self.shards.len() as u64) as usize
    }

    /// Sorted, deduplicated shard ids for a set of terms
    fn shard_set<'t>(&self, terms: impl Iterator<Item = &'t str>) -> Vec<usize> {
        let mut ids: Vec<usize> = terms.map(|t| self.shard_of(t)).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    fn write_shards(&self, shard_ids: &[usize]) -> ShardWriteSet<'_> {
        ShardWriteSet {
            guards: shard_ids
                .iter()
                .map(|&id| (id, self.shards[id].write()))
                .collect(),
        }
    }

    fn doc_lock(&self, doc_id: DocumentId) -> &Mutex<()> {
        &self.doc_locks[(doc_id % self.doc_locks.len() as u64) as usize]
    }
}

fn remove_posting(map: &mut ShardMap, term: &str, doc_id: DocumentId) {
    let now_empty = match map.get_mut(term) {
        Some(list) => {
            Arc::make_mut(list).remove(doc_id);
            list.is_empty()
        }
        None => false,
    };
    if now_empty {
        map.remove(term);
    }
}
