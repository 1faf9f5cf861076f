//! Search engine: ingestion, deletion and ranked search over one index
//!
//! The engine is an owned value; construct one per index and tear it down
//! with [`SearchEngine::shutdown`] (or drop it).

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::merger::{spawn_merger, MergerContext, MergerHandle};
use crate::config::{EngineConfig, IndexingMode};
use crate::error::{QuarryError, Result};
use crate::index::{
    BatchMerger, DocumentVector, IndexSnapshot, InvertedIndex, MergeReport, PendingBuffer,
    StageSignal, UpsertOutcome,
};
use crate::metrics::EngineMetrics;
use crate::models::{Document, DocumentId, OperationKind, SearchRequest, SearchResponse};
use crate::query::{Query, QueryPlanner};
use crate::ranking::Ranker;
use crate::tokenizer::Tokenizer;

/// How an ingestion call reached the index
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestPath {
    /// Upserted synchronously
    Direct,
    /// Staged in the pending buffer
    Staged,
}

/// Outcome of an ingestion call
#[derive(Debug)]
pub struct IngestReport {
    pub doc_id: DocumentId,
    pub kind: OperationKind,
    pub path: IngestPath,
    /// Distinct terms in the new version
    pub terms: usize,
    /// Fields that could not be tokenized and were indexed as empty
    pub skipped_fields: Vec<QuarryError>,
}

/// Point-in-time engine counters
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineStats {
    pub committed_documents: usize,
    pub distinct_terms: usize,
    pub pending_records: usize,
    /// Documents whose current version is still pending
    pub pending_documents: usize,
    pub merges: u64,
    pub merged_records: u64,
}

pub struct SearchEngine {
    config: EngineConfig,
    tokenizer: Tokenizer,
    index: Arc<InvertedIndex>,
    pending: Arc<PendingBuffer>,
    merger: Arc<BatchMerger>,
    /// Serializes ingestion of the same document
    ingest_locks: Vec<Mutex<()>>,
    metrics: EngineMetrics,
    background: Option<MergerHandle>,
}

impl SearchEngine {
    /// Create an engine with an empty index
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let index = InvertedIndex::from_config(&config);
        Self::assemble(config, index)
    }

    /// Create an engine whose committed index is loaded from a snapshot
    pub fn restore(config: EngineConfig, snapshot: IndexSnapshot) -> Result<Self> {
        config.validate()?;
        let index =
            InvertedIndex::from_snapshot(snapshot, config.shard_count, config.doc_lock_stripes)?;
        info!(
            documents = index.doc_count(),
            terms = index.term_count(),
            "restored index from snapshot"
        );
        Self::assemble(config, index)
    }

    fn assemble(config: EngineConfig, index: InvertedIndex) -> Result<Self> {
        let tokenizer = Tokenizer::new(&config.tokenizer);
        let index = Arc::new(index);
        let pending = Arc::new(PendingBuffer::new(config.pending.high_water_mark));
        let merger = Arc::new(BatchMerger::new());
        let metrics = EngineMetrics::new()?;

        let background = if config.indexing_mode == IndexingMode::Buffered
            && config.pending.merge_interval_ms > 0
        {
            Some(spawn_merger(MergerContext {
                index: index.clone(),
                pending: pending.clone(),
                merger: merger.clone(),
                metrics: metrics.clone(),
                batch_size: config.pending.merge_batch_size,
                interval: Duration::from_millis(config.pending.merge_interval_ms),
            })?)
        } else {
            None
        };

        info!(
            mode = ?config.indexing_mode,
            shards = config.shard_count,
            background_merger = background.is_some(),
            "search engine started"
        );

        Ok(Self {
            ingest_locks: (0..config.doc_lock_stripes.max(1))
                .map(|_| Mutex::new(()))
                .collect(),
            config,
            tokenizer,
            index,
            pending,
            merger,
            metrics,
            background,
        })
    }

    /// Tokenize a written document and stage or upsert it
    ///
    /// Fields that fail to tokenize are indexed as empty and reported in the
    /// returned [`IngestReport`]. In buffered mode, a backlog at its hard cap
    /// is merged inline first; if it stays full the call is rejected with
    /// [`QuarryError::MergeOverflow`].
    pub fn on_document_written(&self, doc: &Document) -> Result<IngestReport> {
        let start = Instant::now();
        let (vector, skipped_fields) = DocumentVector::build(&self.tokenizer, &doc.fields);
        for failure in &skipped_fields {
            warn!(doc_id = doc.id, error = %failure, "field indexed as empty");
        }
        self.metrics.record_tokenization_failures(skipped_fields.len());
        let terms = vector.term_count();

        let _doc = self.ingest_lock(doc.id).lock();
        let (kind, path) = match self.config.indexing_mode {
            IndexingMode::Direct => {
                let kind = match self.index.upsert(doc.id, &vector) {
                    UpsertOutcome::Inserted => OperationKind::Insert,
                    UpsertOutcome::Replaced => OperationKind::Update,
                };
                self.metrics.record_upsert(start.elapsed().as_secs_f64());
                (kind, IngestPath::Direct)
            }
            IndexingMode::Buffered => {
                self.admit()?;
                let kind = if self.is_visible(doc.id) {
                    OperationKind::Update
                } else {
                    OperationKind::Insert
                };
                self.stage(doc.id, vector, kind);
                self.metrics.record_stage(start.elapsed().as_secs_f64());
                (kind, IngestPath::Staged)
            }
        };

        debug!(doc_id = doc.id, kind = kind.as_str(), terms, "document written");
        Ok(IngestReport {
            doc_id: doc.id,
            kind,
            path,
            terms,
            skipped_fields,
        })
    }

    /// Remove a document from search results
    ///
    /// Deleting a document that is not visible is a no-op reported as
    /// [`QuarryError::UnknownDocument`].
    pub fn on_document_deleted(&self, doc_id: DocumentId) -> Result<()> {
        let _doc = self.ingest_lock(doc_id).lock();
        if !self.is_visible(doc_id) {
            warn!(doc_id, "delete for unknown document ignored");
            return Err(QuarryError::UnknownDocument(doc_id));
        }

        match self.config.indexing_mode {
            IndexingMode::Direct => {
                self.index.remove(doc_id);
            }
            IndexingMode::Buffered => {
                self.admit()?;
                self.stage(doc_id, DocumentVector::new(), OperationKind::Delete);
            }
        }

        self.metrics.record_delete();
        debug!(doc_id, "document deleted");
        Ok(())
    }

    /// Ranked search over committed and pending documents
    pub fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        let start = Instant::now();
        validate_request(request)?;

        let query = Query::from_request(request, &self.tokenizer);
        if query.is_empty() {
            debug!("every query term normalized away");
            let mut response = SearchResponse::empty();
            response.took_us = start.elapsed().as_micros() as u64;
            return Ok(response);
        }

        let plan =
            QueryPlanner::new(&self.index, &self.pending, &self.merger, &self.config.pending)
                .plan(&query);
        if let Some(report) = &plan.forced_merge {
            self.metrics.record_merge(report);
        }

        let estimated_candidates = plan.estimated_candidates;
        let ranker = Ranker::new(&self.config.ranking, &self.config.biases, &plan.statistics);
        let results = ranker.rank(plan.stream, request.k, request.mode, request.sample_size);

        let elapsed = start.elapsed();
        self.metrics
            .record_search(results.mode.label(), elapsed.as_secs_f64());
        self.metrics
            .set_sizes(self.pending.len(), self.index.doc_count());

        Ok(SearchResponse {
            hits: results.hits,
            mode: results.mode,
            estimated_candidates,
            took_us: elapsed.as_micros() as u64,
        })
    }

    /// Merge up to `max_records` of the oldest pending records
    pub fn merge_pending(&self, max_records: usize) -> MergeReport {
        let report = self.merger.merge(&self.index, &self.pending, max_records);
        self.metrics.record_merge(&report);
        report
    }

    /// Merge everything pending, in batches of the configured size
    pub fn flush(&self) -> MergeReport {
        let mut total = MergeReport::default();
        loop {
            let report = self.merge_pending(self.config.pending.merge_batch_size);
            if report.is_empty() {
                break;
            }
            total.absorb(report);
        }
        self.metrics
            .set_sizes(self.pending.len(), self.index.doc_count());
        total
    }

    /// Flush, then serialize the committed index
    pub fn snapshot(&self) -> IndexSnapshot {
        self.flush();
        self.index.snapshot()
    }

    /// Whether a document is currently visible to searches
    pub fn contains(&self, doc_id: DocumentId) -> bool {
        self.is_visible(doc_id)
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            committed_documents: self.index.doc_count(),
            distinct_terms: self.index.term_count(),
            pending_records: self.pending.len(),
            pending_documents: self.pending.visible_count(),
            merges: self.merger.merge_count(),
            merged_records: self.merger.merged_records(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Committed index, for inspection
    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn pending(&self) -> &PendingBuffer {
        &self.pending
    }

    /// Stop the background merger; pending records stay unmerged
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(background) = self.background.take() {
            background.shutdown()?;
        }
        info!(
            pending = self.pending.len(),
            documents = self.index.doc_count(),
            "search engine stopped"
        );
        Ok(())
    }

    fn stage(&self, doc_id: DocumentId, vector: DocumentVector, kind: OperationKind) {
        let replaced = self
            .index
            .footprint(doc_id)
            .map(|footprint| footprint.terms)
            .unwrap_or_default();
        let signal = self.pending.stage_replacing(doc_id, vector, kind, replaced);
        if signal == StageSignal::MergeRequested {
            if let Some(background) = &self.background {
                background.wake();
            }
        }
    }

    /// Make room for one more staged record
    ///
    /// At the hard cap a bounded merge runs inline; the write is rejected
    /// only if the backlog is still full afterwards, which happens when
    /// another merge holds the merger.
    fn admit(&self) -> Result<()> {
        let hard_cap = self.config.pending.hard_cap;
        if self.pending.len() < hard_cap {
            return Ok(());
        }

        if let Some(report) =
            self.merger
                .try_merge(&self.index, &self.pending, self.config.pending.merge_batch_size)
        {
            if !report.is_empty() {
                self.metrics.record_merge(&report);
                debug!(records = report.records, "merged at hard cap before staging");
            }
        }
        let backlog = self.pending.len();
        if backlog < hard_cap {
            return Ok(());
        }

        if let Some(background) = &self.background {
            background.wake();
        }
        self.metrics.record_backpressure();
        warn!(backlog, hard_cap, "pending backlog full, rejecting write");
        Err(QuarryError::MergeOverflow {
            pending: backlog,
            hard_cap,
        })
    }

    /// The newest pending record wins over the committed index
    fn is_visible(&self, doc_id: DocumentId) -> bool {
        match self.pending.latest(doc_id) {
            Some(record) => !record.kind.is_delete(),
            None => self.index.contains(doc_id),
        }
    }

    fn ingest_lock(&self, doc_id: DocumentId) -> &Mutex<()> {
        &self.ingest_locks[(doc_id % self.ingest_locks.len() as u64) as usize]
    }
}

fn validate_request(request: &SearchRequest) -> Result<()> {
    if request.k == 0 {
        return Err(QuarryError::InvalidQuery("k must be positive".to_string()));
    }
    if request.required.is_empty() && request.optional.is_empty() {
        return Err(QuarryError::InvalidQuery("no query terms".to_string()));
    }
    if request.sample_size == Some(0) {
        return Err(QuarryError::InvalidQuery(
            "sample size must be positive".to_string(),
        ));
    }
    Ok(())
}
