use prometheus::{
    Counter, CounterVec, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
};
use std::sync::Arc;

use crate::index::MergeReport;

/// Prometheus metrics for one engine instance
///
/// Each engine owns its registry, so several engines in one process do not
/// collide.
#[derive(Clone)]
pub struct EngineMetrics {
    // Counters
    pub documents_staged: Counter,
    pub documents_upserted: Counter,
    pub documents_deleted: Counter,
    pub merges_total: Counter,
    pub merged_records: Counter,
    pub backpressure_rejections: Counter,
    pub tokenization_failures: Counter,
    pub searches_total: CounterVec,

    // Gauges
    pub pending_records: Gauge,
    pub committed_documents: Gauge,

    // Histograms
    pub ingest_latency: Histogram,
    pub search_latency: HistogramVec,
    pub merge_batch_size: Histogram,

    // Registry
    registry: Arc<Registry>,
}

impl EngineMetrics {
    /// Create a new EngineMetrics instance with a fresh registry
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        // Counters
        let documents_staged = Counter::with_opts(Opts::new(
            "quarry_documents_staged_total",
            "Total number of document changes staged in the pending buffer",
        ))?;
        registry.register(Box::new(documents_staged.clone()))?;

        let documents_upserted = Counter::with_opts(Opts::new(
            "quarry_documents_upserted_total",
            "Total number of documents upserted directly into the index",
        ))?;
        registry.register(Box::new(documents_upserted.clone()))?;

        let documents_deleted = Counter::with_opts(Opts::new(
            "quarry_documents_deleted_total",
            "Total number of document deletions accepted",
        ))?;
        registry.register(Box::new(documents_deleted.clone()))?;

        let merges_total = Counter::with_opts(Opts::new(
            "quarry_merges_total",
            "Total number of merges that applied pending records",
        ))?;
        registry.register(Box::new(merges_total.clone()))?;

        let merged_records = Counter::with_opts(Opts::new(
            "quarry_merged_records_total",
            "Total number of pending records merged into the index",
        ))?;
        registry.register(Box::new(merged_records.clone()))?;

        let backpressure_rejections = Counter::with_opts(Opts::new(
            "quarry_backpressure_rejections_total",
            "Ingestion calls rejected because the pending backlog hit its hard cap",
        ))?;
        registry.register(Box::new(backpressure_rejections.clone()))?;

        let tokenization_failures = Counter::with_opts(Opts::new(
            "quarry_tokenization_failures_total",
            "Fields skipped because their content could not be tokenized",
        ))?;
        registry.register(Box::new(tokenization_failures.clone()))?;

        let searches_total = CounterVec::new(
            Opts::new("quarry_searches_total", "Total number of searches by ranking mode"),
            &["mode"],
        )?;
        registry.register(Box::new(searches_total.clone()))?;

        // Gauges
        let pending_records = Gauge::with_opts(Opts::new(
            "quarry_pending_records",
            "Records waiting in the pending buffer",
        ))?;
        registry.register(Box::new(pending_records.clone()))?;

        let committed_documents = Gauge::with_opts(Opts::new(
            "quarry_committed_documents",
            "Documents committed to the inverted index",
        ))?;
        registry.register(Box::new(committed_documents.clone()))?;

        // Histograms
        let ingest_latency = Histogram::with_opts(
            HistogramOpts::new("quarry_ingest_latency_seconds", "Ingestion call latency")
                .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;
        registry.register(Box::new(ingest_latency.clone()))?;

        let search_latency = HistogramVec::new(
            HistogramOpts::new("quarry_search_latency_seconds", "Search latency by ranking mode")
                .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
            &["mode"],
        )?;
        registry.register(Box::new(search_latency.clone()))?;

        let merge_batch_size = Histogram::with_opts(
            HistogramOpts::new("quarry_merge_batch_size", "Records applied per merge")
                .buckets(vec![1.0, 10.0, 50.0, 100.0, 500.0, 1000.0, 5000.0]),
        )?;
        registry.register(Box::new(merge_batch_size.clone()))?;

        Ok(Self {
            documents_staged,
            documents_upserted,
            documents_deleted,
            merges_total,
            merged_records,
            backpressure_rejections,
            tokenization_failures,
            searches_total,
            pending_records,
            committed_documents,
            ingest_latency,
            search_latency,
            merge_batch_size,
            registry: Arc::new(registry),
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Record a staged change
    pub fn record_stage(&self, duration_secs: f64) {
        self.documents_staged.inc();
        self.ingest_latency.observe(duration_secs);
    }

    /// Record a direct upsert
    pub fn record_upsert(&self, duration_secs: f64) {
        self.documents_upserted.inc();
        self.ingest_latency.observe(duration_secs);
    }

    pub fn record_delete(&self) {
        self.documents_deleted.inc();
    }

    /// Record a merge; empty merges are ignored
    pub fn record_merge(&self, report: &MergeReport) {
        if report.is_empty() {
            return;
        }
        self.merges_total.inc();
        self.merged_records.inc_by(report.records as f64);
        self.merge_batch_size.observe(report.records as f64);
    }

    pub fn record_backpressure(&self) {
        self.backpressure_rejections.inc();
    }

    pub fn record_tokenization_failures(&self, count: usize) {
        self.tokenization_failures.inc_by(count as f64);
    }

    /// Record a search under the ranking mode that served it
    pub fn record_search(&self, mode: &str, duration_secs: f64) {
        self.searches_total.with_label_values(&[mode]).inc();
        self.search_latency
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    /// Update the size gauges
    pub fn set_sizes(&self, pending: usize, committed: usize) {
        self.pending_records.set(pending as f64);
        self.committed_documents.set(committed as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_record() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_stage(0.0001);
        metrics.record_search("exact", 0.002);
        metrics.record_search("sampled", 0.003);
        metrics.record_merge(&MergeReport {
            records: 7,
            upserted: 7,
            removed: 0,
            missing: 0,
        });
        metrics.record_merge(&MergeReport::default());

        assert_eq!(metrics.documents_staged.get(), 1.0);
        assert_eq!(metrics.merges_total.get(), 1.0);
        assert_eq!(metrics.merged_records.get(), 7.0);
        assert_eq!(metrics.searches_total.with_label_values(&["exact"]).get(), 1.0);

        let families = metrics.registry().gather();
        assert!(families.iter().any(|f| f.get_name() == "quarry_searches_total"));
    }

    #[test]
    fn test_independent_registries() {
        // Two engines in one process must not conflict
        let a = EngineMetrics::new().unwrap();
        let b = EngineMetrics::new().unwrap();
        a.record_delete();
        assert_eq!(a.documents_deleted.get(), 1.0);
        assert_eq!(b.documents_deleted.get(), 0.0);
    }
}
