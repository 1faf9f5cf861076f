//! Query planner
//!
//! Decides whether a bounded merge must run before the query, then builds a
//! candidate stream from committed postings with the pending buffer overlaid.

use tracing::debug;

use super::stream::CandidateStream;
use super::types::Query;
use crate::config::PendingConfig;
use crate::index::{BatchMerger, CorpusStatistics, InvertedIndex, MergeReport, PendingBuffer};

/// Candidate stream plus the decisions that produced it
pub struct QueryPlan {
    pub stream: CandidateStream,
    /// Set if a merge ran before planning
    pub forced_merge: Option<MergeReport>,
    /// Pending documents overlaid on the committed postings
    pub overlay_size: usize,
    pub estimated_candidates: usize,
    /// Committed corpus statistics at planning time
    pub statistics: CorpusStatistics,
}

pub struct QueryPlanner<'a> {
    index: &'a InvertedIndex,
    pending: &'a PendingBuffer,
    merger: &'a BatchMerger,
    config: &'a PendingConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(
        index: &'a InvertedIndex,
        pending: &'a PendingBuffer,
        merger: &'a BatchMerger,
        config: &'a PendingConfig,
    ) -> Self {
        Self {
            index,
            pending,
            merger,
            config,
        }
    }

    pub fn plan(&self, query: &Query) -> QueryPlan {
        let forced_merge = self.merge_if_needed(query);

        // Overlay before committed lookup: a record merged in between is
        // then seen through the overlay either way
        let overlay = self.pending.overlay_snapshot();
        let lists = self.index.lookup_many(&query.term_strings());
        let statistics = self.index.statistics();

        let overlay_size = overlay.len();
        let stream = CandidateStream::new(query, lists, overlay.into_values());
        let estimated_candidates = stream.estimated_len();

        debug!(
            terms = query.len(),
            overlay_size,
            estimated_candidates,
            forced_merge = forced_merge.is_some(),
            "planned query"
        );

        QueryPlan {
            stream,
            forced_merge,
            overlay_size,
            estimated_candidates,
            statistics,
        }
    }

    /// Whether pending records touching this query must be merged first
    ///
    /// True if any term's pending count exceeds the per-term threshold, or the
    /// buffer is over its high-water mark and any term has pending records.
    pub fn needs_merge(&self, query: &Query) -> bool {
        let over_high_water = self.pending.over_high_water_mark();
        query.terms().iter().any(|t| {
            let count = self.pending.pending_count_for_term(&t.term);
            count > self.config.term_merge_threshold || (over_high_water && count > 0)
        })
    }

    fn merge_if_needed(&self, query: &Query) -> Option<MergeReport> {
        if !self.needs_merge(query) {
            return None;
        }

        let report = self
            .merger
            .merge(self.index, self.pending, self.config.merge_batch_size);
        debug!(
            merged = report.records,
            remaining = self.pending.len(),
            "forced merge before query"
        );
        Some(report)
    }
}
