//! Scoring functions for ranked retrieval

use crate::config::{LengthNormalization, RankingConfig, WeightBiases};
use crate::index::{ClassCounts, CorpusStatistics};
use crate::query::{Candidate, Clause};

/// Biased term weight: occurrences per class times the class bias
///
/// # Arguments
/// * `classes` - Occurrences of the term per weight class
/// * `biases` - Bias per weight class
pub fn biased_frequency(classes: &ClassCounts, biases: &WeightBiases) -> f32 {
    classes.weighted(biases)
}

/// Document length under a normalization policy
///
/// `Uniform` counts every occurrence once; `Weighted` multiplies each class
/// length by its bias.
pub fn document_length(
    lengths: &ClassCounts,
    mode: LengthNormalization,
    biases: &WeightBiases,
) -> f64 {
    match mode {
        LengthNormalization::Uniform => lengths.total() as f64,
        LengthNormalization::Weighted => lengths.weighted(biases) as f64,
    }
}

/// Pivoted length normalization
///
/// # Arguments
/// * `doc_len` - Length of the document
/// * `avg_doc_len` - Average committed document length
/// * `pivot` - Strength of normalization in [0, 1]
///
/// # Returns
/// `1 - pivot + pivot * doc_len / avg_doc_len`, or 1 for an empty corpus
pub fn length_norm(doc_len: f64, avg_doc_len: f64, pivot: f64) -> f64 {
    if avg_doc_len <= 0.0 {
        return 1.0;
    }
    (1.0 - pivot + pivot * doc_len / avg_doc_len).max(f64::MIN_POSITIVE)
}

/// Everything needed to score candidates of one query
#[derive(Clone, Debug)]
pub struct ScoringContext {
    biases: WeightBiases,
    normalization: LengthNormalization,
    pivot: f64,
    avg_doc_len: f64,
    optional_weight: f64,
}

impl ScoringContext {
    pub fn new(config: &RankingConfig, biases: &WeightBiases, statistics: &CorpusStatistics) -> Self {
        Self {
            biases: biases.clone(),
            normalization: config.length_normalization,
            pivot: config.length_pivot as f64,
            avg_doc_len: statistics.avg_length(config.length_normalization, biases),
            optional_weight: config.optional_term_weight as f64,
        }
    }

    pub fn avg_doc_len(&self) -> f64 {
        self.avg_doc_len
    }

    pub fn clause_weight(&self, clause: Clause) -> f64 {
        match clause {
            Clause::Required => 1.0,
            Clause::Optional => self.optional_weight,
        }
    }

    /// Score = sum over matched terms of clause weight times biased
    /// frequency, divided by the length norm
    pub fn score(&self, candidate: &Candidate) -> f32 {
        let raw: f64 = candidate
            .matches
            .iter()
            .map(|m| self.clause_weight(m.clause) * biased_frequency(&m.classes, &self.biases) as f64)
            .sum();

        let doc_len = document_length(&candidate.doc_lengths, self.normalization, &self.biases);
        (raw / length_norm(doc_len, self.avg_doc_len, self.pivot)) as f32
    }
}
