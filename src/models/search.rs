use serde::{Deserialize, Serialize};

use super::document::DocumentId;

/// Ranking mode requested by the caller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankingMode {
    /// Let the engine pick based on the estimated candidate count
    #[default]
    Auto,
    /// Score every candidate
    Exact,
    /// Score a fixed-size uniform sample of the candidates
    Sampled,
}

/// Ranking mode that actually produced a result set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeUsed {
    Exact,
    /// Approximate top-k: only `scored` of roughly `probed` candidates were scored
    Sampled { sample_size: usize, probed: usize, scored: usize },
}

impl ModeUsed {
    pub fn is_sampled(&self) -> bool {
        matches!(self, ModeUsed::Sampled { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModeUsed::Exact => "exact",
            ModeUsed::Sampled { .. } => "sampled",
        }
    }
}

/// Search request, with terms already split by the query parser
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Every term must match
    pub required: Vec<String>,
    /// Contributes to score at a lower weight
    pub optional: Vec<String>,
    /// Number of results
    pub k: usize,
    pub mode: RankingMode,
    /// Overrides the configured default sample size
    pub sample_size: Option<usize>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            optional: Vec::new(),
            k: 10,
            mode: RankingMode::Auto,
            sample_size: None,
        }
    }
}

impl SearchRequest {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            ..Default::default()
        }
    }

    pub fn require(mut self, term: impl Into<String>) -> Self {
        self.required.push(term.into());
        self
    }

    pub fn optional(mut self, term: impl Into<String>) -> Self {
        self.optional.push(term.into());
        self
    }

    pub fn with_mode(mut self, mode: RankingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = Some(sample_size);
        self
    }
}

/// A ranked document
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocumentId,
    pub score: f32,
}

impl SearchHit {
    pub fn new(doc_id: DocumentId, score: f32) -> Self {
        Self { doc_id, score }
    }
}

/// Search response with the mode used and timing information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub mode: ModeUsed,
    pub estimated_candidates: usize,
    pub took_us: u64,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self {
            hits: Vec::new(),
            mode: ModeUsed::Exact,
            estimated_candidates: 0,
            took_us: 0,
        }
    }

    /// Document ids in rank order
    pub fn doc_ids(&self) -> Vec<DocumentId> {
        self.hits.iter().map(|hit| hit.doc_id).collect()
    }
}
