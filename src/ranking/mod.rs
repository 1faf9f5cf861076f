//! Relevance scoring and top-k selection

pub mod ranker;
pub mod scoring;

pub use ranker::{RankedResults, Ranker};
pub use scoring::{document_length, length_norm, ScoringContext};
