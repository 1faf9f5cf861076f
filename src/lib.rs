//! Full-text indexing and ranking engine
//!
//! Documents are tokenized into per-document vectors, staged in a pending
//! buffer (or upserted directly), and merged into a sharded inverted index.
//! Searches overlay unmerged changes onto committed postings and rank the
//! candidates exactly or, for very large candidate sets, from a uniform
//! sample.

pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod metrics;
pub mod models;
pub mod query;
pub mod ranking;
pub mod testing;
pub mod tokenizer;

pub use config::{
    EngineConfig, IndexingMode, LengthNormalization, PendingConfig, RankingConfig,
    TokenizerConfig, WeightBiases, WorkloadProfile,
};
pub use engine::{EngineStats, IngestPath, IngestReport, SearchEngine};
pub use error::{QuarryError, Result};
pub use index::IndexSnapshot;
pub use metrics::EngineMetrics;
pub use models::*;
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
