//! Engine lifecycle and the ingestion, deletion and query interfaces

mod engine;
mod merger;

pub use engine::{EngineStats, IngestPath, IngestReport, SearchEngine};
pub use merger::{spawn_merger, MergerContext, MergerHandle, MergerSignal};
