//! Inverted index with a pending-update buffer
//!
//! # Architecture
//!
//! - `DocumentVector`: per-document term -> occurrences map
//! - `PendingBuffer`: staged, unmerged document changes
//! - `InvertedIndex`: committed term -> postings lists, sharded for concurrency
//! - `BatchMerger`: bounded, single-flight merges from buffer to index
//! - `IndexSnapshot`: checkpoint format for the storage layer

mod inverted;
mod merge;
mod pending;
mod snapshot;
mod statistics;
mod types;
mod vector;

pub use inverted::*;
pub use merge::*;
pub use pending::*;
pub use snapshot::*;
pub use statistics::*;
pub use types::*;
pub use vector::*;
