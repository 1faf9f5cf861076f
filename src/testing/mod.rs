//! Testing infrastructure for correctness verification
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use quarry::testing::prelude::*;
//!
//! let violations = check_index(engine.index());
//! assert!(violations.is_empty());
//! ```
//!
//! # Invariants
//!
//! - **SinglePostingPerDocument**: at most one entry per (term, document)
//! - **PositionsAscending**: entries carry strictly ascending positions
//! - **ForwardIndexConsistent**: postings agree with per-document footprints
//! - **StatisticsConsistent**: corpus statistics match committed documents

pub mod invariants;

pub use invariants::{
    check_all_invariants, check_index, default_invariants, ForwardIndexConsistent, IndexView,
    Invariant, PositionsAscending, SinglePostingPerDocument, StatisticsConsistent, Violation,
};

/// Prelude for easy imports
pub mod prelude {
    pub use super::invariants::{
        check_all_invariants, check_index, default_invariants, IndexView, Invariant, Violation,
    };
}
