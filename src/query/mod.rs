//! Query planning and candidate generation
//!
//! Queries arrive as already-parsed required and optional terms. The planner
//! normalizes nothing itself; see [`Query::from_request`].

pub mod planner;
pub mod stream;
pub mod types;

pub use planner::{QueryPlan, QueryPlanner};
pub use stream::{Candidate, CandidateSource, CandidateStream, TermMatch};
pub use types::{Clause, Query, QueryTerm};
