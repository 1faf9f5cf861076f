pub mod document;
pub mod operation;
pub mod search;

pub use document::{Document, DocumentId, Field, Term, WeightClass};
pub use operation::OperationKind;
pub use search::{ModeUsed, RankingMode, SearchHit, SearchRequest, SearchResponse};
