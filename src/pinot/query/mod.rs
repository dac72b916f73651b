//! The query engine (spec §4.6): QP grammar parsing, two-pass stemmed search,
//! ranking, abstract generation and relevance feedback.

pub mod feedback;
pub mod highlighter;
pub mod parser;
pub mod search;

pub use feedback::expand_feedback;
pub use highlighter::Abstract;
pub use parser::{parse, FieldKind, QueryNode, RangeKind};
pub use search::{search, validate, SearchOptions, SearchOutcome, SearchResult, SortOrder};
