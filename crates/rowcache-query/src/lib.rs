//! In-memory evaluation of grid sort/filter models over materialized rows.

pub mod coerce;
pub mod column_index;
pub mod comparator;
pub mod filter;
pub mod model;
pub mod model_parser;

pub use column_index::ColumnIndex;
pub use comparator::RowComparator;
pub use filter::matches;
pub use model::{FilterSpec, Predicate, SortDirection, SortKey, SortSpec};
pub use model_parser::{parse, ParsedModels};
