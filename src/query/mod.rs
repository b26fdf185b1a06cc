pub mod aggs;
pub mod ast;
pub mod executor;
pub mod matcher;
pub mod sort;

pub use aggs::{Aggregation, AggregationResult, Aggregations, Bucket};
pub use ast::{Operator, Query, RangeOp};
pub use executor::{execute, SearchRequest, SearchResponse};
pub use sort::SortSpec;
