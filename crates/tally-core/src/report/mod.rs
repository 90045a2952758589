//! Report definition surface: column descriptors, query filters, and the
//! filter partitioner that splits a report's columns into disjoint provider
//! queries.

pub mod column;
pub mod filter;
pub mod partition;

// re-exports
pub use column::{AggregateOp, ColumnKind, QueryColumn, QueryModifier, ReportColumn};
pub use filter::{CleanInputs, FilterClause, FilterFn, QueryFilter};
pub use partition::{ConflictError, QueryGroup, QueryPartition, QuerySpec, partition_filters};
