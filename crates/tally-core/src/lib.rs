//! Core runtime for Tally: report column descriptors, the filter
//! partitioner, the ordered row-stream merge engine, and the report
//! instance cache, with the ergonomics exported via the `prelude`.
#![warn(unreachable_pub)]

pub mod cache;
pub mod error;
pub mod key;
pub mod obs;
pub mod report;
pub mod source;
pub mod types;
pub mod value;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No stores, sinks, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        cache::{Direction, SortOrder},
        key::Key,
        report::{ColumnKind, QueryFilter, ReportColumn},
        value::{Row, Value},
    };
}
