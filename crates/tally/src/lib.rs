//! Tally: a report materialization engine.
//!
//! ## Crate layout
//! - `core`: the engine; report definitions, filter partitioning, the
//!   ordered row-stream merge, and the instance cache.
//!
//! The `prelude` module mirrors the runtime surface a report host uses;
//! provider adapters and presentation layers stay outside this workspace
//! and talk to the engine through the contracts in `core::source` and
//! `core::cache`.

pub use tally_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        cache::{Direction, FooterSpec, InstanceCache, KvStore as _, MemoryStore, SortOrder},
        error::EngineError,
        key::Key,
        report::{
            AggregateOp, CleanInputs, ColumnKind, FilterClause, QueryFilter, ReportColumn,
            partition_filters,
        },
        source::{
            BulkLookup as _, Cell, MergeConfig, NoLookups, PageConfig, PagedRecords, PartialRow,
            RowMerger, RowStream, key_rows,
        },
        value::{Row, Value},
    };
}

///
/// TESTS
///
