//! Provider row-stream contracts and the ordered merge pipeline.
//!
//! A provider exposes its results as independently sorted streams of
//! `(Key, PartialRow)` pairs; the merge engine assembles complete logical
//! rows from them. Concrete provider adapters live outside this crate.

pub mod merge;
pub mod page;

use crate::{error::EngineError, key::Key, value::Value};
use std::collections::BTreeMap;

// re-exports
pub use merge::{MergeConfig, MergedRows, OrderingError, RowMerger};
pub use page::{PageConfig, PagedRecords};

///
/// Cell
///
/// One field slot of a partial row. `Deferred` carries the lookup key of a
/// late-bound reference column; the bulk-lookup phase must replace it with
/// `Ready` before the row leaves the merge.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Cell {
    Ready(Value),
    Deferred(Value),
}

impl Cell {
    #[must_use]
    pub const fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Self {
        Self::Ready(value)
    }
}

///
/// PartialRow
///
/// The fields one query group contributes to a logical row.
///

pub type PartialRow = BTreeMap<String, Cell>;

///
/// RowStream
///
/// One provider stream: `(Key, PartialRow)` pairs sorted ascending by key.
///

pub type RowStream = Box<dyn Iterator<Item = Result<(Key, PartialRow), EngineError>>>;

/// Wrap an authoritative key enumeration as a row stream with empty partial
/// rows, for reports whose columns alone would not cover the full key set.
pub fn key_rows(keys: impl IntoIterator<Item = Key> + 'static) -> RowStream {
    Box::new(
        keys.into_iter()
            .map(|key| Ok((key, PartialRow::new()))),
    )
}

///
/// BulkLookup
///
/// Batched secondary resolution of deferred fields. Invoked once per staged
/// batch so reference columns cost one provider round trip per batch rather
/// than one per row.
///

pub trait BulkLookup {
    fn resolve_batch(&mut self, rows: &mut [(Key, PartialRow)]) -> Result<(), EngineError>;
}

///
/// NoLookups
///
/// Pass-through resolver for reports without deferred columns.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoLookups;

impl BulkLookup for NoLookups {
    fn resolve_batch(&mut self, _rows: &mut [(Key, PartialRow)]) -> Result<(), EngineError> {
        Ok(())
    }
}
