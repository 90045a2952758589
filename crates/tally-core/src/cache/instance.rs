use crate::{
    cache::{
        keys::CacheKeys,
        store::{Direction, KvStore},
    },
    error::EngineError,
    obs::sink::{self, MetricsEvent},
    report::column::ReportColumn,
    types::Timestamp,
    value::{Row, Value},
};
use std::{collections::BTreeSet, time::Duration};
use thiserror::Error as ThisError;

/// Synthetic field carrying a returned row's original sequential id, so
/// callers can correlate display rows back to footer/detail lookups.
pub const ROW_ID_FIELD: &str = "_row_id";

///
/// InstanceIncompleteError
///
/// A read hit an instance that is absent or not yet finished. Recoverable:
/// the caller triggers (re)computation and retries.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("report '{report}' instance '{instance_id}' is not finished")]
pub struct InstanceIncompleteError {
    pub report: String,
    pub instance_id: String,
}

///
/// SortOrder
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortOrder {
    pub column: String,
    pub direction: Direction,
}

impl SortOrder {
    #[must_use]
    pub fn new(column: &str, direction: Direction) -> Self {
        Self {
            column: column.to_string(),
            direction,
        }
    }
}

///
/// FooterSpec
///
/// How `create_instance` computes the footer: fold the column descriptors'
/// increment/finalize contract over the rows, or invoke a caller-supplied
/// computation directly.
///

pub enum FooterSpec<'a> {
    Columns(&'a [ReportColumn]),
    Callback(Box<dyn FnOnce() -> Row + 'a>),
}

///
/// InstanceCache
///
/// Persists finalized report instances behind a `KvStore`: ordered rows,
/// one sort index per column, and the computed footer, under a
/// `(report, instance)` identity with uniform TTL.
///
/// Single writer per instance id; readers only ever observe finished
/// instances because the completion marker is the last key written.
///

pub struct InstanceCache<S: KvStore> {
    store: S,
}

impl<S: KvStore> InstanceCache<S> {
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Atomically materialize a finished instance.
    ///
    /// Rows receive zero-based sequential ids in encounter order. Every
    /// data key is written before the completion marker, so a concurrent
    /// reader sees either nothing or a fully finished instance. A write
    /// failure before the marker leaves the instance unfinished and
    /// recreatable.
    pub fn create_instance(
        &mut self,
        report: &str,
        instance_id: &str,
        rows: &[Row],
        footer: FooterSpec<'_>,
        ttl: Duration,
    ) -> Result<(), EngineError> {
        let keys = CacheKeys::new(report, instance_id);

        // clear any stale or half-written predecessor (last writer wins)
        self.store.delete_prefix(keys.prefix())?;

        let mut written: Vec<String> = Vec::new();

        let root = keys.root();
        self.store
            .set_value(&root, Value::Timestamp(Timestamp::now()))?;
        written.push(root);

        // row maps, in encounter order
        for (row_id, row) in rows.iter().enumerate() {
            let key = keys.row(row_id as u64);
            self.store.map_put(&key, row)?;
            written.push(key);
        }

        // id order
        let ids: Vec<u64> = (0..rows.len() as u64).collect();
        let ids_key = keys.ids();
        self.store.list_append(&ids_key, &ids)?;
        written.push(ids_key);

        // one sort index per column; absent fields index as null
        for column in column_names(rows) {
            let entries: Vec<(Value, u64)> = rows
                .iter()
                .enumerate()
                .map(|(row_id, row)| {
                    let value = row.get(&column).cloned().unwrap_or(Value::Null);
                    (value, row_id as u64)
                })
                .collect();

            let index_key = keys.index(&column);
            self.store.sorted_insert(&index_key, &entries)?;
            written.push(index_key);
        }

        let footer_key = keys.footer();
        let footer_row = match footer {
            FooterSpec::Columns(columns) => fold_footer(columns, rows),
            FooterSpec::Callback(compute) => compute(),
        };
        self.store.map_put(&footer_key, &footer_row)?;
        written.push(footer_key);

        // the marker flips last; everything then expires together
        let done_key = keys.done();
        self.store.set_value(&done_key, Value::Bool(true))?;
        written.push(done_key);
        self.store.expire_keys(&written, ttl)?;

        sink::record(MetricsEvent::InstanceWrite {
            rows: rows.len() as u64,
        });
        Ok(())
    }

    /// Delete every key belonging to the instance; no-op when absent.
    pub fn kill_instance_cache(
        &mut self,
        report: &str,
        instance_id: &str,
    ) -> Result<(), EngineError> {
        let keys = CacheKeys::new(report, instance_id);
        self.store.delete_prefix(keys.prefix())?;
        sink::record(MetricsEvent::InstanceKill);
        Ok(())
    }

    /// Delete every instance of the report (broad invalidation for shape
    /// changes).
    pub fn kill_report_cache(&mut self, report: &str) -> Result<(), EngineError> {
        self.store.delete_prefix(&CacheKeys::report_prefix(report))?;
        sink::record(MetricsEvent::InstanceKill);
        Ok(())
    }

    /// True once any write for the instance is visible. Never fails.
    #[must_use]
    pub fn is_instance_started(&self, report: &str, instance_id: &str) -> bool {
        let keys = CacheKeys::new(report, instance_id);
        self.store.exists(&keys.root()).unwrap_or(false)
    }

    /// True once the completion marker is visible. Never fails.
    #[must_use]
    pub fn is_instance_finished(&self, report: &str, instance_id: &str) -> bool {
        let keys = CacheKeys::new(report, instance_id);
        self.store.exists(&keys.done()).unwrap_or(false)
    }

    pub fn instance_row_count(&self, report: &str, instance_id: &str) -> Result<u64, EngineError> {
        let keys = self.require_finished(report, instance_id)?;

        self.store.list_len(&keys.ids())?.ok_or_else(|| {
            EngineError::cache_invariant(format!(
                "finished instance '{}' has no id list",
                keys.prefix()
            ))
        })
    }

    pub fn instance_timestamp(
        &self,
        report: &str,
        instance_id: &str,
    ) -> Result<Timestamp, EngineError> {
        let keys = self.require_finished(report, instance_id)?;

        match self.store.get_value(&keys.root())? {
            Some(Value::Timestamp(ts)) => Ok(ts),
            _ => Err(EngineError::cache_invariant(format!(
                "finished instance '{}' has no timestamp",
                keys.prefix()
            ))),
        }
    }

    pub fn instance_footer(&self, report: &str, instance_id: &str) -> Result<Row, EngineError> {
        let keys = self.require_finished(report, instance_id)?;

        self.store.map_get(&keys.footer())?.ok_or_else(|| {
            EngineError::cache_invariant(format!(
                "finished instance '{}' has no footer",
                keys.prefix()
            ))
        })
    }

    /// Read rows by walking the named column's sort index in the requested
    /// direction, applying offset then limit. Every returned row carries
    /// [`ROW_ID_FIELD`] with its original sequential id as an opaque
    /// string.
    pub fn instance_rows(
        &self,
        report: &str,
        instance_id: &str,
        sort: &SortOrder,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Row>, EngineError> {
        let keys = self.require_finished(report, instance_id)?;

        let index_key = keys.index(&sort.column);
        if !self.store.exists(&index_key)? {
            return Err(EngineError::cache_not_found(format!(
                "no sort index for column '{}' on instance '{}'",
                sort.column,
                keys.prefix()
            )));
        }

        let row_ids = self
            .store
            .sorted_range(&index_key, sort.direction, offset, limit)?;

        let mut rows = Vec::with_capacity(row_ids.len());
        for row_id in row_ids {
            let mut row = self.store.map_get(&keys.row(row_id))?.ok_or_else(|| {
                EngineError::cache_invariant(format!(
                    "row {row_id} missing from finished instance '{}'",
                    keys.prefix()
                ))
            })?;
            row.insert(ROW_ID_FIELD.to_string(), Value::text(row_id.to_string()));
            rows.push(row);
        }

        sink::record(MetricsEvent::InstanceRead {
            rows: rows.len() as u64,
        });
        Ok(rows)
    }

    fn require_finished(
        &self,
        report: &str,
        instance_id: &str,
    ) -> Result<CacheKeys, EngineError> {
        if self.is_instance_finished(report, instance_id) {
            Ok(CacheKeys::new(report, instance_id))
        } else {
            Err(InstanceIncompleteError {
                report: report.to_string(),
                instance_id: instance_id.to_string(),
            }
            .into())
        }
    }
}

// Column name union across rows; complete rows normally agree, but a
// missing field still gets indexed (as null) rather than dropped.
fn column_names(rows: &[Row]) -> BTreeSet<String> {
    rows.iter()
        .flat_map(|row| row.keys().cloned())
        .collect()
}

// Fold the descriptors' increment/finalize contract over the rows. Columns
// that opt out contribute nothing to the footer row.
fn fold_footer(columns: &[ReportColumn], rows: &[Row]) -> Row {
    let mut totals: Vec<(usize, Option<Value>)> = Vec::new();
    for (idx, column) in columns.iter().enumerate() {
        let mut total = None;
        let mut participates = false;

        for row in rows {
            let cell = row.get(column.name()).cloned().unwrap_or(Value::Null);
            match column.increment_footer(total.take(), &cell) {
                Some(next) => {
                    participates = true;
                    total = Some(next);
                }
                None => {
                    total = None;
                    break;
                }
            }
        }

        if participates || rows.is_empty() {
            totals.push((idx, total));
        }
    }

    let draft: Row = totals
        .iter()
        .filter_map(|(idx, total)| {
            total
                .clone()
                .map(|value| (columns[*idx].name().to_string(), value))
        })
        .collect();

    let mut footer = Row::new();
    for (idx, total) in totals {
        if let Some(value) = columns[idx].finalize_footer(total, &draft) {
            footer.insert(columns[idx].name().to_string(), value);
        }
    }
    footer
}

///
/// TESTS
///
