use crate::{
    error::EngineError,
    key::Key,
    obs::sink::{self, MetricsEvent},
    source::{BulkLookup, Cell, PartialRow, RowStream},
    value::Row,
};
use std::{
    cmp::{Ordering, Reverse},
    collections::{BinaryHeap, VecDeque},
};
use thiserror::Error as ThisError;

/// Default number of complete rows staged between bulk-lookup flushes.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

///
/// OrderingError
///
/// A provider stream violated the sorted-ascending contract. Treated as a
/// provider bug; propagated, never retried.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("stream {stream} emitted key {found} after {previous}; streams must be sorted ascending")]
pub struct OrderingError {
    pub stream: usize,
    pub previous: Key,
    pub found: Key,
}

///
/// MergeConfig
///
/// Explicit merge tuning; batch size is a parameter, not module state.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MergeConfig {
    pub batch_size: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

///
/// RowMerger
///
/// Executes partitioned queries as independently sorted row streams and
/// k-way merges them into complete logical rows.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct RowMerger {
    config: MergeConfig,
}

impl RowMerger {
    #[must_use]
    pub const fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Merge the authoritative key stream with the per-group provider
    /// streams into complete rows, ascending by key.
    ///
    /// Equal keys combine by successive map update; a later stream
    /// overwrites earlier values for the same field, which callers use
    /// deliberately when one group recomputes a field another left blank.
    /// Completed rows stage up to `batch_size` before flushing through the
    /// bulk-lookup hook. Dropping the iterator between flushes discards
    /// staged rows without side effects.
    pub fn merge<'a>(
        &self,
        key_stream: RowStream,
        provider_streams: Vec<RowStream>,
        lookup: &'a mut dyn BulkLookup,
    ) -> MergedRows<'a> {
        // the key stream merges first so provider values overwrite its
        // (empty) contributions
        let mut streams = Vec::with_capacity(provider_streams.len() + 1);
        streams.push(key_stream);
        streams.extend(provider_streams);

        MergedRows::new(streams, lookup, self.config.batch_size)
    }
}

// Heap entry ordered by (key, stream); row payload is carried but never
// compared.
struct HeapEntry {
    key: Key,
    stream: usize,
    row: PartialRow,
}

impl Eq for HeapEntry {}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.stream == other.stream
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.stream.cmp(&other.stream))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

///
/// MergedRows
///
/// Iterator over merged complete rows: O(total rows · log k) heap-based
/// k-way merge with key-boundary emission and batched lookups. Fused after
/// the first error.
///

pub struct MergedRows<'a> {
    streams: Vec<RowStream>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    last_keys: Vec<Option<Key>>,
    current: Option<(Key, PartialRow)>,
    staged: Vec<(Key, PartialRow)>,
    ready: VecDeque<(Key, Row)>,
    lookup: &'a mut dyn BulkLookup,
    batch_size: usize,
    batches_flushed: u64,
    rows_emitted: u64,
    primed: bool,
    done: bool,
}

impl<'a> MergedRows<'a> {
    fn new(streams: Vec<RowStream>, lookup: &'a mut dyn BulkLookup, batch_size: usize) -> Self {
        let stream_count = streams.len();

        Self {
            streams,
            heap: BinaryHeap::with_capacity(stream_count),
            last_keys: vec![None; stream_count],
            current: None,
            staged: Vec::new(),
            ready: VecDeque::new(),
            lookup,
            batch_size: batch_size.max(1),
            batches_flushed: 0,
            rows_emitted: 0,
            primed: false,
            done: false,
        }
    }

    // Pull the next item from one stream into the heap, enforcing the
    // non-decreasing key contract.
    fn advance_stream(&mut self, stream: usize) -> Result<(), EngineError> {
        let Some(item) = self.streams[stream].next() else {
            return Ok(());
        };
        let (key, row) = item?;

        if let Some(previous) = &self.last_keys[stream]
            && key < *previous
        {
            return Err(OrderingError {
                stream,
                previous: previous.clone(),
                found: key,
            }
            .into());
        }
        self.last_keys[stream] = Some(key.clone());

        self.heap.push(Reverse(HeapEntry { key, stream, row }));
        Ok(())
    }

    fn prime(&mut self) -> Result<(), EngineError> {
        for stream in 0..self.streams.len() {
            self.advance_stream(stream)?;
        }
        Ok(())
    }

    // Resolve deferred cells for the staged batch and move it to the ready
    // queue.
    fn flush_staged(&mut self) -> Result<(), EngineError> {
        if self.staged.is_empty() {
            return Ok(());
        }

        let mut batch = std::mem::take(&mut self.staged);
        self.lookup.resolve_batch(&mut batch)?;
        self.batches_flushed += 1;

        for (key, partial) in batch {
            self.ready.push_back((key.clone(), finalize_row(&key, partial)?));
        }
        Ok(())
    }

    fn stage_current(&mut self) -> Result<(), EngineError> {
        if let Some(row) = self.current.take() {
            self.staged.push(row);
            if self.staged.len() >= self.batch_size {
                self.flush_staged()?;
            }
        }
        Ok(())
    }

    // Consume heap entries until a batch is ready or input is exhausted.
    fn fill_ready(&mut self) -> Result<(), EngineError> {
        if !self.primed {
            self.primed = true;
            self.prime()?;
        }

        while self.ready.is_empty() {
            let Some(Reverse(entry)) = self.heap.pop() else {
                // end of input: stage the trailing row and flush the final
                // short batch
                self.stage_current()?;
                self.flush_staged()?;
                self.done = true;
                return Ok(());
            };

            match &mut self.current {
                Some((key, row)) if *key == entry.key => {
                    // same logical row: successive update, later streams win
                    row.extend(entry.row);
                }
                _ => {
                    // key boundary: the accumulated row is complete
                    self.stage_current()?;
                    self.current = Some((entry.key.clone(), entry.row));
                }
            }

            self.advance_stream(entry.stream)?;
        }
        Ok(())
    }
}

impl Iterator for MergedRows<'_> {
    type Item = Result<(Key, Row), EngineError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.ready.pop_front() {
                self.rows_emitted += 1;
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }

            if let Err(err) = self.fill_ready() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}

impl Drop for MergedRows<'_> {
    fn drop(&mut self) {
        sink::record(MetricsEvent::MergeFinish {
            rows: self.rows_emitted,
            batches: self.batches_flushed,
        });
    }
}

// A deferred cell surviving the lookup phase is a resolver bug, not
// missing data.
fn finalize_row(key: &Key, partial: PartialRow) -> Result<Row, EngineError> {
    let mut row = Row::new();
    for (name, cell) in partial {
        match cell {
            Cell::Ready(value) => {
                row.insert(name, value);
            }
            Cell::Deferred(_) => {
                return Err(EngineError::merge_invariant(format!(
                    "deferred field '{name}' unresolved after bulk lookup for key {key}"
                )));
            }
        }
    }
    Ok(row)
}

///
/// TESTS
///
