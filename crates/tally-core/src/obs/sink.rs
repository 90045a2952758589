//! Metrics sink boundary.
//!
//! Engine logic MUST NOT touch `obs::metrics` state directly; all
//! instrumentation flows through `MetricsEvent` and `MetricsSink`. Sinks
//! must not affect execution semantics.

use crate::obs::metrics;
use std::cell::RefCell;

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<*const dyn MetricsSink>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug)]
pub enum MetricsEvent {
    PartitionBuilt { groups: u64 },
    MergeFinish { rows: u64, batches: u64 },
    PageFetch { rows: u64 },
    InstanceWrite { rows: u64 },
    InstanceRead { rows: u64 },
    InstanceKill,
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}

///
/// GlobalMetricsSink
/// Default process-local sink that writes into the global counter state.
///

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::PartitionBuilt { .. } => {
                m.ops.partitions_built = m.ops.partitions_built.saturating_add(1);
            }
            MetricsEvent::MergeFinish { rows, batches } => {
                m.ops.merges_finished = m.ops.merges_finished.saturating_add(1);
                m.ops.rows_merged = m.ops.rows_merged.saturating_add(rows);
                m.ops.batches_flushed = m.ops.batches_flushed.saturating_add(batches);
            }
            MetricsEvent::PageFetch { rows } => {
                m.ops.pages_fetched = m.ops.pages_fetched.saturating_add(1);
                m.ops.rows_paged = m.ops.rows_paged.saturating_add(rows);
            }
            MetricsEvent::InstanceWrite { rows } => {
                m.ops.instance_writes = m.ops.instance_writes.saturating_add(1);
                m.ops.rows_written = m.ops.rows_written.saturating_add(rows);
            }
            MetricsEvent::InstanceRead { rows } => {
                m.ops.instance_reads = m.ops.instance_reads.saturating_add(1);
                m.ops.rows_read = m.ops.rows_read.saturating_add(rows);
            }
            MetricsEvent::InstanceKill => {
                m.ops.instance_kills = m.ops.instance_kills.saturating_add(1);
            }
        });
    }
}

/// Route one event to the scoped override when installed, otherwise to the
/// global sink.
pub(crate) fn record(event: MetricsEvent) {
    let installed = SINK_OVERRIDE.with(|cell| *cell.borrow());

    match installed {
        // SAFETY: the pointer is installed by with_sink_override, which
        // keeps the sink alive for the closure's full extent on this
        // thread and removes it before returning.
        Some(ptr) => unsafe { (*ptr).record(event) },
        None => GlobalMetricsSink.record(event),
    }
}

/// Install a scoped sink override for the duration of `f` (test hook).
pub fn with_sink_override<R>(sink: &dyn MetricsSink, f: impl FnOnce() -> R) -> R {
    // The stored pointer is removed before this function returns (below), so
    // erasing the borrow's lifetime to 'static for storage never lets it
    // outlive `sink`.
    let ptr: *const (dyn MetricsSink + 'static) =
        unsafe { std::mem::transmute::<*const dyn MetricsSink, *const (dyn MetricsSink + 'static)>(std::ptr::from_ref(sink)) };
    SINK_OVERRIDE.with(|cell| {
        *cell.borrow_mut() = Some(ptr);
    });

    let result = f();

    SINK_OVERRIDE.with(|cell| {
        *cell.borrow_mut() = None;
    });

    result
}

///
/// TESTS
///
