use serde::{Deserialize, Serialize};
use std::cell::RefCell;

thread_local! {
    static STATE: RefCell<EventState> = RefCell::new(EventState::default());
}

///
/// EventState
/// Ephemeral, in-memory counters for engine operations.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventState {
    pub ops: EventOps,
}

///
/// EventOps
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct EventOps {
    // Pipeline
    pub partitions_built: u64,
    pub merges_finished: u64,
    pub rows_merged: u64,
    pub batches_flushed: u64,
    pub pages_fetched: u64,
    pub rows_paged: u64,

    // Instance cache
    pub instance_writes: u64,
    pub instance_reads: u64,
    pub instance_kills: u64,
    pub rows_written: u64,
    pub rows_read: u64,
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut EventState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Snapshot the process-local counters.
#[must_use]
pub fn report() -> EventState {
    STATE.with(|state| state.borrow().clone())
}

/// Reset the process-local counters.
pub fn reset() {
    STATE.with(|state| *state.borrow_mut() = EventState::default());
}
