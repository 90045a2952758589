use crate::{
    error::EngineError,
    types::Timestamp,
    value::{Row, Value},
};
use derive_more::{Deref, DerefMut};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

///
/// Direction
///
/// Canonical traversal direction for sort-index range reads.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

///
/// KvStore
///
/// Backing key-value store contract consumed by the instance cache: scalar
/// set/get, ordered-list append and read, row-map put/get, sorted
/// association insert and ranged read, existence check, delete-by-prefix,
/// and uniform TTL application across a batch of keys written together.
///
/// Implementations map these onto their wire protocol (string, list, hash,
/// and sorted-set primitives). The crate ships `MemoryStore` for tests and
/// embedded use.
///

pub trait KvStore {
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), EngineError>;
    fn get_value(&self, key: &str) -> Result<Option<Value>, EngineError>;

    fn list_append(&mut self, key: &str, ids: &[u64]) -> Result<(), EngineError>;
    fn list_len(&self, key: &str) -> Result<Option<u64>, EngineError>;
    fn list_range(
        &self,
        key: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<u64>, EngineError>;

    fn map_put(&mut self, key: &str, row: &Row) -> Result<(), EngineError>;
    fn map_get(&self, key: &str) -> Result<Option<Row>, EngineError>;

    /// Insert `(sort value, row id)` pairs; the association stays ordered
    /// by value with row id as the stable tiebreak.
    fn sorted_insert(&mut self, key: &str, entries: &[(Value, u64)]) -> Result<(), EngineError>;

    /// Read row ids from a sorted association in the given direction,
    /// applying offset then limit.
    fn sorted_range(
        &self,
        key: &str,
        direction: Direction,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<u64>, EngineError>;

    fn exists(&self, key: &str) -> Result<bool, EngineError>;

    /// Delete every key starting with `prefix`; returns the number removed.
    fn delete_prefix(&mut self, prefix: &str) -> Result<u64, EngineError>;

    /// Apply one TTL uniformly to a batch of keys written together, so a
    /// whole instance expires at once. Unknown keys are ignored.
    fn expire_keys(&mut self, keys: &[String], ttl: Duration) -> Result<(), EngineError>;
}

///
/// StoreSlot
///
/// One typed slot of the memory backend.
///

#[derive(Clone, Debug)]
enum StoreSlot {
    Scalar(Value),
    List(Vec<u64>),
    Map(Row),
    Sorted(Vec<(Value, u64)>),
}

impl StoreSlot {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Sorted(_) => "sorted",
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreEntry {
    slot: StoreSlot,
    expires_at: Option<Timestamp>,
}

///
/// Clock
///

type Clock = Box<dyn Fn() -> Timestamp>;

///
/// MemoryStore
///
/// BTreeMap-backed `KvStore` with lazy millisecond TTL expiry against an
/// injectable clock. Expired keys read as absent; expiry and explicit
/// deletion are indistinguishable to readers.
///

#[derive(Deref, DerefMut)]
pub struct MemoryStore {
    #[deref]
    #[deref_mut]
    entries: BTreeMap<String, StoreEntry>,
    clock: Clock,
}

impl MemoryStore {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self::with_clock(Timestamp::now)
    }

    /// Construct with an explicit clock; tests drive expiry with this.
    #[must_use]
    pub fn with_clock(clock: impl Fn() -> Timestamp + 'static) -> Self {
        Self {
            entries: BTreeMap::new(),
            clock: Box::new(clock),
        }
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn live_entry(&self, key: &str) -> Option<&StoreEntry> {
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            Some(deadline) if deadline <= self.now() => None,
            _ => Some(entry),
        }
    }

    // Insert or overwrite; a fresh write clears any previous TTL.
    fn put_slot(&mut self, key: &str, slot: StoreSlot) {
        self.entries.insert(
            key.to_string(),
            StoreEntry {
                slot,
                expires_at: None,
            },
        );
    }

    fn wrong_kind(key: &str, expected: &str, found: &str) -> EngineError {
        EngineError::store_invariant(format!(
            "key '{key}' holds a {found} slot, expected {expected}"
        ))
    }
}

impl KvStore for MemoryStore {
    fn set_value(&mut self, key: &str, value: Value) -> Result<(), EngineError> {
        self.put_slot(key, StoreSlot::Scalar(value));
        Ok(())
    }

    fn get_value(&self, key: &str) -> Result<Option<Value>, EngineError> {
        match self.live_entry(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                StoreSlot::Scalar(value) => Ok(Some(value.clone())),
                other => Err(Self::wrong_kind(key, "scalar", other.kind())),
            },
        }
    }

    fn list_append(&mut self, key: &str, ids: &[u64]) -> Result<(), EngineError> {
        if self.live_entry(key).is_none() {
            self.put_slot(key, StoreSlot::List(Vec::new()));
        }

        let entry = self.entries.get_mut(key).expect("slot just ensured");
        match &mut entry.slot {
            StoreSlot::List(list) => {
                list.extend_from_slice(ids);
                Ok(())
            }
            other => Err(Self::wrong_kind(key, "list", other.kind())),
        }
    }

    fn list_len(&self, key: &str) -> Result<Option<u64>, EngineError> {
        match self.live_entry(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                StoreSlot::List(list) => Ok(Some(list.len() as u64)),
                other => Err(Self::wrong_kind(key, "list", other.kind())),
            },
        }
    }

    fn list_range(
        &self,
        key: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<u64>, EngineError> {
        match self.live_entry(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &entry.slot {
                StoreSlot::List(list) => Ok(list
                    .iter()
                    .skip(offset)
                    .take(limit.unwrap_or(usize::MAX))
                    .copied()
                    .collect()),
                other => Err(Self::wrong_kind(key, "list", other.kind())),
            },
        }
    }

    fn map_put(&mut self, key: &str, row: &Row) -> Result<(), EngineError> {
        self.put_slot(key, StoreSlot::Map(row.clone()));
        Ok(())
    }

    fn map_get(&self, key: &str) -> Result<Option<Row>, EngineError> {
        match self.live_entry(key) {
            None => Ok(None),
            Some(entry) => match &entry.slot {
                StoreSlot::Map(row) => Ok(Some(row.clone())),
                other => Err(Self::wrong_kind(key, "map", other.kind())),
            },
        }
    }

    fn sorted_insert(&mut self, key: &str, entries: &[(Value, u64)]) -> Result<(), EngineError> {
        if self.live_entry(key).is_none() {
            self.put_slot(key, StoreSlot::Sorted(Vec::new()));
        }

        let entry = self.entries.get_mut(key).expect("slot just ensured");
        match &mut entry.slot {
            StoreSlot::Sorted(sorted) => {
                sorted.extend_from_slice(entries);
                // value order with row id as the stable tiebreak
                sorted.sort();
                Ok(())
            }
            other => Err(Self::wrong_kind(key, "sorted", other.kind())),
        }
    }

    fn sorted_range(
        &self,
        key: &str,
        direction: Direction,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<u64>, EngineError> {
        match self.live_entry(key) {
            None => Ok(Vec::new()),
            Some(entry) => match &entry.slot {
                StoreSlot::Sorted(sorted) => {
                    let limit = limit.unwrap_or(usize::MAX);
                    let ids = match direction {
                        Direction::Asc => sorted
                            .iter()
                            .skip(offset)
                            .take(limit)
                            .map(|(_, id)| *id)
                            .collect(),
                        // value order reverses, but equal-value runs keep
                        // their ascending row-id order (stable ties)
                        Direction::Desc => descending_ids(sorted)
                            .skip(offset)
                            .take(limit)
                            .collect(),
                    };
                    Ok(ids)
                }
                other => Err(Self::wrong_kind(key, "sorted", other.kind())),
            },
        }
    }

    fn exists(&self, key: &str) -> Result<bool, EngineError> {
        Ok(self.live_entry(key).is_some())
    }

    fn delete_prefix(&mut self, prefix: &str) -> Result<u64, EngineError> {
        let keys: Vec<String> = self
            .entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            self.entries.remove(key);
        }
        Ok(keys.len() as u64)
    }

    fn expire_keys(&mut self, keys: &[String], ttl: Duration) -> Result<(), EngineError> {
        let deadline = self.now().saturating_add(ttl);
        for key in keys {
            // a fresh deadline must not resurrect an already-expired key
            if self.live_entry(key).is_none() {
                continue;
            }
            if let Some(entry) = self.entries.get_mut(key) {
                entry.expires_at = Some(deadline);
            }
        }
        Ok(())
    }
}

// Walk an ascending (value, row id) association from the top value down,
// emitting each equal-value run in its original ascending row-id order.
fn descending_ids(sorted: &[(Value, u64)]) -> impl Iterator<Item = u64> + '_ {
    let mut runs: Vec<&[(Value, u64)]> = Vec::new();
    let mut rest = sorted;
    while let Some((first, _)) = rest.first() {
        let len = rest.iter().take_while(|(value, _)| value == first).count();
        let (run, tail) = rest.split_at(len);
        runs.push(run);
        rest = tail;
    }

    runs.into_iter()
        .rev()
        .flat_map(|run| run.iter().map(|(_, id)| *id))
}

///
/// TESTS
///
