//! Report instance cache: the key-value store contract, the instance key
//! scheme, and the lifecycle of persisted, sortable report instances.

pub mod instance;
pub mod keys;
pub mod store;

// re-exports
pub use instance::{
    FooterSpec, InstanceCache, InstanceIncompleteError, ROW_ID_FIELD, SortOrder,
};
pub use keys::CacheKeys;
pub use store::{Direction, KvStore, MemoryStore};
