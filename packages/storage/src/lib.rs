//! # contentdesk-storage
//!
//! Small key/value stores used to persist session state between runs.
//!
//! Every store implements [`KeyValueStore`]. Writes and removals happen in
//! batches so related keys (a token and its expiry, say) are never observed
//! half-written.
//!
//! ```rust
//! use contentdesk_storage::{InMemoryStore, KeyValueStore};
//!
//! let store = InMemoryStore::new();
//! store.set_many(&[("access_token", "abc".to_string())]).unwrap();
//! assert_eq!(store.get("access_token").unwrap().as_deref(), Some("abc"));
//! ```

pub mod error;
pub mod in_memory;
pub mod local_disk;

pub use error::Error;
pub use in_memory::InMemoryStore;
pub use local_disk::LocalDiskStore;

/// A durable string key/value store.
///
/// Implementations use interior mutability so a single store can be shared
/// behind an `Arc` by everything that needs session state.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Write all `entries` as one batch.
    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), Error>;

    /// Remove all `keys` as one batch. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> Result<(), Error>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key)
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), Error> {
        (**self).set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), Error> {
        (**self).remove_many(keys)
    }
}
