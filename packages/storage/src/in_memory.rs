//! In-memory key/value store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::{Error, KeyValueStore};

/// A store that keeps everything in a `BTreeMap` for the life of the process.
///
/// Useful for tests and for sessions that should not outlive the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl InMemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set_many(&self, batch: &[(&str, String)]) -> Result<(), Error> {
        let mut entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
        for (key, value) in batch {
            entries.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), Error> {
        let mut entries = self.entries.lock().map_err(|_| Error::Poisoned)?;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
