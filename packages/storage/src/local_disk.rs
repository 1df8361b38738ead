use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::{fs, io};

use serde_json::Value as JsonValue;

use crate::{Error, KeyValueStore};

const APP_DIR: &str = "contentdesk";
const SESSION_FILE: &str = "session.json";

/// A store backed by a single JSON object file on local disk.
///
/// Every batch is applied to the full map and persisted through a temporary
/// file in the same directory that is then renamed over the target, so the
/// file on disk always holds either the old or the new batch. A file that
/// no longer parses is reported by reads and overwritten by the next batch.
pub struct LocalDiskStore {
    file: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl LocalDiskStore {
    pub fn new(file: impl Into<PathBuf>) -> Result<LocalDiskStore, Error> {
        let file = file.into();

        if file.is_dir() {
            return Err(Error::Io {
                path: file,
                source: io::Error::other("Store path must be a file, not a directory."),
            });
        }

        Ok(LocalDiskStore {
            file,
            lock: Mutex::new(()),
        })
    }

    /// Store at the platform's local data directory, e.g.
    /// `~/.local/share/contentdesk/session.json` on Linux.
    pub fn in_default_location() -> Result<LocalDiskStore, Error> {
        let dir = dirs::data_local_dir().ok_or_else(|| Error::NoLocation {
            message: "platform has no local data directory".to_string(),
        })?;
        Self::new(dir.join(APP_DIR).join(SESSION_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.file
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, Error> {
        let text = match fs::read_to_string(&self.file) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => {
                return Err(Error::Io {
                    path: self.file.clone(),
                    source,
                })
            }
        };

        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let value: JsonValue = serde_json::from_str(&text).map_err(|source| Error::Corrupt {
            path: self.file.clone(),
            source,
        })?;

        // Non-string leaves are kept in their JSON text form.
        let map = match value {
            JsonValue::Object(map) => map
                .into_iter()
                .map(|(key, value)| match value {
                    JsonValue::String(s) => (key, s),
                    other => (key, other.to_string()),
                })
                .collect(),
            _ => BTreeMap::new(),
        };
        Ok(map)
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), Error> {
        let dir = match self.file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;

        let text = serde_json::to_string_pretty(map)?;
        tracing::debug!(path = %self.file.display(), keys = map.len(), "writing session store");

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| Error::Io {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(text.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| Error::Io {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&self.file).map_err(|e| Error::Io {
            path: self.file.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    fn modify<F>(&self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        // A corrupt file is replaced by the batch applied to an empty map.
        let (mut map, corrupt) = match self.read_map() {
            Ok(map) => (map, false),
            Err(Error::Corrupt { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "replacing corrupt session store");
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        if f(&mut map) || corrupt {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

impl KeyValueStore for LocalDiskStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock().map_err(|_| Error::Poisoned)?;
        Ok(self.read_map()?.remove(key))
    }

    fn set_many(&self, entries: &[(&str, String)]) -> Result<(), Error> {
        self.modify(|map| {
            for (key, value) in entries {
                map.insert((*key).to_string(), value.clone());
            }
            true
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), Error> {
        self.modify(|map| {
            let mut changed = false;
            for key in keys {
                changed |= map.remove(*key).is_some();
            }
            changed
        })
    }
}
