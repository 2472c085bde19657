//! Key-value storage boundary and the JSON adapter on top of it.

use std::{
    collections::HashMap,
    fs, io,
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use serde::{de::DeserializeOwned, Serialize};

/// Durable string slots addressed by a fixed key.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    /// Replaces the whole value stored under `key`.
    fn set(&self, key: &str, value: &str) -> io::Result<()>;

    fn remove(&self, key: &str) -> io::Result<()>;
}

/// In-process storage.
///
/// Clones share the same slots, so two stores opened over clones of one
/// [`MemoryStorage`] behave like two browser tabs of the same origin.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(Arc<Mutex<HashMap<String, String>>>);

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let slots = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(slots.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Directory-backed storage keeping every key in `<dir>/<key>.json`.
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        // Written aside and renamed over, so readers never see half a file.
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, self.path(key))
    }

    fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path(key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Reads the collection stored under `key`.
///
/// A missing key yields an empty collection. So does a payload that fails to
/// deserialize: it is logged and then treated as absent, discarding whatever
/// was stored there.
pub fn load<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> io::Result<Vec<T>> {
    Ok(load_value(storage, key)?.unwrap_or_default())
}

/// Writes the whole collection under `key`.
pub fn save<T: Serialize>(
    storage: &dyn Storage,
    key: &str,
    items: &[T],
) -> io::Result<()> {
    save_value(storage, key, items)
}

pub(crate) fn load_value<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> io::Result<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key, error = %e, "discarding malformed payload");
            Ok(None)
        }
    }
}

pub(crate) fn save_value<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> io::Result<()> {
    let raw = serde_json::to_string(value).map_err(io::Error::from)?;
    storage.set(key, &raw)
}
