//! `JsonKvStore`: content-keyed JSON namespace.
//!
//! Upsert is insert-if-absent: a key that already exists keeps its record, so
//! re-ingesting the same content is a no-op. `filter_keys` answers "which of
//! these are new?" before any expensive work is done for them.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;

pub struct JsonKvStore<V> {
    namespace: String,
    path: PathBuf,
    data: RwLock<BTreeMap<String, V>>,
}

impl<V> JsonKvStore<V>
where
    V: Serialize + DeserializeOwned + Clone,
{
    /// Open `{working_dir}/{namespace}.json`, loading it when present.
    pub fn open(working_dir: &Path, namespace: &str) -> Result<Self, AppError> {
        fs::create_dir_all(working_dir).map_err(|e| {
            AppError::Storage(format!("{namespace}: cannot create {}: {e}", working_dir.display()))
        })?;
        let path = working_dir.join(format!("{namespace}.json"));
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .map_err(|e| AppError::Storage(format!("{namespace}: read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| AppError::Storage(format!("{namespace}: parse {}: {e}", path.display())))?
        } else {
            BTreeMap::new()
        };
        debug!(namespace, records = data.len(), "kv store opened");
        Ok(Self { namespace: namespace.to_string(), path, data: RwLock::new(data) })
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<V>, AppError> {
        Ok(self.read()?.get(id).cloned())
    }

    pub fn all(&self) -> Result<BTreeMap<String, V>, AppError> {
        Ok(self.read()?.clone())
    }

    pub fn len(&self) -> Result<usize, AppError> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.read()?.is_empty())
    }

    /// Keys from `keys` that are not stored yet.
    pub fn filter_keys<'a, I>(&self, keys: I) -> Result<BTreeSet<String>, AppError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let data = self.read()?;
        Ok(keys.into_iter().filter(|k| !data.contains_key(*k)).cloned().collect())
    }

    /// Insert records whose keys are absent; returns the ones actually inserted.
    pub fn upsert(&self, records: BTreeMap<String, V>) -> Result<BTreeMap<String, V>, AppError> {
        let mut data = self.write()?;
        let mut inserted = BTreeMap::new();
        for (key, value) in records {
            if !data.contains_key(&key) {
                data.insert(key.clone(), value.clone());
                inserted.insert(key, value);
            }
        }
        Ok(inserted)
    }

    /// Write the namespace file.
    pub fn flush(&self) -> Result<(), AppError> {
        let data = self.read()?;
        let json = serde_json::to_string_pretty(&*data)
            .map_err(|e| AppError::Storage(format!("{}: serialize: {e}", self.namespace)))?;
        fs::write(&self.path, json).map_err(|e| {
            AppError::Storage(format!("{}: write {}: {e}", self.namespace, self.path.display()))
        })?;
        debug!(namespace = %self.namespace, records = data.len(), "kv store flushed");
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, V>>, AppError> {
        self.data
            .read()
            .map_err(|_| AppError::Storage(format!("{}: lock poisoned", self.namespace)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, V>>, AppError> {
        self.data
            .write()
            .map_err(|_| AppError::Storage(format!("{}: lock poisoned", self.namespace)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_store(dir: &TempDir) -> JsonKvStore<String> {
        JsonKvStore::open(dir.path(), "notes").unwrap()
    }

    #[test]
    fn upsert_inserts_only_missing() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        let first = store.upsert(BTreeMap::from([("a".to_string(), "one".to_string())])).unwrap();
        assert_eq!(first.len(), 1);

        let second = store
            .upsert(BTreeMap::from([
                ("a".to_string(), "changed".to_string()),
                ("b".to_string(), "two".to_string()),
            ]))
            .unwrap();
        assert_eq!(second.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(store.get_by_id("a").unwrap().as_deref(), Some("one"));
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn filter_keys_returns_new_only() {
        let dir = TempDir::new().unwrap();
        let store = make_store(&dir);
        store.upsert(BTreeMap::from([("a".to_string(), "x".to_string())])).unwrap();
        let keys = vec!["a".to_string(), "b".to_string()];
        let fresh = store.filter_keys(&keys).unwrap();
        assert_eq!(fresh, BTreeSet::from(["b".to_string()]));
    }

    #[test]
    fn flush_and_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = make_store(&dir);
            store.upsert(BTreeMap::from([("k".to_string(), "v".to_string())])).unwrap();
            store.flush().unwrap();
        }
        let reopened = make_store(&dir);
        assert_eq!(reopened.get_by_id("k").unwrap().as_deref(), Some("v"));
        assert!(dir.path().join("notes.json").exists());
    }

    #[test]
    fn malformed_file_errors() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.json"), "{not json").unwrap();
        let err = JsonKvStore::<String>::open(dir.path(), "notes").err().unwrap();
        assert!(err.to_string().contains("parse"));
    }
}
