use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable key-value storage scoped to a namespace. Each namespace is one JSON
/// object on disk, rewritten through a temp file and rename.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self { path: dir.as_ref().join(format!("{}.json", namespace)) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let mut map = self.read_all()?;
        match map.remove(key) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let mut map = self.read_all()?;
        map.insert(key.to_string(), serde_json::to_value(value)?);
        self.write_all(&map)
    }

    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut map = self.read_all()?;
        if map.remove(key).is_some() {
            self.write_all(&map)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_all(&self) -> Result<Map<String, Value>, StorageError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn write_all(&self, map: &Map<String, Value>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(map)?;
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        debug!("Persisted {} keys to {:?}", map.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "bulk_sender");

        assert_eq!(storage.get::<String>("mintAddress").unwrap(), None);
        storage.set("mintAddress", &"abc".to_string()).unwrap();
        storage.set("decimalized", &true).unwrap();
        assert_eq!(storage.get::<String>("mintAddress").unwrap().as_deref(), Some("abc"));
        assert_eq!(storage.get::<bool>("decimalized").unwrap(), Some(true));

        storage.remove("mintAddress").unwrap();
        assert_eq!(storage.get::<String>("mintAddress").unwrap(), None);
        assert_eq!(storage.get::<bool>("decimalized").unwrap(), Some(true));
    }

    #[test]
    fn test_namespaces_are_isolated_and_durable() {
        let dir = tempfile::tempdir().unwrap();
        LocalStorage::new(dir.path(), "a").set("k", &1u32).unwrap();
        LocalStorage::new(dir.path(), "b").set("k", &2u32).unwrap();

        // a fresh handle sees what the previous one wrote
        assert_eq!(LocalStorage::new(dir.path(), "a").get::<u32>("k").unwrap(), Some(1));
        assert_eq!(LocalStorage::new(dir.path(), "b").get::<u32>("k").unwrap(), Some(2));
    }

    #[test]
    fn test_clear_missing_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "nothing");
        assert!(storage.clear().is_ok());
    }
}
