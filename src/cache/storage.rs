use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::CacheError;

/// Persisted cache contents: record name → `{fingerprint, layout}` document.
pub type Entries = BTreeMap<String, Value>;

/// Durable home of the layout cache. Always read and written whole.
pub trait CacheStorage {
    /// Everything currently persisted. A store that does not exist yet is an
    /// empty map, not an error.
    fn load(&self) -> Result<Entries, CacheError>;

    /// Replace the persisted contents with `entries`.
    fn save(&mut self, entries: &Entries) -> Result<(), CacheError>;

    /// Delete the persisted store.
    fn purge(&mut self) -> Result<(), CacheError>;
}

// ─── MemoryStorage ──────────────────────────────────────────────────────────

/// In-process storage. Clones share the same map, so two caches built over
/// clones behave like two processes sharing one file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<Entries>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Direct access to the stored documents.
    pub fn entry(&self, name: &str) -> Option<Value> {
        self.entries.borrow().get(name).cloned()
    }

    pub fn insert_raw(&self, name: &str, doc: Value) {
        self.entries.borrow_mut().insert(name.to_string(), doc);
    }
}

impl CacheStorage for MemoryStorage {
    fn load(&self) -> Result<Entries, CacheError> {
        Ok(self.entries.borrow().clone())
    }

    fn save(&mut self, entries: &Entries) -> Result<(), CacheError> {
        *self.entries.borrow_mut() = entries.clone();
        Ok(())
    }

    fn purge(&mut self) -> Result<(), CacheError> {
        self.entries.borrow_mut().clear();
        Ok(())
    }
}

// ─── JsonFileStorage ────────────────────────────────────────────────────────

/// One flat JSON object on disk, keyed by record name.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStorage for JsonFileStorage {
    fn load(&self) -> Result<Entries, CacheError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Entries::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&mut self, entries: &Entries) -> Result<(), CacheError> {
        let text = serde_json::to_string(entries)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    fn purge(&mut self) -> Result<(), CacheError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_json_file_missing_is_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let storage = JsonFileStorage::new(dir.path().join("memcache.json"));
        assert!(storage.load()?.is_empty());
        Ok(())
    }

    #[test]
    fn test_json_file_roundtrip_and_purge() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("memcache.json");
        let mut storage = JsonFileStorage::new(&path);

        let mut entries = Entries::new();
        entries.insert("nvam".into(), json!({"fingerprint": 7}));
        storage.save(&entries)?;
        assert_eq!(storage.load()?, entries);

        storage.purge()?;
        assert!(!path.exists());
        // purging twice is fine
        storage.purge()?;
        Ok(())
    }

    #[test]
    fn test_json_file_garbage_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("memcache.json");
        std::fs::write(&path, "{not json")?;
        assert!(JsonFileStorage::new(&path).load().is_err());
        Ok(())
    }

    #[test]
    fn test_memory_storage_clones_share_state() {
        let a = MemoryStorage::new();
        let mut b = a.clone();
        let mut entries = Entries::new();
        entries.insert("x".into(), json!(1));
        b.save(&entries).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.entry("x"), Some(json!(1)));
    }
}
