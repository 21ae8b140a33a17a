pub mod redb_storage;
pub mod storage;

pub use redb_storage::RedbCacheStorage;
pub use storage::{CacheStorage, Entries, JsonFileStorage, MemoryStorage};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::layout::{Fingerprint, Layout};

/// One persisted document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub layout: Layout,
}

/// Explicit cache handle, passed to every record constructor.
///
/// Maps a record name to its compiled layout and the fingerprint of the
/// declaration behind it. Every storage failure degrades to a miss on `get`
/// or a no-op on `put` and never reaches a caller.
///
/// The persisted store is loaded lazily on the first `get` and kept for the
/// life of the handle; each `put` re-reads the store, merges its one entry
/// and writes the whole thing back, so several handles (or processes) with
/// disjoint record names can share one store.
pub struct LayoutCache {
    storage: Box<dyn CacheStorage>,
    entries: Option<Entries>,
    consume_on_hit: bool,
}

impl LayoutCache {
    pub fn new(storage: impl CacheStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
            entries: None,
            consume_on_hit: false,
        }
    }

    /// Build from configuration: a JSON file at `config.path`, or a private
    /// in-memory store when no path is set.
    pub fn from_config(config: &CacheConfig) -> Self {
        let cache = match &config.path {
            Some(path) => Self::new(JsonFileStorage::new(path.clone())),
            None => Self::in_memory(),
        };
        cache.consume_on_hit(config.consume_on_hit)
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Drop an entry from the store the first time it is served.
    pub fn consume_on_hit(mut self, consume: bool) -> Self {
        self.consume_on_hit = consume;
        self
    }

    fn loaded(&mut self) -> &mut Entries {
        if self.entries.is_none() {
            let entries = match self.storage.load() {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(error = %e, "layout cache unavailable, starting empty");
                    Entries::new()
                }
            };
            self.entries = Some(entries);
        }
        self.entries.get_or_insert_with(Entries::new)
    }

    /// The cached layout for `name`, if it was stored for exactly this
    /// `fingerprint`. Stale and unreadable entries are dropped.
    pub fn get(&mut self, name: &str, fingerprint: Fingerprint) -> Option<Layout> {
        let consume = self.consume_on_hit;
        let entries = self.loaded();
        let doc = entries.get(name)?.clone();

        let entry: CacheEntry = match serde_json::from_value(doc) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(record = name, error = %e, "unreadable layout cache entry, ignoring");
                entries.remove(name);
                return None;
            }
        };
        if entry.fingerprint != fingerprint {
            debug!(
                record = name,
                cached = %entry.fingerprint,
                expected = %fingerprint,
                "stale layout cache entry"
            );
            entries.remove(name);
            return None;
        }

        debug!(record = name, %fingerprint, "layout cache hit");
        if consume {
            entries.remove(name);
            self.write_through(name, None);
        }
        Some(entry.layout)
    }

    /// Store `layout` under `name`, replacing any previous entry. Best effort.
    pub fn put(&mut self, name: &str, layout: &Layout, fingerprint: Fingerprint) {
        let entry = CacheEntry {
            fingerprint,
            layout: layout.clone(),
        };
        let doc = match serde_json::to_value(&entry) {
            Ok(doc) => doc,
            Err(e) => {
                debug!(record = name, error = %e, "could not encode layout for cache");
                return;
            }
        };
        self.loaded().insert(name.to_string(), doc.clone());
        self.write_through(name, Some(doc));
    }

    /// Read-merge-write one entry (`None` removes it).
    fn write_through(&mut self, name: &str, doc: Option<serde_json::Value>) {
        let mut persisted = self.storage.load().unwrap_or_default();
        match doc {
            Some(doc) => {
                persisted.insert(name.to_string(), doc);
            }
            None => {
                persisted.remove(name);
            }
        }
        if let Err(e) = self.storage.save(&persisted) {
            debug!(record = name, error = %e, "layout cache write failed, continuing without");
        }
    }

    /// Forget the in-process copy; the next `get` reloads from storage.
    pub fn clear(&mut self) {
        self.entries = None;
    }

    /// Delete the persisted store and the in-process copy.
    pub fn purge(&mut self) {
        self.entries = None;
        if let Err(e) = self.storage.purge() {
            debug!(error = %e, "layout cache purge failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDescriptor, FieldSpec};
    use crate::layout::{Packing, compile};
    use serde_json::json;
    use tempfile::tempdir;

    fn sample() -> (Layout, Fingerprint) {
        let fields = FieldDescriptor::resolve_all(&[
            FieldSpec::bit("FLAG", 1),
            FieldSpec::bytes("NAME", 4),
        ])
        .unwrap();
        let layout = compile(&fields, 8, Packing::BitsFirst).unwrap();
        (layout, Fingerprint::compute(0, &fields, 0, 8))
    }

    #[test]
    fn test_miss_then_hit() {
        let (layout, fp) = sample();
        let mut cache = LayoutCache::in_memory();
        assert!(cache.get("rec", fp).is_none());
        cache.put("rec", &layout, fp);
        assert_eq!(cache.get("rec", fp), Some(layout.clone()));
        // entries stay by default
        assert_eq!(cache.get("rec", fp), Some(layout));
    }

    #[test]
    fn test_fingerprint_mismatch_is_miss() {
        let (layout, fp) = sample();
        let mut cache = LayoutCache::in_memory();
        cache.put("rec", &layout, fp);
        assert!(cache.get("rec", Fingerprint(fp.0 ^ 1)).is_none());
        // the stale entry is gone from the in-process copy
        assert!(cache.get("rec", fp).is_none());
    }

    #[test]
    fn test_survives_restart() {
        let (layout, fp) = sample();
        let storage = MemoryStorage::new();
        LayoutCache::new(storage.clone()).put("rec", &layout, fp);

        let mut fresh = LayoutCache::new(storage);
        assert_eq!(fresh.get("rec", fp), Some(layout));
    }

    #[test]
    fn test_consume_on_hit() {
        let (layout, fp) = sample();
        let storage = MemoryStorage::new();
        let mut cache = LayoutCache::new(storage.clone()).consume_on_hit(true);
        cache.put("rec", &layout, fp);
        assert!(cache.get("rec", fp).is_some());
        assert!(cache.get("rec", fp).is_none());
        assert!(storage.entry("rec").is_none());
    }

    #[test]
    fn test_disjoint_names_share_storage() {
        let (layout, fp) = sample();
        let storage = MemoryStorage::new();
        let mut a = LayoutCache::new(storage.clone());
        let mut b = LayoutCache::new(storage.clone());
        // both load before either writes
        assert!(a.get("A", fp).is_none());
        assert!(b.get("B", fp).is_none());
        a.put("A", &layout, fp);
        b.put("B", &layout, fp);
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_tuple_shaped_entry_is_normalized() {
        let (layout, fp) = sample();
        let storage = MemoryStorage::new();
        storage.insert_raw(
            "rec",
            json!({
                "fingerprint": fp.to_string(),
                "layout": {
                    "extent": 5,
                    "positions": [["FLAG", [0, 0, 1, 1, 1]], ["NAME", [1, 0, 0, 1, 4]]]
                }
            }),
        );
        let mut cache = LayoutCache::new(storage);
        assert_eq!(cache.get("rec", fp), Some(layout));
    }

    #[test]
    fn test_corrupt_entry_is_miss() {
        let (_, fp) = sample();
        let storage = MemoryStorage::new();
        storage.insert_raw(
            "rec",
            json!({"fingerprint": fp.to_string(), "layout": {"positions": [["FLAG", [0, 0]]]}}),
        );
        let mut cache = LayoutCache::new(storage);
        assert!(cache.get("rec", fp).is_none());
    }

    #[test]
    fn test_unavailable_store_degrades() -> Result<(), Box<dyn std::error::Error>> {
        let (layout, fp) = sample();
        let dir = tempdir()?;
        // a directory where the file should be: reads and writes both fail
        let mut cache = LayoutCache::new(JsonFileStorage::new(dir.path()));
        assert!(cache.get("rec", fp).is_none());
        cache.put("rec", &layout, fp);
        // the in-process copy still serves the entry
        assert_eq!(cache.get("rec", fp), Some(layout));
        Ok(())
    }

    #[test]
    fn test_json_file_roundtrip_and_purge() -> Result<(), Box<dyn std::error::Error>> {
        let (layout, fp) = sample();
        let dir = tempdir()?;
        let path = dir.path().join("memcache.json");

        let mut cache = LayoutCache::new(JsonFileStorage::new(&path));
        cache.put("rec", &layout, fp);
        assert!(path.exists());

        let mut reopened = LayoutCache::new(JsonFileStorage::new(&path));
        assert_eq!(reopened.get("rec", fp), Some(layout));

        reopened.purge();
        assert!(!path.exists());
        assert!(reopened.get("rec", fp).is_none());
        Ok(())
    }

    #[test]
    fn test_clear_reloads_from_storage() {
        let (layout, fp) = sample();
        let storage = MemoryStorage::new();
        let mut cache = LayoutCache::new(storage.clone());
        assert!(cache.get("rec", fp).is_none());

        LayoutCache::new(storage).put("rec", &layout, fp);
        // still working from the copy loaded before the other write
        assert!(cache.get("rec", fp).is_none());
        cache.clear();
        assert_eq!(cache.get("rec", fp), Some(layout));
    }

    #[test]
    fn test_from_config_without_path_is_private() {
        let (layout, fp) = sample();
        let config = CacheConfig {
            path: None,
            consume_on_hit: false,
        };
        let mut cache = LayoutCache::from_config(&config);
        cache.put("rec", &layout, fp);
        assert!(LayoutCache::from_config(&config).get("rec", fp).is_none());
    }
}
