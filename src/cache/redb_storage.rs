use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;

use super::storage::{CacheStorage, Entries};
use crate::error::CacheError;

// Key: record name
// Value: CBOR-encoded `{fingerprint, layout}` document
const LAYOUTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("layouts");

/// Layout cache kept in a redb table, one CBOR document per record.
pub struct RedbCacheStorage {
    db: Database,
}

impl RedbCacheStorage {
    /// Open or create the database at the specified path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(LAYOUTS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl CacheStorage for RedbCacheStorage {
    fn load(&self) -> Result<Entries, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(LAYOUTS_TABLE)?;

        let mut entries = Entries::new();
        for row in table.iter()? {
            let (key, value) = row?;
            let doc: serde_json::Value = cbor4ii::serde::from_slice(value.value())
                .map_err(|e| CacheError::Cbor(e.to_string()))?;
            entries.insert(key.value().to_string(), doc);
        }
        Ok(entries)
    }

    fn save(&mut self, entries: &Entries) -> Result<(), CacheError> {
        // Encode before begin_write() to keep the write lock short.
        let mut encoded: Vec<(&str, Vec<u8>)> = Vec::with_capacity(entries.len());
        for (name, doc) in entries {
            let mut buf = Vec::new();
            cbor4ii::serde::to_writer(&mut buf, doc).map_err(|e| CacheError::Cbor(e.to_string()))?;
            encoded.push((name.as_str(), buf));
        }

        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(LAYOUTS_TABLE)?;
            let mut table = write_txn.open_table(LAYOUTS_TABLE)?;
            for (name, buf) in &encoded {
                table.insert(*name, buf.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn purge(&mut self) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write()?;
        {
            write_txn.delete_table(LAYOUTS_TABLE)?;
            let _ = write_txn.open_table(LAYOUTS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::NamedTempFile;

    #[test]
    fn test_redb_storage_roundtrip() -> Result<(), Box<dyn std::error::Error>> {
        let tmp_file = NamedTempFile::new()?;
        let mut storage = RedbCacheStorage::open(tmp_file.path())?;
        assert!(storage.load()?.is_empty());

        let mut entries = Entries::new();
        entries.insert(
            "HEADER".into(),
            json!({"fingerprint": "00000000deadbeef", "layout": {"extent": 1, "positions": []}}),
        );
        entries.insert("REGISTER".into(), json!({"fingerprint": 3}));
        storage.save(&entries)?;
        assert_eq!(storage.load()?, entries);

        // save replaces, it does not append
        entries.remove("REGISTER");
        storage.save(&entries)?;
        assert_eq!(storage.load()?.len(), 1);

        storage.purge()?;
        assert!(storage.load()?.is_empty());
        Ok(())
    }
}
