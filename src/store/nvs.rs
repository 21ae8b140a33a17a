use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use smol_str::SmolStr;
use std::path::Path;
use tracing::debug;

use super::ByteStore;
use crate::error::StoreError;

// Key: blob name
// Value: raw blob bytes
const BLOBS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("blobs");

/// Non-volatile key/value storage holding one fixed-size blob.
///
/// A blob that was never written reads back as zeros. Every write is a
/// read-modify-write of the whole blob inside one redb transaction, so the
/// store only ever holds complete blobs.
pub struct NvsStore {
    db: Database,
    key: SmolStr,
    len: usize,
}

impl NvsStore {
    /// Open or create the database at `path` and bind the blob `key` of
    /// `len` bytes.
    pub fn open(path: impl AsRef<Path>, key: &str, len: usize) -> Result<Self, StoreError> {
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BLOBS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db,
            key: SmolStr::new(key),
            len,
        })
    }

    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The full blob under `key`, zero-filled or clipped to `len`.
fn read_blob<T>(table: &T, key: &str, len: usize) -> Result<Vec<u8>, StoreError>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut blob = vec![0u8; len];
    if let Some(access) = table.get(key)? {
        let stored = access.value();
        let n = stored.len().min(len);
        blob[..n].copy_from_slice(&stored[..n]);
    } else {
        debug!(key, "blob missing, reading zeros");
    }
    Ok(blob)
}

impl ByteStore for NvsStore {
    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, buf.len())?;
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BLOBS_TABLE)?;
        let blob = read_blob(&table, &self.key, self.len)?;
        buf.copy_from_slice(&blob[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, bytes.len())?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(BLOBS_TABLE)?;
            let mut blob = read_blob(&table, &self.key, self.len)?;
            blob[offset..offset + bytes.len()].copy_from_slice(bytes);
            table.insert(self.key.as_str(), blob.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
