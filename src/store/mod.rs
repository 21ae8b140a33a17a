pub mod nvs;

pub use nvs::NvsStore;

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::StoreError;

/// Shared handle to a byte store. Records never own the store; several
/// records can sit over disjoint windows of the same one.
pub type SharedStore<S> = Rc<RefCell<S>>;

pub fn shared<S: ByteStore>(store: S) -> SharedStore<S> {
    Rc::new(RefCell::new(store))
}

// ─── ByteStore ──────────────────────────────────────────────────────────────

/// Bounded read/write over an addressable byte range.
pub trait ByteStore {
    /// Total addressable bytes.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fill `buf` with the bytes at `offset..offset + buf.len()`.
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError>;

    /// Write `bytes` at `offset..offset + bytes.len()`.
    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError>;

    #[inline]
    fn check_bounds(&self, offset: usize, len: usize) -> Result<(), StoreError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len() => Ok(()),
            _ => Err(StoreError::OutOfBounds {
                offset,
                len,
                store_len: self.len(),
            }),
        }
    }
}

// ─── MemStore (RAM) ─────────────────────────────────────────────────────────

/// Plain RAM.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemStore {
    bytes: Vec<u8>,
}

impl MemStore {
    /// `len` zeroed bytes.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0u8; len],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl ByteStore for MemStore {
    #[inline]
    fn len(&self) -> usize {
        self.bytes.len()
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, buf.len())?;
        buf.copy_from_slice(&self.bytes[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, bytes: &[u8]) -> Result<(), StoreError> {
        self.check_bounds(offset, bytes.len())?;
        self.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_store_read_write() {
        let mut store = MemStore::new(8);
        store.write(2, &[1, 2, 3]).unwrap();
        let mut buf = [0u8; 4];
        store.read(1, &mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(store.as_bytes(), &[0, 0, 1, 2, 3, 0, 0, 0]);
    }

    #[test]
    fn test_mem_store_bounds() {
        let mut store = MemStore::new(4);
        assert!(matches!(
            store.write(3, &[1, 2]),
            Err(StoreError::OutOfBounds { offset: 3, len: 2, store_len: 4 })
        ));
        let mut buf = [0u8; 1];
        assert!(store.read(usize::MAX, &mut buf).is_err());
        assert!(store.read(4, &mut []).is_ok());
    }
}
