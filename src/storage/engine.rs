//! Ordered key-value engine interface
//!
//! The time store never touches storage directly. It needs exactly this:
//!
//! ```text
//! KvEngine ── update(f) ──► WriteTxn ── create_bucket_if_not_exists / bucket_mut ──► BucketMut ── put / cursor_mut
//!          └─ view(f) ────► ReadTxn ─── bucket ──────────────────────────────────► Bucket ──── len / cursor
//! ```
//!
//! Each bucket is an independent map ordered by byte-wise key comparison.
//! `update` is atomic: when the closure fails, nothing it did is kept.
//! `view` sees a consistent snapshot.

use crate::storage::error::StorageResult;

/// Owned key/value pair returned by cursor moves
pub type KeyValue = (Vec<u8>, Vec<u8>);

/// Ordered cursor over one bucket
///
/// Every move returns `None` when it runs off either end; the cursor is then
/// unpositioned and further `next`/`prev` calls keep returning `None`.
pub trait Cursor {
    /// Move to the smallest key
    fn first(&mut self) -> StorageResult<Option<KeyValue>>;
    /// Move to the largest key
    fn last(&mut self) -> StorageResult<Option<KeyValue>>;
    /// Move to the first key `>= key`
    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>>;
    /// Move to the next larger key
    fn next(&mut self) -> StorageResult<Option<KeyValue>>;
    /// Move to the next smaller key
    fn prev(&mut self) -> StorageResult<Option<KeyValue>>;
}

/// Cursor that can remove entries
pub trait CursorMut: Cursor {
    /// Remove the entry at the current position.
    ///
    /// The position is kept, so `next` continues after the removed key.
    fn delete(&mut self) -> StorageResult<()>;
}

/// Read access to one bucket
pub trait Bucket {
    /// Number of entries in the bucket
    fn len(&self) -> StorageResult<usize>;

    fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    fn cursor(&self) -> Box<dyn Cursor + '_>;
}

/// Write access to one bucket
pub trait BucketMut: Bucket {
    /// Insert or overwrite `key`
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()>;

    fn cursor_mut(&mut self) -> Box<dyn CursorMut + '_>;
}

/// Read-only transaction
pub trait ReadTxn {
    /// Look up a bucket; `None` if it was never created
    fn bucket(&self, name: &str) -> StorageResult<Option<Box<dyn Bucket + '_>>>;
}

/// Read-write transaction
pub trait WriteTxn {
    /// Look up a bucket for writing; `None` if it was never created
    fn bucket_mut(&mut self, name: &str) -> StorageResult<Option<Box<dyn BucketMut + '_>>>;

    /// Look up a bucket, creating it first if needed
    fn create_bucket_if_not_exists(&mut self, name: &str) -> StorageResult<Box<dyn BucketMut + '_>>;
}

/// An ordered key-value engine with transactional buckets
///
/// Implementations serialize writers and give readers snapshot isolation.
pub trait KvEngine: Send + Sync {
    /// Run `f` in a read-write transaction; committed only if `f` succeeds
    fn update<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn WriteTxn) -> StorageResult<T>;

    /// Run `f` in a read-only transaction
    fn view<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn ReadTxn) -> StorageResult<T>;

    /// Release the engine's handle
    fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}
