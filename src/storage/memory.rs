//! In-memory engine
//!
//! Buckets are `BTreeMap`s keyed by raw bytes. Readers clone an `Arc` of the
//! current state and never wait on a writer. Writers are serialized, work on
//! a private copy, and publish it only when their closure succeeds; a failed
//! transaction simply drops the copy.
//!
//! Every write copies the full state, so this engine suits tests and small
//! ephemeral stores.

use crate::storage::engine::{
    Bucket, BucketMut, Cursor, CursorMut, KeyValue, KvEngine, ReadTxn, WriteTxn,
};
use crate::storage::error::{StorageError, StorageResult};
use std::collections::BTreeMap;
use std::ops::{Bound, Deref, DerefMut};
use std::sync::{Arc, Mutex, RwLock};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;
type Trees = BTreeMap<String, Tree>;

/// Engine keeping every bucket in memory
#[derive(Debug, Default)]
pub struct MemoryEngine {
    /// Last committed state
    trees: RwLock<Arc<Trees>>,
    /// Held for the whole duration of a write transaction
    writer: Mutex<()>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> StorageResult<Arc<Trees>> {
        Ok(Arc::clone(&*self.trees.read()?))
    }
}

impl KvEngine for MemoryEngine {
    fn update<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn WriteTxn) -> StorageResult<T>,
    {
        let _writer = self.writer.lock()?;

        let mut working = Trees::clone(&*self.snapshot()?);
        let mut txn = MemoryWriteTxn {
            trees: &mut working,
        };
        let out = f(&mut txn)?;

        *self.trees.write()? = Arc::new(working);
        Ok(out)
    }

    fn view<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn ReadTxn) -> StorageResult<T>,
    {
        let snapshot = self.snapshot()?;
        let txn = MemoryReadTxn {
            trees: snapshot.as_ref(),
        };
        f(&txn)
    }

    fn close(self) -> StorageResult<()> {
        Ok(())
    }
}

struct MemoryReadTxn<'a> {
    trees: &'a Trees,
}

impl ReadTxn for MemoryReadTxn<'_> {
    fn bucket(&self, name: &str) -> StorageResult<Option<Box<dyn Bucket + '_>>> {
        Ok(self
            .trees
            .get(name)
            .map(|tree| Box::new(TreeBucket { tree }) as Box<dyn Bucket + '_>))
    }
}

struct MemoryWriteTxn<'a> {
    trees: &'a mut Trees,
}

impl WriteTxn for MemoryWriteTxn<'_> {
    fn bucket_mut(&mut self, name: &str) -> StorageResult<Option<Box<dyn BucketMut + '_>>> {
        Ok(self
            .trees
            .get_mut(name)
            .map(|tree| Box::new(TreeBucket { tree }) as Box<dyn BucketMut + '_>))
    }

    fn create_bucket_if_not_exists(&mut self, name: &str) -> StorageResult<Box<dyn BucketMut + '_>> {
        if name.is_empty() {
            return Err(StorageError::InvalidBucket(name.to_string()));
        }
        let tree = self.trees.entry(name.to_string()).or_default();
        Ok(Box::new(TreeBucket { tree }))
    }
}

/// A bucket borrowed either shared (`&Tree`) or exclusive (`&mut Tree`)
struct TreeBucket<M> {
    tree: M,
}

impl<M: Deref<Target = Tree>> Bucket for TreeBucket<M> {
    fn len(&self) -> StorageResult<usize> {
        Ok(self.tree.len())
    }

    fn cursor(&self) -> Box<dyn Cursor + '_> {
        Box::new(TreeCursor::new(&*self.tree))
    }
}

impl<M: DerefMut<Target = Tree>> BucketMut for TreeBucket<M> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.tree.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn cursor_mut(&mut self) -> Box<dyn CursorMut + '_> {
        Box::new(TreeCursor::new(&mut *self.tree))
    }
}

struct TreeCursor<M> {
    tree: M,
    /// Key the cursor sits on; kept after a delete so `next` can continue
    position: Option<Vec<u8>>,
}

impl<M: Deref<Target = Tree>> TreeCursor<M> {
    fn new(tree: M) -> Self {
        Self {
            tree,
            position: None,
        }
    }

    fn land(&mut self, found: Option<KeyValue>) -> Option<KeyValue> {
        self.position = found.as_ref().map(|(key, _)| key.clone());
        found
    }
}

fn owned((key, value): (&Vec<u8>, &Vec<u8>)) -> KeyValue {
    (key.clone(), value.clone())
}

impl<M: Deref<Target = Tree>> Cursor for TreeCursor<M> {
    fn first(&mut self) -> StorageResult<Option<KeyValue>> {
        let found = self.tree.iter().next().map(owned);
        Ok(self.land(found))
    }

    fn last(&mut self) -> StorageResult<Option<KeyValue>> {
        let found = self.tree.iter().next_back().map(owned);
        Ok(self.land(found))
    }

    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        let found = self
            .tree
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
            .next()
            .map(owned);
        Ok(self.land(found))
    }

    fn next(&mut self) -> StorageResult<Option<KeyValue>> {
        let found = match self.position.as_deref() {
            Some(pos) => self
                .tree
                .range::<[u8], _>((Bound::Excluded(pos), Bound::Unbounded))
                .next()
                .map(owned),
            None => None,
        };
        Ok(self.land(found))
    }

    fn prev(&mut self) -> StorageResult<Option<KeyValue>> {
        let found = match self.position.as_deref() {
            Some(pos) => self
                .tree
                .range::<[u8], _>((Bound::Unbounded, Bound::Excluded(pos)))
                .next_back()
                .map(owned),
            None => None,
        };
        Ok(self.land(found))
    }
}

impl<M: DerefMut<Target = Tree>> CursorMut for TreeCursor<M> {
    fn delete(&mut self) -> StorageResult<()> {
        if let Some(pos) = &self.position {
            self.tree.remove(pos.as_slice());
        }
        Ok(())
    }
}
