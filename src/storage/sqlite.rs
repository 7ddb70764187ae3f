//! SQLite-backed engine
//!
//! One database file per store. Buckets are rows of a `buckets` table and
//! their entries live in a single `WITHOUT ROWID` table clustered on
//! `(bucket, key)`, so every cursor move is a primary-key probe:
//!
//! ```text
//! buckets(name TEXT PRIMARY KEY)
//! entries(bucket TEXT, key BLOB, value BLOB, PRIMARY KEY (bucket, key))
//! ```
//!
//! SQLite compares BLOBs with `memcmp`, which gives the byte-wise key order
//! the time store relies on. Write transactions are `IMMEDIATE` so writers
//! serialize up front instead of failing on lock upgrade.

use crate::storage::engine::{
    Bucket, BucketMut, Cursor, CursorMut, KeyValue, KvEngine, ReadTxn, WriteTxn,
};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::store::StoreConfig;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS buckets (
        name TEXT PRIMARY KEY NOT NULL
    ) WITHOUT ROWID;

    CREATE TABLE IF NOT EXISTS entries (
        bucket TEXT NOT NULL,
        key BLOB NOT NULL,
        value BLOB NOT NULL,
        PRIMARY KEY (bucket, key)
    ) WITHOUT ROWID;
";

const FIRST: &str =
    "SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key ASC LIMIT 1";
const LAST: &str =
    "SELECT key, value FROM entries WHERE bucket = ?1 ORDER BY key DESC LIMIT 1";
const SEEK: &str =
    "SELECT key, value FROM entries WHERE bucket = ?1 AND key >= ?2 ORDER BY key ASC LIMIT 1";
const NEXT: &str =
    "SELECT key, value FROM entries WHERE bucket = ?1 AND key > ?2 ORDER BY key ASC LIMIT 1";
const PREV: &str =
    "SELECT key, value FROM entries WHERE bucket = ?1 AND key < ?2 ORDER BY key DESC LIMIT 1";

/// Engine storing all buckets in one SQLite file
pub struct SqliteEngine {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteEngine {
    /// Open or create a database file with default settings
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(&StoreConfig::new(path.as_ref()))
    }

    /// Open or create the database file described by `config`
    pub fn open_with_config(config: &StoreConfig) -> StorageResult<Self> {
        let path = config.path.clone();

        // Create parent directory if needed
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        conn.execute_batch(&format!(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = {};",
            config.synchronous.as_pragma()
        ))?;
        conn.execute_batch(SCHEMA)?;

        tracing::debug!("Opened SQLite engine at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvEngine for SqliteEngine {
    fn update<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut dyn WriteTxn) -> StorageResult<T>,
    {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // An early return drops `tx`, which rolls back.
        let out = {
            let mut txn = SqliteTxn { conn: &*tx };
            f(&mut txn)?
        };

        tx.commit()?;
        Ok(out)
    }

    fn view<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&dyn ReadTxn) -> StorageResult<T>,
    {
        let mut conn = self.conn.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;

        let out = {
            let txn = SqliteTxn { conn: &*tx };
            f(&txn)?
        };

        tx.commit()?;
        Ok(out)
    }

    fn close(self) -> StorageResult<()> {
        let conn = self.conn.into_inner()?;
        conn.close().map_err(|(_, e)| StorageError::from(e))?;
        tracing::debug!("Closed SQLite engine at {:?}", self.path);
        Ok(())
    }
}

struct SqliteTxn<'c> {
    conn: &'c Connection,
}

impl<'c> SqliteTxn<'c> {
    fn bucket_exists(&self, name: &str) -> StorageResult<bool> {
        let found = self
            .conn
            .prepare_cached("SELECT 1 FROM buckets WHERE name = ?1")?
            .query_row(params![name], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }

    fn handle(&self, name: &str) -> SqliteBucket<'c> {
        SqliteBucket {
            conn: self.conn,
            name: name.to_string(),
        }
    }
}

impl ReadTxn for SqliteTxn<'_> {
    fn bucket(&self, name: &str) -> StorageResult<Option<Box<dyn Bucket + '_>>> {
        if !self.bucket_exists(name)? {
            return Ok(None);
        }
        Ok(Some(Box::new(self.handle(name))))
    }
}

impl WriteTxn for SqliteTxn<'_> {
    fn bucket_mut(&mut self, name: &str) -> StorageResult<Option<Box<dyn BucketMut + '_>>> {
        if !self.bucket_exists(name)? {
            return Ok(None);
        }
        Ok(Some(Box::new(self.handle(name))))
    }

    fn create_bucket_if_not_exists(&mut self, name: &str) -> StorageResult<Box<dyn BucketMut + '_>> {
        if name.is_empty() {
            return Err(StorageError::InvalidBucket(name.to_string()));
        }

        self.conn
            .prepare_cached("INSERT OR IGNORE INTO buckets (name) VALUES (?1)")?
            .execute(params![name])?;

        Ok(Box::new(self.handle(name)))
    }
}

struct SqliteBucket<'c> {
    conn: &'c Connection,
    name: String,
}

impl SqliteBucket<'_> {
    fn open_cursor(&self) -> SqliteCursor<'_> {
        SqliteCursor {
            conn: self.conn,
            bucket: &self.name,
            position: None,
        }
    }
}

impl Bucket for SqliteBucket<'_> {
    fn len(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .prepare_cached("SELECT COUNT(*) FROM entries WHERE bucket = ?1")?
            .query_row(params![self.name], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn cursor(&self) -> Box<dyn Cursor + '_> {
        Box::new(self.open_cursor())
    }
}

impl BucketMut for SqliteBucket<'_> {
    fn put(&mut self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        self.conn
            .prepare_cached("INSERT OR REPLACE INTO entries (bucket, key, value) VALUES (?1, ?2, ?3)")?
            .execute(params![self.name, key, value])?;
        Ok(())
    }

    fn cursor_mut(&mut self) -> Box<dyn CursorMut + '_> {
        Box::new(self.open_cursor())
    }
}

struct SqliteCursor<'a> {
    conn: &'a Connection,
    bucket: &'a str,
    position: Option<Vec<u8>>,
}

fn read_entry(row: &Row<'_>) -> rusqlite::Result<KeyValue> {
    Ok((row.get(0)?, row.get(1)?))
}

impl SqliteCursor<'_> {
    fn fetch(&mut self, sql: &str, from: Option<&[u8]>) -> StorageResult<Option<KeyValue>> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(sql)?;
        let found = match from {
            Some(key) => stmt.query_row(params![self.bucket, key], read_entry),
            None => stmt.query_row(params![self.bucket], read_entry),
        }
        .optional()?;

        self.position = found.as_ref().map(|(key, _)| key.clone());
        Ok(found)
    }

    fn step(&mut self, sql: &str) -> StorageResult<Option<KeyValue>> {
        match self.position.take() {
            Some(pos) => self.fetch(sql, Some(&pos)),
            None => Ok(None),
        }
    }
}

impl Cursor for SqliteCursor<'_> {
    fn first(&mut self) -> StorageResult<Option<KeyValue>> {
        self.fetch(FIRST, None)
    }

    fn last(&mut self) -> StorageResult<Option<KeyValue>> {
        self.fetch(LAST, None)
    }

    fn seek(&mut self, key: &[u8]) -> StorageResult<Option<KeyValue>> {
        self.fetch(SEEK, Some(key))
    }

    fn next(&mut self) -> StorageResult<Option<KeyValue>> {
        self.step(NEXT)
    }

    fn prev(&mut self) -> StorageResult<Option<KeyValue>> {
        self.step(PREV)
    }
}

impl CursorMut for SqliteCursor<'_> {
    fn delete(&mut self) -> StorageResult<()> {
        if let Some(pos) = &self.position {
            self.conn
                .prepare_cached("DELETE FROM entries WHERE bucket = ?1 AND key = ?2")?
                .execute(params![self.bucket, pos])?;
        }
        Ok(())
    }
}
