//! Time store
//!
//! Maps the four time operations onto ordered-key operations of one bucket,
//! each inside a single engine transaction:
//!
//! ```text
//! put           update: create bucket if absent, put(encode(ts), payload)
//! get_since     view:   seek(encode(since)), walk forward to the end
//! get_latest_n  view:   count, last(), walk backward n entries
//! delete_before update: first(), delete while decode(key) < cutoff
//! ```
//!
//! Missing buckets read as empty. A key that does not decode fails the
//! whole call; for `delete_before` that also rolls back every removal made
//! before the bad key was reached.

use crate::storage::engine::KvEngine;
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::key::KeyEncoding;
use crate::storage::memory::MemoryEngine;
use crate::storage::sqlite::SqliteEngine;
use crate::storage::types::Record;
use chrono::{DateTime, Datelike, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Where a forward scan starts for a given lower bound
enum LowerBound {
    Key(Vec<u8>),
    /// Bound sorts before every encodable key
    Unbounded,
    /// Bound sorts after every encodable key
    PastEnd,
}

impl LowerBound {
    fn new(encoding: KeyEncoding, since: &DateTime<Utc>) -> StorageResult<Self> {
        match encoding.encode(since) {
            Ok(key) => Ok(LowerBound::Key(key)),
            // Text keys only cover years 0000-9999; stored keys never fall outside.
            Err(_) if since.year() < 0 => Ok(LowerBound::Unbounded),
            Err(_) if since.year() > 9999 => Ok(LowerBound::PastEnd),
            Err(e) => Err(e),
        }
    }
}

/// SQLite `synchronous` setting for the on-disk engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Hand writes to the OS without waiting (fastest, risk of loss on power failure)
    Off,
    /// Sync at WAL checkpoints (balanced)
    #[default]
    Normal,
    /// Sync on every commit (safest, slowest)
    Full,
}

impl SyncMode {
    pub(crate) fn as_pragma(&self) -> &'static str {
        match self {
            SyncMode::Off => "OFF",
            SyncMode::Normal => "NORMAL",
            SyncMode::Full => "FULL",
        }
    }
}

/// Configuration for a time store
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoreConfig {
    /// Database file
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// How timestamps become keys
    #[serde(default)]
    pub key_encoding: KeyEncoding,
    /// Durability of commits
    #[serde(default)]
    pub synchronous: SyncMode,
    /// How long a writer waits on a locked file before failing
    #[serde(default = "default_busy_timeout")]
    pub busy_timeout_ms: u64,
}

fn default_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|p| p.join("timebucket").join("timebucket.db"))
        .unwrap_or_else(|| PathBuf::from("timebucket.db"))
}

fn default_busy_timeout() -> u64 {
    5000 // 5 seconds
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            key_encoding: KeyEncoding::default(),
            synchronous: SyncMode::default(),
            busy_timeout_ms: default_busy_timeout(),
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Builder: set key encoding
    pub fn key_encoding(mut self, encoding: KeyEncoding) -> Self {
        self.key_encoding = encoding;
        self
    }

    /// Builder: set synchronous mode
    pub fn synchronous(mut self, mode: SyncMode) -> Self {
        self.synchronous = mode;
        self
    }
}

/// Timestamped records in named buckets on top of an ordered key-value engine
///
/// Safe to share between threads; concurrency control is the engine's.
pub struct TimeStore<E: KvEngine = SqliteEngine> {
    /// `None` once closed
    engine: RwLock<Option<E>>,
    encoding: KeyEncoding,
}

impl TimeStore<SqliteEngine> {
    /// Open or create a store file with default settings
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_config(&StoreConfig::new(path.as_ref()))
    }

    /// Open or create the store described by `config`
    pub fn open_with_config(config: &StoreConfig) -> StorageResult<Self> {
        let engine = SqliteEngine::open_with_config(config)?;
        tracing::info!(
            "Opened time store at {:?} ({} keys)",
            config.path,
            config.key_encoding
        );
        Ok(Self::with_engine(engine, config.key_encoding))
    }
}

impl TimeStore<MemoryEngine> {
    /// Store that lives only as long as the value
    pub fn in_memory() -> Self {
        Self::with_engine(MemoryEngine::new(), KeyEncoding::default())
    }
}

impl<E: KvEngine> TimeStore<E> {
    /// Wrap an already opened engine
    pub fn with_engine(engine: E, encoding: KeyEncoding) -> Self {
        Self {
            engine: RwLock::new(Some(engine)),
            encoding,
        }
    }

    pub fn key_encoding(&self) -> KeyEncoding {
        self.encoding
    }

    /// Run `f` against the engine, failing if the store is closed
    pub(crate) fn with_engine_ref<T>(
        &self,
        f: impl FnOnce(&E) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let guard = self.engine.read()?;
        let engine = guard.as_ref().ok_or(StorageError::Closed)?;
        f(engine)
    }

    /// Store a record, creating the bucket if needed.
    ///
    /// A record with the same timestamp already in the bucket is replaced.
    pub fn put(&self, bucket: &str, record: &Record) -> StorageResult<()> {
        let key = self.encoding.encode(&record.timestamp)?;

        self.with_engine_ref(|engine| {
            engine.update(|tx| {
                let mut handle = tx.create_bucket_if_not_exists(bucket)?;
                handle.put(&key, &record.payload)
            })
        })?;

        tracing::debug!(
            "Put {} bytes into {:?} at {}",
            record.payload.len(),
            bucket,
            record.timestamp
        );
        Ok(())
    }

    /// All records at or after `since`, oldest first
    pub fn get_since(&self, bucket: &str, since: DateTime<Utc>) -> StorageResult<Vec<Record>> {
        let encoding = self.encoding;
        let start = LowerBound::new(encoding, &since)?;

        let records = self.with_engine_ref(|engine| {
            engine.view(|tx| {
                let mut records = Vec::new();
                let Some(handle) = tx.bucket(bucket)? else {
                    return Ok(records);
                };

                let mut cursor = handle.cursor();
                let mut entry = match &start {
                    LowerBound::Key(key) => cursor.seek(key)?,
                    LowerBound::Unbounded => cursor.first()?,
                    LowerBound::PastEnd => return Ok(records),
                };
                while let Some((key, payload)) = entry {
                    records.push(Record {
                        timestamp: encoding.decode(&key)?,
                        payload,
                    });
                    entry = cursor.next()?;
                }
                Ok(records)
            })
        })?;

        tracing::debug!(
            "Read {} records from {:?} since {}",
            records.len(),
            bucket,
            since
        );
        Ok(records)
    }

    /// The `n` most recent records, newest first.
    ///
    /// Fails with `InsufficientData` when the bucket holds fewer than `n`
    /// records (a missing bucket holds zero). `n == 0` always yields an
    /// empty list.
    pub fn get_latest_n(&self, bucket: &str, n: usize) -> StorageResult<Vec<Record>> {
        let encoding = self.encoding;

        let records = self.with_engine_ref(|engine| {
            if n == 0 {
                return Ok(Vec::new());
            }

            engine.view(|tx| {
                let handle = tx.bucket(bucket)?;
                let available = match &handle {
                    Some(handle) => handle.len()?,
                    None => 0,
                };
                if available < n {
                    return Err(StorageError::InsufficientData {
                        available,
                        requested: n,
                    });
                }
                let Some(handle) = handle else {
                    return Ok(Vec::new());
                };

                let mut records = Vec::with_capacity(n);
                let mut cursor = handle.cursor();
                let mut entry = cursor.last()?;
                while records.len() < n {
                    let Some((key, payload)) = entry else {
                        return Err(StorageError::InsufficientData {
                            available: records.len(),
                            requested: n,
                        });
                    };
                    records.push(Record {
                        timestamp: encoding.decode(&key)?,
                        payload,
                    });
                    entry = if records.len() < n {
                        cursor.prev()?
                    } else {
                        None
                    };
                }
                Ok(records)
            })
        })?;

        tracing::debug!("Read latest {} records from {:?}", records.len(), bucket);
        Ok(records)
    }

    /// Remove every record strictly before `cutoff`; returns how many went.
    ///
    /// Stops at the first record at or after `cutoff`. A missing bucket is a
    /// no-op.
    pub fn delete_before(&self, bucket: &str, cutoff: DateTime<Utc>) -> StorageResult<usize> {
        let encoding = self.encoding;

        let removed = self.with_engine_ref(|engine| {
            engine.update(|tx| {
                let Some(mut handle) = tx.bucket_mut(bucket)? else {
                    return Ok(0);
                };

                let mut removed = 0;
                let mut cursor = handle.cursor_mut();
                let mut entry = cursor.first()?;
                while let Some((key, _)) = entry {
                    if encoding.decode(&key)? >= cutoff {
                        break;
                    }
                    cursor.delete()?;
                    removed += 1;
                    entry = cursor.next()?;
                }
                Ok(removed)
            })
        })?;

        tracing::debug!(
            "Deleted {} records from {:?} before {}",
            removed,
            bucket,
            cutoff
        );
        Ok(removed)
    }

    /// Release the engine. Every later operation fails with `Closed`;
    /// closing twice is a no-op.
    pub fn close(&self) -> StorageResult<()> {
        let engine = self.engine.write()?.take();
        if let Some(engine) = engine {
            engine.close()?;
            tracing::info!("Time store closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.engine
            .read()
            .map(|guard| guard.is_none())
            .unwrap_or(true)
    }
}
