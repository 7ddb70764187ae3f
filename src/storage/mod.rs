//! Timebucket storage
//!
//! This module provides the time-indexed record store and its engines:
//!
//! - **types**: `Record`, a timestamped payload
//! - **key**: order-preserving timestamp keys
//! - **engine**: the ordered key-value interface the store is written against
//! - **memory**: in-memory engine
//! - **sqlite**: on-disk engine
//! - **store**: `TimeStore`, the four time operations
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! TimeStore ── encode(ts) ──► KvEngine (update / view)
//!                               ├── MemoryEngine  (BTreeMap per bucket)
//!                               └── SqliteEngine  (one file, WITHOUT ROWID table)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use timebucket::storage::{Record, TimeStore};
//! use chrono::{Duration, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TimeStore::open("./readings.db")?;
//!
//!     store.put("sensor-1", &Record::now("21.5"))?;
//!
//!     let last_hour = store.get_since("sensor-1", Utc::now() - Duration::hours(1))?;
//!     let newest = store.get_latest_n("sensor-1", 1)?;
//!     store.delete_before("sensor-1", Utc::now() - Duration::days(30))?;
//!
//!     println!("{} readings, newest {:?}", last_hour.len(), newest[0].payload_str());
//!     store.close()?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod error;
pub mod key;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use engine::{Bucket, BucketMut, Cursor, CursorMut, KeyValue, KvEngine, ReadTxn, WriteTxn};
pub use error::{StorageError, StorageResult};
pub use key::KeyEncoding;
pub use memory::MemoryEngine;
pub use sqlite::SqliteEngine;
pub use store::{StoreConfig, SyncMode, TimeStore};
pub use types::Record;
