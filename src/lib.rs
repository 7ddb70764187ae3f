//! # Timebucket
//!
//! A time-indexed append/query layer over an ordered key-value store.
//! Timestamped byte payloads go into named buckets and come back by time
//! range or recency, or are purged by age.
//!
//! ## Features
//!
//! - **Sortable keys**: timestamps encode to keys whose byte order is time order
//! - **Four operations**: put, get since, get latest N, delete before
//! - **Atomic**: every operation is exactly one engine transaction
//! - **Pluggable engines**: SQLite file on disk, or in memory
//!
//! ## Modules
//!
//! - [`storage`]: Time store, key encoding and engines
//! - [`config`]: TOML configuration with environment overrides
//! - [`logging`]: Tracing subscriber setup
//! - [`cli`]: Command-line shell
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use timebucket::storage::*;
//! use chrono::{Duration, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = TimeStore::open("./events.db")?;
//!
//!     let start = Utc::now();
//!     store.put("logins", &Record::new(start, "alice"))?;
//!     store.put("logins", &Record::new(start + Duration::seconds(5), "bob"))?;
//!
//!     // Newest first
//!     let latest = store.get_latest_n("logins", 2)?;
//!     assert_eq!(latest[0].payload_str(), Some("bob"));
//!
//!     // Oldest first, inclusive lower bound
//!     let since = store.get_since("logins", start)?;
//!     assert_eq!(since.len(), 2);
//!
//!     store.delete_before("logins", start + Duration::seconds(1))?;
//!     store.close()?;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod logging;
pub mod storage;

// Re-export top-level types for convenience
pub use storage::{
    KeyEncoding, KvEngine, MemoryEngine, Record, SqliteEngine, StorageError, StorageResult,
    StoreConfig, SyncMode, TimeStore,
};

pub use config::{Config, ConfigError, LogFormat, LoggingConfig};
