//! Core data types for the time store
//!
//! - `Record`: a timestamped, opaque payload

use chrono::{DateTime, TimeZone, Utc};

/// A single timestamped record
///
/// The timestamp is the record's unique key within its bucket. Payloads are
/// opaque bytes stored without any framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Instant of the record, normalized to UTC
    pub timestamp: DateTime<Utc>,
    /// Raw payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record at a specific instant
    ///
    /// Timestamps in any timezone are accepted and normalized to UTC.
    pub fn new<Tz: TimeZone>(timestamp: DateTime<Tz>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            timestamp: timestamp.with_timezone(&Utc),
            payload: payload.into(),
        }
    }

    /// Create a record with the current timestamp
    pub fn now(payload: impl Into<Vec<u8>>) -> Self {
        Self::new(Utc::now(), payload)
    }

    /// Payload as UTF-8, if it is valid UTF-8
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
