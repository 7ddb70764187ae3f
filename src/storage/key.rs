//! Sortable timestamp keys
//!
//! Every record is stored under a key derived from its timestamp. Range and
//! recency queries walk the engine's byte-ordered key space, so the encoding
//! must satisfy:
//!
//! ```text
//! a < b  <=>  encode(a) < encode(b)   (byte-wise comparison)
//! ```
//!
//! Two encodings are available:
//!
//! - **Binary** (default): 12 bytes. Seconds since the epoch as big-endian
//!   `i64` with the sign bit flipped, then sub-second nanoseconds as
//!   big-endian `u32`. Covers the full chrono range, including pre-1970.
//! - **Text**: `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`, always UTC and always nine
//!   fractional digits. Readable in a raw dump, limited to years 0000-9999.

use crate::storage::error::{StorageError, StorageResult};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SIGN_BIT: u64 = 1 << 63;

/// Length of a binary key in bytes
pub const BINARY_KEY_LEN: usize = 12;

/// Length of a text key in bytes
pub const TEXT_KEY_LEN: usize = 30;

const TEXT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.9fZ";

/// How timestamps are turned into keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyEncoding {
    /// Fixed 12-byte big-endian encoding
    #[default]
    Binary,
    /// Fixed-width normalized UTC text
    Text,
}

impl KeyEncoding {
    /// Encode a timestamp into its sortable key
    pub fn encode(&self, ts: &DateTime<Utc>) -> StorageResult<Vec<u8>> {
        match self {
            KeyEncoding::Binary => Ok(encode_binary(ts)),
            KeyEncoding::Text => encode_text(ts),
        }
    }

    /// Decode a stored key back into its timestamp
    pub fn decode(&self, key: &[u8]) -> StorageResult<DateTime<Utc>> {
        match self {
            KeyEncoding::Binary => decode_binary(key),
            KeyEncoding::Text => decode_text(key),
        }
    }

    /// Key length produced by this encoding
    pub fn key_len(&self) -> usize {
        match self {
            KeyEncoding::Binary => BINARY_KEY_LEN,
            KeyEncoding::Text => TEXT_KEY_LEN,
        }
    }
}

impl fmt::Display for KeyEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyEncoding::Binary => write!(f, "binary"),
            KeyEncoding::Text => write!(f, "text"),
        }
    }
}

impl FromStr for KeyEncoding {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binary" => Ok(KeyEncoding::Binary),
            "text" => Ok(KeyEncoding::Text),
            other => Err(StorageError::Config(format!(
                "unknown key encoding {:?} (expected binary or text)",
                other
            ))),
        }
    }
}

fn encode_binary(ts: &DateTime<Utc>) -> Vec<u8> {
    let secs = (ts.timestamp() as u64) ^ SIGN_BIT;
    let nanos = ts.timestamp_subsec_nanos();

    let mut key = Vec::with_capacity(BINARY_KEY_LEN);
    key.extend_from_slice(&secs.to_be_bytes());
    key.extend_from_slice(&nanos.to_be_bytes());
    key
}

fn decode_binary(key: &[u8]) -> StorageResult<DateTime<Utc>> {
    if key.len() != BINARY_KEY_LEN {
        return Err(bad_key(
            key,
            &format!("expected {} bytes, found {}", BINARY_KEY_LEN, key.len()),
        ));
    }

    let mut secs = [0u8; 8];
    secs.copy_from_slice(&key[..8]);
    let mut nanos = [0u8; 4];
    nanos.copy_from_slice(&key[8..]);

    let secs = (u64::from_be_bytes(secs) ^ SIGN_BIT) as i64;
    let nanos = u32::from_be_bytes(nanos);

    DateTime::from_timestamp(secs, nanos)
        .ok_or_else(|| bad_key(key, "timestamp out of range"))
}

fn encode_text(ts: &DateTime<Utc>) -> StorageResult<Vec<u8>> {
    // Outside 0000-9999 chrono adds a sign or a fifth digit and the width breaks.
    if !(0..=9999).contains(&ts.year()) {
        return Err(StorageError::Encoding(format!(
            "year {} cannot be encoded as a fixed-width text key",
            ts.year()
        )));
    }

    Ok(ts.format(TEXT_FORMAT).to_string().into_bytes())
}

fn decode_text(key: &[u8]) -> StorageResult<DateTime<Utc>> {
    if key.len() != TEXT_KEY_LEN {
        return Err(bad_key(
            key,
            &format!("expected {} bytes, found {}", TEXT_KEY_LEN, key.len()),
        ));
    }

    let text = std::str::from_utf8(key).map_err(|_| bad_key(key, "not valid UTF-8"))?;
    if !text.ends_with('Z') {
        return Err(bad_key(key, "text key must be UTC"));
    }

    let ts = DateTime::parse_from_rfc3339(text)
        .map_err(|e| bad_key(key, &e.to_string()))?
        .with_timezone(&Utc);

    // Reject anything that parses but would not sort like its re-encoding.
    if encode_text(&ts)? != key {
        return Err(bad_key(key, "non-canonical text key"));
    }

    Ok(ts)
}

fn bad_key(key: &[u8], reason: &str) -> StorageError {
    let hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
    StorageError::Encoding(format!("invalid key 0x{}: {}", hex, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn instants() -> Vec<DateTime<Utc>> {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        vec![
            Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 59).unwrap() + Duration::nanoseconds(999_999_999),
            Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 0).unwrap(),
            base - Duration::minutes(1),
            base,
            base + Duration::nanoseconds(1),
            base + Duration::milliseconds(10),
            base + Duration::seconds(1),
            base + Duration::days(400),
            Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap(),
        ]
    }

    fn assert_order_preserved(encoding: KeyEncoding) {
        let instants = instants();
        let keys: Vec<Vec<u8>> = instants
            .iter()
            .map(|ts| encoding.encode(ts).unwrap())
            .collect();

        for (i, key) in keys.iter().enumerate() {
            assert_eq!(key.len(), encoding.key_len());
            assert_eq!(encoding.decode(key).unwrap(), instants[i]);
        }
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_binary_keys_sort_chronologically() {
        assert_order_preserved(KeyEncoding::Binary);
    }

    #[test]
    fn test_text_keys_sort_chronologically() {
        assert_order_preserved(KeyEncoding::Text);
    }

    #[test]
    fn test_text_key_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + Duration::microseconds(6);
        let key = KeyEncoding::Text.encode(&ts).unwrap();
        assert_eq!(key, b"2024-01-02T03:04:05.000006000Z");
    }

    #[test]
    fn test_text_rejects_wide_years() {
        let ts = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let err = KeyEncoding::Text.encode(&ts).unwrap_err();
        assert!(matches!(err, StorageError::Encoding(_)));

        // Binary has no such limit
        let key = KeyEncoding::Binary.encode(&ts).unwrap();
        assert_eq!(KeyEncoding::Binary.decode(&key).unwrap(), ts);
    }

    #[test]
    fn test_decode_rejects_corrupt_keys() {
        assert!(matches!(
            KeyEncoding::Binary.decode(b"short"),
            Err(StorageError::Encoding(_))
        ));
        assert!(matches!(
            KeyEncoding::Text.decode(b"2024-01-02T03:04:05.000006000+"),
            Err(StorageError::Encoding(_))
        ));
        // RFC3339 with an offset is valid RFC3339 but not a canonical key
        assert!(matches!(
            KeyEncoding::Text.decode(b"2024-01-02T03:04:05.0000060+01"),
            Err(StorageError::Encoding(_))
        ));
    }

    #[test]
    fn test_mismatched_encoding_is_an_error() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let binary = KeyEncoding::Binary.encode(&ts).unwrap();
        let text = KeyEncoding::Text.encode(&ts).unwrap();

        assert!(KeyEncoding::Text.decode(&binary).is_err());
        assert!(KeyEncoding::Binary.decode(&text).is_err());
    }

    #[test]
    fn test_parse_encoding_name() {
        assert_eq!("binary".parse::<KeyEncoding>().unwrap(), KeyEncoding::Binary);
        assert_eq!(" Text ".parse::<KeyEncoding>().unwrap(), KeyEncoding::Text);
        assert!("rfc3339".parse::<KeyEncoding>().is_err());
    }
}
