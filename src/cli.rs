//! Timebucket CLI
//!
//! Command-line shell over the time store:
//! - Store a record
//! - Read records since a time or the latest N
//! - Purge old records
//! - Generate a config file

use crate::config::{generate_default_config, Config};
use crate::storage::{Record, TimeStore};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "timebucket")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Timestamped records in named buckets")]
#[command(long_about = "Timebucket stores timestamped payloads in named buckets.\nQuery them by time range or recency, and purge them by age.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database file (overrides the config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Store a record
    Put {
        /// Bucket name
        bucket: String,
        /// Payload (default: read from stdin)
        payload: Option<String>,
        /// Timestamp (default: now). Supports: "now", "now-15m", RFC 3339, Unix seconds
        #[arg(short, long)]
        time: Option<String>,
    },

    /// Records at or after a time, oldest first
    Since {
        /// Bucket name
        bucket: String,
        /// Lower bound (inclusive)
        time: String,
    },

    /// The N most recent records, newest first
    Latest {
        /// Bucket name
        bucket: String,
        /// Number of records; fails if the bucket holds fewer
        n: usize,
    },

    /// Delete records strictly before a time
    Purge {
        /// Bucket name
        bucket: String,
        /// Cutoff (exclusive)
        before: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

impl Cli {
    /// Command-line settings that take precedence over the config
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(db) = &self.db {
            config.storage.path = db.clone();
        }
    }
}

/// Resolve the config for this invocation
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    cli.apply_overrides(&mut config);
    Ok(config)
}

/// Execute one command, writing results to `out`
pub fn run(cli: &Cli, config: &Config, out: &mut impl Write) -> Result<()> {
    // The template needs no store
    if let Commands::Config { output } = &cli.command {
        return write_config(output.as_deref(), out);
    }

    let store = TimeStore::open_with_config(&config.storage)
        .with_context(|| format!("Failed to open store {:?}", config.storage.path))?;
    let result = execute(&store, cli, out);
    store.close()?;
    result
}

fn execute(store: &TimeStore, cli: &Cli, out: &mut impl Write) -> Result<()> {
    let now = Utc::now();

    match &cli.command {
        Commands::Put {
            bucket,
            payload,
            time,
        } => {
            let timestamp = match time {
                Some(t) => parse_time(t, now)?,
                None => now,
            };
            let payload = match payload {
                Some(p) => p.clone().into_bytes(),
                None => {
                    let mut buf = Vec::new();
                    std::io::stdin().read_to_end(&mut buf)?;
                    buf
                }
            };

            let record = Record::new(timestamp, payload);
            store.put(bucket, &record)?;

            match cli.format {
                OutputFormat::Table => writeln!(
                    out,
                    "Stored {} bytes in {} at {}",
                    record.len(),
                    bucket,
                    format_time(&record.timestamp)
                )?,
                OutputFormat::Json => writeln!(
                    out,
                    "{}",
                    serde_json::json!({
                        "bucket": bucket,
                        "timestamp": record.timestamp,
                        "bytes": record.len(),
                    })
                )?,
            }
        }

        Commands::Since { bucket, time } => {
            let since = parse_time(time, now)?;
            let records = store.get_since(bucket, since)?;
            print_records(out, cli.format, &records)?;
        }

        Commands::Latest { bucket, n } => {
            let records = store.get_latest_n(bucket, *n)?;
            print_records(out, cli.format, &records)?;
        }

        Commands::Purge { bucket, before } => {
            let cutoff = parse_time(before, now)?;
            let removed = store.delete_before(bucket, cutoff)?;

            match cli.format {
                OutputFormat::Table => {
                    writeln!(out, "Deleted {} records from {}", removed, bucket)?
                }
                OutputFormat::Json => writeln!(
                    out,
                    "{}",
                    serde_json::json!({ "bucket": bucket, "deleted": removed })
                )?,
            }
        }

        Commands::Config { output } => write_config(output.as_deref(), out)?,
    }

    Ok(())
}

fn write_config(output: Option<&Path>, out: &mut impl Write) -> Result<()> {
    let template = generate_default_config();
    match output {
        Some(path) => {
            // Create parent directory if needed
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &template)?;
            writeln!(out, "Config written to {:?}", path)?;
        }
        None => write!(out, "{}", template)?,
    }
    Ok(())
}

/// Parse a time argument relative to `now`
///
/// Accepts `now`, `now-<N><s|m|h|d|w>`, RFC 3339 with any offset, and
/// integer Unix seconds.
pub fn parse_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if s.starts_with("now") {
        return parse_relative_time(s, now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(secs) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .with_context(|| format!("Unix timestamp out of range: {}", s));
    }

    bail!(
        "Cannot parse time: {} (use now, now-15m, RFC 3339 or Unix seconds)",
        s
    )
}

/// Parse relative time like "now-7d"
fn parse_relative_time(s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    if s == "now" {
        return Ok(now);
    }

    let re = regex::Regex::new(r"^now-(\d+)([smhdw])$")?;
    let caps = re
        .captures(s)
        .with_context(|| format!("Cannot parse relative time: {}", s))?;

    let amount = i64::from(
        caps[1]
            .parse::<u32>()
            .with_context(|| format!("Invalid number in time expression: {}", s))?,
    );

    let delta = match &caps[2] {
        "s" => Duration::seconds(amount),
        "m" => Duration::minutes(amount),
        "h" => Duration::hours(amount),
        "d" => Duration::days(amount),
        "w" => Duration::weeks(amount),
        unit => bail!("Invalid time unit: {}", unit),
    };

    now.checked_sub_signed(delta)
        .with_context(|| format!("Time out of range: {}", s))
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[derive(Serialize)]
struct RecordView {
    timestamp: DateTime<Utc>,
    payload: String,
}

fn print_records(out: &mut impl Write, format: OutputFormat, records: &[Record]) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let views: Vec<RecordView> = records
                .iter()
                .map(|r| RecordView {
                    timestamp: r.timestamp,
                    payload: String::from_utf8_lossy(&r.payload).into_owned(),
                })
                .collect();
            serde_json::to_writer(&mut *out, &views)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            if records.is_empty() {
                writeln!(out, "No records")?;
                return Ok(());
            }

            writeln!(out, "{:<32} | {}", "Timestamp", "Payload")?;
            writeln!(out, "{}", "-".repeat(45))?;
            for record in records {
                writeln!(
                    out,
                    "{:<32} | {}",
                    format_time(&record.timestamp),
                    String::from_utf8_lossy(&record.payload)
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::tempdir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_time_forms() {
        assert_eq!(parse_time("now", now()).unwrap(), now());
        assert_eq!(
            parse_time("now-15m", now()).unwrap(),
            now() - Duration::minutes(15)
        );
        assert_eq!(
            parse_time("now-2w", now()).unwrap(),
            now() - Duration::weeks(2)
        );
        assert_eq!(
            parse_time("2024-06-01T14:00:00+02:00", now()).unwrap(),
            now()
        );
        assert_eq!(
            parse_time(&now().timestamp().to_string(), now()).unwrap(),
            now()
        );
    }

    #[test]
    fn test_parse_time_rejects_garbage() {
        assert!(parse_time("yesterday", now()).is_err());
        assert!(parse_time("now-5y", now()).is_err());
        assert!(parse_time("now+5m", now()).is_err());
        assert!(parse_time("now-99999999999s", now()).is_err());
    }

    fn invoke(db: &std::path::Path, args: &[&str]) -> Result<String> {
        let mut argv = vec!["timebucket", "--db", db.to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;

        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        let mut out = Vec::new();
        run(&cli, &config, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_commands_end_to_end() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cli.db");

        for (time, payload) in [
            ("2024-06-01T10:00:00Z", "A"),
            ("2024-06-01T10:01:00Z", "B"),
            ("2024-06-01T10:02:00Z", "C"),
        ] {
            let out = invoke(&db, &["put", "b", payload, "--time", time]).unwrap();
            assert!(out.starts_with("Stored 1 bytes in b"));
        }

        let out = invoke(&db, &["--format", "json", "latest", "b", "2"]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["payload"], "C");
        assert_eq!(parsed[1]["payload"], "B");

        let out = invoke(&db, &["purge", "b", "2024-06-01T10:01:00Z"]).unwrap();
        assert_eq!(out.trim(), "Deleted 1 records from b");

        let out = invoke(&db, &["since", "b", "2024-06-01T00:00:00Z"]).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("| B"));
        assert!(lines[3].ends_with("| C"));

        let out = invoke(&db, &["since", "empty", "now"]).unwrap();
        assert_eq!(out.trim(), "No records");
    }

    #[test]
    fn test_latest_shortfall_surfaces_storage_error() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("cli.db");

        invoke(&db, &["put", "b", "x"]).unwrap();
        let err = invoke(&db, &["latest", "b", "5"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::InsufficientData {
                available: 1,
                requested: 5
            })
        ));
    }

    #[test]
    fn test_config_command_writes_template() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("conf").join("config.toml");

        let out = invoke(
            &dir.path().join("unused.db"),
            &["config", "--output", path.to_str().unwrap()],
        )
        .unwrap();
        assert!(out.starts_with("Config written to"));
        assert!(Config::load(&path).is_ok());
        // The store is never opened for this command
        assert!(!dir.path().join("unused.db").exists());
    }

    #[test]
    fn test_config_command_on_open_store_prints_template() {
        let dir = tempdir().unwrap();
        let store = TimeStore::open(dir.path().join("cli.db")).unwrap();
        let cli = Cli::try_parse_from(["timebucket", "config"]).unwrap();

        let mut out = Vec::new();
        execute(&store, &cli, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), generate_default_config());
    }
}
