//! Persistent result cache
//!
//! Maps normalized query keys to the remote records (or terminal failures)
//! fetched for them. The store is a single SQLite file at a caller-supplied
//! path, written key-by-key as batches complete, so an interrupted run
//! resumes from the last fully written batch. Re-running against the same
//! store with cache reuse enabled issues zero additional network fetches.
//!
//! Multiple proteins may share one key (isoforms from the same locus); the
//! cache is keyed per normalized identifier, never per input record. The
//! single connection serializes writers, and batches own disjoint keys, so
//! `INSERT OR REPLACE` last-writer-wins semantics are safe.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};

use crate::db::SequenceRecord;
use crate::error::CdsError;
use crate::Result;

/// Lifecycle state of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Not yet settled this run (absent from the store)
    Pending,
    /// Remote records were retrieved and stored
    Fetched,
    /// Terminally failed (not found, or retries exhausted)
    Failed,
}

impl CacheStatus {
    fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Pending => "pending",
            CacheStatus::Fetched => "fetched",
            CacheStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(CacheStatus::Pending),
            "fetched" => Some(CacheStatus::Fetched),
            "failed" => Some(CacheStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One settled cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Normalized query key
    pub key: String,
    /// Terminal status of the key
    pub status: CacheStatus,
    /// Fetched records; present only for `Fetched` entries
    pub payload: Option<Vec<SequenceRecord>>,
    /// Failure reason; present only for `Failed` entries
    pub reason: Option<String>,
    /// When the key was settled
    pub fetched_at: DateTime<Utc>,
}

/// SQLite-backed cache of remote lookups.
pub struct ResultCache {
    conn: Connection,
}

impl ResultCache {
    /// Open (or create) a cache store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory store; useful for tests and cache-less runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS entries (
                key        TEXT PRIMARY KEY,
                status     TEXT NOT NULL,
                payload    TEXT,
                reason     TEXT,
                fetched_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Look up a key. `Ok(None)` means the key is still pending.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row = self
            .conn
            .query_row(
                "SELECT status, payload, reason, fetched_at FROM entries WHERE key = ?1",
                [key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((status, payload, reason, fetched_at)) = row else {
            return Ok(None);
        };

        let status = CacheStatus::parse(&status).ok_or_else(|| CdsError::CachePayload {
            key: key.to_string(),
            msg: format!("unknown status '{}'", status),
        })?;

        let payload = match payload {
            Some(json) => Some(serde_json::from_str(&json).map_err(|e| CdsError::CachePayload {
                key: key.to_string(),
                msg: e.to_string(),
            })?),
            None => None,
        };

        let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
            .map_err(|e| CdsError::CachePayload {
                key: key.to_string(),
                msg: format!("bad timestamp: {}", e),
            })?
            .with_timezone(&Utc);

        Ok(Some(CacheEntry {
            key: key.to_string(),
            status,
            payload,
            reason,
            fetched_at,
        }))
    }

    /// Record a successful fetch for a key.
    pub fn put_fetched(&self, key: &str, records: &[SequenceRecord]) -> Result<()> {
        let payload = serde_json::to_string(records)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (key, status, payload, reason, fetched_at)
             VALUES (?1, ?2, ?3, NULL, ?4)",
            rusqlite::params![
                key,
                CacheStatus::Fetched.as_str(),
                payload,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Record a terminal failure for a key.
    pub fn put_failed(&self, key: &str, reason: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (key, status, payload, reason, fetched_at)
             VALUES (?1, ?2, NULL, ?3, ?4)",
            rusqlite::params![
                key,
                CacheStatus::Failed.as_str(),
                reason,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Filter `keys` down to those not yet settled, deduplicated and in
    /// first-seen order.
    pub fn pending_keys(&self, keys: &[String]) -> Result<Vec<String>> {
        let mut pending = Vec::new();
        for key in keys {
            if pending.contains(key) {
                continue;
            }
            if self.get(key)?.is_none() {
                pending.push(key.clone());
            }
        }
        Ok(pending)
    }

    /// Number of settled keys in the store.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// True when no key has been settled yet.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Counts of (fetched, failed) keys.
    pub fn counts(&self) -> Result<(usize, usize)> {
        let fetched: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE status = 'fetched'",
            [],
            |row| row.get(0),
        )?;
        let failed: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE status = 'failed'",
            [],
            |row| row.get(0),
        )?;
        Ok((fetched as usize, failed as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CdsFeature;
    use tempfile::TempDir;

    fn record(accession: &str, seq: &str) -> SequenceRecord {
        SequenceRecord {
            accession: accession.to_string(),
            sequence: seq.to_string(),
            cds: vec![CdsFeature::spanning(seq.len())],
        }
    }

    #[test]
    fn test_missing_key_is_pending() {
        let cache = ResultCache::open_in_memory().unwrap();
        assert!(cache.get("nothing").unwrap().is_none());
    }

    #[test]
    fn test_put_fetched_roundtrip() {
        let cache = ResultCache::open_in_memory().unwrap();
        let records = vec![record("NM_1.1", "ATGTAA")];
        cache.put_fetched("XP_1.1", &records).unwrap();

        let entry = cache.get("XP_1.1").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Fetched);
        assert_eq!(entry.payload.as_deref(), Some(&records[..]));
        assert!(entry.reason.is_none());
    }

    #[test]
    fn test_put_failed_roundtrip() {
        let cache = ResultCache::open_in_memory().unwrap();
        cache.put_failed("ghost", "not found").unwrap();

        let entry = cache.get("ghost").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Failed);
        assert_eq!(entry.reason.as_deref(), Some("not found"));
        assert!(entry.payload.is_none());
    }

    #[test]
    fn test_pending_keys_filters_settled_and_dedups() {
        let cache = ResultCache::open_in_memory().unwrap();
        cache.put_fetched("a", &[record("NM_1.1", "ATG")]).unwrap();
        cache.put_failed("b", "not found").unwrap();

        let keys: Vec<String> = ["a", "b", "c", "c", "d"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let pending = cache.pending_keys(&keys).unwrap();
        assert_eq!(pending, vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_last_writer_wins() {
        let cache = ResultCache::open_in_memory().unwrap();
        cache.put_failed("k", "not found").unwrap();
        cache.put_fetched("k", &[record("NM_2.1", "ATGTAA")]).unwrap();

        let entry = cache.get("k").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Fetched);
        assert!(entry.reason.is_none());
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("run.db");

        {
            let cache = ResultCache::open(&path).unwrap();
            cache.put_fetched("a", &[record("NM_1.1", "ATGTAA")]).unwrap();
            cache.put_failed("b", "fetch exhausted retries").unwrap();
        }

        let cache = ResultCache::open(&path).unwrap();
        assert_eq!(cache.len().unwrap(), 2);
        let entry = cache.get("a").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Fetched);
        let entry = cache.get("b").unwrap().unwrap();
        assert_eq!(entry.reason.as_deref(), Some("fetch exhausted retries"));
    }

    #[test]
    fn test_counts() {
        let cache = ResultCache::open_in_memory().unwrap();
        assert_eq!(cache.counts().unwrap(), (0, 0));
        cache.put_fetched("a", &[record("NM_1.1", "ATG")]).unwrap();
        cache.put_fetched("b", &[record("NM_2.1", "ATG")]).unwrap();
        cache.put_failed("c", "not found").unwrap();
        assert_eq!(cache.counts().unwrap(), (2, 1));
        assert!(!cache.is_empty().unwrap());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CacheStatus::Pending.to_string(), "pending");
        assert_eq!(CacheStatus::Fetched.to_string(), "fetched");
        assert_eq!(CacheStatus::Failed.to_string(), "failed");
    }
}
