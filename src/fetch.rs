//! Batched, retried fetch orchestration
//!
//! Pending keys are partitioned into ordered batches and submitted to the
//! [`SequenceDatabase`] collaborator. A transient failure retries the whole
//! batch up to a bounded attempt count; exhausting the budget marks every
//! key in that batch failed without stopping the other batches. Not-found
//! is a per-key terminal answer, never a retry condition.
//!
//! Every settled key is written into the [`ResultCache`] before the next
//! batch starts, so an interrupted run loses at most the in-flight batch.

use std::time::Duration;

use log::warn;

use crate::cache::ResultCache;
use crate::db::{KeyLookup, SequenceDatabase};
use crate::Result;

/// Failure reason recorded when the remote database has no record.
pub const REASON_NOT_FOUND: &str = "not found";
/// Failure reason recorded when the retry budget ran out.
pub const REASON_EXHAUSTED: &str = "fetch exhausted retries";

/// Configuration for batch fetching.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum number of keys per batch.
    pub batch_size: usize,
    /// Maximum attempts per batch before its keys are marked failed.
    pub max_retries: usize,
    /// Pause between attempts of the same batch.
    pub retry_delay: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            max_retries: 10,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl FetchConfig {
    /// Create a new fetch configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch size (minimum 1).
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the retry budget per batch (minimum 1).
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the pause between attempts.
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// Progress information emitted after each batch settles.
#[derive(Debug, Clone)]
pub struct FetchProgress {
    /// Total keys to settle.
    pub total: usize,
    /// Keys settled so far.
    pub settled: usize,
    /// Batches completed so far.
    pub batches_done: usize,
    /// Total number of batches.
    pub batches_total: usize,
}

/// Result of a fetch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Keys with records retrieved.
    pub fetched: usize,
    /// Keys the database reported as absent.
    pub not_found: usize,
    /// Keys failed because their batch ran out of attempts.
    pub exhausted: usize,
    /// Total attempts issued across all batches.
    pub attempts: usize,
}

/// Fetches pending keys through a [`SequenceDatabase`], writing outcomes
/// into the [`ResultCache`].
pub struct BatchFetcher<'a, D: SequenceDatabase> {
    db: &'a D,
    config: FetchConfig,
}

impl<'a, D: SequenceDatabase> BatchFetcher<'a, D> {
    /// Create a fetcher with default configuration.
    pub fn new(db: &'a D) -> Self {
        Self {
            db,
            config: FetchConfig::default(),
        }
    }

    /// Create a fetcher with the given configuration.
    pub fn with_config(db: &'a D, config: FetchConfig) -> Self {
        Self { db, config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch all `keys`, writing every outcome into `cache`.
    pub fn fetch(&self, keys: &[String], cache: &ResultCache) -> Result<FetchSummary> {
        self.fetch_with_progress(keys, cache, |_| {})
    }

    /// Fetch with a progress callback invoked after each batch.
    pub fn fetch_with_progress<F>(
        &self,
        keys: &[String],
        cache: &ResultCache,
        mut progress_fn: F,
    ) -> Result<FetchSummary>
    where
        F: FnMut(FetchProgress),
    {
        let mut summary = FetchSummary::default();
        if keys.is_empty() {
            return Ok(summary);
        }

        let batches: Vec<&[String]> = keys.chunks(self.config.batch_size).collect();
        let batches_total = batches.len();
        let mut settled = 0;

        for (batch_idx, batch) in batches.into_iter().enumerate() {
            self.fetch_batch(batch, cache, &mut summary)?;
            settled += batch.len();

            progress_fn(FetchProgress {
                total: keys.len(),
                settled,
                batches_done: batch_idx + 1,
                batches_total,
            });
        }

        Ok(summary)
    }

    /// Run one batch through the bounded retry loop and persist outcomes.
    fn fetch_batch(
        &self,
        batch: &[String],
        cache: &ResultCache,
        summary: &mut FetchSummary,
    ) -> Result<()> {
        for attempt in 1..=self.config.max_retries {
            summary.attempts += 1;
            match self.db.search_and_fetch(batch) {
                Ok(outcome) => {
                    for key in batch {
                        match outcome.get(key) {
                            Some(KeyLookup::Found(records)) => {
                                cache.put_fetched(key, records)?;
                                summary.fetched += 1;
                            }
                            // A well-behaved backend answers every key; a
                            // missing one is indistinguishable from absent.
                            Some(KeyLookup::NotFound) | None => {
                                cache.put_failed(key, REASON_NOT_FOUND)?;
                                summary.not_found += 1;
                            }
                        }
                    }
                    return Ok(());
                }
                Err(err) => {
                    warn!(
                        "batch of {} keys failed attempt {}/{}: {}",
                        batch.len(),
                        attempt,
                        self.config.max_retries,
                        err
                    );
                    if attempt < self.config.max_retries {
                        std::thread::sleep(self.config.retry_delay);
                    }
                }
            }
        }

        // Retry budget exhausted: terminal for this batch, non-fatal for
        // the run.
        for key in batch {
            cache.put_failed(key, REASON_EXHAUSTED)?;
            summary.exhausted += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStatus;
    use crate::db::{CdsFeature, MockDatabase, SequenceRecord};

    fn record(accession: &str, seq: &str) -> SequenceRecord {
        SequenceRecord {
            accession: accession.to_string(),
            sequence: seq.to_string(),
            cds: vec![CdsFeature::spanning(seq.len())],
        }
    }

    fn fast_config() -> FetchConfig {
        FetchConfig::new()
            .batch_size(2)
            .max_retries(3)
            .retry_delay(Duration::from_millis(0))
    }

    #[test]
    fn test_fetch_config_defaults() {
        let config = FetchConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_retries, 10);
    }

    #[test]
    fn test_fetch_config_builder_clamps_to_one() {
        let config = FetchConfig::new().batch_size(0).max_retries(0);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn test_fetch_writes_found_and_not_found() {
        let mut db = MockDatabase::new();
        db.add_record("a", record("NM_1.1", "ATGTAA"));
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::with_config(&db, fast_config());

        let keys = vec!["a".to_string(), "ghost".to_string()];
        let summary = fetcher.fetch(&keys, &cache).unwrap();

        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.not_found, 1);
        assert_eq!(summary.exhausted, 0);

        let entry = cache.get("a").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Fetched);
        let entry = cache.get("ghost").unwrap().unwrap();
        assert_eq!(entry.reason.as_deref(), Some(REASON_NOT_FOUND));
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let mut db = MockDatabase::new();
        db.add_record("a", record("NM_1.1", "ATGTAA"));
        db.fail_next_attempts(2);
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::with_config(&db, fast_config());

        let keys = vec!["a".to_string()];
        let summary = fetcher.fetch(&keys, &cache).unwrap();

        assert_eq!(summary.fetched, 1);
        assert_eq!(summary.attempts, 3);
    }

    #[test]
    fn test_exhausted_retries_mark_batch_failed() {
        let mut db = MockDatabase::new();
        db.add_record("a", record("NM_1.1", "ATGTAA"));
        db.fail_next_attempts(99);
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::with_config(&db, fast_config());

        let keys = vec!["a".to_string()];
        let summary = fetcher.fetch(&keys, &cache).unwrap();

        assert_eq!(summary.exhausted, 1);
        assert_eq!(summary.attempts, 3);
        let entry = cache.get("a").unwrap().unwrap();
        assert_eq!(entry.status, CacheStatus::Failed);
        assert_eq!(entry.reason.as_deref(), Some(REASON_EXHAUSTED));
    }

    #[test]
    fn test_failed_batch_does_not_stop_later_batches() {
        let mut db = MockDatabase::new();
        db.add_record("a", record("NM_1.1", "ATGTAA"));
        db.add_record("b", record("NM_2.1", "ATGTAA"));
        db.add_record("c", record("NM_3.1", "ATGTAA"));
        // batch_size 2: first batch [a, b] burns all three attempts, the
        // second batch [c] succeeds.
        db.fail_next_attempts(3);
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::with_config(&db, fast_config());

        let keys: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let summary = fetcher.fetch(&keys, &cache).unwrap();

        assert_eq!(summary.exhausted, 2);
        assert_eq!(summary.fetched, 1);
        assert_eq!(
            cache.get("c").unwrap().unwrap().status,
            CacheStatus::Fetched
        );
    }

    #[test]
    fn test_progress_callback_per_batch() {
        let mut db = MockDatabase::new();
        for key in ["a", "b", "c"] {
            db.add_record(key, record(&format!("NM_{}.1", key), "ATGTAA"));
        }
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::with_config(&db, fast_config());

        let keys: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let mut seen = Vec::new();
        fetcher
            .fetch_with_progress(&keys, &cache, |p| seen.push((p.settled, p.batches_done)))
            .unwrap();

        assert_eq!(seen, vec![(2, 1), (3, 2)]);
    }

    #[test]
    fn test_empty_key_set_is_noop() {
        let db = MockDatabase::new();
        let cache = ResultCache::open_in_memory().unwrap();
        let fetcher = BatchFetcher::new(&db);

        let summary = fetcher.fetch(&[], &cache).unwrap();
        assert_eq!(summary, FetchSummary::default());
        assert_eq!(db.call_count(), 0);
    }
}
