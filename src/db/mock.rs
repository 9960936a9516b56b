//! Mock sequence database for testing
//!
//! Serves scripted records from memory, counts every call, and can be told
//! to fail transiently for a while, so retry budgets and cache idempotence
//! are observable in tests.

use std::cell::Cell;
use std::collections::HashMap;

use crate::db::{SequenceDatabase, SequenceRecord, TransientError};
use crate::db::{CdsFeature, KeyLookup};

/// Mock database holding records keyed by query term.
#[derive(Debug, Default)]
pub struct MockDatabase {
    /// Records served per query key
    records: HashMap<String, Vec<SequenceRecord>>,
    /// Number of search_and_fetch calls made so far
    calls: Cell<usize>,
    /// Fail this many attempts transiently before succeeding
    fail_first: Cell<usize>,
}

impl MockDatabase {
    /// Create an empty mock database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record served for `key`.
    pub fn add_record(&mut self, key: impl Into<String>, record: SequenceRecord) {
        self.records.entry(key.into()).or_default().push(record);
    }

    /// Make the next `n` attempts fail with a transient error.
    pub fn fail_next_attempts(&self, n: usize) {
        self.fail_first.set(n);
    }

    /// Number of search/fetch attempts made against this database.
    pub fn call_count(&self) -> usize {
        self.calls.get()
    }

    /// A database with a few records useful in doctests and unit tests.
    ///
    /// `XP_000001.1` maps to a single 9 nt CDS translating to `MKV`.
    pub fn with_test_data() -> Self {
        let mut db = Self::new();
        db.add_record(
            "XP_000001.1",
            SequenceRecord {
                accession: "NM_000001.1".to_string(),
                sequence: "ATGAAAGTT".to_string(),
                cds: vec![CdsFeature {
                    start: 0,
                    end: 9,
                    protein_id: Some("XP_000001.1".to_string()),
                    complete: true,
                }],
            },
        );
        db
    }

    fn maybe_fail(&self) -> Result<(), TransientError> {
        let remaining = self.fail_first.get();
        if remaining > 0 {
            self.fail_first.set(remaining - 1);
            return Err(TransientError::new("simulated network failure"));
        }
        Ok(())
    }
}

impl SequenceDatabase for MockDatabase {
    fn search(&self, keys: &[String]) -> Result<HashMap<String, Vec<String>>, TransientError> {
        self.maybe_fail()?;
        let mut out = HashMap::new();
        for key in keys {
            let accessions = self
                .records
                .get(key)
                .map(|records| records.iter().map(|r| r.accession.clone()).collect())
                .unwrap_or_default();
            out.insert(key.clone(), accessions);
        }
        Ok(out)
    }

    fn fetch_records(
        &self,
        accessions: &[String],
    ) -> Result<HashMap<String, SequenceRecord>, TransientError> {
        self.maybe_fail()?;
        let mut out = HashMap::new();
        for records in self.records.values() {
            for record in records {
                if accessions.contains(&record.accession) {
                    out.insert(record.accession.clone(), record.clone());
                }
            }
        }
        Ok(out)
    }

    fn search_and_fetch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, KeyLookup>, TransientError> {
        self.calls.set(self.calls.get() + 1);
        self.maybe_fail()?;

        let mut outcome = HashMap::with_capacity(keys.len());
        for key in keys {
            match self.records.get(key) {
                Some(records) if !records.is_empty() => {
                    outcome.insert(key.clone(), KeyLookup::Found(records.clone()));
                }
                _ => {
                    outcome.insert(key.clone(), KeyLookup::NotFound);
                }
            }
        }
        Ok(outcome)
    }
}
