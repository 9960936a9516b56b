//! Remote sequence database collaborators
//!
//! The pipeline core talks to one abstract interface,
//! [`SequenceDatabase`]. Implementations include:
//! - [`MockDatabase`] for testing
//! - [`EntrezDatabase`] for NCBI E-utilities (behind the `entrez` feature)
//!
//! Backend-specific query syntax is the implementation's concern; the core
//! only hands over normalized keys and receives records or typed failures.

pub mod mock;

#[cfg(feature = "entrez")]
pub mod entrez;

pub use mock::MockDatabase;

#[cfg(feature = "entrez")]
pub use entrez::EntrezDatabase;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One coding-region annotation on a nucleotide record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdsFeature {
    /// 0-based start of the coding region on the record sequence
    pub start: usize,
    /// 0-based exclusive end of the coding region
    pub end: usize,
    /// Protein accession this CDS is annotated with, if any
    pub protein_id: Option<String>,
    /// False when the record declares a partial or ambiguous boundary
    pub complete: bool,
}

impl CdsFeature {
    /// A complete CDS spanning a whole sequence of `len` nucleotides.
    pub fn spanning(len: usize) -> Self {
        Self {
            start: 0,
            end: len,
            protein_id: None,
            complete: true,
        }
    }
}

/// A nucleotide record as returned by the remote database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    /// Nucleotide accession
    pub accession: String,
    /// Full nucleotide sequence of the record
    pub sequence: String,
    /// Annotated coding regions
    pub cds: Vec<CdsFeature>,
}

/// Per-key answer from a database lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyLookup {
    /// Records were found for this key
    Found(Vec<SequenceRecord>),
    /// The database has no record for this key; this is terminal, not a
    /// retry condition
    NotFound,
}

/// A transient database failure (network, timeout, rate limit). The whole
/// batch attempt failed and may be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransientError {
    pub msg: String,
}

impl TransientError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl std::fmt::Display for TransientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg)
    }
}

impl std::error::Error for TransientError {}

/// Interface to a remote sequence database.
///
/// Each attempt must be bounded by a timeout internally; an unresponsive
/// backend fails the attempt with a [`TransientError`] rather than hanging
/// the caller.
pub trait SequenceDatabase {
    /// Map each query key to the nucleotide accessions matching it.
    /// Keys with no match map to an empty list.
    fn search(&self, keys: &[String]) -> Result<HashMap<String, Vec<String>>, TransientError>;

    /// Fetch full records for the given nucleotide accessions.
    fn fetch_records(
        &self,
        accessions: &[String],
    ) -> Result<HashMap<String, SequenceRecord>, TransientError>;

    /// Search and fetch in one step, keeping per-key outcomes separate.
    ///
    /// The default implementation composes `search` and `fetch_records`.
    /// An `Err` means the whole attempt failed transiently; a per-key
    /// [`KeyLookup::NotFound`] means the database answered and had nothing.
    fn search_and_fetch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, KeyLookup>, TransientError> {
        let matches = self.search(keys)?;

        let mut wanted: Vec<String> = Vec::new();
        for accessions in matches.values() {
            for acc in accessions {
                if !wanted.contains(acc) {
                    wanted.push(acc.clone());
                }
            }
        }
        let records = self.fetch_records(&wanted)?;

        let mut outcome = HashMap::with_capacity(keys.len());
        for key in keys {
            let found: Vec<SequenceRecord> = matches
                .get(key)
                .map(|accessions| {
                    accessions
                        .iter()
                        .filter_map(|acc| records.get(acc).cloned())
                        .collect()
                })
                .unwrap_or_default();

            if found.is_empty() {
                outcome.insert(key.clone(), KeyLookup::NotFound);
            } else {
                outcome.insert(key.clone(), KeyLookup::Found(found));
            }
        }

        Ok(outcome)
    }
}

/// Blanket implementation for boxed trait objects
impl SequenceDatabase for Box<dyn SequenceDatabase> {
    fn search(&self, keys: &[String]) -> Result<HashMap<String, Vec<String>>, TransientError> {
        (**self).search(keys)
    }

    fn fetch_records(
        &self,
        accessions: &[String],
    ) -> Result<HashMap<String, SequenceRecord>, TransientError> {
        (**self).fetch_records(accessions)
    }

    fn search_and_fetch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, KeyLookup>, TransientError> {
        (**self).search_and_fetch(keys)
    }
}
