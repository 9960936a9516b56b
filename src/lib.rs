// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-cds: coding sequence retrieval for protein FASTA input
//!
//! Part of the ferro bioinformatics toolkit.
//!
//! Given protein sequences whose headers carry either an NCBI protein
//! accession or a UniProt gene identifier, ferro-cds finds the nucleotide
//! coding sequence (CDS) behind each protein in a remote sequence database,
//! caching every remote answer in a local store so that interrupted or
//! repeated runs never re-download data. A match is only reported when the
//! conceptual translation of the candidate CDS reproduces the input protein
//! exactly (or the `/start-stop` sub-region of it).
//!
//! # Example
//!
//! ```
//! use ferro_cds::{classify, ClassifyOptions, MockDatabase, Pipeline, PipelineConfig, ResultCache};
//! use ferro_cds::fasta::FastaRecord;
//! use ferro_cds::query::ProteinRecord;
//!
//! let record = FastaRecord::new("XP_000001.1", "hypothetical protein", "MKV");
//! let protein = ProteinRecord::from_fasta(&record, &ClassifyOptions::default()).unwrap();
//!
//! let db = MockDatabase::with_test_data();
//! let cache = ResultCache::open_in_memory().unwrap();
//! let pipeline = Pipeline::new(PipelineConfig::default());
//! let outcome = pipeline.run(&[protein], &db, &cache).unwrap();
//! println!("matched {} of {}", outcome.summary.matched, outcome.results.len());
//! ```

pub mod cache;
pub mod db;
pub mod error;
pub mod fasta;
pub mod fetch;
pub mod pipeline;
pub mod query;
pub mod resolve;
pub mod translate;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheStatus, ResultCache};
pub use db::{MockDatabase, SequenceDatabase, SequenceRecord};
pub use error::CdsError;
pub use fetch::{BatchFetcher, FetchConfig, FetchProgress, FetchSummary};
pub use pipeline::{Pipeline, PipelineConfig, RunOutcome, RunSummary};
pub use query::{classify, ClassifyOptions, Query, Region, Scheme};
pub use resolve::{
    MatchQuality, MatchedCds, ResolutionResult, ResolutionStatus, Resolver, ResolverConfig,
    SkipReason,
};

#[cfg(feature = "entrez")]
pub use db::EntrezDatabase;

/// Result type alias for ferro-cds operations
pub type Result<T> = std::result::Result<T, CdsError>;
