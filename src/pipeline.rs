//! End-to-end resolution pipeline
//!
//! Ties the stages together: collect query keys from the classified input,
//! settle the pending ones through the batch fetcher, then resolve every
//! protein against the cache. Output order always equals input order, and
//! every input appears exactly once, matched or skipped.
//!
//! The fetch stage operates on deduplicated keys; isoforms sharing a key
//! are fetched once and resolved independently.

use log::info;

use crate::cache::ResultCache;
use crate::db::SequenceDatabase;
use crate::error::CdsError;
use crate::fetch::{BatchFetcher, FetchConfig, FetchProgress, FetchSummary};
use crate::query::ProteinRecord;
use crate::resolve::{
    MatchQuality, ResolutionResult, ResolutionStatus, Resolver, ResolverConfig, SkipReason,
};
use crate::Result;

/// Configuration for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub resolve: ResolverConfig,
}

/// Aggregate counts over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input proteins processed
    pub total: usize,
    /// Proteins with a selected CDS
    pub matched: usize,
    /// Proteins skipped with a reason
    pub skipped: usize,
    /// Matches accepted through the sole-CDS fallback; subset of `matched`
    pub fallback_matches: usize,
}

/// Everything produced by one pipeline run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Per-protein results, in input order
    pub results: Vec<ResolutionResult>,
    /// Aggregate counts
    pub summary: RunSummary,
    /// What the fetch stage did (all zeros on a fully cached rerun)
    pub fetch: FetchSummary,
}

impl RunOutcome {
    /// Matched results, in input order.
    pub fn matched(&self) -> impl Iterator<Item = &ResolutionResult> {
        self.results.iter().filter(|r| r.is_matched())
    }

    /// Skipped results, in input order.
    pub fn skipped(&self) -> impl Iterator<Item = &ResolutionResult> {
        self.results.iter().filter(|r| !r.is_matched())
    }
}

/// The protein-to-CDS resolution pipeline.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline over classified input proteins.
    ///
    /// Fetches only keys not already settled in `cache`, then resolves
    /// every protein. Data-quality problems become skipped results; only
    /// infrastructure failures (cache store I/O) propagate as errors.
    pub fn run<D: SequenceDatabase>(
        &self,
        proteins: &[ProteinRecord],
        db: &D,
        cache: &ResultCache,
    ) -> Result<RunOutcome> {
        self.run_with_progress(proteins, db, cache, |_| {})
    }

    /// Run with a progress callback invoked after each fetch batch.
    pub fn run_with_progress<D, F>(
        &self,
        proteins: &[ProteinRecord],
        db: &D,
        cache: &ResultCache,
        progress_fn: F,
    ) -> Result<RunOutcome>
    where
        D: SequenceDatabase,
        F: FnMut(FetchProgress),
    {
        let keys: Vec<String> = proteins
            .iter()
            .filter_map(|p| p.query.key.clone())
            .collect();
        let pending = cache.pending_keys(&keys)?;
        info!(
            "{} protein(s), {} unique key(s) pending fetch",
            proteins.len(),
            pending.len()
        );

        let fetcher = BatchFetcher::with_config(db, self.config.fetch.clone());
        let fetch = fetcher.fetch_with_progress(&pending, cache, progress_fn)?;

        let resolver = Resolver::with_config(self.config.resolve);
        let mut results = Vec::with_capacity(proteins.len());
        let mut summary = RunSummary {
            total: proteins.len(),
            ..RunSummary::default()
        };

        for protein in proteins {
            let result = match &protein.query.key {
                None => ResolutionResult {
                    protein: protein.clone(),
                    cds: None,
                    status: ResolutionStatus::Skipped,
                    reason: Some(SkipReason::NoQueryTerm),
                },
                Some(key) => {
                    // Every collected key was settled above; a pending key
                    // here is a bug, not a data problem.
                    let entry = cache
                        .get(key)?
                        .ok_or_else(|| CdsError::UnresolvedKey { key: key.clone() })?;
                    resolver.resolve(protein, &entry)
                }
            };

            if result.is_matched() {
                summary.matched += 1;
                if result
                    .cds
                    .as_ref()
                    .is_some_and(|c| c.quality == MatchQuality::SoleCandidateFallback)
                {
                    summary.fallback_matches += 1;
                }
            } else {
                summary.skipped += 1;
            }
            results.push(result);
        }

        info!(
            "run complete: {} matched ({} via sole-CDS fallback), {} skipped",
            summary.matched, summary.fallback_matches, summary.skipped
        );

        Ok(RunOutcome {
            results,
            summary,
            fetch,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
