//! CDS selection and validation
//!
//! Given a protein and the cached database records for its query key, the
//! resolver picks the minimal complete CDS whose conceptual translation
//! reproduces the protein (or its Stockholm sub-region) exactly.
//!
//! Selection policy, in priority order:
//! 1. enumerate candidate CDS regions from the fetched records
//! 2. keep only candidates with complete coding boundaries
//! 3. trim each candidate to the requested amino-acid sub-region, if any
//! 4. keep candidates whose translation equals the target residues
//! 5. prefer the shortest CDS, then the lexically smallest accession
//! 6. if nothing validates but exactly one CDS existed in total, accept it
//!    as a last-resort match flagged for review (a known source of false
//!    positives)
//!
//! Data-quality problems never raise; they become skipped results with a
//! reason for downstream reporting.

use log::debug;

use crate::cache::{CacheEntry, CacheStatus};
use crate::fetch::{REASON_EXHAUSTED, REASON_NOT_FOUND};
use crate::query::{ProteinRecord, Region};
use crate::translate::CodonTable;

/// A candidate coding sequence derived from one fetched record. Scoped to
/// a single resolution attempt; never persisted.
#[derive(Debug, Clone)]
struct CandidateCds {
    accession: String,
    protein_id: Option<String>,
    /// Full CDS nucleotide sequence (untrimmed)
    nucleotide: String,
    coding_offsets: (usize, usize),
    complete: bool,
}

/// How a match was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchQuality {
    /// Translation validated against the target residues
    Validated,
    /// Sole-CDS fallback: accepted without validation because it was the
    /// only CDS returned for the query
    SoleCandidateFallback,
}

/// The selected coding sequence for a matched protein.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedCds {
    /// Nucleotide accession the CDS came from
    pub accession: String,
    /// Protein accession annotated on the CDS, if any
    pub protein_id: Option<String>,
    /// Nucleotide sequence, trimmed to the sub-region when one was requested
    pub nucleotide: String,
    /// Coding offsets of the full CDS on its source record
    pub coding_offsets: (usize, usize),
    /// How the match was established
    pub quality: MatchQuality,
}

/// Terminal status of one protein's resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStatus {
    Matched,
    Skipped,
}

/// Why a protein was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// No query term could be extracted from the header
    NoQueryTerm,
    /// The remote database has no record for the key
    NotFound,
    /// The fetch retry budget ran out for the key's batch
    FetchExhausted,
    /// Fetch failed with an unrecognized recorded reason
    FetchFailed(String),
    /// The fetched records carried no usable CDS features
    NoCandidates,
    /// No candidate's translation matched the target residues
    TranslationMismatch { candidates: usize },
    /// Two equally ranked candidates with no tie-break winner
    AmbiguousCandidates,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NoQueryTerm => write!(f, "no query term found in header"),
            SkipReason::NotFound => write!(f, "{}", REASON_NOT_FOUND),
            SkipReason::FetchExhausted => write!(f, "{}", REASON_EXHAUSTED),
            SkipReason::FetchFailed(msg) => write!(f, "fetch failed: {}", msg),
            SkipReason::NoCandidates => write!(f, "no CDS candidates in fetched records"),
            SkipReason::TranslationMismatch { candidates } => write!(
                f,
                "translation mismatch for all {} candidate(s)",
                candidates
            ),
            SkipReason::AmbiguousCandidates => {
                write!(f, "multiple equally ranked candidates, no tie-break winner")
            }
        }
    }
}

/// Terminal outcome for one input protein; written once.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    /// The input protein this result belongs to
    pub protein: ProteinRecord,
    /// The selected CDS; present exactly when `status` is `Matched`
    pub cds: Option<MatchedCds>,
    pub status: ResolutionStatus,
    /// Present exactly when `status` is `Skipped`
    pub reason: Option<SkipReason>,
}

impl ResolutionResult {
    /// True when a CDS was selected for this protein.
    pub fn is_matched(&self) -> bool {
        self.status == ResolutionStatus::Matched
    }

    fn matched(protein: &ProteinRecord, cds: MatchedCds) -> Self {
        Self {
            protein: protein.clone(),
            cds: Some(cds),
            status: ResolutionStatus::Matched,
            reason: None,
        }
    }

    fn skipped(protein: &ProteinRecord, reason: SkipReason) -> Self {
        Self {
            protein: protein.clone(),
            cds: None,
            status: ResolutionStatus::Skipped,
            reason: Some(reason),
        }
    }
}

/// Configuration for CDS resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolverConfig {
    /// Translate bacterial alternative initiators (GTG, TTG, CTG) as Met
    pub allow_alternative_start: bool,
}

/// Resolves proteins against cached database records.
pub struct Resolver {
    table: CodonTable,
    config: ResolverConfig,
}

impl Resolver {
    /// Create a resolver with default configuration.
    pub fn new() -> Self {
        Self::with_config(ResolverConfig::default())
    }

    /// Create a resolver with the given configuration.
    pub fn with_config(config: ResolverConfig) -> Self {
        Self {
            table: CodonTable::standard(),
            config,
        }
    }

    /// Resolve one protein against its settled cache entry.
    ///
    /// Never fails for data-quality reasons; every such problem becomes a
    /// skipped result carrying a reason.
    pub fn resolve(&self, protein: &ProteinRecord, entry: &CacheEntry) -> ResolutionResult {
        if entry.status == CacheStatus::Failed {
            let reason = match entry.reason.as_deref() {
                Some(REASON_NOT_FOUND) | None => SkipReason::NotFound,
                Some(REASON_EXHAUSTED) => SkipReason::FetchExhausted,
                Some(other) => SkipReason::FetchFailed(other.to_string()),
            };
            return ResolutionResult::skipped(protein, reason);
        }

        let records = entry.payload.as_deref().unwrap_or(&[]);
        let candidates = enumerate_candidates(records);
        if candidates.is_empty() {
            return ResolutionResult::skipped(protein, SkipReason::NoCandidates);
        }

        let target = protein.residues().to_ascii_uppercase();
        let region = protein.query.region;

        // Validate complete candidates against the target residues.
        let mut validated: Vec<(&CandidateCds, String)> = Vec::new();
        for candidate in candidates.iter().filter(|c| c.complete) {
            let Some(nt) = trimmed_nucleotide(candidate, region) else {
                continue;
            };
            match self.table.translate(&nt, self.config.allow_alternative_start) {
                Ok(translated) if translated == target => validated.push((candidate, nt)),
                Ok(_) | Err(_) => {}
            }
        }

        // Shortest full CDS first, then lexically smallest accession.
        validated.sort_by(|(a, _), (b, _)| {
            a.nucleotide
                .len()
                .cmp(&b.nucleotide.len())
                .then_with(|| a.accession.cmp(&b.accession))
        });

        if validated.len() >= 2 {
            let (first, _) = &validated[0];
            let (second, _) = &validated[1];
            if first.nucleotide.len() == second.nucleotide.len()
                && first.accession == second.accession
            {
                return ResolutionResult::skipped(protein, SkipReason::AmbiguousCandidates);
            }
        }

        if let Some((candidate, nt)) = validated.into_iter().next() {
            return ResolutionResult::matched(
                protein,
                MatchedCds {
                    accession: candidate.accession.clone(),
                    protein_id: candidate.protein_id.clone(),
                    nucleotide: nt,
                    coding_offsets: candidate.coding_offsets,
                    quality: MatchQuality::Validated,
                },
            );
        }

        // Last-resort fallback: a single CDS in total is accepted without
        // validation. Flagged so downstream users can audit it.
        if candidates.len() == 1 {
            let candidate = &candidates[0];
            if let Some(nt) = trimmed_nucleotide(candidate, region) {
                debug!(
                    "accepting sole unvalidated CDS {} for {}",
                    candidate.accession, protein.id
                );
                return ResolutionResult::matched(
                    protein,
                    MatchedCds {
                        accession: candidate.accession.clone(),
                        protein_id: candidate.protein_id.clone(),
                        nucleotide: nt,
                        coding_offsets: candidate.coding_offsets,
                        quality: MatchQuality::SoleCandidateFallback,
                    },
                );
            }
        }

        ResolutionResult::skipped(
            protein,
            SkipReason::TranslationMismatch {
                candidates: candidates.len(),
            },
        )
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive candidate CDS regions from fetched records, dropping features
/// whose offsets fall outside their sequence.
fn enumerate_candidates(records: &[crate::db::SequenceRecord]) -> Vec<CandidateCds> {
    let mut candidates = Vec::new();
    for record in records {
        for feature in &record.cds {
            let Some(nt) = record.sequence.get(feature.start..feature.end) else {
                continue;
            };
            candidates.push(CandidateCds {
                accession: record.accession.clone(),
                protein_id: feature.protein_id.clone(),
                nucleotide: nt.to_string(),
                coding_offsets: (feature.start, feature.end),
                complete: feature.complete,
            });
        }
    }
    candidates
}

/// The candidate nucleotide sequence to validate: the full CDS, or its
/// slice for the requested amino-acid sub-region.
///
/// Amino-acid coordinates map to triplets as `nt_start = 3*(aa_start-1)`,
/// `nt_stop = 3*aa_stop`. Returns `None` when the region falls outside the
/// CDS.
fn trimmed_nucleotide(candidate: &CandidateCds, region: Option<Region>) -> Option<String> {
    match region {
        None => Some(candidate.nucleotide.clone()),
        Some(region) => {
            let nt_start = 3 * (region.start - 1);
            let nt_stop = 3 * region.stop;
            candidate
                .nucleotide
                .get(nt_start..nt_stop)
                .map(str::to_string)
        }
    }
}
