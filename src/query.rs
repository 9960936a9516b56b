//! Query classification for FASTA headers
//!
//! Every input protein carries a search key for the remote nucleotide
//! database somewhere in its header. NCBI records put a protein accession
//! in the first token; UniProt records carry the originating gene name as
//! a `GN=` field in the description. A single input file may mix both, so
//! the scheme is guessed per record rather than fixed per run.
//!
//! Classification is pure and total over well-formed headers: ambiguous
//! headers degrade to a best-effort scheme, and only an empty header is an
//! error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CdsError;
use crate::fasta::FastaRecord;

/// NCBI protein accession: short alphabetic prefix, optional underscore,
/// digits, optional version (e.g. `XP_745952.1`, `CAA71118.1`).
static RE_NCBI_ACCESSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z]{1,4}_?\d+(\.\d+)?$").expect("valid regex"));

/// UniProt gene name field, e.g. `GN=abc1` in the description.
static RE_UNIPROT_GN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"GN=(\S+)").expect("valid regex"));

/// Stockholm-style sub-region suffix, e.g. `P12345/10-40`.
static RE_STOCKHOLM_REGION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<id>.+)/(?P<start>\d+)-(?P<stop>\d+)$").expect("valid regex"));

/// Identifier scheme detected in a FASTA header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scheme {
    /// NCBI protein accession in the first header token
    Ncbi,
    /// UniProt entry; key is the `GN=` gene name (or accession fallback)
    Uniprot,
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Ncbi => write!(f, "ncbi"),
            Scheme::Uniprot => write!(f, "uniprot"),
        }
    }
}

/// A 1-based, inclusive amino-acid sub-region of a protein (Stockholm
/// `/start-stop` convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start: usize,
    pub stop: usize,
}

impl Region {
    /// Number of residues covered by the region.
    pub fn residues(&self) -> usize {
        self.stop - self.start + 1
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.stop)
    }
}

/// A classified query, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Identifier token as it appeared in the header (region suffix intact)
    pub raw: String,
    /// Normalized database search key; `None` when no usable key was found
    /// (e.g. UniProt record without `GN=` and fallback disabled)
    pub key: Option<String>,
    /// Detected identifier scheme
    pub scheme: Scheme,
    /// Sub-region of the protein this record covers, if any
    pub region: Option<Region>,
}

/// Options controlling header classification.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyOptions {
    /// Prefer UniProt interpretation even when the first token looks like
    /// an NCBI accession
    pub uniprot: bool,
    /// Parse Stockholm `/start-stop` suffixes into a sub-region
    pub stockholm: bool,
    /// When a UniProt record has no `GN=` field, fall back to the bare
    /// accession as the search key. A deliberate heuristic: gene-name
    /// mapping via the accession is imprecise, but it recovers records
    /// that would otherwise be skipped outright.
    pub uniprot_accession_fallback: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            uniprot: false,
            stockholm: false,
            uniprot_accession_fallback: true,
        }
    }
}

/// Classify a FASTA header into a [`Query`].
///
/// `header` is the full header line without the leading `>`. The first
/// whitespace-delimited token is the identifier; the remainder is the
/// description.
///
/// # Errors
///
/// Returns [`CdsError::Classification`] only when the header is empty.
/// Ambiguous-but-parsable headers never fail.
pub fn classify(header: &str, options: &ClassifyOptions) -> Result<Query, CdsError> {
    let header = header.trim();
    if header.is_empty() {
        return Err(CdsError::classification("empty header"));
    }

    let (id_token, description) = match header.split_once(char::is_whitespace) {
        Some((id, rest)) => (id, rest.trim()),
        None => (header, ""),
    };

    let (bare_id, region) = split_region(id_token, options.stockholm);

    // NCBI first unless the caller says otherwise; anything that fails the
    // accession pattern falls through to the UniProt heuristics.
    if !options.uniprot && RE_NCBI_ACCESSION.is_match(bare_id) {
        return Ok(Query {
            raw: id_token.to_string(),
            key: Some(bare_id.to_string()),
            scheme: Scheme::Ncbi,
            region,
        });
    }

    let key = match RE_UNIPROT_GN.captures(description) {
        Some(caps) => Some(caps[1].to_string()),
        None if options.uniprot_accession_fallback => Some(uniprot_accession(bare_id)),
        None => None,
    };

    Ok(Query {
        raw: id_token.to_string(),
        key,
        scheme: Scheme::Uniprot,
        region,
    })
}

/// Split a Stockholm `/start-stop` suffix off an identifier token.
///
/// The suffix is recorded only when parsing is enabled and `stop >= start`;
/// a malformed suffix leaves the token untouched.
fn split_region(id_token: &str, stockholm: bool) -> (&str, Option<Region>) {
    if !stockholm {
        return (id_token, None);
    }

    if let Some(caps) = RE_STOCKHOLM_REGION.captures(id_token) {
        let start: usize = caps["start"].parse().unwrap_or(0);
        let stop: usize = caps["stop"].parse().unwrap_or(0);
        if start >= 1 && stop >= start {
            let id = caps.name("id").map(|m| m.as_str()).unwrap_or(id_token);
            return (id, Some(Region { start, stop }));
        }
    }

    (id_token, None)
}

/// Extract the accession from a UniProt-style identifier token.
///
/// UniProt FASTA ids look like `sp|P12345|NAME_SPECIES`; the middle field
/// is the accession. Tokens without `|` separators are used as-is.
fn uniprot_accession(id_token: &str) -> String {
    let mut fields = id_token.split('|');
    match (fields.next(), fields.next()) {
        (Some(_), Some(acc)) if !acc.is_empty() => acc.to_string(),
        _ => id_token.to_string(),
    }
}

/// An input protein with its classified query attached. Created once per
/// FASTA entry and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinRecord {
    /// FASTA identifier (first header token, region suffix intact)
    pub id: String,
    /// Remainder of the header line
    pub description: String,
    /// Amino-acid sequence as read (may contain alignment gaps)
    pub sequence: String,
    /// Classified query for this record
    pub query: Query,
}

impl ProteinRecord {
    /// Build a protein record from a parsed FASTA entry.
    pub fn from_fasta(record: &FastaRecord, options: &ClassifyOptions) -> Result<Self, CdsError> {
        let header = if record.description.is_empty() {
            record.id.clone()
        } else {
            format!("{} {}", record.id, record.description)
        };
        let query = classify(&header, options)?;

        Ok(Self {
            id: record.id.clone(),
            description: record.description.clone(),
            sequence: record.sequence.clone(),
            query,
        })
    }

    /// Amino-acid sequence with alignment gap characters removed.
    pub fn residues(&self) -> String {
        self.sequence
            .chars()
            .filter(|c| *c != '-' && *c != '.')
            .collect()
    }
}
