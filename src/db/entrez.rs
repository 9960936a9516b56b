//! NCBI E-utilities backend
//!
//! Implements [`SequenceDatabase`] against the Entrez E-utilities HTTP
//! API: `esearch` maps query terms to nucleotide accessions, `efetch`
//! with `rettype=fasta_cds_na` returns the annotated coding sequences of
//! those records.
//!
//! Every request is bounded by a timeout and any HTTP or parse failure is
//! reported as a [`TransientError`], leaving retry policy to the caller.
//! NCBI asks unauthenticated clients to stay under 3 requests per second;
//! a short pause between requests keeps us inside that limit.

use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::db::{CdsFeature, SequenceDatabase, SequenceRecord, TransientError};

const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const TOOL_NAME: &str = "ferro-cds";
const REQUEST_PAUSE: Duration = Duration::from_millis(350);

/// Source accession in a `fasta_cds_na` header, e.g. `lcl|NM_000001.1_cds_...`
static RE_CDS_SOURCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"lcl\|(?P<acc>[^_\s]+(?:_[^_\s]+)?)_cds_").expect("valid regex"));

/// Bracketed qualifier in a `fasta_cds_na` header, e.g. `[protein_id=XP_1.1]`
static RE_QUALIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?P<name>[^=\]]+)=(?P<value>[^\]]*)\]").expect("valid regex"));

/// NCBI Entrez nucleotide database client.
pub struct EntrezDatabase {
    agent: ureq::Agent,
    /// Optional API key; raises the NCBI rate limit when present
    api_key: Option<String>,
    /// Contact address sent with every request, as NCBI asks of tools
    email: Option<String>,
}

impl EntrezDatabase {
    /// Create a client with a default request timeout.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Create a client with the given per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            api_key: None,
            email: None,
        }
    }

    /// Attach an NCBI API key to every request.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Attach a contact email address to every request.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    fn get(&self, url: &str) -> Result<String, TransientError> {
        std::thread::sleep(REQUEST_PAUSE);
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| TransientError::new(format!("request failed: {}", e)))?;
        response
            .into_string()
            .map_err(|e| TransientError::new(format!("reading response failed: {}", e)))
    }

    fn with_common_params(&self, mut url: String) -> String {
        url.push_str("&tool=");
        url.push_str(TOOL_NAME);
        if let Some(key) = &self.api_key {
            url.push_str("&api_key=");
            url.push_str(key);
        }
        if let Some(email) = &self.email {
            url.push_str("&email=");
            url.push_str(&urlencode(email));
        }
        url
    }

    /// Resolve one query term to nucleotide accessions via `esearch`.
    fn esearch(&self, term: &str) -> Result<Vec<String>, TransientError> {
        let url = self.with_common_params(format!(
            "{}/esearch.fcgi?db=nuccore&term={}&idtype=acc&retmax=200&retmode=json",
            EUTILS_BASE,
            urlencode(term)
        ));
        let body = self.get(&url)?;

        let parsed: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| TransientError::new(format!("esearch response not JSON: {}", e)))?;
        let idlist = parsed
            .get("esearchresult")
            .and_then(|r| r.get("idlist"))
            .and_then(|l| l.as_array())
            .ok_or_else(|| TransientError::new("esearch response missing idlist"))?;

        let accessions: Vec<String> = idlist
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect();
        debug!("esearch '{}' -> {} accession(s)", term, accessions.len());
        Ok(accessions)
    }

    /// Fetch coding sequences for accessions via `efetch` with
    /// `rettype=fasta_cds_na`.
    fn efetch_cds(&self, accessions: &[String]) -> Result<String, TransientError> {
        let url = self.with_common_params(format!(
            "{}/efetch.fcgi?db=nuccore&id={}&rettype=fasta_cds_na&retmode=text",
            EUTILS_BASE,
            urlencode(&accessions.join(","))
        ));
        self.get(&url)
    }
}

impl Default for EntrezDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceDatabase for EntrezDatabase {
    fn search(&self, keys: &[String]) -> Result<HashMap<String, Vec<String>>, TransientError> {
        let mut out = HashMap::with_capacity(keys.len());
        for key in keys {
            out.insert(key.clone(), self.esearch(key)?);
        }
        Ok(out)
    }

    fn fetch_records(
        &self,
        accessions: &[String],
    ) -> Result<HashMap<String, SequenceRecord>, TransientError> {
        if accessions.is_empty() {
            return Ok(HashMap::new());
        }
        let body = self.efetch_cds(accessions)?;
        Ok(parse_cds_fasta(&body))
    }
}

/// Parse `fasta_cds_na` output into one [`SequenceRecord`] per source
/// accession.
///
/// Each FASTA entry is one coding sequence; entries from the same source
/// record are concatenated, with a [`CdsFeature`] marking each segment. A
/// `[partial=...]` qualifier or a `<`/`>` in `[location=...]` marks the
/// feature incomplete. Entries whose source accession cannot be parsed are
/// dropped.
fn parse_cds_fasta(body: &str) -> HashMap<String, SequenceRecord> {
    let mut records: HashMap<String, SequenceRecord> = HashMap::new();
    let mut header: Option<String> = None;
    let mut sequence = String::new();

    let finish = |header: &Option<String>, sequence: &str, records: &mut HashMap<String, SequenceRecord>| {
        let Some(header) = header else { return };
        if sequence.is_empty() {
            return;
        }
        let Some(accession) = RE_CDS_SOURCE
            .captures(header)
            .map(|caps| caps["acc"].to_string())
        else {
            debug!("dropping CDS entry with unparsable source: {}", header);
            return;
        };

        let mut protein_id = None;
        let mut complete = true;
        for caps in RE_QUALIFIER.captures_iter(header) {
            match &caps["name"] {
                "protein_id" => protein_id = Some(caps["value"].to_string()),
                "partial" => complete = false,
                "location" => {
                    if caps["value"].contains('<') || caps["value"].contains('>') {
                        complete = false;
                    }
                }
                _ => {}
            }
        }

        let record = records
            .entry(accession.clone())
            .or_insert_with(|| SequenceRecord {
                accession,
                sequence: String::new(),
                cds: Vec::new(),
            });
        let start = record.sequence.len();
        record.sequence.push_str(sequence);
        record.cds.push(CdsFeature {
            start,
            end: record.sequence.len(),
            protein_id,
            complete,
        });
    };

    for line in body.lines() {
        if let Some(rest) = line.strip_prefix('>') {
            finish(&header, &sequence, &mut records);
            header = Some(rest.to_string());
            sequence.clear();
        } else {
            sequence.push_str(line.trim());
        }
    }
    finish(&header, &sequence, &mut records);

    records
}

/// Percent-encode a query component.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b',' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
