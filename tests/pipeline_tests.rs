//! Integration tests for the full resolution pipeline

use std::io::Cursor;
use std::time::Duration;

use tempfile::TempDir;

use ferro_cds::fasta::read_fasta;
use ferro_cds::query::ProteinRecord;
use ferro_cds::{
    ClassifyOptions, FetchConfig, FetchSummary, MatchQuality, MockDatabase, Pipeline,
    PipelineConfig, ResolutionStatus, ResolverConfig, ResultCache, SkipReason,
};
use ferro_cds::db::{CdsFeature, SequenceRecord};

fn record(accession: &str, seq: &str) -> SequenceRecord {
    SequenceRecord {
        accession: accession.to_string(),
        sequence: seq.to_string(),
        cds: vec![CdsFeature::spanning(seq.len())],
    }
}

fn proteins_from(fasta: &str, options: &ClassifyOptions) -> Vec<ProteinRecord> {
    read_fasta(Cursor::new(fasta))
        .unwrap()
        .iter()
        .map(|r| ProteinRecord::from_fasta(r, options).unwrap())
        .collect()
}

fn pipeline() -> Pipeline {
    Pipeline::new(PipelineConfig {
        fetch: FetchConfig::new()
            .batch_size(2)
            .max_retries(3)
            .retry_delay(Duration::from_millis(0)),
        resolve: ResolverConfig::default(),
    })
}

#[test]
fn test_full_run_from_fasta_input() {
    // 101-residue protein backed by a 303 nt CDS
    let aa = format!("M{}", "A".repeat(100));
    let nt = format!("ATG{}", "GCT".repeat(100));

    let fasta = format!(
        ">XP_1.1 hypothetical protein\n{}\n>XP_9.9 unknown protein\nMKV\n",
        aa
    );
    let proteins = proteins_from(&fasta, &ClassifyOptions::default());

    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", &nt));
    let cache = ResultCache::open_in_memory().unwrap();

    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    assert_eq!(outcome.summary.total, 2);
    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.skipped, 1);

    let matched = &outcome.results[0];
    assert_eq!(matched.status, ResolutionStatus::Matched);
    let cds = matched.cds.as_ref().unwrap();
    assert_eq!(cds.nucleotide.len(), 303);
    assert_eq!(cds.accession, "NM_1.1");
    assert_eq!(cds.quality, MatchQuality::Validated);

    let skipped = &outcome.results[1];
    assert_eq!(skipped.reason, Some(SkipReason::NotFound));
}

#[test]
fn test_stockholm_region_end_to_end() {
    // Gene-name query with a /10-40 sub-region: 31 residues, 93 nt
    let opts = ClassifyOptions {
        uniprot: true,
        stockholm: true,
        ..ClassifyOptions::default()
    };
    let fasta = format!(
        ">sp|P1|NAME/10-40 protein GN=abc1\n{}\n",
        "A".repeat(31)
    );
    let proteins = proteins_from(&fasta, &opts);
    assert_eq!(proteins[0].query.key.as_deref(), Some("abc1"));

    let mut db = MockDatabase::new();
    db.add_record("abc1", record("NM_1.1", &format!("ATG{}", "GCT".repeat(49))));
    let cache = ResultCache::open_in_memory().unwrap();

    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();
    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.results[0].cds.as_ref().unwrap().nucleotide.len(), 93);
}

#[test]
fn test_rerun_against_kept_cache_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("run.db");

    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    db.add_record("XP_2.1", record("NM_2.1", "ATGGCTTGG"));

    let fasta = ">XP_1.1\nMKV\n>XP_2.1\nMAW\n>XP_9.9\nMKV\n";
    let proteins = proteins_from(fasta, &ClassifyOptions::default());

    let first = {
        let cache = ResultCache::open(&cache_path).unwrap();
        pipeline().run(&proteins, &db, &cache).unwrap()
    };
    assert_eq!(first.fetch.fetched, 2);
    assert_eq!(first.fetch.not_found, 1);
    let calls = db.call_count();

    // Second run over the same store fetches nothing and produces the
    // same partition.
    let second = {
        let cache = ResultCache::open(&cache_path).unwrap();
        pipeline().run(&proteins, &db, &cache).unwrap()
    };
    assert_eq!(second.fetch, FetchSummary::default());
    assert_eq!(db.call_count(), calls);
    assert_eq!(second.summary.matched, first.summary.matched);
    assert_eq!(second.summary.skipped, first.summary.skipped);
}

#[test]
fn test_interrupted_run_resumes_from_settled_keys() {
    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("run.db");

    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    db.add_record("XP_2.1", record("NM_2.1", "ATGGCTTGG"));

    // Simulate an interrupted first run: only XP_1.1 got settled.
    {
        let cache = ResultCache::open(&cache_path).unwrap();
        cache
            .put_fetched("XP_1.1", &[record("NM_1.1", "ATGAAAGTT")])
            .unwrap();
    }

    let fasta = ">XP_1.1\nMKV\n>XP_2.1\nMAW\n";
    let proteins = proteins_from(fasta, &ClassifyOptions::default());
    let cache = ResultCache::open(&cache_path).unwrap();
    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    // Only the unsettled key hits the network.
    assert_eq!(outcome.fetch.fetched, 1);
    assert_eq!(outcome.summary.matched, 2);
}

#[test]
fn test_transient_failures_recover_within_budget() {
    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    db.fail_next_attempts(2);
    let cache = ResultCache::open_in_memory().unwrap();

    let proteins = proteins_from(">XP_1.1\nMKV\n", &ClassifyOptions::default());
    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.fetch.attempts, 3);
}

#[test]
fn test_exhausted_batch_skips_only_its_keys() {
    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    db.add_record("XP_2.1", record("NM_2.1", "ATGAAAGTT"));
    db.add_record("XP_3.1", record("NM_3.1", "ATGAAAGTT"));
    // batch_size 2: the first batch burns all three attempts, the second
    // succeeds.
    db.fail_next_attempts(3);
    let cache = ResultCache::open_in_memory().unwrap();

    let fasta = ">XP_1.1\nMKV\n>XP_2.1\nMKV\n>XP_3.1\nMKV\n";
    let proteins = proteins_from(fasta, &ClassifyOptions::default());
    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    assert_eq!(outcome.results[0].reason, Some(SkipReason::FetchExhausted));
    assert_eq!(outcome.results[1].reason, Some(SkipReason::FetchExhausted));
    assert_eq!(outcome.results[2].status, ResolutionStatus::Matched);
}

#[test]
fn test_mixed_origin_input_classified_per_record() {
    let fasta = "\
>XP_1.1 hypothetical protein
MKV
>tr|A0A024|A0A024_HUMAN Protein OS=Homo sapiens GN=abc1
MAW
";
    let proteins = proteins_from(fasta, &ClassifyOptions::default());

    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    db.add_record("abc1", record("NM_2.1", "ATGGCTTGG"));
    let cache = ResultCache::open_in_memory().unwrap();

    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();
    assert_eq!(outcome.summary.matched, 2);
}

#[test]
fn test_sole_candidate_fallback_is_counted() {
    let mut db = MockDatabase::new();
    db.add_record("XP_1.1", record("NM_1.1", "ATGAAAGTT"));
    let cache = ResultCache::open_in_memory().unwrap();

    // Sequence disagrees with the sole CDS; the fallback accepts it
    // anyway and the summary exposes the count.
    let proteins = proteins_from(">XP_1.1\nMWWW\n", &ClassifyOptions::default());
    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    assert_eq!(outcome.summary.matched, 1);
    assert_eq!(outcome.summary.fallback_matches, 1);
    assert_eq!(
        outcome.results[0].cds.as_ref().unwrap().quality,
        MatchQuality::SoleCandidateFallback
    );
}

#[test]
fn test_output_partition_is_exhaustive_and_ordered() {
    let mut db = MockDatabase::new();
    db.add_record("XP_2.1", record("NM_2.1", "ATGAAAGTT"));
    let cache = ResultCache::open_in_memory().unwrap();

    let fasta = ">XP_1.1\nMKV\n>XP_2.1\nMKV\n>XP_3.1\nMKV\n";
    let proteins = proteins_from(fasta, &ClassifyOptions::default());
    let outcome = pipeline().run(&proteins, &db, &cache).unwrap();

    let matched: Vec<&str> = outcome.matched().map(|r| r.protein.id.as_str()).collect();
    let skipped: Vec<&str> = outcome.skipped().map(|r| r.protein.id.as_str()).collect();
    assert_eq!(matched, vec!["XP_2.1"]);
    assert_eq!(skipped, vec!["XP_1.1", "XP_3.1"]);
    assert_eq!(matched.len() + skipped.len(), outcome.results.len());
}
