// Copyright (c) 2024-2025 Fulcrum Genomics LLC
// SPDX-License-Identifier: MIT

//! ferro-cds CLI
//!
//! Command-line interface for resolving the coding sequences behind a
//! protein FASTA file via NCBI Entrez.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, LevelFilter};

use ferro_cds::fasta::{read_fasta, write_fasta, FastaRecord};
use ferro_cds::query::ProteinRecord;
use ferro_cds::{
    ClassifyOptions, EntrezDatabase, FetchConfig, MatchQuality, Pipeline, PipelineConfig,
    ResolverConfig, ResultCache, RunOutcome,
};

#[derive(Parser)]
#[command(name = "ferro-cds")]
#[command(author, version, about = "Find the CDS behind each protein in a FASTA file")]
#[command(
    long_about = "Find the nucleotide coding sequence behind each protein in a FASTA file.

Headers carrying an NCBI protein accession or a UniProt GN= gene name are
classified per record, queried against NCBI Entrez in batches, and each
candidate CDS is validated by conceptual translation before being reported.
Remote answers are cached locally so interrupted or repeated runs never
re-download data.

Examples:
  ferro-cds proteins.fasta results/
  ferro-cds --uniprot --stockholm alignment.fasta results/
  ferro-cds --keepcache -c myrun proteins.fasta results/"
)]
struct Cli {
    /// Input protein FASTA file
    input: PathBuf,

    /// Output directory
    outdir: PathBuf,

    /// Treat headers as UniProt even when they look like NCBI accessions
    #[arg(short, long)]
    uniprot: bool,

    /// Parse Stockholm /start-stop suffixes into sub-regions
    #[arg(short, long)]
    stockholm: bool,

    /// Directory for the download cache
    #[arg(short = 'd', long, default_value = ".ferro_cds_cache")]
    cachedir: PathBuf,

    /// Cache file stem; reuse a previous stem with --keepcache to resume
    #[arg(short = 'c', long)]
    cachestem: Option<String>,

    /// Keep the download cache after the run
    #[arg(long)]
    keepcache: bool,

    /// Number of queries per Entrez batch
    #[arg(short = 'b', long, default_value_t = 100)]
    batchsize: usize,

    /// Maximum download attempts per batch
    #[arg(short = 'r', long, default_value_t = 10)]
    retries: usize,

    /// Process at most this many input sequences
    #[arg(long)]
    limit: Option<usize>,

    /// Stem for output FASTA files
    #[arg(long, default_value = "ferro_cds")]
    filestem: String,

    /// File name for skipped input sequences (written to the output dir)
    #[arg(long, default_value = "skipped.fasta")]
    skippedfile: String,

    /// Write the log to this file as well
    #[arg(short = 'l', long)]
    logfile: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Accept bacterial alternative start codons (GTG, TTG, CTG) as Met
    #[arg(long)]
    allow_alternative_start_codon: bool,

    /// Contact email address sent with every NCBI request
    #[arg(short = 'e', long)]
    email: Option<String>,

    /// Use the input protein ID in nucleotide output headers instead of
    /// the coding record accession
    #[arg(long)]
    use_protein_ids: bool,

    /// NCBI API key (raises the Entrez rate limit)
    #[arg(long, env = "NCBI_API_KEY")]
    api_key: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.logfile.as_deref())?;

    fs::create_dir_all(&cli.outdir)?;
    fs::create_dir_all(&cli.cachedir)?;

    // Load and classify input
    let options = ClassifyOptions {
        uniprot: cli.uniprot,
        stockholm: cli.stockholm,
        ..ClassifyOptions::default()
    };
    let reader = BufReader::new(File::open(&cli.input)?);
    let mut records = read_fasta(reader)?;
    if let Some(limit) = cli.limit {
        records.truncate(limit);
    }
    let proteins: Vec<ProteinRecord> = records
        .iter()
        .map(|r| ProteinRecord::from_fasta(r, &options))
        .collect::<Result<_, _>>()?;
    info!("loaded {} sequence(s) from {}", proteins.len(), cli.input.display());

    // Open the cache; a fresh stem per run unless the caller pins one
    let stem = cli
        .cachestem
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d-%H-%M-%S").to_string());
    let cache_path = cli.cachedir.join(format!("{}.db", stem));
    let cache = ResultCache::open(&cache_path)?;
    info!("cache store: {}", cache_path.display());

    let mut db = EntrezDatabase::new();
    if let Some(key) = &cli.api_key {
        db = db.api_key(key);
    }
    if let Some(email) = &cli.email {
        db = db.email(email);
    }

    let pipeline = Pipeline::new(PipelineConfig {
        fetch: FetchConfig::new()
            .batch_size(cli.batchsize)
            .max_retries(cli.retries),
        resolve: ResolverConfig {
            allow_alternative_start: cli.allow_alternative_start_codon,
        },
    });

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} queries")
            .expect("valid template")
            .progress_chars("##-"),
    );
    let outcome = pipeline.run_with_progress(&proteins, &db, &cache, |p| {
        pb.set_length(p.total as u64);
        pb.set_position(p.settled as u64);
    })?;
    pb.finish_and_clear();

    write_outputs(&cli, &outcome)?;
    report(&outcome);

    if !cli.keepcache {
        drop(cache);
        fs::remove_file(&cache_path)?;
    } else {
        info!("cache kept at {}", cache_path.display());
    }

    Ok(())
}

fn init_logging(verbose: u8, logfile: Option<&std::path::Path>) -> std::io::Result<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    if let Some(path) = logfile {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

/// Write matched amino-acid and nucleotide FASTA files plus the skipped
/// input records.
fn write_outputs(cli: &Cli, outcome: &RunOutcome) -> ferro_cds::Result<()> {
    let aa_path = cli.outdir.join(format!("{}_aa.fasta", cli.filestem));
    let nt_path = cli.outdir.join(format!("{}_nt.fasta", cli.filestem));
    let skipped_path = cli.outdir.join(&cli.skippedfile);

    let mut aa_records = Vec::new();
    let mut nt_records = Vec::new();
    for result in outcome.matched() {
        let protein = &result.protein;
        let cds = result.cds.as_ref().expect("matched result has a CDS");

        aa_records.push(FastaRecord::new(
            &protein.id,
            &protein.description,
            &protein.sequence,
        ));

        let nt_id = if cli.use_protein_ids {
            protein.id.clone()
        } else {
            cds.accession.clone()
        };
        let mut description = format!("coding sequence for {}", protein.query.raw);
        if cds.quality == MatchQuality::SoleCandidateFallback {
            description.push_str(" [unvalidated: sole candidate]");
        }
        nt_records.push(FastaRecord::new(&nt_id, &description, &cds.nucleotide));
    }

    let mut skipped_records = Vec::new();
    for result in outcome.skipped() {
        let protein = &result.protein;
        let reason = result
            .reason
            .as_ref()
            .map(|r| r.to_string())
            .unwrap_or_default();
        let description = if protein.description.is_empty() {
            format!("[skipped: {}]", reason)
        } else {
            format!("{} [skipped: {}]", protein.description, reason)
        };
        skipped_records.push(FastaRecord::new(&protein.id, &description, &protein.sequence));
    }

    let mut writer = BufWriter::new(File::create(&aa_path)?);
    write_fasta(&mut writer, &aa_records)?;
    let mut writer = BufWriter::new(File::create(&nt_path)?);
    write_fasta(&mut writer, &nt_records)?;
    info!("wrote {} and {}", aa_path.display(), nt_path.display());

    if !skipped_records.is_empty() {
        let mut writer = BufWriter::new(File::create(&skipped_path)?);
        write_fasta(&mut writer, &skipped_records)?;
        info!(
            "wrote {} skipped record(s) to {}",
            skipped_records.len(),
            skipped_path.display()
        );
    }

    Ok(())
}

fn report(outcome: &RunOutcome) {
    let summary = &outcome.summary;
    println!(
        "{} of {} sequence(s) matched, {} skipped",
        summary.matched, summary.total, summary.skipped
    );
    if summary.fallback_matches > 0 {
        warn!(
            "{} match(es) accepted via the sole-candidate fallback; check them",
            summary.fallback_matches
        );
    }

    if summary.skipped > 0 {
        let mut reasons: BTreeMap<String, usize> = BTreeMap::new();
        for result in outcome.skipped() {
            if let Some(reason) = &result.reason {
                *reasons.entry(reason.to_string()).or_default() += 1;
            }
        }
        for (reason, count) in reasons {
            println!("  {}: {}", reason, count);
        }
    }
}
