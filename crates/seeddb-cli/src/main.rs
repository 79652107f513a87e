use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use seeddb_lib::config::{load_seed_text, BuildConfig, ChildTableKind, InputFormat};
use seeddb_lib::{pipeline, seed};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "seeddb")]
#[command(version)]
#[command(about = "Build a seeded suffix-array database from FASTA/FASTQ", long_about = None)]
struct Cli {
    /// Output base name for the database bundle
    db_name: String,

    /// Input sequence files; stdin if absent or "-"
    inputs: Vec<PathBuf>,

    /// Use the standard protein alphabet
    #[arg(long)]
    protein: bool,

    /// Use this string of letters as the alphabet
    #[arg(long, value_name = "STRING")]
    user_alphabet: Option<String>,

    /// Seed source: a built-in name (e.g. YASS) or a seed file;
    /// wins over --seed-pattern when both are given
    #[arg(long, value_name = "PATH")]
    seed_file: Option<String>,

    /// Seed pattern (repeatable; one index per pattern)
    #[arg(long, value_name = "STR")]
    seed_pattern: Vec<String>,

    /// Index every Nth position of each sequence
    #[arg(long, value_name = "N")]
    index_step: Option<usize>,

    /// Keep only window-minimal positions among W admitted candidates
    #[arg(long, value_name = "W")]
    minimizer_window: Option<usize>,

    /// Bucket directory depth (default: derived from the index size)
    #[arg(long, value_name = "D")]
    bucket_depth: Option<usize>,

    /// Leave intervals up to this size unsorted
    #[arg(long, value_name = "L")]
    min_seed_limit: Option<usize>,

    /// Child table kind: none, byte, short or full
    #[arg(long, value_name = "KIND", value_parser = parse_child_table)]
    child_table: Option<ChildTableKind>,

    /// Mask simple repeats: 0 off, 1 standard, 2 extra-sensitive
    #[arg(long, value_name = "LEVEL")]
    tantan: Option<u8>,

    /// Keep input lowercase letters lowercase
    #[arg(long)]
    keep_lowercase: bool,

    /// Exclude lowercase (masked) letters from seeding (the default)
    #[arg(long, overrides_with = "no_case_sensitive")]
    case_sensitive: bool,

    /// Seed lowercase letters like their uppercase forms
    #[arg(long)]
    no_case_sensitive: bool,

    /// Input format: fasta, fastq-sanger, fastq-solexa, fastq-illumina
    #[arg(long, value_name = "FMT", value_parser = parse_input_format)]
    input_format: Option<InputFormat>,

    /// Per-volume size budget in bytes (suffixes K, M, G, T allowed)
    #[arg(long, short = 's', value_name = "BYTES", value_parser = parse_byte_size)]
    volume_size: Option<u64>,

    /// Worker threads; 0 uses all available cores
    #[arg(long, short = 't', value_name = "N")]
    threads: Option<usize>,

    /// Only count sequences and letters; write just the manifest
    #[arg(long)]
    counts_only: bool,

    /// Progress verbosity: 0 quiet, 1 progress, 2 debug
    #[arg(long, short = 'v', value_name = "K")]
    verbosity: Option<u32>,
}

impl Cli {
    /// Fill unset options from another parse (seed-file-embedded
    /// options merge underneath the command line)
    fn merge_under(mut self, under: Cli) -> Cli {
        self.protein |= under.protein;
        self.user_alphabet = self.user_alphabet.or(under.user_alphabet);
        if self.seed_pattern.is_empty() {
            self.seed_pattern = under.seed_pattern;
        }
        self.index_step = self.index_step.or(under.index_step);
        self.minimizer_window = self.minimizer_window.or(under.minimizer_window);
        self.bucket_depth = self.bucket_depth.or(under.bucket_depth);
        self.min_seed_limit = self.min_seed_limit.or(under.min_seed_limit);
        self.child_table = self.child_table.or(under.child_table);
        self.tantan = self.tantan.or(under.tantan);
        self.keep_lowercase |= under.keep_lowercase;
        // the case flags are a pair: adopt the seed file's choice only
        // when the command line expressed none, so an explicit
        // --case-sensitive beats an embedded --no-case-sensitive
        if !self.case_sensitive && !self.no_case_sensitive {
            self.case_sensitive = under.case_sensitive;
            self.no_case_sensitive = under.no_case_sensitive;
        }
        self.input_format = self.input_format.or(under.input_format);
        self.volume_size = self.volume_size.or(under.volume_size);
        self.threads = self.threads.or(under.threads);
        self.counts_only |= under.counts_only;
        self.verbosity = self.verbosity.or(under.verbosity);
        self
    }

    fn into_config(self, seed_text: Option<String>) -> BuildConfig {
        let defaults = BuildConfig::default();
        BuildConfig {
            db_name: self.db_name,
            inputs: self.inputs,
            is_protein: self.protein,
            user_alphabet: self.user_alphabet,
            seed_file: self.seed_file,
            seed_text,
            seed_patterns: self.seed_pattern,
            index_step: self.index_step.unwrap_or(defaults.index_step),
            minimizer_window: self.minimizer_window.unwrap_or(defaults.minimizer_window),
            bucket_depth: self.bucket_depth,
            min_seed_limit: self.min_seed_limit.unwrap_or(defaults.min_seed_limit),
            child_table: self.child_table.unwrap_or(defaults.child_table),
            tantan: self.tantan.unwrap_or(defaults.tantan),
            keep_lowercase: self.keep_lowercase,
            case_sensitive: !self.no_case_sensitive,
            input_format: self.input_format.unwrap_or(defaults.input_format),
            volume_size: self.volume_size.unwrap_or(defaults.volume_size),
            num_threads: self.threads.unwrap_or(defaults.num_threads),
            counts_only: self.counts_only,
            verbosity: self.verbosity.unwrap_or(defaults.verbosity),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbosity.unwrap_or(0));

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("seeddb: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(mut cli: Cli) -> Result<()> {
    // a seed file may embed options; they merge underneath the
    // command line, which is re-applied on top
    let mut seed_text = None;
    if let Some(name_or_path) = &cli.seed_file {
        let text = load_seed_text(name_or_path)?;
        let tokens = seed::embedded_option_tokens(&text);
        if !tokens.is_empty() {
            debug!("merging {} option token(s) from the seed file", tokens.len());
            let mut argv = vec!["seeddb".to_string()];
            argv.extend(tokens);
            argv.push(cli.db_name.clone());
            let embedded = Cli::try_parse_from(&argv)
                .map_err(|e| anyhow::anyhow!("bad options in seed file: {e}"))?;
            cli = cli.merge_under(embedded);
        }
        seed_text = Some(text);
    }

    let config = cli.into_config(seed_text);
    pipeline::run(config)?;
    Ok(())
}

fn init_tracing(verbosity: u32) {
    let default_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_input_format(s: &str) -> Result<InputFormat, String> {
    s.parse().map_err(|e: seeddb_lib::Error| e.to_string())
}

fn parse_child_table(s: &str) -> Result<ChildTableKind, String> {
    s.parse().map_err(|e: seeddb_lib::Error| e.to_string())
}

/// Parse a byte count with an optional binary suffix, e.g. `1M`
fn parse_byte_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, scale) = match s.chars().last() {
        Some('K' | 'k') => (&s[..s.len() - 1], 1u64 << 10),
        Some('M' | 'm') => (&s[..s.len() - 1], 1 << 20),
        Some('G' | 'g') => (&s[..s.len() - 1], 1 << 30),
        Some('T' | 't') => (&s[..s.len() - 1], 1 << 40),
        _ => (s, 1),
    };
    let value: u64 = digits
        .parse()
        .map_err(|_| format!("bad byte count: {s:?}"))?;
    value
        .checked_mul(scale)
        .ok_or_else(|| format!("byte count too large: {s:?}"))
}
