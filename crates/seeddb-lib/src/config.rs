//! Build configuration
//!
//! Every CLI-visible option lives here, so the pipeline and the
//! command-line front end share one source of truth. The front end
//! maps parsed arguments onto [`BuildConfig`]; seed files may embed
//! further options that merge underneath the command line.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default per-volume size budget in bytes
pub const DEFAULT_VOLUME_SIZE: u64 = 1 << 30;

/// Input sequence format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// FASTA (the default)
    #[default]
    Fasta,
    /// FASTQ with Sanger (+33) quality codes
    FastqSanger,
    /// FASTQ with Solexa (+64, minimum -5) quality codes
    FastqSolexa,
    /// FASTQ with Illumina 1.3+ (+64) quality codes
    FastqIllumina,
}

impl InputFormat {
    /// True for any FASTQ variant
    pub fn is_fastq(self) -> bool {
        self != InputFormat::Fasta
    }

    /// ASCII offset of the quality scale, `None` for FASTA
    pub fn quality_offset(self) -> Option<u8> {
        match self {
            InputFormat::Fasta => None,
            InputFormat::FastqSanger => Some(33),
            InputFormat::FastqSolexa | InputFormat::FastqIllumina => Some(64),
        }
    }

    /// Smallest legal quality byte, `None` for FASTA
    pub fn quality_min(self) -> Option<u8> {
        match self {
            InputFormat::Fasta => None,
            InputFormat::FastqSanger => Some(33),
            InputFormat::FastqSolexa => Some(59), // -5 on the +64 scale
            InputFormat::FastqIllumina => Some(64),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            InputFormat::Fasta => "fasta",
            InputFormat::FastqSanger => "fastq-sanger",
            InputFormat::FastqSolexa => "fastq-solexa",
            InputFormat::FastqIllumina => "fastq-illumina",
        };
        f.write_str(token)
    }
}

impl FromStr for InputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fasta" => Ok(InputFormat::Fasta),
            "fastq-sanger" => Ok(InputFormat::FastqSanger),
            "fastq-solexa" => Ok(InputFormat::FastqSolexa),
            "fastq-illumina" => Ok(InputFormat::FastqIllumina),
            _ => Err(Error::Config(format!("bad input format: {s:?}"))),
        }
    }
}

/// Child table representation written next to the sorted positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildTableKind {
    /// No child table
    #[default]
    None,
    /// Saturating one-byte sibling deltas
    Byte,
    /// Saturating two-byte sibling deltas
    Short,
    /// Absolute four-byte sibling boundaries
    Full,
}

impl fmt::Display for ChildTableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ChildTableKind::None => "none",
            ChildTableKind::Byte => "byte",
            ChildTableKind::Short => "short",
            ChildTableKind::Full => "full",
        };
        f.write_str(token)
    }
}

impl FromStr for ChildTableKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(ChildTableKind::None),
            "byte" => Ok(ChildTableKind::Byte),
            "short" => Ok(ChildTableKind::Short),
            "full" => Ok(ChildTableKind::Full),
            _ => Err(Error::Config(format!("bad child table kind: {s:?}"))),
        }
    }
}

/// Configuration for one database build
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Output base name for the database bundle
    pub db_name: String,
    /// Input files; empty (or `-`) means stdin
    pub inputs: Vec<PathBuf>,
    /// Use the standard protein alphabet
    pub is_protein: bool,
    /// User-supplied alphabet letters
    pub user_alphabet: Option<String>,
    /// Seed source: built-in name or file path (wins over patterns)
    pub seed_file: Option<String>,
    /// Loaded seed text (set by the front end when `seed_file` is given)
    pub seed_text: Option<String>,
    /// Bare seed patterns, one seed each
    pub seed_patterns: Vec<String>,
    /// Index every `index_step`-th position of each sequence
    pub index_step: usize,
    /// Minimizer window over admitted positions; 1 disables
    pub minimizer_window: usize,
    /// Bucket depth; `None` picks a depth from the position count
    pub bucket_depth: Option<usize>,
    /// Leave ranges this small unsorted during the suffix sort
    pub min_seed_limit: usize,
    /// Child table kind
    pub child_table: ChildTableKind,
    /// Tantan masking: 0 off, 1 standard, 2 extra-sensitive repeats
    pub tantan: u8,
    /// Keep input lowercase letters lowercase when encoding
    pub keep_lowercase: bool,
    /// Exclude lowercase (masked) letters from seeding
    pub case_sensitive: bool,
    /// Input sequence format
    pub input_format: InputFormat,
    /// Per-volume size budget in bytes
    pub volume_size: u64,
    /// Worker threads; 0 uses all available cores
    pub num_threads: usize,
    /// Only count sequences and letters; write just the manifest
    pub counts_only: bool,
    /// Progress verbosity (0 quiet, 1 progress, 2 debug)
    pub verbosity: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            db_name: String::new(),
            inputs: Vec::new(),
            is_protein: false,
            user_alphabet: None,
            seed_file: None,
            seed_text: None,
            seed_patterns: Vec::new(),
            index_step: 1,
            minimizer_window: 1,
            bucket_depth: None,
            min_seed_limit: 0,
            child_table: ChildTableKind::None,
            tantan: 0,
            keep_lowercase: false,
            case_sensitive: true,
            input_format: InputFormat::Fasta,
            volume_size: DEFAULT_VOLUME_SIZE,
            num_threads: 0,
            counts_only: false,
            verbosity: 0,
        }
    }
}

impl BuildConfig {
    /// Validate option values and combinations
    pub fn validate(&self) -> Result<()> {
        if self.db_name.is_empty() {
            return Err(Error::Config("no output name given".to_string()));
        }
        if self.index_step == 0 {
            return Err(Error::Config("index step must be at least 1".to_string()));
        }
        if self.minimizer_window == 0 {
            return Err(Error::Config(
                "minimizer window must be at least 1".to_string(),
            ));
        }
        if self.tantan > 2 {
            return Err(Error::Config(format!(
                "bad tantan setting {} (0, 1 or 2)",
                self.tantan
            )));
        }
        if self.volume_size == 0 {
            return Err(Error::Config("volume size must be positive".to_string()));
        }
        if self.is_protein && self.user_alphabet.is_some() {
            return Err(Error::Config(
                "both a protein and a user alphabet were given".to_string(),
            ));
        }
        Ok(())
    }

    /// Log the configuration via tracing
    pub fn print(&self) {
        tracing::info!("Build configuration:");
        tracing::info!("  output = {}", self.db_name);
        tracing::debug!("  protein = {}", self.is_protein);
        if let Some(a) = &self.user_alphabet {
            tracing::info!("  alphabet = {a}");
        }
        if let Some(f) = &self.seed_file {
            tracing::info!("  seed file = {f}");
        }
        for p in &self.seed_patterns {
            tracing::info!("  seed pattern = {p}");
        }
        tracing::debug!("  index step = {}", self.index_step);
        tracing::debug!("  minimizer window = {}", self.minimizer_window);
        tracing::debug!("  bucket depth = {:?}", self.bucket_depth);
        tracing::debug!("  min seed limit = {}", self.min_seed_limit);
        tracing::debug!("  child table = {}", self.child_table);
        tracing::debug!("  tantan = {}", self.tantan);
        tracing::debug!("  keep lowercase = {}", self.keep_lowercase);
        tracing::debug!("  case sensitive = {}", self.case_sensitive);
        tracing::debug!("  input format = {}", self.input_format);
        tracing::debug!("  volume size = {}", self.volume_size);
        if self.num_threads == 0 {
            tracing::debug!("  threads = all available cores");
        } else {
            tracing::debug!("  threads = {}", self.num_threads);
        }
        tracing::debug!("  counts only = {}", self.counts_only);
    }
}

/// Load seed text from a built-in name or a file path
pub fn load_seed_text(name_or_path: &str) -> Result<String> {
    if let Some(text) = crate::seed::string_from_name(name_or_path) {
        return Ok(text.to_string());
    }
    let path = Path::new(name_or_path);
    if path.exists() {
        return std::fs::read_to_string(path).map_err(|e| Error::file("read", path, e));
    }
    Err(Error::Config(format!(
        "unknown seed name or file: {name_or_path}"
    )))
}
