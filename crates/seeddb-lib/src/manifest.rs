//! Database manifests
//!
//! A `.prj` manifest is a text file of `key=value` lines describing
//! either one volume or the whole database. The `volumes` key is
//! overloaded on the wire: `volumes=-1` marks a file that describes a
//! single volume of a larger set, `volumes=K` the top-level manifest
//! of a K-volume database, and a single-volume database carries
//! `numofindexes=M` instead. Consumers depend on this sentinel, so it
//! stays.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::config::InputFormat;
use crate::error::{Error, Result};

/// What the `volumes`/`numofindexes` line of a manifest says
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeCount {
    /// This file describes one volume of a multi-volume set
    PartOfSet,
    /// Top-level manifest of a database with this many volumes
    Volumes(u32),
    /// Single-volume database with this many indexes (seeds)
    Indexes(u32),
}

/// Everything a `.prj` manifest records
#[derive(Debug, Clone)]
pub struct PrjData<'a> {
    /// Alphabet letters, in code order
    pub alphabet: &'a str,
    /// Number of sequences covered by this manifest
    pub num_sequences: u64,
    /// Per-letter counts, in alphabet order
    pub letter_counts: &'a [u64],
    /// Counts-only builds record nothing beyond the counts
    pub counts_only: bool,
    /// Largest interval the suffix sort left unsorted
    pub min_seed_limit: usize,
    /// Whether input lowercase was kept
    pub keep_lowercase: bool,
    /// Tantan masking level, 0 when off
    pub tantan: u8,
    /// Whether lowercase letters are excluded from seeding
    pub mask_lowercase: bool,
    /// Input sequence format
    pub input_format: InputFormat,
    /// Minimizer window width
    pub minimizer_window: usize,
    /// The volume/index count line
    pub volume_count: VolumeCount,
    /// `#lastal …` lines carried over from the seed text
    pub lastal_lines: &'a [String],
}

/// Write one `.prj` manifest
pub fn write_prj(path: &Path, data: &PrjData) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::file("write", path, e))?;
    let mut w = BufWriter::new(file);
    write_to(&mut w, data).map_err(|e| Error::file("write", path, e))
}

fn write_to(w: &mut impl Write, data: &PrjData) -> std::io::Result<()> {
    writeln!(w, "version={}", env!("CARGO_PKG_VERSION"))?;
    writeln!(w, "alphabet={}", data.alphabet)?;
    writeln!(w, "numofsequences={}", data.num_sequences)?;
    let total: u64 = data.letter_counts.iter().sum();
    writeln!(w, "numofletters={total}")?;
    write!(w, "letterfreqs=")?;
    for (i, count) in data.letter_counts.iter().enumerate() {
        if i > 0 {
            write!(w, " ")?;
        }
        write!(w, "{count}")?;
    }
    writeln!(w)?;

    if !data.counts_only {
        writeln!(w, "maxunsortedinterval={}", data.min_seed_limit)?;
        writeln!(w, "keeplowercase={}", data.keep_lowercase as u8)?;
        if data.tantan > 0 {
            writeln!(w, "tantansetting={}", data.tantan)?;
        }
        writeln!(w, "masklowercase={}", data.mask_lowercase as u8)?;
        if data.input_format != InputFormat::Fasta {
            writeln!(w, "sequenceformat={}", data.input_format)?;
        }
        if data.minimizer_window > 1 {
            writeln!(w, "minimizerwindow={}", data.minimizer_window)?;
        }
        match data.volume_count {
            VolumeCount::PartOfSet => writeln!(w, "volumes=-1")?,
            VolumeCount::Volumes(k) => writeln!(w, "volumes={k}")?,
            VolumeCount::Indexes(m) => writeln!(w, "numofindexes={m}")?,
        }
        for line in data.lastal_lines {
            writeln!(w, "{line}")?;
        }
    }

    w.flush()
}
