//! The indexing pipeline
//!
//! Streams the input files, appending sequences into the multi-sequence
//! buffer until the per-volume cap is hit, then flushes a volume and
//! keeps going. Small inputs produce a single volume under the bare
//! database name; larger ones produce numbered volumes plus a top-level
//! manifest. All I/O and state transitions happen on this thread; the
//! per-volume work fans out over the rayon pool built here.

use std::path::{Path, PathBuf};

use needletail::{parse_fastx_file, parse_fastx_stdin, FastxReader};
use tracing::{info, warn};

use crate::alphabet::{Alphabet, DNA};
use crate::config::{load_seed_text, BuildConfig};
use crate::error::{Error, Result};
use crate::manifest::{self, PrjData, VolumeCount};
use crate::multiseq::{AppendOutcome, MultiSequence, SequenceRecord};
use crate::seed::{self, CyclicSubsetSeed};
use crate::tantan::TantanMasker;
use crate::volume;
use crate::Position;

/// Build a database according to `config`
pub fn run(config: BuildConfig) -> Result<()> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads)
        .build()
        .map_err(|e| Error::Config(format!("can't create thread pool: {e}")))?;
    pool.install(|| Pipeline::new(config)?.run())
}

/// Pipeline state: one owned object, no globals
struct Pipeline {
    config: BuildConfig,
    alphabet: Alphabet,
    /// The alphabet defaulted to DNA (not overridden by the user)
    alphabet_is_default_dna: bool,
    seeds: Vec<CyclicSubsetSeed>,
    /// `#lastal …` lines from the seed text, for manifest pass-through
    lastal_lines: Vec<String>,
    masker: Option<TantanMasker>,
    multi: MultiSequence,
    /// Letters per volume, derived from the volume size budget
    max_letters: Position,
    /// Per-letter counts of the current volume
    letter_counts: Vec<u64>,
    /// Per-letter totals across flushed volumes
    letter_totals: Vec<u64>,
    sequence_count: u64,
    volume_number: u32,
    dubious_checked: bool,
}

impl Pipeline {
    fn new(config: BuildConfig) -> Result<Self> {
        config.print();

        let (alphabet, alphabet_is_default_dna) = match (&config.user_alphabet, config.is_protein)
        {
            (Some(letters), _) => (Alphabet::new(letters)?, false),
            (None, true) => (Alphabet::protein(), false),
            (None, false) => (Alphabet::dna(), true),
        };

        let seed_text = resolve_seed_text(&config, &alphabet)?;
        let parsed = seed::parse_seed_text(&seed_text, config.case_sensitive, &alphabet)?;
        if parsed.seeds.is_empty() {
            return Err(Error::Config("no seed patterns".to_string()));
        }
        info!("{} seed pattern(s)", parsed.seeds.len());

        let masker = (config.tantan > 0).then(|| TantanMasker::new(&alphabet, config.tantan > 1));
        let multi = MultiSequence::new(alphabet.sentinel(), config.input_format.is_fastq());
        let max_letters = max_letters_per_volume(&config, parsed.seeds.len());
        let size = alphabet.size();

        Ok(Self {
            config,
            alphabet,
            alphabet_is_default_dna,
            seeds: parsed.seeds,
            lastal_lines: seed::lastal_lines(&seed_text),
            masker,
            multi,
            max_letters,
            letter_counts: vec![0; size],
            letter_totals: vec![0; size],
            sequence_count: 0,
            volume_number: 0,
            dubious_checked: false,
        })
    }

    fn run(mut self) -> Result<()> {
        let inputs: Vec<Option<PathBuf>> = if self.config.inputs.is_empty() {
            vec![None]
        } else {
            self.config
                .inputs
                .clone()
                .into_iter()
                .map(|p| if p == Path::new("-") { None } else { Some(p) })
                .collect()
        };

        for input in inputs {
            match &input {
                Some(path) => info!("reading {}...", path.display()),
                None => info!("reading standard input..."),
            }
            let Some(mut reader) = open_input(input.as_deref())? else {
                continue; // an empty file yields an empty database
            };
            while let Some(record) = reader.next() {
                let record = record?;
                if self.config.input_format.is_fastq() && record.qual().is_none() {
                    return Err(Error::InputFormat(format!(
                        "{} input has no quality data",
                        self.config.input_format
                    )));
                }
                let record = SequenceRecord {
                    name: String::from_utf8_lossy(record.id()).into_owned(),
                    seq: record.seq().into_owned(),
                    qual: record.qual().map(<[u8]>::to_vec),
                };
                self.take_sequence(&record)?;
            }
        }

        self.finalize()
    }

    /// Append one sequence, flushing a volume when the buffer fills
    fn take_sequence(&mut self, record: &SequenceRecord) -> Result<()> {
        if !self.dubious_checked && self.alphabet_is_default_dna && self.sequence_count == 0 {
            if is_dubious_dna(&record.seq) {
                warn!("that's some funny-lookin DNA");
            }
            self.dubious_checked = true;
        }

        let mut outcome = self.append(record)?;
        if outcome == AppendOutcome::VolumeFull {
            if self.multi.finished_sequences() == 0 {
                return Err(Error::SequenceTooLong);
            }
            self.flush_numbered_volume()?;
            outcome = self.append(record)?;
            if outcome == AppendOutcome::VolumeFull {
                return Err(Error::SequenceTooLong);
            }
        }

        // count the letters of the sequence that just went in
        let last = self.multi.finished_sequences() - 1;
        let span = &self.multi.text()[self.multi.seq_beg(last)..self.multi.seq_end(last)];
        self.alphabet.count(span, &mut self.letter_counts);
        self.sequence_count += 1;

        if self.config.counts_only {
            // the text is never indexed, so don't keep it around
            self.multi.reinit();
        }
        Ok(())
    }

    fn append(&mut self, record: &SequenceRecord) -> Result<AppendOutcome> {
        self.multi.append(
            record,
            &self.alphabet,
            self.config.keep_lowercase,
            self.config.input_format,
            self.max_letters,
        )
    }

    /// Flush the buffer as the next numbered volume
    fn flush_numbered_volume(&mut self) -> Result<()> {
        let base = format!("{}{}", self.config.db_name, self.volume_number);
        self.make_volume(&base, VolumeCount::PartOfSet)?;
        self.volume_number += 1;
        for (total, count) in self.letter_totals.iter_mut().zip(&mut self.letter_counts) {
            *total += std::mem::take(count);
        }
        self.multi.reinit();
        Ok(())
    }

    fn make_volume(&mut self, base: &str, volume_count: VolumeCount) -> Result<()> {
        volume::make_volume(
            &self.seeds,
            &mut self.multi,
            &self.config,
            &self.alphabet,
            &self.letter_counts,
            self.masker.as_ref(),
            &self.lastal_lines,
            volume_count,
            base,
        )
    }

    fn finalize(mut self) -> Result<()> {
        if self.multi.finished_sequences() > 0 {
            if self.volume_number == 0 {
                // everything fit in one volume: it is the database,
                // under the bare name, and there is no top-level manifest
                let base = self.config.db_name.clone();
                let num_indexes = self.seeds.len() as u32;
                return self.make_volume(&base, VolumeCount::Indexes(num_indexes));
            }
            self.flush_numbered_volume()?;
        }

        for (total, count) in self.letter_totals.iter_mut().zip(&self.letter_counts) {
            *total += count;
        }

        manifest::write_prj(
            Path::new(&format!("{}.prj", self.config.db_name)),
            &PrjData {
                alphabet: self.alphabet.letters(),
                num_sequences: self.sequence_count,
                letter_counts: &self.letter_totals,
                counts_only: self.config.counts_only,
                min_seed_limit: self.config.min_seed_limit,
                keep_lowercase: self.config.keep_lowercase,
                tantan: self.config.tantan,
                mask_lowercase: self.config.case_sensitive,
                input_format: self.config.input_format,
                minimizer_window: self.config.minimizer_window,
                volume_count: VolumeCount::Volumes(self.volume_number),
                lastal_lines: &self.lastal_lines,
            },
        )
    }
}

/// The seed text for this build: an explicit file wins over patterns,
/// and the default is YASS for DNA or every-position for anything else
fn resolve_seed_text(config: &BuildConfig, alphabet: &Alphabet) -> Result<String> {
    if let Some(text) = &config.seed_text {
        return Ok(text.clone());
    }
    if let Some(name_or_path) = &config.seed_file {
        return load_seed_text(name_or_path);
    }
    if !config.seed_patterns.is_empty() {
        let mut text = String::new();
        for pattern in &config.seed_patterns {
            text.push_str(&seed::string_from_patterns(pattern, alphabet.letters()));
        }
        return Ok(text);
    }
    if alphabet.letters() == DNA {
        Ok(seed::string_from_name("YASS")
            .expect("YASS is built in")
            .to_string())
    } else {
        Ok(seed::string_from_patterns("1", alphabet.letters()))
    }
}

fn open_input(path: Option<&Path>) -> Result<Option<Box<dyn FastxReader>>> {
    match path {
        Some(path) => {
            let len = std::fs::metadata(path)
                .map_err(|e| Error::file("open", path, e))?
                .len();
            if len == 0 {
                return Ok(None);
            }
            Ok(Some(parse_fastx_file(path)?))
        }
        None => Ok(Some(parse_fastx_stdin()?)),
    }
}

/// The most sequence letters a volume may hold so its files and its
/// index stay near the volume size budget
///
/// Bytes per indexed position is `sizeof(Position) + 1` per seed; FASTQ
/// needs two bytes per letter (text + quality). The result is clamped
/// so positions stay representable.
fn max_letters_per_volume(config: &BuildConfig, num_seeds: usize) -> Position {
    let bytes_per_letter: u64 = if config.input_format.is_fastq() { 2 } else { 1 };
    let index_step = config.index_step as u64;
    let bytes_per_position = (std::mem::size_of::<Position>() as u64 + 1) * num_seeds as u64;
    let per_step = bytes_per_letter * index_step + bytes_per_position;
    let letters = config.volume_size / per_step * index_step;
    letters.min(Position::MAX as u64) as Position
}

/// Does the first sequence look like it isn't really DNA?
///
/// Looks at the first 100 letters; short sequences never warn.
fn is_dubious_dna(raw: &[u8]) -> bool {
    if raw.len() < 100 {
        return false;
    }
    let dna_count = raw[..100]
        .iter()
        .filter(|c| matches!(c, b'A' | b'C' | b'G' | b'T' | b'a' | b'c' | b'g' | b't' | b'N' | b'n'))
        .count();
    dna_count < 90
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputFormat;

    #[test]
    fn test_max_letters_per_volume() {
        let config = BuildConfig {
            db_name: "db".to_string(),
            volume_size: 600,
            ..BuildConfig::default()
        };
        // fasta, step 1, one seed: 1 + 5 bytes per letter
        assert_eq!(max_letters_per_volume(&config, 1), 100);

        let fastq = BuildConfig {
            input_format: InputFormat::FastqSanger,
            ..config.clone()
        };
        assert_eq!(max_letters_per_volume(&fastq, 1), 85);

        // two seeds double the index bytes
        assert_eq!(max_letters_per_volume(&config, 2), 54);

        // a huge budget clamps to the position range
        let huge = BuildConfig {
            volume_size: u64::MAX,
            ..config
        };
        assert_eq!(max_letters_per_volume(&huge, 1), Position::MAX);
    }

    #[test]
    fn test_index_step_stretches_the_cap() {
        let one = BuildConfig {
            db_name: "db".to_string(),
            volume_size: 600,
            ..BuildConfig::default()
        };
        let four = BuildConfig {
            index_step: 4,
            ..one.clone()
        };
        assert!(max_letters_per_volume(&four, 1) > max_letters_per_volume(&one, 1));
    }

    #[test]
    fn test_dubious_dna_detection() {
        let protein = b"MKVLWAALLVTFLAGCQAKVEQAVETEPEPELRQQTEWQSGQRWELALGRFWDYLRWVQT\
                        LSEQVQEELLSSQVTQELRALMDETMKELKAYKSELEEQLTPVAEETRARLSKELQAAQA";
        assert!(is_dubious_dna(protein));

        let dna = b"ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTACGT\
                    ACGTACGTACGTACGTACGTACGTACGTACGTACGTACGTNNNNACGTACGTACGTACGT";
        assert!(!is_dubious_dna(dna));

        // too short to judge
        assert!(!is_dubious_dna(b"MKVLW"));
    }

    #[test]
    fn test_default_seed_is_yass_for_dna() {
        let config = BuildConfig {
            db_name: "db".to_string(),
            ..BuildConfig::default()
        };
        let text = resolve_seed_text(&config, &Alphabet::dna()).unwrap();
        assert!(text.contains("1T1001100101"));
        let text = resolve_seed_text(&config, &Alphabet::protein()).unwrap();
        assert!(text.ends_with("1\n"));
    }

    #[test]
    fn test_seed_file_wins_over_patterns() {
        let config = BuildConfig {
            db_name: "db".to_string(),
            seed_file: Some("YASS".to_string()),
            seed_patterns: vec!["111".to_string()],
            ..BuildConfig::default()
        };
        let text = resolve_seed_text(&config, &Alphabet::dna()).unwrap();
        assert!(text.contains("1T1001100101"));
        assert!(!text.contains("111"));
    }
}
