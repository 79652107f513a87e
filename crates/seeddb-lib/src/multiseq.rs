//! Append-only multi-sequence buffer
//!
//! [`MultiSequence`] concatenates encoded sequences with one sentinel
//! code after each, so a suffix comparison started inside sequence `i`
//! terminates before entering sequence `i+1`. Appends are bounded: once
//! the buffer holds at least one finished sequence, an append that
//! would exceed the cap is refused atomically and the pipeline flushes
//! a volume instead.

use crate::alphabet::Alphabet;
use crate::config::InputFormat;
use crate::error::{Error, Result};
use crate::Position;

/// Quality byte stored at sentinel positions of the quality buffer
const PAD_QUALITY: u8 = b'!';

/// Outcome of a bounded append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The sequence (and its sentinel) was appended
    Appended,
    /// The buffer is full: nothing was written, flush a volume first
    VolumeFull,
}

/// One owned input record, as delivered by the tokenizer
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    /// Sequence name (the full header line)
    pub name: String,
    /// Raw sequence bytes
    pub seq: Vec<u8>,
    /// Quality bytes, present for FASTQ input
    pub qual: Option<Vec<u8>>,
}

/// An append-only concatenation of encoded sequences
#[derive(Debug)]
pub struct MultiSequence {
    /// Encoded letters, one sentinel after each sequence
    text: Vec<u8>,
    /// Quality bytes aligned with `text` (FASTQ only)
    quals: Vec<u8>,
    /// Sequence names, in append order
    names: Vec<String>,
    /// End offset of each sequence, exclusive of its sentinel
    ends: Vec<Position>,
    /// The sentinel code of the active alphabet
    sentinel: u8,
    /// Whether a quality buffer is maintained
    with_quality: bool,
}

impl MultiSequence {
    /// Create an empty buffer
    pub fn new(sentinel: u8, with_quality: bool) -> Self {
        Self {
            text: Vec::new(),
            quals: Vec::new(),
            names: Vec::new(),
            ends: Vec::new(),
            sentinel,
            with_quality,
        }
    }

    /// Append one whole sequence, or refuse if it would overflow the cap
    ///
    /// `max_len` caps the total buffer size in letters (sentinels
    /// included). A refused append leaves the buffer untouched; the
    /// pipeline flushes a volume and retries, and a sequence refused by
    /// an empty buffer is its fatal "too long" condition.
    pub fn append(
        &mut self,
        record: &SequenceRecord,
        alphabet: &Alphabet,
        keep_lowercase: bool,
        format: InputFormat,
        max_len: Position,
    ) -> Result<AppendOutcome> {
        let new_size = self.text.len() as u64 + record.seq.len() as u64 + 1;
        if new_size > Position::MAX as u64 || new_size > max_len as u64 {
            return Ok(AppendOutcome::VolumeFull);
        }

        if self.with_quality {
            let qual = record.qual.as_deref().ok_or_else(|| {
                Error::InputFormat(format!("missing quality line for sequence {:?}", record.name))
            })?;
            if qual.len() != record.seq.len() {
                return Err(Error::InputFormat(format!(
                    "quality length {} doesn't match sequence length {} for {:?}",
                    qual.len(),
                    record.seq.len(),
                    record.name
                )));
            }
            check_quality_codes(qual, format)?;
            self.quals.extend_from_slice(qual);
            self.quals.push(PAD_QUALITY);
        }

        alphabet.encode_sequence(&record.seq, keep_lowercase, &mut self.text);
        self.ends.push(self.text.len() as Position);
        self.text.push(self.sentinel);
        self.names.push(record.name.clone());
        Ok(AppendOutcome::Appended)
    }

    /// Number of whole sequences in the buffer
    #[inline]
    pub fn finished_sequences(&self) -> usize {
        self.names.len()
    }

    /// Total buffer size in letters, sentinels included
    #[inline]
    pub fn finished_size(&self) -> usize {
        self.text.len()
    }

    /// Start offset of sequence `i`
    #[inline]
    pub fn seq_beg(&self, i: usize) -> usize {
        if i == 0 {
            0
        } else {
            self.ends[i - 1] as usize + 1
        }
    }

    /// End offset of sequence `i`, exclusive of its sentinel
    #[inline]
    pub fn seq_end(&self, i: usize) -> usize {
        self.ends[i] as usize
    }

    /// The encoded text
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// The encoded text, writable (the masker rewrites it in place)
    pub fn text_mut(&mut self) -> &mut [u8] {
        &mut self.text
    }

    /// The quality buffer (empty unless FASTQ)
    pub fn quals(&self) -> &[u8] {
        &self.quals
    }

    /// Sequence names in append order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Per-sequence end offsets, exclusive of sentinels
    pub fn ends(&self) -> &[Position] {
        &self.ends
    }

    /// Reset for the next volume
    pub fn reinit(&mut self) {
        self.text.clear();
        self.quals.clear();
        self.names.clear();
        self.ends.clear();
    }
}

/// Validate quality bytes against the input format's code range
fn check_quality_codes(qual: &[u8], format: InputFormat) -> Result<()> {
    let Some(offset) = format.quality_offset() else {
        return Ok(());
    };
    let min = format.quality_min().expect("fastq formats have a minimum");
    for &q in qual {
        if q < min || q > 126 {
            return Err(Error::BadQualityCode { code: q, offset });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, seq: &[u8]) -> SequenceRecord {
        SequenceRecord {
            name: name.to_string(),
            seq: seq.to_vec(),
            qual: None,
        }
    }

    fn fastq_record(name: &str, seq: &[u8], qual: &[u8]) -> SequenceRecord {
        SequenceRecord {
            name: name.to_string(),
            seq: seq.to_vec(),
            qual: Some(qual.to_vec()),
        }
    }

    #[test]
    fn test_append_places_sentinels() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), false);
        multi
            .append(&record("a", b"AAA"), &alphabet, false, InputFormat::Fasta, 100)
            .unwrap();
        multi
            .append(&record("b", b"TTT"), &alphabet, false, InputFormat::Fasta, 100)
            .unwrap();
        assert_eq!(multi.finished_sequences(), 2);
        assert_eq!(multi.finished_size(), 8);
        assert_eq!(multi.text()[3], alphabet.sentinel());
        assert_eq!(multi.text()[7], alphabet.sentinel());
        assert_eq!((multi.seq_beg(0), multi.seq_end(0)), (0, 3));
        assert_eq!((multi.seq_beg(1), multi.seq_end(1)), (4, 7));
    }

    #[test]
    fn test_append_refuses_at_cap() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), false);
        let out = multi
            .append(&record("a", b"ACGTACGT"), &alphabet, false, InputFormat::Fasta, 12)
            .unwrap();
        assert_eq!(out, AppendOutcome::Appended);
        // next append would overflow: refused, nothing written
        let before = multi.finished_size();
        let out = multi
            .append(&record("b", b"ACGT"), &alphabet, false, InputFormat::Fasta, 12)
            .unwrap();
        assert_eq!(out, AppendOutcome::VolumeFull);
        assert_eq!(multi.finished_size(), before);
        assert_eq!(multi.finished_sequences(), 1);
    }

    #[test]
    fn test_empty_buffer_still_enforces_the_cap() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), false);
        let out = multi
            .append(&record("a", b"ACGTACGT"), &alphabet, false, InputFormat::Fasta, 4)
            .unwrap();
        assert_eq!(out, AppendOutcome::VolumeFull);
        assert_eq!(multi.finished_sequences(), 0);
    }

    #[test]
    fn test_quality_buffer_aligns_with_text() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), true);
        multi
            .append(
                &fastq_record("r", b"ACG", b"III"),
                &alphabet,
                false,
                InputFormat::FastqSanger,
                100,
            )
            .unwrap();
        assert_eq!(multi.quals().len(), multi.finished_size());
        assert_eq!(&multi.quals()[..3], b"III");
    }

    #[test]
    fn test_bad_quality_code() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), true);
        let err = multi.append(
            &fastq_record("r", b"ACG", b"I\x1fI"),
            &alphabet,
            false,
            InputFormat::FastqSanger,
            100,
        );
        assert!(matches!(err, Err(Error::BadQualityCode { .. })));
    }

    #[test]
    fn test_missing_quality_is_a_format_error() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), true);
        let err = multi.append(
            &record("r", b"ACG"),
            &alphabet,
            false,
            InputFormat::FastqSanger,
            100,
        );
        assert!(matches!(err, Err(Error::InputFormat(_))));
    }

    #[test]
    fn test_reinit_clears_everything() {
        let alphabet = Alphabet::dna();
        let mut multi = MultiSequence::new(alphabet.sentinel(), false);
        multi
            .append(&record("a", b"ACGT"), &alphabet, false, InputFormat::Fasta, 100)
            .unwrap();
        multi.reinit();
        assert_eq!(multi.finished_sequences(), 0);
        assert_eq!(multi.finished_size(), 0);
    }
}
