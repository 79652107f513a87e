//! Volume output
//!
//! One volume is a self-contained on-disk index over a batch of
//! sequences: a `.prj` manifest, the encoded text (`.tis`), sequence
//! names (`.des`) and end offsets (`.sds`), quality bytes (`.qua`,
//! FASTQ only), and one suffix-array file per seed (`.ssa`, suffixed
//! `a`, `b`, … when several seeds are indexed). All per-seed files
//! share the same sequence text.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use rayon::prelude::*;
use tracing::info;

use crate::alphabet::Alphabet;
use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::{self, PrjData, VolumeCount};
use crate::multiseq::MultiSequence;
use crate::seed::CyclicSubsetSeed;
use crate::suffix_array::SubsetSuffixArray;
use crate::tantan::TantanMasker;

/// Build and write one volume from the buffered sequences
#[allow(clippy::too_many_arguments)]
pub fn make_volume(
    seeds: &[CyclicSubsetSeed],
    multi: &mut MultiSequence,
    config: &BuildConfig,
    alphabet: &Alphabet,
    letter_counts: &[u64],
    masker: Option<&TantanMasker>,
    lastal_lines: &[String],
    volume_count: VolumeCount,
    base_name: &str,
) -> Result<()> {
    let num_sequences = multi.finished_sequences();
    let text_len = multi.finished_size();

    if let Some(masker) = masker {
        info!("masking...");
        mask_sequences(multi, masker, alphabet);
    }

    info!("writing...");
    manifest::write_prj(
        Path::new(&format!("{base_name}.prj")),
        &PrjData {
            alphabet: alphabet.letters(),
            num_sequences: num_sequences as u64,
            letter_counts,
            counts_only: false,
            min_seed_limit: config.min_seed_limit,
            keep_lowercase: config.keep_lowercase,
            tantan: config.tantan,
            mask_lowercase: config.case_sensitive,
            input_format: config.input_format,
            minimizer_window: config.minimizer_window,
            volume_count,
            lastal_lines,
        },
    )?;
    write_sequence_files(multi, base_name)?;

    for (x, seed) in seeds.iter().enumerate() {
        info!("gathering...");
        let mut index = SubsetSuffixArray::new();
        for i in 0..num_sequences {
            index.add_positions(
                seed,
                multi.text(),
                multi.seq_beg(i),
                multi.seq_end(i),
                config.index_step,
                config.minimizer_window,
            );
        }

        info!("sorting...");
        index.sort_index(seed, multi.text(), config.min_seed_limit, config.child_table)?;

        info!("bucketing...");
        index.make_buckets(seed, multi.text(), config.bucket_depth, config.min_seed_limit)?;

        info!("writing...");
        let path = if seeds.len() > 1 {
            format!("{}{}.ssa", base_name, (b'a' + x as u8) as char)
        } else {
            format!("{base_name}.ssa")
        };
        index.write_file(seed, Path::new(&path), text_len)?;
    }

    info!("done!");
    Ok(())
}

/// Write the sequence text, names, offsets and qualities of a volume
pub fn write_sequence_files(multi: &MultiSequence, base_name: &str) -> Result<()> {
    write_file(&format!("{base_name}.tis"), |w| w.write_all(multi.text()))?;

    write_file(&format!("{base_name}.des"), |w| {
        for name in multi.names() {
            writeln!(w, "{name}")?;
        }
        Ok(())
    })?;

    write_file(&format!("{base_name}.sds"), |w| {
        for &end in multi.ends() {
            w.write_all(&(end as u64).to_le_bytes())?;
        }
        Ok(())
    })?;

    if !multi.quals().is_empty() {
        write_file(&format!("{base_name}.qua"), |w| w.write_all(multi.quals()))?;
    }
    Ok(())
}

fn write_file(
    path: &str,
    body: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::file("write", path, e))?;
    let mut w = BufWriter::new(file);
    body(&mut w)
        .and_then(|()| w.flush())
        .map_err(|e| Error::file("write", path, e))
}

/// Mask every sequence in place, parallel over letter-balanced chunks
/// of whole sequences
fn mask_sequences(multi: &mut MultiSequence, masker: &TantanMasker, alphabet: &Alphabet) {
    let num_seqs = multi.finished_sequences();
    if num_seqs == 0 {
        return;
    }
    let spans: Vec<(usize, usize)> = (0..num_seqs)
        .map(|i| (multi.seq_beg(i), multi.seq_end(i)))
        .collect();
    let text_len = multi.finished_size();
    let num_chunks = rayon::current_num_threads().clamp(1, num_seqs);
    let bounds: Vec<usize> = (0..=num_chunks)
        .map(|c| first_sequence_in_chunk(&spans, text_len, num_chunks, c))
        .collect();

    let fold = alphabet.numbers_to_uppercase();
    let lower = alphabet.numbers_to_lowercase();

    // chunks are sequence-aligned, so the text splits into disjoint
    // mutable slices, one per worker
    let mut jobs = Vec::with_capacity(num_chunks);
    let mut rest = multi.text_mut();
    let mut offset = 0usize;
    for c in 0..num_chunks {
        let (seq_beg, seq_end) = (bounds[c], bounds[c + 1]);
        if seq_beg == seq_end {
            continue;
        }
        let chunk_beg = spans[seq_beg].0;
        let chunk_end = if seq_end == num_seqs {
            text_len
        } else {
            spans[seq_end].0
        };
        let (_, tail) = rest.split_at_mut(chunk_beg - offset);
        let (chunk, tail) = tail.split_at_mut(chunk_end - chunk_beg);
        rest = tail;
        offset = chunk_end;
        jobs.push((chunk, chunk_beg, seq_beg, seq_end));
    }

    jobs.into_par_iter().for_each(|(chunk, base, seq_beg, seq_end)| {
        for &(beg, end) in &spans[seq_beg..seq_end] {
            masker.mask(&mut chunk[beg - base..end - base], fold, lower);
        }
    });
}

/// First sequence of `chunk` when sequences are cut into
/// `num_chunks` letter-balanced chunks
fn first_sequence_in_chunk(
    spans: &[(usize, usize)],
    text_len: usize,
    num_chunks: usize,
    chunk: usize,
) -> usize {
    let target = text_len * chunk / num_chunks;
    spans.partition_point(|&(beg, _)| beg < target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InputFormat;
    use crate::multiseq::SequenceRecord;

    fn filled_multi(alphabet: &Alphabet, seqs: &[(&str, &str)]) -> MultiSequence {
        let mut multi = MultiSequence::new(alphabet.sentinel(), false);
        for (name, seq) in seqs {
            let record = SequenceRecord {
                name: name.to_string(),
                seq: seq.as_bytes().to_vec(),
                qual: None,
            };
            multi
                .append(&record, alphabet, false, InputFormat::Fasta, u32::MAX)
                .unwrap();
        }
        multi
    }

    #[test]
    fn test_sequence_files_content() {
        let alphabet = Alphabet::dna();
        let multi = filled_multi(&alphabet, &[("a", "AAA"), ("b", "TTT")]);
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("vol").to_string_lossy().into_owned();
        write_sequence_files(&multi, &base).unwrap();

        let tis = std::fs::read(format!("{base}.tis")).unwrap();
        assert_eq!(tis, multi.text());
        let des = std::fs::read_to_string(format!("{base}.des")).unwrap();
        assert_eq!(des, "a\nb\n");
        let sds = std::fs::read(format!("{base}.sds")).unwrap();
        assert_eq!(sds.len(), 16);
        assert_eq!(u64::from_le_bytes(sds[0..8].try_into().unwrap()), 3);
        assert_eq!(u64::from_le_bytes(sds[8..16].try_into().unwrap()), 7);
        assert!(!Path::new(&format!("{base}.qua")).exists());
    }

    #[test]
    fn test_chunk_partition_covers_all_sequences() {
        let alphabet = Alphabet::dna();
        let multi = filled_multi(
            &alphabet,
            &[("a", "ACGTACGT"), ("b", "AC"), ("c", "GTGTGTGT"), ("d", "A")],
        );
        let spans: Vec<(usize, usize)> = (0..multi.finished_sequences())
            .map(|i| (multi.seq_beg(i), multi.seq_end(i)))
            .collect();
        let total = multi.finished_size();
        for num_chunks in 1..=4 {
            let bounds: Vec<usize> = (0..=num_chunks)
                .map(|c| first_sequence_in_chunk(&spans, total, num_chunks, c))
                .collect();
            assert_eq!(bounds[0], 0);
            assert_eq!(bounds[num_chunks], spans.len());
            for pair in bounds.windows(2) {
                assert!(pair[0] <= pair[1]);
            }
        }
    }

    #[test]
    fn test_masking_is_confined_to_sequences() {
        let alphabet = Alphabet::dna();
        let masker = TantanMasker::new(&alphabet, false);
        let mut multi = filled_multi(
            &alphabet,
            &[("r", &"AC".repeat(40)), ("p", "GATTACAGTC")],
        );
        let sentinel_positions: Vec<usize> = multi
            .text()
            .iter()
            .enumerate()
            .filter(|&(_, &c)| alphabet.is_sentinel(c))
            .map(|(i, _)| i)
            .collect();
        mask_sequences(&mut multi, &masker, &alphabet);
        // the repeat got masked, sentinels are untouched
        let n = alphabet.size() as u8;
        let masked = multi.text().iter().filter(|&&c| c >= n && c < 2 * n).count();
        assert!(masked > 0);
        for p in sentinel_positions {
            assert!(alphabet.is_sentinel(multi.text()[p]));
        }
    }
}
