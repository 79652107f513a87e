//! Low-complexity masking
//!
//! A single-pass probabilistic repeat detector in the style of tantan:
//! a hidden repeat process may copy the letter seen `f` positions ago,
//! for any offset `f` up to `max_offset`. A forward scan tracks the
//! likelihood of being inside such a repeat; positions whose repeat
//! probability exceeds one half are rewritten to their lowercase codes
//! through the alphabet's numbers-to-lowercase table.
//!
//! Spans are independent, so the volume writer masks disjoint sequence
//! chunks in parallel.

use crate::alphabet::Alphabet;

/// Posterior threshold above which a letter is masked
const MIN_MASK_PROBABILITY: f64 = 0.5;

/// Probability that a repeat ends at each position
const REPEAT_END_PROBABILITY: f64 = 0.05;

/// A low-complexity region detector
#[derive(Debug, Clone)]
pub struct TantanMasker {
    /// Longest repeat period considered
    max_offset: usize,
    /// Probability of entering a repeat, split across offsets
    repeat_start: f64,
    /// Likelihood ratio for a letter matching its repeat source
    match_ratio: f64,
    /// Likelihood ratio for a mismatching letter
    mismatch_ratio: f64,
    /// Number of canonical letters; larger codes carry no repeat signal
    num_letters: u8,
}

impl TantanMasker {
    /// Set up the masker for an alphabet and sensitivity level
    ///
    /// `extra_sensitive` corresponds to the "repeat" setting (level 2):
    /// repeats start more readily and more gets masked.
    pub fn new(alphabet: &Alphabet, extra_sensitive: bool) -> Self {
        let n = alphabet.size() as f64;
        let max_offset = if alphabet.is_protein() { 50 } else { 100 };
        let repeat_start = if extra_sensitive { 0.02 } else { 0.005 };
        let match_probability = if alphabet.is_protein() { 0.5 } else { 0.7 };
        Self {
            max_offset,
            repeat_start,
            match_ratio: match_probability * n,
            mismatch_ratio: (1.0 - match_probability) / (n - 1.0) * n,
            num_letters: alphabet.size() as u8,
        }
    }

    /// Mask one sequence span in place
    ///
    /// `fold` is the code-to-uppercase table (repeat detection ignores
    /// case) and `mask_table` the numbers-to-lowercase table that the
    /// offending letters are rewritten through.
    pub fn mask(&self, span: &mut [u8], fold: &[u8], mask_table: &[u8]) {
        if span.len() < 2 {
            return;
        }

        // forward likelihoods, one state per repeat offset
        let mut repeat = vec![0.0f64; self.max_offset + 1];
        let mut background = 1.0f64;
        let start_per_offset = self.repeat_start / self.max_offset as f64;

        let mut masked = vec![false; span.len()];
        for i in 0..span.len() {
            let reachable = i.min(self.max_offset);
            let mut repeat_total = 0.0;
            for f in 1..=reachable {
                let emit = self.emission_ratio(fold[span[i] as usize], fold[span[i - f] as usize]);
                repeat[f] =
                    (repeat[f] * (1.0 - REPEAT_END_PROBABILITY) + background * start_per_offset)
                        * emit;
                repeat_total += repeat[f];
            }
            background = background * (1.0 - self.repeat_start)
                + repeat_total * REPEAT_END_PROBABILITY;

            // rescale so the likelihoods stay in floating-point range
            let scale = background + repeat_total;
            background /= scale;
            for f in 1..=reachable {
                repeat[f] /= scale;
            }

            if repeat_total / scale > MIN_MASK_PROBABILITY {
                masked[i] = true;
            }
        }

        for (c, &m) in span.iter_mut().zip(&masked) {
            if m {
                *c = mask_table[*c as usize];
            }
        }
    }

    /// Likelihood ratio of emitting `code` given the letter `source`
    /// seen one repeat period earlier; both are case-folded codes
    #[inline]
    fn emission_ratio(&self, code: u8, source: u8) -> f64 {
        if code >= self.num_letters || source >= self.num_letters {
            1.0
        } else if code == source {
            self.match_ratio
        } else {
            self.mismatch_ratio
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(alphabet: &Alphabet, s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        alphabet.encode_sequence(s.as_bytes(), false, &mut out);
        out
    }

    fn masked_count(alphabet: &Alphabet, span: &[u8]) -> usize {
        let n = alphabet.size() as u8;
        span.iter().filter(|&&c| c >= n && c < 2 * n).count()
    }

    #[test]
    fn test_simple_repeat_gets_masked() {
        let alphabet = Alphabet::dna();
        let masker = TantanMasker::new(&alphabet, false);
        let mut span = encoded(&alphabet, &"AC".repeat(40));
        masker.mask(
            &mut span,
            alphabet.numbers_to_uppercase(),
            alphabet.numbers_to_lowercase(),
        );
        assert!(
            masked_count(&alphabet, &span) > 0,
            "a pure AC repeat should get masked"
        );
    }

    #[test]
    fn test_non_repeat_stays_uppercase() {
        let alphabet = Alphabet::dna();
        let masker = TantanMasker::new(&alphabet, false);
        // no short-period repetition
        let mut span = encoded(&alphabet, "ACGTTGCAATCCGGATGCTA");
        let before = span.clone();
        masker.mask(
            &mut span,
            alphabet.numbers_to_uppercase(),
            alphabet.numbers_to_lowercase(),
        );
        assert_eq!(span, before);
    }

    #[test]
    fn test_extra_sensitive_masks_at_least_as_much() {
        let alphabet = Alphabet::dna();
        let text = format!("ACGTTGCAAT{}GGATGCTAAC", "CAG".repeat(12));
        let plain = TantanMasker::new(&alphabet, false);
        let extra = TantanMasker::new(&alphabet, true);

        let mut a = encoded(&alphabet, &text);
        plain.mask(
            &mut a,
            alphabet.numbers_to_uppercase(),
            alphabet.numbers_to_lowercase(),
        );
        let mut b = encoded(&alphabet, &text);
        extra.mask(
            &mut b,
            alphabet.numbers_to_uppercase(),
            alphabet.numbers_to_lowercase(),
        );

        assert!(masked_count(&alphabet, &b) >= masked_count(&alphabet, &a));
        assert!(masked_count(&alphabet, &b) > 0);
    }

    #[test]
    fn test_unknown_letters_are_neutral() {
        let alphabet = Alphabet::dna();
        let masker = TantanMasker::new(&alphabet, false);
        let mut span = encoded(&alphabet, &"N".repeat(60));
        let before = span.clone();
        masker.mask(
            &mut span,
            alphabet.numbers_to_uppercase(),
            alphabet.numbers_to_lowercase(),
        );
        assert_eq!(span, before, "an N run carries no repeat signal");
    }
}
