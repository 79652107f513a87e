//! Cyclic subset seeds
//!
//! A seed is a period-P sequence of subset maps. The map at position
//! `i mod P` partitions the alphabet into equivalence classes; letters
//! outside every class (and sentinels, and lowercase letters when case
//! sensitivity is on) map to a reserved delimiter class that terminates
//! any key passing through it. The seed governs which text positions
//! get indexed and how their suffixes compare during sorting and lookup.
//!
//! Seed text format, resolved one line at a time:
//! - `#` starts a comment; `#lastal …` lines are kept for manifest
//!   pass-through and `#seeddb …` lines carry embedded options
//! - `S group group …` (first token a single character) declares the
//!   subset alphabet used by pattern symbol `S`
//! - any other non-empty line is a pattern; each pattern yields one seed
//!   using the declarations seen so far

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::alphabet::Alphabet;
use crate::error::{Error, Result};

/// The reserved class for excluded letters; it ends a comparison key
pub const DELIMITER: u8 = u8::MAX;

/// A period-P cyclic sequence of subset maps over the alphabet codes
#[derive(Debug, Clone)]
pub struct CyclicSubsetSeed {
    /// One map per pattern position: letter code -> class or DELIMITER
    maps: Vec<Vec<u8>>,
    /// Number of classes of each map (DELIMITER not counted)
    class_counts: Vec<u8>,
}

impl CyclicSubsetSeed {
    /// Build a seed from one pattern and its symbol declarations
    ///
    /// `declarations` maps each pattern symbol to its letter groups.
    /// With `is_case_sensitive`, lowercase letter codes land in the
    /// delimiter class and are excluded from indexing.
    pub fn from_pattern(
        pattern: &str,
        declarations: &HashMap<char, Vec<String>>,
        is_case_sensitive: bool,
        alphabet: &Alphabet,
    ) -> Result<Self> {
        if pattern.is_empty() {
            return Err(Error::Config("empty seed pattern".to_string()));
        }
        let mut maps = Vec::with_capacity(pattern.len());
        let mut class_counts = Vec::with_capacity(pattern.len());
        for sym in pattern.chars() {
            let groups = declarations
                .get(&sym)
                .ok_or_else(|| Error::Config(format!("bad seed pattern symbol {sym:?}")))?;
            let (map, count) = subset_map(groups, is_case_sensitive, alphabet)?;
            maps.push(map);
            class_counts.push(count);
        }
        Ok(Self { maps, class_counts })
    }

    /// The seed's period P
    #[inline]
    pub fn period(&self) -> usize {
        self.maps.len()
    }

    /// Number of classes of the map at offset `depth mod P`
    #[inline]
    pub fn class_count(&self, depth: usize) -> usize {
        self.class_counts[depth % self.class_counts.len()] as usize
    }

    /// Classify a letter code at a given depth
    #[inline]
    pub fn class(&self, depth: usize, code: u8) -> u8 {
        self.maps[depth % self.maps.len()][code as usize]
    }

    /// True when the seed admits `pos` into the index
    #[inline]
    pub fn is_position_good(&self, text: &[u8], pos: usize) -> bool {
        self.maps[0][text[pos] as usize] != DELIMITER
    }

    /// Compare the suffixes starting at `a` and `b` under the seed
    ///
    /// The delimiter class ends a key, and a shorter key sorts before
    /// any longer key sharing its prefix. Equal keys are ordered by
    /// position, so the overall order is total and deterministic.
    pub fn suffix_compare(&self, text: &[u8], a: usize, b: usize) -> Ordering {
        let mut i = 0;
        loop {
            let ca = self.class(i, text[a + i]);
            let cb = self.class(i, text[b + i]);
            if ca == DELIMITER || cb == DELIMITER {
                return if ca == cb {
                    a.cmp(&b)
                } else if ca == DELIMITER {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
            }
            match ca.cmp(&cb) {
                Ordering::Equal => i += 1,
                unequal => return unequal,
            }
        }
    }

    /// Pack the first `depth` class indices of the suffix at `pos`
    /// into one mixed-radix integer, the bucket key
    ///
    /// Each level has radix `class_count + 1`: digit 0 marks a key that
    /// ended before this depth, and class `c` becomes digit `c + 1`, so
    /// bucket keys order exactly like [`suffix_compare`] prefixes.
    ///
    /// [`suffix_compare`]: CyclicSubsetSeed::suffix_compare
    pub fn bucket_value(&self, text: &[u8], pos: usize, depth: usize) -> usize {
        let mut value = 0usize;
        let mut ended = false;
        for i in 0..depth {
            value *= self.class_count(i) + 1;
            if !ended {
                let c = self.class(i, text[pos + i]);
                if c == DELIMITER {
                    ended = true;
                } else {
                    value += c as usize + 1;
                }
            }
        }
        value
    }

    /// Number of distinct bucket keys at `depth`
    pub fn bucket_key_count(&self, depth: usize) -> usize {
        (0..depth).map(|i| self.class_count(i) + 1).product()
    }
}

/// Build one subset map from letter groups
fn subset_map(
    groups: &[String],
    is_case_sensitive: bool,
    alphabet: &Alphabet,
) -> Result<(Vec<u8>, u8)> {
    if groups.is_empty() || groups.len() > DELIMITER as usize {
        return Err(Error::Config("bad subset alphabet".to_string()));
    }
    let n = alphabet.size() as u8;
    let mut map = vec![DELIMITER; alphabet.num_codes()];
    for (class, group) in groups.iter().enumerate() {
        for letter in group.bytes() {
            let upper = alphabet.encode(letter.to_ascii_uppercase());
            if upper >= n {
                return Err(Error::Config(format!(
                    "bad letter in subset alphabet: {:?}",
                    letter as char
                )));
            }
            if map[upper as usize] != DELIMITER {
                return Err(Error::Config(format!(
                    "repeated letter in subset alphabet: {:?}",
                    letter as char
                )));
            }
            map[upper as usize] = class as u8;
            if !is_case_sensitive {
                map[(upper + n) as usize] = class as u8;
            }
        }
    }
    Ok((map, groups.len() as u8))
}

/// One parsed seed text: seeds plus the lines kept for other consumers
#[derive(Debug, Default)]
pub struct ParsedSeeds {
    /// One seed per pattern line, in order of appearance
    pub seeds: Vec<CyclicSubsetSeed>,
    /// The pattern strings, parallel to `seeds`
    pub patterns: Vec<String>,
}

/// Parse seed text into seeds
///
/// Declarations accumulate down the file; every pattern line emits one
/// seed against the declarations seen so far.
pub fn parse_seed_text(
    text: &str,
    is_case_sensitive: bool,
    alphabet: &Alphabet,
) -> Result<ParsedSeeds> {
    let mut declarations: HashMap<char, Vec<String>> = HashMap::new();
    let mut parsed = ParsedSeeds::default();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let first = tokens.next().expect("non-empty line has a token");
        let rest: Vec<String> = tokens.map(str::to_string).collect();
        if !rest.is_empty() {
            if first.chars().count() != 1 {
                return Err(Error::Config(format!(
                    "bad subset alphabet line: {line:?}"
                )));
            }
            let symbol = first.chars().next().expect("checked single char");
            declarations.insert(symbol, rest);
        } else {
            let seed =
                CyclicSubsetSeed::from_pattern(first, &declarations, is_case_sensitive, alphabet)?;
            parsed.seeds.push(seed);
            parsed.patterns.push(first.to_string());
        }
    }
    Ok(parsed)
}

/// Collect `#lastal …` lines for manifest pass-through
pub fn lastal_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| line.starts_with("#lastal"))
        .map(str::to_string)
        .collect()
}

/// Collect the tokens of `#seeddb …` lines: options embedded in a
/// seed file, merged underneath command-line options
pub fn embedded_option_tokens(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.strip_prefix("#seeddb"))
        .flat_map(|rest| rest.split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Expand bare pattern strings into seed text
///
/// `1` matches each letter exactly, `0` collapses all letters into one
/// class, and for DNA `T`/`t` group transitions (`AG CT`). Several
/// patterns may be given separated by commas.
pub fn string_from_patterns(patterns: &str, letters: &str) -> String {
    let mut text = String::new();
    text.push('1');
    for c in letters.chars() {
        text.push(' ');
        text.push(c);
    }
    text.push('\n');
    text.push_str("0 ");
    text.push_str(letters);
    text.push('\n');
    if letters == crate::alphabet::DNA {
        text.push_str("T AG CT\n");
        text.push_str("t AG CT\n");
    }
    for pattern in patterns.split(',') {
        let pattern = pattern.trim();
        if !pattern.is_empty() {
            text.push_str(pattern);
            text.push('\n');
        }
    }
    text
}

/// Seed text of a built-in named seed, if the name is known
pub fn string_from_name(name: &str) -> Option<&'static str> {
    match name {
        // YASS-like transition-tolerant DNA seed
        "YASS" => Some(
            "1 A C G T\n\
             0 ACGT\n\
             T AG CT\n\
             1T1001100101\n",
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dna_text(s: &str) -> (Alphabet, Vec<u8>) {
        let alphabet = Alphabet::dna();
        let mut text = Vec::new();
        alphabet.encode_sequence(s.as_bytes(), true, &mut text);
        text.push(alphabet.sentinel());
        (alphabet, text)
    }

    fn exact_seed(pattern: &str, alphabet: &Alphabet) -> CyclicSubsetSeed {
        let text = string_from_patterns(pattern, alphabet.letters());
        let parsed = parse_seed_text(&text, true, alphabet).unwrap();
        assert_eq!(parsed.seeds.len(), 1);
        parsed.seeds.into_iter().next().unwrap()
    }

    #[test]
    fn test_exact_seed_classifies_letters() {
        let (alphabet, text) = dna_text("ACGT");
        let seed = exact_seed("1", &alphabet);
        assert_eq!(seed.period(), 1);
        assert_eq!(seed.class_count(0), 4);
        for pos in 0..4 {
            assert!(seed.is_position_good(&text, pos));
            assert_eq!(seed.class(0, text[pos]), pos as u8);
        }
        // sentinel is excluded
        assert!(!seed.is_position_good(&text, 4));
    }

    #[test]
    fn test_suffix_compare_is_lexicographic() {
        let (alphabet, text) = dna_text("ACGTACGT");
        let seed = exact_seed("1", &alphabet);
        // suffix "ACGT..." < suffix "CGT..."
        assert_eq!(seed.suffix_compare(&text, 0, 1), Ordering::Less);
        assert_eq!(seed.suffix_compare(&text, 1, 0), Ordering::Greater);
        // "ACGT" (short, at 4) < "ACGTACGT" (long, at 0): delimiter ends the key
        assert_eq!(seed.suffix_compare(&text, 4, 0), Ordering::Less);
        // equal keys tie-break by position
        assert_eq!(seed.suffix_compare(&text, 3, 3), Ordering::Equal);
    }

    #[test]
    fn test_transition_seed_collapses_classes() {
        let alphabet = Alphabet::dna();
        let parsed = parse_seed_text("T AG CT\nT\n", true, &alphabet).unwrap();
        let seed = &parsed.seeds[0];
        assert_eq!(seed.class_count(0), 2);
        let a = alphabet.encode(b'A');
        let g = alphabet.encode(b'G');
        let c = alphabet.encode(b'C');
        assert_eq!(seed.class(0, a), seed.class(0, g));
        assert_ne!(seed.class(0, a), seed.class(0, c));
    }

    #[test]
    fn test_case_sensitivity_excludes_lowercase() {
        let alphabet = Alphabet::dna();
        let masked = parse_seed_text("1 A C G T\n1\n", true, &alphabet).unwrap();
        let lenient = parse_seed_text("1 A C G T\n1\n", false, &alphabet).unwrap();
        let a_low = alphabet.encode(b'a');
        assert_eq!(masked.seeds[0].class(0, a_low), DELIMITER);
        assert_eq!(lenient.seeds[0].class(0, a_low), 0);
    }

    #[test]
    fn test_bucket_value_mixed_radix() {
        let (alphabet, text) = dna_text("ACGT");
        let seed = exact_seed("1", &alphabet);
        // radix 5 per level; digits are class + 1
        assert_eq!(seed.bucket_value(&text, 0, 2), 5 * 1 + 2); // A,C
        assert_eq!(seed.bucket_value(&text, 2, 2), 5 * 3 + 4); // G,T
        // key ends at the sentinel: trailing digits are 0
        assert_eq!(seed.bucket_value(&text, 3, 2), 5 * 4);
        assert_eq!(seed.bucket_key_count(2), 25);
    }

    #[test]
    fn test_period_two_pattern() {
        let (alphabet, text) = dna_text("ACAC");
        let parsed = parse_seed_text(
            &string_from_patterns("10", alphabet.letters()),
            true,
            &alphabet,
        )
        .unwrap();
        let seed = &parsed.seeds[0];
        assert_eq!(seed.period(), 2);
        assert_eq!(seed.class_count(0), 4);
        assert_eq!(seed.class_count(1), 1);
        // depth 1 map collapses everything into one class
        assert_eq!(seed.class(1, text[0]), seed.class(1, text[1]));
    }

    #[test]
    fn test_yass_builtin_parses() {
        let alphabet = Alphabet::dna();
        let text = string_from_name("YASS").unwrap();
        let parsed = parse_seed_text(text, true, &alphabet).unwrap();
        assert_eq!(parsed.seeds.len(), 1);
        assert_eq!(parsed.patterns[0], "1T1001100101");
        assert_eq!(parsed.seeds[0].period(), 12);
        assert!(string_from_name("NOSUCH").is_none());
    }

    #[test]
    fn test_unknown_pattern_symbol_is_an_error() {
        let alphabet = Alphabet::dna();
        let err = parse_seed_text("1 A C G T\n1X1\n", true, &alphabet);
        assert!(err.is_err());
    }

    #[test]
    fn test_option_line_extraction() {
        let text = "#lastal -r5 -q5\n1 A C G T\n#seeddb --index-step 2\n1\n";
        assert_eq!(lastal_lines(text), vec!["#lastal -r5 -q5".to_string()]);
        assert_eq!(
            embedded_option_tokens(text),
            vec!["--index-step".to_string(), "2".to_string()]
        );
    }
}
