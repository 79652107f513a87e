//! Bucket directory over the sorted positions
//!
//! The bucket table maps every depth-`b` seed prefix to the lower
//! bound of its half-open range in the sorted positions, so a lookup
//! can jump straight to the right slice before binary-searching. Keys
//! come from [`CyclicSubsetSeed::bucket_value`], whose mixed-radix
//! packing orders exactly like the suffix sort.
//!
//! [`CyclicSubsetSeed::bucket_value`]: crate::seed::CyclicSubsetSeed::bucket_value

use crate::error::Result;
use crate::seed::CyclicSubsetSeed;
use crate::Position;

/// Lower bounds of every depth-`b` prefix range
#[derive(Debug, Clone, Default)]
pub struct BucketTable {
    /// The prefix depth `b`
    pub depth: usize,
    /// `starts[k]..starts[k+1]` holds the suffixes with prefix key `k`;
    /// one trailing entry equals the position count
    pub starts: Vec<Position>,
}

impl BucketTable {
    /// The range of sorted positions whose prefix packs to `key`
    pub fn range(&self, key: usize) -> std::ops::Range<usize> {
        self.starts[key] as usize..self.starts[key + 1] as usize
    }
}

/// Build the bucket table at `depth` (or a size-derived default)
///
/// `min_seed_limit` is the sort's unsorted-tail threshold. A limit
/// above 1 leaves ranges frozen at arbitrary refinement depths, where
/// positions with different deep prefixes interleave; a lower-bound
/// table is only correct over positions actually sorted to its depth,
/// so the directory collapses to depth 0 in that case.
pub fn make_buckets(
    positions: &[Position],
    seed: &CyclicSubsetSeed,
    text: &[u8],
    depth: Option<usize>,
    min_seed_limit: usize,
) -> Result<BucketTable> {
    let depth = if min_seed_limit > 1 {
        0
    } else {
        depth.unwrap_or_else(|| default_bucket_depth(seed, positions.len()))
    };
    let key_count = seed.bucket_key_count(depth);

    let mut starts: Vec<Position> = Vec::new();
    starts.try_reserve_exact(key_count + 1)?;
    starts.resize(key_count + 1, 0);

    for &p in positions {
        let key = seed.bucket_value(text, p as usize, depth);
        starts[key + 1] += 1;
    }
    for k in 1..=key_count {
        starts[k] += starts[k - 1];
    }
    debug_assert_eq!(starts[key_count] as usize, positions.len());

    Ok(BucketTable { depth, starts })
}

/// The deepest bucket depth whose table stays within a quarter of the
/// positions array
pub fn default_bucket_depth(seed: &CyclicSubsetSeed, num_positions: usize) -> usize {
    let cap = (num_positions / 4).max(1);
    let mut depth = 0;
    let mut keys = 1usize;
    loop {
        let radix = seed.class_count(depth) + 1;
        match keys.checked_mul(radix) {
            Some(next) if next <= cap => {
                keys = next;
                depth += 1;
            }
            _ => return depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::Alphabet;
    use crate::seed::{parse_seed_text, string_from_patterns};
    use crate::suffix_array::sort::sort_positions;

    fn setup(s: &str) -> (Vec<u8>, CyclicSubsetSeed) {
        let alphabet = Alphabet::dna();
        let mut text = Vec::new();
        alphabet.encode_sequence(s.as_bytes(), true, &mut text);
        text.push(alphabet.sentinel());
        let parsed = parse_seed_text(
            &string_from_patterns("1", alphabet.letters()),
            true,
            &alphabet,
        )
        .unwrap();
        (text, parsed.seeds.into_iter().next().unwrap())
    }

    fn sorted_positions(text: &[u8], seed: &CyclicSubsetSeed) -> Vec<Position> {
        let mut positions: Vec<Position> = (0..text.len() - 1)
            .filter(|&p| seed.is_position_good(text, p))
            .map(|p| p as Position)
            .collect();
        sort_positions(&mut positions, None, seed, text, 0);
        positions
    }

    #[test]
    fn test_depth_zero_is_one_bucket() {
        let (text, seed) = setup("ACGTACGT");
        let positions = sorted_positions(&text, &seed);
        let table = make_buckets(&positions, &seed, &text, Some(0), 0).unwrap();
        assert_eq!(table.starts, vec![0, positions.len() as Position]);
        assert_eq!(table.range(0), 0..positions.len());
    }

    #[test]
    fn test_buckets_partition_the_positions() {
        let (text, seed) = setup("TGCATGCAGTACGTAGCTAGGCTACGATCG");
        let positions = sorted_positions(&text, &seed);
        let depth = 2;
        let table = make_buckets(&positions, &seed, &text, Some(depth), 0).unwrap();
        assert_eq!(table.starts.len(), seed.bucket_key_count(depth) + 1);
        assert_eq!(*table.starts.first().unwrap(), 0);
        assert_eq!(*table.starts.last().unwrap() as usize, positions.len());

        // every position sits inside its own key's range, and nowhere else
        for key in 0..seed.bucket_key_count(depth) {
            for i in table.range(key) {
                let got = seed.bucket_value(&text, positions[i] as usize, depth);
                assert_eq!(got, key);
            }
        }
    }

    #[test]
    fn test_bucket_starts_are_monotone() {
        let (text, seed) = setup(&"GATC".repeat(20));
        let positions = sorted_positions(&text, &seed);
        let table = make_buckets(&positions, &seed, &text, Some(3), 0).unwrap();
        for pair in table.starts.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }

    #[test]
    fn test_unsorted_tails_collapse_the_directory() {
        let (text, seed) = setup(&"GATC".repeat(20));
        // refinement stops at ranges of 4, so deep prefixes interleave
        // and only the depth-0 directory is valid
        let mut positions: Vec<Position> = (0..text.len() - 1)
            .filter(|&p| seed.is_position_good(&text, p))
            .map(|p| p as Position)
            .collect();
        sort_positions(&mut positions, None, &seed, &text, 4);

        let table = make_buckets(&positions, &seed, &text, Some(2), 4).unwrap();
        assert_eq!(table.depth, 0);
        assert_eq!(table.starts, vec![0, positions.len() as Position]);
        for i in table.range(0) {
            assert_eq!(seed.bucket_value(&text, positions[i] as usize, table.depth), 0);
        }

        // the auto-derived depth is clamped the same way
        let auto = make_buckets(&positions, &seed, &text, None, 4).unwrap();
        assert_eq!(auto.depth, 0);
    }

    #[test]
    fn test_default_depth_tracks_position_count() {
        let (_, seed) = setup("ACGT");
        // radix 5 per level: depth d needs 5^d keys within n/4
        assert_eq!(default_bucket_depth(&seed, 4), 0);
        assert_eq!(default_bucket_depth(&seed, 20), 1);
        assert_eq!(default_bucket_depth(&seed, 100), 2);
        assert_eq!(default_bucket_depth(&seed, 500), 3);
    }
}
