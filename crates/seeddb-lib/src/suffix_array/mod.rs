//! Subset suffix arrays
//!
//! For one seed, a [`SubsetSuffixArray`] holds the text positions the
//! seed admits, sorted by seed-wise suffix comparison, together with a
//! bucket directory for fast prefix lookup and an optional child table
//! that turns binary search over the array into a walk that inspects
//! each pattern letter once.
//!
//! On disk (little-endian), one file per seed:
//!
//! ```text
//! magic            "SEEDDBSA"
//! version          u32 major, u32 minor
//! text length      u64
//! position count   u64
//! period           u32, then one class-count byte per seed position
//! bucket depth     u32
//! bucket length    u64
//! child kind       u8 (0 none, 1 byte, 2 short, 3 full)
//! positions        u32 each
//! bucket table     u32 each
//! child table      1, 2 or 4 bytes each, per kind
//! ```

pub mod buckets;
pub(crate) mod sort;

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::config::ChildTableKind;
use crate::error::{Error, Result};
use crate::seed::CyclicSubsetSeed;
use crate::Position;

pub use buckets::{default_bucket_depth, make_buckets, BucketTable};

/// Magic bytes of the suffix-array file format
const MAGIC: &[u8; 8] = b"SEEDDBSA";

/// File format version: (major, minor)
const FORMAT_VERSION: (u32, u32) = (1, 0);

/// Sibling-boundary table accelerating string binary search
///
/// An entry is stored at the first index of every non-final sibling
/// group produced by the suffix sort and holds the group's end. `Byte`
/// and `Short` store the saturating delta `end - index`; a saturated
/// delta means "out of range" and consumers fall back to searching.
#[derive(Debug, Clone, Default)]
pub enum ChildTable {
    /// No child table
    #[default]
    None,
    /// Saturating one-byte deltas
    Byte(Vec<u8>),
    /// Saturating two-byte deltas
    Short(Vec<u16>),
    /// Absolute boundaries
    Full(Vec<Position>),
}

impl ChildTable {
    fn kind_code(&self) -> u8 {
        match self {
            ChildTable::None => 0,
            ChildTable::Byte(_) => 1,
            ChildTable::Short(_) => 2,
            ChildTable::Full(_) => 3,
        }
    }

    fn from_boundaries(kind: ChildTableKind, boundaries: Vec<Position>) -> Self {
        match kind {
            ChildTableKind::None => ChildTable::None,
            ChildTableKind::Byte => ChildTable::Byte(
                boundaries
                    .iter()
                    .enumerate()
                    .map(|(i, &b)| saturating_delta(i, b).min(u8::MAX as Position) as u8)
                    .collect(),
            ),
            ChildTableKind::Short => ChildTable::Short(
                boundaries
                    .iter()
                    .enumerate()
                    .map(|(i, &b)| saturating_delta(i, b).min(u16::MAX as Position) as u16)
                    .collect(),
            ),
            ChildTableKind::Full => ChildTable::Full(boundaries),
        }
    }
}

/// Delta of a boundary from its index; zero stays "no entry"
#[inline]
fn saturating_delta(index: usize, boundary: Position) -> Position {
    if boundary == 0 {
        0
    } else {
        boundary - index as Position
    }
}

/// The positions admitted by one seed, plus lookup acceleration
#[derive(Debug, Default)]
pub struct SubsetSuffixArray {
    positions: Vec<Position>,
    buckets: BucketTable,
    child: ChildTable,
}

impl SubsetSuffixArray {
    /// Create an empty array
    pub fn new() -> Self {
        Self::default()
    }

    /// Gather the admitted positions of one sequence span
    ///
    /// Scans `beg, beg+step, …` within `[beg, end)` and keeps the
    /// positions the seed classifies. With `window > 1` only positions
    /// whose suffix is minimal within a window of that many admitted
    /// candidates survive (earliest position on ties).
    pub fn add_positions(
        &mut self,
        seed: &CyclicSubsetSeed,
        text: &[u8],
        beg: usize,
        end: usize,
        step: usize,
        window: usize,
    ) {
        let candidates = (beg..end)
            .step_by(step)
            .filter(|&p| seed.is_position_good(text, p));

        if window <= 1 {
            self.positions.extend(candidates.map(|p| p as Position));
            return;
        }

        // monotone queue of (candidate rank, position), front minimal;
        // ties keep the earlier position
        let mut queue: VecDeque<(usize, usize)> = VecDeque::new();
        let mut last_kept = None;
        for (i, pos) in candidates.enumerate() {
            while let Some(&(_, back)) = queue.back() {
                if seed.suffix_compare(text, pos, back) == std::cmp::Ordering::Less {
                    queue.pop_back();
                } else {
                    break;
                }
            }
            queue.push_back((i, pos));
            while let Some(&(rank, _)) = queue.front() {
                if rank + window <= i {
                    queue.pop_front();
                } else {
                    break;
                }
            }
            if i + 1 >= window {
                let &(_, front) = queue.front().expect("queue holds the window minimum");
                if last_kept != Some(front) {
                    self.positions.push(front as Position);
                    last_kept = Some(front);
                }
            }
        }
    }

    /// Sort the positions by suffix comparison under the seed
    ///
    /// Ranges no longer than `min_seed_limit` are left unsorted for the
    /// consumer to finish on demand. A child table is recorded when
    /// `child_kind` asks for one.
    pub fn sort_index(
        &mut self,
        seed: &CyclicSubsetSeed,
        text: &[u8],
        min_seed_limit: usize,
        child_kind: ChildTableKind,
    ) -> Result<()> {
        let mut boundaries: Vec<Position> = Vec::new();
        let child_slice = if child_kind == ChildTableKind::None {
            None
        } else {
            boundaries.try_reserve_exact(self.positions.len())?;
            boundaries.resize(self.positions.len(), 0);
            Some(boundaries.as_mut_slice())
        };

        sort::sort_positions(&mut self.positions, child_slice, seed, text, min_seed_limit);

        self.child = ChildTable::from_boundaries(child_kind, boundaries);
        Ok(())
    }

    /// Build the bucket directory at `depth` (or a size-derived default)
    ///
    /// `min_seed_limit` must be the value the sort ran with: unsorted
    /// tails cap how deep a correct directory can go.
    pub fn make_buckets(
        &mut self,
        seed: &CyclicSubsetSeed,
        text: &[u8],
        depth: Option<usize>,
        min_seed_limit: usize,
    ) -> Result<()> {
        self.buckets =
            buckets::make_buckets(&self.positions, seed, text, depth, min_seed_limit)?;
        Ok(())
    }

    /// The sorted positions
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// The bucket directory
    pub fn buckets(&self) -> &BucketTable {
        &self.buckets
    }

    /// The child table
    pub fn child(&self) -> &ChildTable {
        &self.child
    }

    /// Write the array to one file
    pub fn write_file(
        &self,
        seed: &CyclicSubsetSeed,
        path: &Path,
        text_len: usize,
    ) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::file("write", path, e))?;
        let mut w = BufWriter::new(file);
        self.write_to(seed, &mut w, text_len)
            .map_err(|e| Error::file("write", path, e))
    }

    fn write_to(
        &self,
        seed: &CyclicSubsetSeed,
        w: &mut impl Write,
        text_len: usize,
    ) -> std::io::Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&FORMAT_VERSION.0.to_le_bytes())?;
        w.write_all(&FORMAT_VERSION.1.to_le_bytes())?;
        w.write_all(&(text_len as u64).to_le_bytes())?;
        w.write_all(&(self.positions.len() as u64).to_le_bytes())?;
        w.write_all(&(seed.period() as u32).to_le_bytes())?;
        for i in 0..seed.period() {
            w.write_all(&[seed.class_count(i) as u8])?;
        }
        w.write_all(&(self.buckets.depth as u32).to_le_bytes())?;
        w.write_all(&(self.buckets.starts.len() as u64).to_le_bytes())?;
        w.write_all(&[self.child.kind_code()])?;

        for &p in &self.positions {
            w.write_all(&p.to_le_bytes())?;
        }
        for &b in &self.buckets.starts {
            w.write_all(&b.to_le_bytes())?;
        }
        match &self.child {
            ChildTable::None => {}
            ChildTable::Byte(t) => w.write_all(t)?,
            ChildTable::Short(t) => {
                for &c in t {
                    w.write_all(&c.to_le_bytes())?;
                }
            }
            ChildTable::Full(t) => {
                for &c in t {
                    w.write_all(&c.to_le_bytes())?;
                }
            }
        }
        w.flush()
    }
}

/// A suffix-array file read back into memory
#[derive(Debug)]
pub struct SsaFile {
    /// Length of the text the positions index into
    pub text_len: u64,
    /// The sorted positions
    pub positions: Vec<Position>,
    /// Per-position class counts of the seed, one entry per period slot
    pub class_counts: Vec<u8>,
    /// The bucket depth
    pub bucket_depth: usize,
    /// The bucket table
    pub bucket_starts: Vec<Position>,
    /// The child table
    pub child: ChildTable,
}

/// Read a suffix-array file written by [`SubsetSuffixArray::write_file`]
pub fn read_file(path: &Path) -> Result<SsaFile> {
    let file = File::open(path).map_err(|e| Error::file("open", path, e))?;
    let mut r = BufReader::new(file);
    read_from(&mut r).map_err(|e| Error::file("read", path, e))
}

fn read_from(r: &mut impl Read) -> std::io::Result<SsaFile> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "bad suffix-array file magic",
        ));
    }
    let major = read_u32(r)?;
    let _minor = read_u32(r)?;
    if major != FORMAT_VERSION.0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("unsupported suffix-array format version {major}"),
        ));
    }
    let text_len = read_u64(r)?;
    let num_positions = read_u64(r)? as usize;
    let period = read_u32(r)? as usize;
    let mut class_counts = vec![0u8; period];
    r.read_exact(&mut class_counts)?;
    let bucket_depth = read_u32(r)? as usize;
    let bucket_len = read_u64(r)? as usize;
    let mut kind = [0u8; 1];
    r.read_exact(&mut kind)?;

    let mut positions = Vec::with_capacity(num_positions);
    for _ in 0..num_positions {
        positions.push(read_u32(r)?);
    }
    let mut bucket_starts = Vec::with_capacity(bucket_len);
    for _ in 0..bucket_len {
        bucket_starts.push(read_u32(r)?);
    }
    let child = match kind[0] {
        0 => ChildTable::None,
        1 => {
            let mut t = vec![0u8; num_positions];
            r.read_exact(&mut t)?;
            ChildTable::Byte(t)
        }
        2 => {
            let mut t = Vec::with_capacity(num_positions);
            for _ in 0..num_positions {
                let mut b = [0u8; 2];
                r.read_exact(&mut b)?;
                t.push(u16::from_le_bytes(b));
            }
            ChildTable::Short(t)
        }
        3 => {
            let mut t = Vec::with_capacity(num_positions);
            for _ in 0..num_positions {
                t.push(read_u32(r)?);
            }
            ChildTable::Full(t)
        }
        k => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("bad child table kind {k}"),
            ))
        }
    };

    Ok(SsaFile {
        text_len,
        positions,
        class_counts,
        bucket_depth,
        bucket_starts,
        child,
    })
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}
