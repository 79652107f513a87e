//! Multikey sorting of seed positions
//!
//! Positions are sorted by seed-wise suffix comparison using a
//! radix-like refinement: partition a range by class at its current
//! depth, then refine each class group one level deeper. Refinement
//! uses an explicit work stack, so pathological repeats cannot
//! overflow the call stack. The delimiter group of a partition holds
//! exhausted keys; it is ordered by position (the counting sort is
//! stable and gathering produces ascending positions) and never
//! refined. Groups no longer than the unsorted limit are left as-is.
//!
//! Parallelism: the top of the refinement tree is expanded until there
//! are enough independent ranges to occupy the thread pool, then the
//! ranges are refined concurrently.

use std::collections::BinaryHeap;

use rayon::prelude::*;

use crate::seed::{CyclicSubsetSeed, DELIMITER};
use crate::Position;

/// One pending refinement range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Task {
    len: usize,
    beg: usize,
    end: usize,
    depth: usize,
}

impl Ord for Task {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // heap by length, position as a deterministic tie-break
        (self.len, other.beg).cmp(&(other.len, self.beg))
    }
}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort `positions` by suffix comparison under `seed`
///
/// When `child` is given it must be zero-filled and as long as
/// `positions`; the start of every non-final sibling group receives
/// the group's end index (shallowest depth wins).
pub(crate) fn sort_positions(
    positions: &mut [Position],
    mut child: Option<&mut [Position]>,
    seed: &CyclicSubsetSeed,
    text: &[u8],
    min_seed_limit: usize,
) {
    let limit = min_seed_limit.max(1);
    let n = positions.len();
    if n <= limit {
        return;
    }

    // expand the top of the tree until the pool has enough to chew on
    let target_tasks = rayon::current_num_threads() * 4;
    let mut scratch: Vec<Position> = Vec::new();
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut heap = BinaryHeap::new();
    heap.push(Task {
        len: n,
        beg: 0,
        end: n,
        depth: 0,
    });
    while heap.len() < target_tasks {
        let Some(task) = heap.pop() else { break };
        partition(
            positions,
            child.as_mut().map(|c| &mut **c),
            0,
            task,
            seed,
            text,
            &mut scratch,
            &mut groups,
        );
        for &(beg, end) in &groups {
            if end - beg > limit {
                heap.push(Task {
                    len: end - beg,
                    beg,
                    end,
                    depth: task.depth + 1,
                });
            }
        }
    }

    // refine the surviving ranges concurrently; they are disjoint, so
    // the slices (and the matching child slices) can be split apart
    let mut tasks: Vec<Task> = heap.into_vec();
    tasks.sort_unstable_by_key(|t| t.beg);

    let mut jobs = Vec::with_capacity(tasks.len());
    let mut rest = positions;
    let mut child_rest = child;
    let mut consumed = 0;
    for task in tasks {
        let (_, tail) = rest.split_at_mut(task.beg - consumed);
        let (range, tail) = tail.split_at_mut(task.end - task.beg);
        rest = tail;
        let child_range = match child_rest.take() {
            Some(c) => {
                let (_, tail) = c.split_at_mut(task.beg - consumed);
                let (range, tail) = tail.split_at_mut(task.end - task.beg);
                child_rest = Some(tail);
                Some(range)
            }
            None => None,
        };
        consumed = task.end;
        jobs.push((task, range, child_range));
    }

    jobs.into_par_iter().for_each(|(task, range, child_range)| {
        refine_range(range, child_range, task.beg, task.depth, seed, text, limit);
    });
}

/// Refine one range to completion with a local work stack
fn refine_range(
    range: &mut [Position],
    mut child: Option<&mut [Position]>,
    base: usize,
    depth: usize,
    seed: &CyclicSubsetSeed,
    text: &[u8],
    limit: usize,
) {
    let mut scratch: Vec<Position> = Vec::with_capacity(range.len());
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut stack = vec![Task {
        len: range.len(),
        beg: 0,
        end: range.len(),
        depth,
    }];
    while let Some(task) = stack.pop() {
        partition(
            range,
            child.as_mut().map(|c| &mut **c),
            base,
            task,
            seed,
            text,
            &mut scratch,
            &mut groups,
        );
        for &(beg, end) in &groups {
            if end - beg > limit {
                stack.push(Task {
                    len: end - beg,
                    beg,
                    end,
                    depth: task.depth + 1,
                });
            }
        }
    }
}

/// Partition one range by class at its depth
///
/// Reorders `positions[task.beg..task.end]` stably into the delimiter
/// group followed by the class groups in ascending class order, writes
/// sibling boundaries into `child`, and returns the refinable (non-
/// delimiter) groups through `groups`.
#[allow(clippy::too_many_arguments)]
fn partition(
    positions: &mut [Position],
    child: Option<&mut [Position]>,
    base: usize,
    task: Task,
    seed: &CyclicSubsetSeed,
    text: &[u8],
    scratch: &mut Vec<Position>,
    groups: &mut Vec<(usize, usize)>,
) {
    groups.clear();
    let Task { beg, end, depth, .. } = task;
    let num_bins = seed.class_count(depth) + 1;
    let mut counts = [0usize; 65];
    debug_assert!(num_bins <= counts.len());

    for &p in &positions[beg..end] {
        counts[bin_of(seed, text, p, depth)] += 1;
    }

    // a range entirely in one class needs no reorder
    if counts[..num_bins].iter().any(|&c| c == end - beg) {
        if counts[0] != end - beg {
            // single non-delimiter class: refine it one level deeper
            groups.push((beg, end));
        }
        return;
    }

    let mut starts = [0usize; 66];
    for bin in 0..num_bins {
        starts[bin + 1] = starts[bin] + counts[bin];
    }

    scratch.clear();
    scratch.extend_from_slice(&positions[beg..end]);
    let mut cursors = starts;
    for &p in scratch.iter() {
        let bin = bin_of(seed, text, p, depth);
        positions[beg + cursors[bin]] = p;
        cursors[bin] += 1;
    }

    // sibling boundaries at group starts; deeper partitions must not
    // clobber a boundary already set at a shallower depth
    if let Some(child) = child {
        let mut last_nonempty = 0;
        for bin in 0..num_bins {
            if counts[bin] > 0 {
                last_nonempty = bin;
            }
        }
        for bin in 0..num_bins {
            if counts[bin] == 0 || bin == last_nonempty {
                continue;
            }
            let group_beg = beg + starts[bin];
            let group_end = beg + starts[bin + 1];
            if child[group_beg] == 0 {
                child[group_beg] = (base + group_end) as Position;
            }
        }
    }

    for bin in 1..num_bins {
        if counts[bin] > 0 {
            groups.push((beg + starts[bin], beg + starts[bin + 1]));
        }
    }
}

/// Bin index at `depth`: 0 for the delimiter class, class + 1 otherwise
#[inline]
fn bin_of(seed: &CyclicSubsetSeed, text: &[u8], pos: Position, depth: usize) -> usize {
    let class = seed.class(depth, text[pos as usize + depth]);
    if class == DELIMITER {
        0
    } else {
        class as usize + 1
    }
}
