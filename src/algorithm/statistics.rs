//! Streaming central moments over matrix blocks
//!
//! Each block yields one [`CentralMoment`] per column (or row) it covers:
//! stored non-zeros are folded in with Welford's update, and the block's
//! implicit zeros are merged in closed form, so sparse blocks cost
//! `O(nnz)`. Partials from different blocks of the same column are then
//! combined with Chan's pairwise formula.
//!
//! Merging is not associative in floating point, so partials are always
//! combined in ascending [`BlockIndex`] order. Every backend therefore rounds
//! identically no matter in which order its tasks finished.

use crate::block::{BlockStorage, MatrixBlock};
use crate::error::{Error, Result};
use crate::matrix::{BlockIndex, BlockLayout};

/// Which dimension an aggregate reduces over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Axis {
    /// One result per column, reducing over rows
    #[default]
    Columns,
    /// One result per row, reducing over columns
    Rows,
}

impl Axis {
    /// Number of results for a matrix of the given shape
    #[inline]
    pub fn output_len(&self, shape: [usize; 2]) -> usize {
        match self {
            Axis::Columns => shape[1],
            Axis::Rows => shape[0],
        }
    }

    /// Number of values reduced into each result
    #[inline]
    pub fn reduced_len(&self, shape: [usize; 2]) -> usize {
        match self {
            Axis::Columns => shape[0],
            Axis::Rows => shape[1],
        }
    }
}

/// Count, mean and sum of squared deviations of a stream of values
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CentralMoment {
    /// Number of values seen
    pub count: usize,
    /// Running mean
    pub mean: f64,
    /// Sum of squared deviations from the mean
    pub m2: f64,
}

impl CentralMoment {
    /// Moments of `count` zeros
    #[inline]
    pub fn zeros(count: usize) -> Self {
        Self {
            count,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Welford update with one value
    #[inline]
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Account for `count` implicit zeros
    #[inline]
    pub fn push_zeros(&mut self, count: usize) {
        self.merge(&Self::zeros(count));
    }

    /// Chan's pairwise combination of two partial moments
    pub fn merge(&mut self, other: &Self) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let na = self.count as f64;
        let nb = other.count as f64;
        let n = na + nb;
        let delta = other.mean - self.mean;
        self.mean += delta * nb / n;
        self.m2 += other.m2 + delta * delta * na * nb / n;
        self.count += other.count;
    }

    /// Variance with `correction` degrees of freedom removed
    ///
    /// Returns 0 when `count <= correction`; a single observation has no
    /// sample spread.
    pub fn variance(&self, correction: usize) -> f64 {
        if self.count <= correction {
            return 0.0;
        }
        (self.m2 / (self.count - correction) as f64).max(0.0)
    }

    /// Square root of [`variance`](Self::variance)
    #[inline]
    pub fn std_dev(&self, correction: usize) -> f64 {
        self.variance(correction).sqrt()
    }
}

/// Per-column (or per-row) moments of one block, implicit zeros included
pub fn block_moments(block: &MatrixBlock, axis: Axis) -> Vec<CentralMoment> {
    let shape = block.shape();
    let mut moments = vec![CentralMoment::default(); axis.output_len(shape)];
    block.for_each_nonzero(|i, j, v| {
        let slot = match axis {
            Axis::Columns => j,
            Axis::Rows => i,
        };
        moments[slot].push(v);
    });
    let reduced = axis.reduced_len(shape);
    for m in &mut moments {
        let zeros = reduced - m.count;
        m.push_zeros(zeros);
    }
    moments
}

/// Combine per-block partials into one moment per column (or row)
///
/// Partials are merged in ascending block order. A block reported more than
/// once (a duplicated task attempt) is counted once.
///
/// # Errors
///
/// `ShapeMismatch` if a partial's length disagrees with its block, or
/// `IndexOutOfBounds` if an index lies outside `layout`.
pub fn assemble_moments(
    layout: &BlockLayout,
    axis: Axis,
    mut partials: Vec<(BlockIndex, Vec<CentralMoment>)>,
) -> Result<Vec<CentralMoment>> {
    partials.sort_by_key(|(index, _)| *index);
    partials.dedup_by_key(|(index, _)| *index);

    let mut out = vec![CentralMoment::default(); axis.output_len(layout.shape())];
    for (index, moments) in &partials {
        if !layout.contains(*index) {
            return Err(Error::IndexOutOfBounds {
                index: layout.linear_index(*index),
                size: layout.num_blocks(),
            });
        }
        let range = match axis {
            Axis::Columns => layout.col_range(index.col),
            Axis::Rows => layout.row_range(index.row),
        };
        if moments.len() != range.len() {
            return Err(Error::shape_mismatch(
                "block moments",
                &[range.len()],
                &[moments.len()],
            ));
        }
        for (slot, m) in out[range].iter_mut().zip(moments) {
            slot.merge(m);
        }
    }
    Ok(out)
}
