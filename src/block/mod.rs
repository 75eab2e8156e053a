//! Matrix blocks: the unit of storage, transfer and computation
//!
//! A [`MatrixBlock`] is a rectangular tile of a larger matrix, held either as
//! row-major dense values or in compressed sparse row form.
//!
//! # Formats
//!
//! - **Dense**: row-major `f64` values plus a cached non-zero count. Used for
//!   factor slices and high-density weights.
//! - **CSR** (Compressed Sparse Row): row pointers + column indices + values,
//!   never storing explicit zeros. Used for sparse weights.
//!
//! Operators are written once against [`MatrixBlock::for_each_nonzero`], which
//! visits stored non-zeros in row-major order for either representation.
//!
//! Blocks are immutable once built. Components share them through
//! `Arc<MatrixBlock>`; any update builds a new block.
//!
//! ```
//! use blockwise::block::{BlockStorage, MatrixBlock};
//!
//! let block = MatrixBlock::from_triplets([3, 3], &[(0, 0, 1.0), (2, 1, 4.0)])?;
//! assert!(block.is_sparse());
//! assert_eq!(block.nnz(), 2);
//! assert_eq!(block.get(2, 1), 4.0);
//! assert_eq!(block.get(1, 1), 0.0);
//! # Ok::<(), blockwise::error::Error>(())
//! ```

mod csr;
mod dense;
mod format;

pub use csr::CsrBlock;
pub use dense::{DenseBlock, DenseView};
pub use format::{
    BlockFormat, BlockStorage, SKINNY_TURN_POINT, SPARSITY_TURN_POINT, estimate_csr_bytes,
    estimate_dense_bytes,
};

use std::borrow::Cow;

use crate::error::Result;

/// A dense or sparse matrix tile
#[derive(Debug, Clone, PartialEq)]
pub enum MatrixBlock {
    /// Row-major dense storage
    Dense(DenseBlock),
    /// Compressed sparse row storage
    Sparse(CsrBlock),
}

impl MatrixBlock {
    /// Create an empty (all-zero) block
    pub fn empty(shape: [usize; 2]) -> Self {
        MatrixBlock::Sparse(CsrBlock::empty(shape))
    }

    /// Create a block from row-major values, choosing the cheaper representation
    pub fn from_dense(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        Ok(MatrixBlock::Dense(DenseBlock::new(rows, cols, values)?).examine_sparsity())
    }

    /// Create a sparse block from (row, col, value) triplets
    pub fn from_triplets(shape: [usize; 2], triplets: &[(usize, usize, f64)]) -> Result<Self> {
        Ok(MatrixBlock::Sparse(CsrBlock::from_triplets(shape, triplets)?))
    }

    /// Returns true when held in CSR form
    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self, MatrixBlock::Sparse(_))
    }

    /// Value at `(row, col)`; zero for positions that are not stored
    pub fn get(&self, row: usize, col: usize) -> f64 {
        match self {
            MatrixBlock::Dense(d) => d.get(row, col),
            MatrixBlock::Sparse(s) => s.get(row, col),
        }
    }

    /// Visit every stored non-zero `(row, col, value)` in row-major order
    pub fn for_each_nonzero<F: FnMut(usize, usize, f64)>(&self, f: F) {
        match self {
            MatrixBlock::Dense(d) => d.for_each_nonzero(f),
            MatrixBlock::Sparse(s) => s.for_each_nonzero(f),
        }
    }

    /// Dense view of this block, borrowing when it already is dense
    pub fn to_dense(&self) -> Cow<'_, DenseBlock> {
        match self {
            MatrixBlock::Dense(d) => Cow::Borrowed(d),
            MatrixBlock::Sparse(s) => Cow::Owned(s.to_dense()),
        }
    }

    /// Sparse view of this block, borrowing when it already is sparse
    pub fn to_sparse(&self) -> Cow<'_, CsrBlock> {
        match self {
            MatrixBlock::Dense(d) => Cow::Owned(CsrBlock::from_dense(d)),
            MatrixBlock::Sparse(s) => Cow::Borrowed(s),
        }
    }

    /// Convert to the representation preferred for the current density
    pub fn examine_sparsity(self) -> Self {
        let [rows, cols] = self.shape();
        let preferred = BlockFormat::preferred(rows, cols, self.nnz());
        match (preferred, self) {
            (BlockFormat::Csr, MatrixBlock::Dense(d)) => MatrixBlock::Sparse(CsrBlock::from_dense(&d)),
            (BlockFormat::Dense, MatrixBlock::Sparse(s)) => MatrixBlock::Dense(s.to_dense()),
            (_, block) => block,
        }
    }
}

impl BlockStorage for MatrixBlock {
    fn format(&self) -> BlockFormat {
        match self {
            MatrixBlock::Dense(d) => d.format(),
            MatrixBlock::Sparse(s) => s.format(),
        }
    }

    fn shape(&self) -> [usize; 2] {
        match self {
            MatrixBlock::Dense(d) => d.shape(),
            MatrixBlock::Sparse(s) => s.shape(),
        }
    }

    fn nnz(&self) -> usize {
        match self {
            MatrixBlock::Dense(d) => d.nnz(),
            MatrixBlock::Sparse(s) => s.nnz(),
        }
    }

    fn memory_usage(&self) -> usize {
        match self {
            MatrixBlock::Dense(d) => d.memory_usage(),
            MatrixBlock::Sparse(s) => s.memory_usage(),
        }
    }
}

impl From<DenseBlock> for MatrixBlock {
    fn from(block: DenseBlock) -> Self {
        MatrixBlock::Dense(block)
    }
}

impl From<CsrBlock> for MatrixBlock {
    fn from(block: CsrBlock) -> Self {
        MatrixBlock::Sparse(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nonzeros(block: &MatrixBlock) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        block.for_each_nonzero(|i, j, v| out.push((i, j, v)));
        out
    }

    #[test]
    fn test_empty_block_reads_zero() {
        let block = MatrixBlock::empty([4, 5]);
        assert_eq!(block.nnz(), 0);
        assert!(block.is_empty());
        for i in 0..4 {
            for j in 0..5 {
                assert_eq!(block.get(i, j), 0.0);
            }
        }
        assert!(nonzeros(&block).is_empty());
    }

    #[test]
    fn test_iteration_is_representation_independent() {
        let values = vec![
            0.0, 1.0, 0.0, 0.0, 0.0, 0.0, //
            2.0, 0.0, 0.0, 0.0, 0.0, 3.0,
        ];
        let dense = MatrixBlock::Dense(DenseBlock::new(2, 6, values).unwrap());
        let sparse = MatrixBlock::Sparse(dense.to_sparse().into_owned());

        assert_eq!(nonzeros(&dense), nonzeros(&sparse));
        assert_eq!(dense.nnz(), sparse.nnz());
        assert_eq!(sparse.to_dense().into_owned(), *dense.to_dense());
    }

    #[test]
    fn test_examine_sparsity() {
        // 1 of 60 entries set: goes sparse
        let mut values = vec![0.0; 60];
        values[7] = 1.0;
        let block = MatrixBlock::from_dense(6, 10, values).unwrap();
        assert!(block.is_sparse());

        // fully dense: stays dense
        let block = MatrixBlock::from_dense(6, 10, vec![1.0; 60]).unwrap();
        assert!(!block.is_sparse());
        assert_eq!(block.format(), BlockFormat::Dense);

        // dense CSR input converts back
        let triplets: Vec<_> = (0..3)
            .flat_map(|i| (0..6).map(move |j| (i, j, 1.0)))
            .collect();
        let block = MatrixBlock::from_triplets([3, 6], &triplets)
            .unwrap()
            .examine_sparsity();
        assert!(!block.is_sparse());
    }
}
