//! Block-partitioned logical matrices
//!
//! A [`BlockedMatrix`] is an aggregate of [`MatrixBlock`]s addressed by
//! [`BlockIndex`]. Its [`BlockLayout`] partitions the matrix exactly: every
//! block is present and every block's shape is the one the layout assigns to
//! its index.

mod layout;

pub use layout::{BlockIndex, BlockLayout};

use std::sync::Arc;

use crate::block::{BlockStorage, CsrBlock, DenseBlock, MatrixBlock};
use crate::error::{Error, Result};

/// Logical matrix stored as a grid of immutable, shareable blocks
#[derive(Debug, Clone)]
pub struct BlockedMatrix {
    layout: BlockLayout,
    blocks: Vec<Arc<MatrixBlock>>,
}

impl BlockedMatrix {
    /// Assemble a matrix from blocks given in row-major block order
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the number of blocks or any block's shape
    /// disagrees with `layout`.
    pub fn from_blocks(layout: BlockLayout, blocks: Vec<MatrixBlock>) -> Result<Self> {
        Self::from_shared_blocks(layout, blocks.into_iter().map(Arc::new).collect())
    }

    /// Assemble a matrix from already shared blocks in row-major block order
    pub fn from_shared_blocks(layout: BlockLayout, blocks: Vec<Arc<MatrixBlock>>) -> Result<Self> {
        if blocks.len() != layout.num_blocks() {
            return Err(Error::shape_mismatch(
                "block count",
                &[layout.num_row_blocks(), layout.num_col_blocks()],
                &[blocks.len()],
            ));
        }
        for (index, block) in layout.indices().zip(&blocks) {
            let expected = layout.block_shape(index);
            if block.shape() != expected {
                return Err(Error::shape_mismatch("block shape", &expected, &block.shape()));
            }
        }
        Ok(Self { layout, blocks })
    }

    /// Cut row-major dense values into blocks
    ///
    /// Each block picks its own representation from its density.
    pub fn from_dense(
        rows: usize,
        cols: usize,
        values: &[f64],
        block_rows: usize,
        block_cols: usize,
    ) -> Result<Self> {
        let layout = BlockLayout::new(rows, cols, block_rows, block_cols)?;
        if values.len() != rows * cols {
            return Err(Error::shape_mismatch("dense values", &[rows * cols], &[values.len()]));
        }
        let mut blocks = Vec::with_capacity(layout.num_blocks());
        for index in layout.indices() {
            let row_range = layout.row_range(index.row);
            let col_range = layout.col_range(index.col);
            let mut data = Vec::with_capacity(row_range.len() * col_range.len());
            for i in row_range.clone() {
                data.extend_from_slice(&values[i * cols + col_range.start..i * cols + col_range.end]);
            }
            blocks.push(MatrixBlock::from_dense(row_range.len(), col_range.len(), data)?);
        }
        Self::from_blocks(layout, blocks)
    }

    /// Build a matrix from (row, col, value) triplets
    ///
    /// Every block is stored in CSR form; duplicates are summed.
    pub fn from_triplets(
        rows: usize,
        cols: usize,
        triplets: &[(usize, usize, f64)],
        block_rows: usize,
        block_cols: usize,
    ) -> Result<Self> {
        let layout = BlockLayout::new(rows, cols, block_rows, block_cols)?;
        let mut per_block: Vec<Vec<(usize, usize, f64)>> = vec![Vec::new(); layout.num_blocks()];
        for &(r, c, v) in triplets {
            if r >= rows {
                return Err(Error::IndexOutOfBounds { index: r, size: rows });
            }
            if c >= cols {
                return Err(Error::IndexOutOfBounds { index: c, size: cols });
            }
            let index = layout.block_of(r, c);
            let local = (r - index.row * block_rows, c - index.col * block_cols, v);
            per_block[layout.linear_index(index)].push(local);
        }
        let blocks = layout
            .indices()
            .zip(per_block)
            .map(|(index, local)| {
                CsrBlock::from_triplets(layout.block_shape(index), &local).map(MatrixBlock::Sparse)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_blocks(layout, blocks)
    }

    /// An all-zero matrix with the given layout
    pub fn zeros(layout: BlockLayout) -> Self {
        let blocks = layout
            .indices()
            .map(|index| Arc::new(MatrixBlock::empty(layout.block_shape(index))))
            .collect();
        Self { layout, blocks }
    }

    /// The block layout
    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    /// Total rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.layout.rows()
    }

    /// Total columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.layout.cols()
    }

    /// Shape as [rows, cols]
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        self.layout.shape()
    }

    /// Total number of stored non-zeros
    pub fn nnz(&self) -> usize {
        self.blocks.iter().map(|b| b.nnz()).sum()
    }

    /// Approximate in-memory size of all blocks
    pub fn memory_usage(&self) -> usize {
        self.blocks.iter().map(|b| b.memory_usage()).sum()
    }

    /// The block at `index`
    pub fn block(&self, index: BlockIndex) -> Result<&Arc<MatrixBlock>> {
        if !self.layout.contains(index) {
            let size = if index.row >= self.layout.num_row_blocks() {
                self.layout.num_row_blocks()
            } else {
                self.layout.num_col_blocks()
            };
            return Err(Error::IndexOutOfBounds {
                index: index.row.max(index.col),
                size,
            });
        }
        Ok(&self.blocks[self.layout.linear_index(index)])
    }

    /// All blocks with their indices, in row-major block order
    pub fn blocks(&self) -> impl Iterator<Item = (BlockIndex, &Arc<MatrixBlock>)> {
        self.layout.indices().zip(self.blocks.iter())
    }

    /// Value at cell `(row, col)`
    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        if row >= self.rows() {
            return Err(Error::IndexOutOfBounds { index: row, size: self.rows() });
        }
        if col >= self.cols() {
            return Err(Error::IndexOutOfBounds { index: col, size: self.cols() });
        }
        let index = self.layout.block_of(row, col);
        let block = &self.blocks[self.layout.linear_index(index)];
        Ok(block.get(
            row - index.row * self.layout.block_rows(),
            col - index.col * self.layout.block_cols(),
        ))
    }

    /// Materialize the whole matrix as a single dense block
    pub fn to_dense(&self) -> DenseBlock {
        let [rows, cols] = self.shape();
        let mut values = vec![0.0; rows * cols];
        let mut nnz = 0;
        for (index, block) in self.blocks() {
            let r0 = index.row * self.layout.block_rows();
            let c0 = index.col * self.layout.block_cols();
            block.for_each_nonzero(|i, j, v| {
                values[(r0 + i) * cols + c0 + j] = v;
                nnz += 1;
            });
        }
        DenseBlock::from_parts(rows, cols, values, nnz)
    }

    /// Visit every stored non-zero with global `(row, col, value)` coordinates
    pub fn for_each_nonzero<F: FnMut(usize, usize, f64)>(&self, mut f: F) {
        for (index, block) in self.blocks() {
            let r0 = index.row * self.layout.block_rows();
            let c0 = index.col * self.layout.block_cols();
            block.for_each_nonzero(|i, j, v| f(r0 + i, c0 + j, v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_dense_round_trip() {
        let values: Vec<f64> = (0..35).map(|v| v as f64).collect();
        let m = BlockedMatrix::from_dense(5, 7, &values, 2, 3).unwrap();
        assert_eq!(m.layout().num_blocks(), 9);
        assert_eq!(m.nnz(), 34);
        assert_eq!(m.to_dense().values(), values.as_slice());
        assert_eq!(m.get(4, 6).unwrap(), 34.0);
        assert!(m.get(5, 0).is_err());
    }

    #[test]
    fn test_from_triplets_places_entries_in_blocks() {
        let m = BlockedMatrix::from_triplets(4, 4, &[(0, 0, 1.0), (3, 3, 2.0), (1, 2, 3.0)], 2, 2)
            .unwrap();
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.block(BlockIndex::new(1, 1)).unwrap().get(1, 1), 2.0);
        assert_eq!(m.block(BlockIndex::new(0, 1)).unwrap().get(1, 0), 3.0);
        assert_eq!(m.block(BlockIndex::new(1, 0)).unwrap().nnz(), 0);

        let mut seen = Vec::new();
        m.for_each_nonzero(|i, j, v| seen.push((i, j, v)));
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, vec![(0, 0, 1.0), (1, 2, 3.0), (3, 3, 2.0)]);
    }

    #[test]
    fn test_from_blocks_validates_layout() {
        let layout = BlockLayout::new(3, 3, 2, 2).unwrap();
        let blocks = layout
            .indices()
            .map(|idx| MatrixBlock::empty(layout.block_shape(idx)))
            .collect();
        assert!(BlockedMatrix::from_blocks(layout, blocks).is_ok());

        // wrong shape for the edge block
        let blocks = vec![MatrixBlock::empty([2, 2]); 4];
        let err = BlockedMatrix::from_blocks(layout, blocks).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { what: "block shape", .. }));

        // missing block
        let blocks = vec![MatrixBlock::empty([2, 2])];
        assert!(BlockedMatrix::from_blocks(layout, blocks).is_err());
    }

    #[test]
    fn test_zeros() {
        let m = BlockedMatrix::zeros(BlockLayout::new(5, 5, 2, 2).unwrap());
        assert_eq!(m.nnz(), 0);
        assert_eq!(m.to_dense().nnz(), 0);
    }
}
