//! Block layout: how a logical matrix is cut into blocks

use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

/// Coordinates of a block within a blocked matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockIndex {
    /// Block-row index
    pub row: usize,
    /// Block-column index
    pub col: usize,
}

impl BlockIndex {
    /// Create a block index
    #[inline]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for BlockIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

/// Partition of `[0, rows) x [0, cols)` into fixed-size blocks
///
/// All blocks are `block_rows x block_cols` except the last block row and
/// block column, which hold the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockLayout {
    rows: usize,
    cols: usize,
    block_rows: usize,
    block_cols: usize,
}

impl BlockLayout {
    /// Create a layout
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a block size is zero. Zero rows or columns
    /// are allowed and produce a layout without blocks.
    pub fn new(rows: usize, cols: usize, block_rows: usize, block_cols: usize) -> Result<Self> {
        if block_rows == 0 || block_cols == 0 {
            return Err(Error::invalid_argument(
                "block size",
                format!(
                    "block dimensions must be positive, got {}x{}",
                    block_rows, block_cols
                ),
            ));
        }
        Ok(Self {
            rows,
            cols,
            block_rows,
            block_cols,
        })
    }

    /// Layout holding the whole matrix in one block
    pub fn single(rows: usize, cols: usize) -> Result<Self> {
        Self::new(rows, cols, rows.max(1), cols.max(1))
    }

    /// Total rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Total columns
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Shape as [rows, cols]
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Rows per full block
    #[inline]
    pub fn block_rows(&self) -> usize {
        self.block_rows
    }

    /// Columns per full block
    #[inline]
    pub fn block_cols(&self) -> usize {
        self.block_cols
    }

    /// Number of block rows
    #[inline]
    pub fn num_row_blocks(&self) -> usize {
        self.rows.div_ceil(self.block_rows)
    }

    /// Number of block columns
    #[inline]
    pub fn num_col_blocks(&self) -> usize {
        self.cols.div_ceil(self.block_cols)
    }

    /// Total number of blocks
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.num_row_blocks() * self.num_col_blocks()
    }

    /// Row range covered by block row `bi`
    pub fn row_range(&self, bi: usize) -> Range<usize> {
        let start = bi * self.block_rows;
        start..(start + self.block_rows).min(self.rows)
    }

    /// Column range covered by block column `bj`
    pub fn col_range(&self, bj: usize) -> Range<usize> {
        let start = bj * self.block_cols;
        start..(start + self.block_cols).min(self.cols)
    }

    /// Shape of the block at `index`
    pub fn block_shape(&self, index: BlockIndex) -> [usize; 2] {
        [self.row_range(index.row).len(), self.col_range(index.col).len()]
    }

    /// Returns true if `index` addresses a block of this layout
    #[inline]
    pub fn contains(&self, index: BlockIndex) -> bool {
        index.row < self.num_row_blocks() && index.col < self.num_col_blocks()
    }

    /// Row-major position of `index` among all blocks
    #[inline]
    pub fn linear_index(&self, index: BlockIndex) -> usize {
        index.row * self.num_col_blocks() + index.col
    }

    /// Block containing the cell `(row, col)`
    #[inline]
    pub fn block_of(&self, row: usize, col: usize) -> BlockIndex {
        BlockIndex::new(row / self.block_rows, col / self.block_cols)
    }

    /// All block indices in row-major order
    pub fn indices(&self) -> impl Iterator<Item = BlockIndex> + '_ {
        let ncb = self.num_col_blocks();
        (0..self.num_row_blocks()).flat_map(move |bi| (0..ncb).map(move |bj| BlockIndex::new(bi, bj)))
    }
}

impl fmt::Display for BlockLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} in {}x{} blocks",
            self.rows, self.cols, self.block_rows, self.block_cols
        )
    }
}
