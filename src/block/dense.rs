//! Dense row-major block

use crate::error::{Error, Result};

use super::format::{BlockFormat, BlockStorage, estimate_dense_bytes};

/// Dense row-major block of `f64` values
#[derive(Debug, Clone, PartialEq)]
pub struct DenseBlock {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
    nnz: usize,
}

impl DenseBlock {
    /// Create a dense block from row-major values
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `values.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(Error::shape_mismatch(
                "dense block values",
                &[rows * cols],
                &[values.len()],
            ));
        }
        let nnz = values.iter().filter(|v| **v != 0.0).count();
        Ok(Self {
            rows,
            cols,
            values,
            nnz,
        })
    }

    /// Assemble from values whose non-zero count is already known
    pub(crate) fn from_parts(rows: usize, cols: usize, values: Vec<f64>, nnz: usize) -> Self {
        debug_assert_eq!(values.len(), rows * cols);
        debug_assert_eq!(nnz, values.iter().filter(|v| **v != 0.0).count());
        Self {
            rows,
            cols,
            values,
            nnz,
        }
    }

    /// Create an all-zero dense block
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![0.0; rows * cols],
            nnz: 0,
        }
    }

    /// Create a dense block from a slice of equally sized rows
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut values = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(Error::shape_mismatch("dense row", &[i, cols], &[i, row.len()]));
            }
            values.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, values)
    }

    /// Row-major values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the block and return its row-major values
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    /// Value at `(row, col)`
    ///
    /// # Panics
    ///
    /// Panics if the position is outside the block.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        assert!(row < self.rows && col < self.cols, "dense block index out of bounds");
        self.values[row * self.cols + col]
    }

    /// One row as a slice
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        let start = row * self.cols;
        &self.values[start..start + self.cols]
    }

    /// Borrow all rows as a factor view
    pub fn view(&self) -> DenseView<'_> {
        DenseView {
            data: &self.values,
            rows: self.rows,
            cols: self.cols,
        }
    }

    /// Borrow rows `start..start + len` as a factor view without copying
    pub fn row_view(&self, start: usize, len: usize) -> Result<DenseView<'_>> {
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.rows)
            .ok_or(Error::IndexOutOfBounds {
                index: start.saturating_add(len),
                size: self.rows,
            })?;
        Ok(DenseView {
            data: &self.values[start * self.cols..end * self.cols],
            rows: len,
            cols: self.cols,
        })
    }

    /// Copy rows `start..start + len` into a new block
    pub fn slice_rows(&self, start: usize, len: usize) -> Result<Self> {
        let view = self.row_view(start, len)?;
        Self::new(len, self.cols, view.data.to_vec())
    }

    /// Iterate stored non-zeros in row-major order
    pub fn for_each_nonzero<F: FnMut(usize, usize, f64)>(&self, mut f: F) {
        if self.nnz == 0 {
            return;
        }
        for (i, row) in self.values.chunks_exact(self.cols.max(1)).enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if v != 0.0 {
                    f(i, j, v);
                }
            }
        }
    }
}

impl BlockStorage for DenseBlock {
    fn format(&self) -> BlockFormat {
        BlockFormat::Dense
    }

    fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn memory_usage(&self) -> usize {
        estimate_dense_bytes(self.rows, self.cols)
    }
}

/// Borrowed row-major view over consecutive rows of a dense block
///
/// Factor slices handed to the evaluator are views, so replicated factors are
/// sliced per weight block without copying.
#[derive(Debug, Clone, Copy)]
pub struct DenseView<'a> {
    data: &'a [f64],
    rows: usize,
    cols: usize,
}

impl<'a> DenseView<'a> {
    /// Number of rows in the view
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns in the view
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// One row as a slice
    #[inline]
    pub fn row(&self, row: usize) -> &'a [f64] {
        let start = row * self.cols;
        &self.data[start..start + self.cols]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_creation_counts_nonzeros() {
        // [1, 0, 2]
        // [0, 0, 3]
        let block = DenseBlock::new(2, 3, vec![1.0, 0.0, 2.0, 0.0, 0.0, 3.0]).unwrap();
        assert_eq!(block.nnz(), 3);
        assert_eq!(block.shape(), [2, 3]);
        assert_eq!(block.get(1, 2), 3.0);
        assert_eq!(block.row(0), &[1.0, 0.0, 2.0]);
    }

    #[test]
    fn test_dense_rejects_wrong_length() {
        let err = DenseBlock::new(2, 2, vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_row_view_shares_storage() {
        let block = DenseBlock::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]]).unwrap();
        let view = block.row_view(1, 2).unwrap();
        assert_eq!(view.rows(), 2);
        assert_eq!(view.row(0), &[3.0, 4.0]);
        assert_eq!(view.row(1), &[5.0, 6.0]);
        assert!(block.row_view(2, 2).is_err());
    }

    #[test]
    fn test_for_each_nonzero_skips_zeros() {
        let block = DenseBlock::from_rows(&[[0.0, 7.0], [8.0, 0.0]]).unwrap();
        let mut seen = Vec::new();
        block.for_each_nonzero(|i, j, v| seen.push((i, j, v)));
        assert_eq!(seen, vec![(0, 1, 7.0), (1, 0, 8.0)]);
    }
}
