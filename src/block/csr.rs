//! Compressed sparse row block

use crate::error::{Error, Result};

use super::dense::DenseBlock;
use super::format::{BlockFormat, BlockStorage, estimate_csr_bytes};

/// CSR (Compressed Sparse Row) block
///
/// Column indices are strictly increasing within each row and no explicit
/// zero is ever stored, so `nnz()` is exactly the number of stored values.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrBlock {
    pub(crate) row_ptrs: Vec<usize>,
    pub(crate) col_indices: Vec<usize>,
    pub(crate) values: Vec<f64>,
    pub(crate) shape: [usize; 2],
}

impl CsrBlock {
    /// Create a CSR block from components
    ///
    /// # Arguments
    ///
    /// * `row_ptrs` - Row pointers (length: nrows + 1)
    /// * `col_indices` - Column indices for each non-zero
    /// * `values` - Values at each position
    /// * `shape` - Block shape [nrows, ncols]
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - row_ptrs length != nrows + 1, or row_ptrs is not monotonic
    /// - col_indices and values have different lengths
    /// - a column index is out of bounds or not increasing within its row
    /// - a stored value is an explicit zero
    pub fn new(
        row_ptrs: Vec<usize>,
        col_indices: Vec<usize>,
        values: Vec<f64>,
        shape: [usize; 2],
    ) -> Result<Self> {
        let [nrows, ncols] = shape;
        let nnz = values.len();

        if row_ptrs.len() != nrows + 1 {
            return Err(Error::shape_mismatch(
                "csr row pointers",
                &[nrows + 1],
                &[row_ptrs.len()],
            ));
        }
        if col_indices.len() != nnz {
            return Err(Error::shape_mismatch(
                "csr column indices",
                &[nnz],
                &[col_indices.len()],
            ));
        }
        if row_ptrs[0] != 0 || row_ptrs[nrows] != nnz {
            return Err(Error::invalid_argument(
                "row_ptrs",
                format!(
                    "expected [0]=0 and [{}]={}, got [0]={} and [{}]={}",
                    nrows, nnz, row_ptrs[0], nrows, row_ptrs[nrows]
                ),
            ));
        }

        for row in 0..nrows {
            let (start, end) = (row_ptrs[row], row_ptrs[row + 1]);
            if start > end || end > nnz {
                return Err(Error::invalid_argument(
                    "row_ptrs",
                    format!("row pointers not monotonic at row {}", row),
                ));
            }
            let mut prev: Option<usize> = None;
            for pos in start..end {
                let col = col_indices[pos];
                if col >= ncols {
                    return Err(Error::IndexOutOfBounds {
                        index: col,
                        size: ncols,
                    });
                }
                if prev.is_some_and(|p| p >= col) {
                    return Err(Error::invalid_argument(
                        "col_indices",
                        format!("columns not strictly increasing in row {}", row),
                    ));
                }
                if values[pos] == 0.0 {
                    return Err(Error::invalid_argument(
                        "values",
                        format!("explicit zero stored at ({}, {})", row, col),
                    ));
                }
                prev = Some(col);
            }
        }

        Ok(Self {
            row_ptrs,
            col_indices,
            values,
            shape,
        })
    }

    /// Create an empty CSR block
    pub fn empty(shape: [usize; 2]) -> Self {
        Self {
            row_ptrs: vec![0; shape[0] + 1],
            col_indices: Vec::new(),
            values: Vec::new(),
            shape,
        }
    }

    /// Create a CSR block from (row, col, value) triplets
    ///
    /// Triplets may come in any order. Duplicates are summed and entries that
    /// end up zero are dropped.
    pub fn from_triplets(shape: [usize; 2], triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let [nrows, ncols] = shape;
        let mut sorted = triplets.to_vec();
        for &(r, c, _) in &sorted {
            if r >= nrows {
                return Err(Error::IndexOutOfBounds { index: r, size: nrows });
            }
            if c >= ncols {
                return Err(Error::IndexOutOfBounds { index: c, size: ncols });
            }
        }
        sorted.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_ptrs = vec![0usize; nrows + 1];
        let mut col_indices = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut rows_of: Vec<usize> = Vec::with_capacity(sorted.len());

        for (r, c, v) in sorted {
            if rows_of.last() == Some(&r) && col_indices.last() == Some(&c) {
                if let Some(last) = values.last_mut() {
                    *last += v;
                }
            } else {
                rows_of.push(r);
                col_indices.push(c);
                values.push(v);
            }
        }

        // drop entries that cancelled out or were zero to begin with
        let mut keep_cols = Vec::with_capacity(values.len());
        let mut keep_vals = Vec::with_capacity(values.len());
        for ((r, c), v) in rows_of.into_iter().zip(col_indices).zip(values) {
            if v != 0.0 {
                row_ptrs[r + 1] += 1;
                keep_cols.push(c);
                keep_vals.push(v);
            }
        }
        for row in 0..nrows {
            row_ptrs[row + 1] += row_ptrs[row];
        }

        Ok(Self {
            row_ptrs,
            col_indices: keep_cols,
            values: keep_vals,
            shape,
        })
    }

    /// Convert a dense block, keeping only its non-zeros
    pub fn from_dense(dense: &DenseBlock) -> Self {
        let [nrows, _] = dense.shape();
        let mut row_ptrs = Vec::with_capacity(nrows + 1);
        let mut col_indices = Vec::with_capacity(dense.nnz());
        let mut values = Vec::with_capacity(dense.nnz());
        row_ptrs.push(0);
        for i in 0..nrows {
            for (j, &v) in dense.row(i).iter().enumerate() {
                if v != 0.0 {
                    col_indices.push(j);
                    values.push(v);
                }
            }
            row_ptrs.push(values.len());
        }
        Self {
            row_ptrs,
            col_indices,
            values,
            shape: dense.shape(),
        }
    }

    /// Returns the row pointers
    pub fn row_ptrs(&self) -> &[usize] {
        &self.row_ptrs
    }

    /// Returns the column indices
    pub fn col_indices(&self) -> &[usize] {
        &self.col_indices
    }

    /// Returns the stored values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Column indices and values of one row
    #[inline]
    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let (start, end) = (self.row_ptrs[row], self.row_ptrs[row + 1]);
        (&self.col_indices[start..end], &self.values[start..end])
    }

    /// Returns the number of non-zeros in a specific row
    pub fn row_nnz(&self, row: usize) -> usize {
        debug_assert!(row < self.nrows());
        self.row_ptrs[row + 1] - self.row_ptrs[row]
    }

    /// Value at `(row, col)`, zero if not stored
    pub fn get(&self, row: usize, col: usize) -> f64 {
        let (cols, vals) = self.row(row);
        match cols.binary_search(&col) {
            Ok(pos) => vals[pos],
            Err(_) => 0.0,
        }
    }

    /// Expand into a dense block
    pub fn to_dense(&self) -> DenseBlock {
        let [nrows, ncols] = self.shape;
        let mut out = vec![0.0; nrows * ncols];
        self.for_each_nonzero(|i, j, v| out[i * ncols + j] = v);
        DenseBlock::from_parts(nrows, ncols, out, self.nnz())
    }

    /// Iterate stored non-zeros in row-major order
    pub fn for_each_nonzero<F: FnMut(usize, usize, f64)>(&self, mut f: F) {
        for row in 0..self.shape[0] {
            let (cols, vals) = self.row(row);
            for (&c, &v) in cols.iter().zip(vals) {
                f(row, c, v);
            }
        }
    }
}

impl BlockStorage for CsrBlock {
    fn format(&self) -> BlockFormat {
        BlockFormat::Csr
    }

    fn shape(&self) -> [usize; 2] {
        self.shape
    }

    fn nnz(&self) -> usize {
        self.values.len()
    }

    fn memory_usage(&self) -> usize {
        estimate_csr_bytes(self.shape[0], self.nnz())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csr_creation() {
        // Block:
        // [1, 0, 2]
        // [0, 0, 3]
        // [4, 5, 0]
        let csr = CsrBlock::new(
            vec![0, 2, 3, 5],
            vec![0, 2, 2, 0, 1],
            vec![1.0, 2.0, 3.0, 4.0, 5.0],
            [3, 3],
        )
        .unwrap();

        assert_eq!(csr.nnz(), 5);
        assert_eq!(csr.shape(), [3, 3]);
        assert_eq!(csr.row_nnz(2), 2);
        assert_eq!(csr.get(2, 1), 5.0);
        assert_eq!(csr.get(1, 1), 0.0);
    }

    #[test]
    fn test_csr_empty() {
        let csr = CsrBlock::empty([100, 200]);
        assert_eq!(csr.nnz(), 0);
        assert!(csr.is_empty());
        assert_eq!(csr.get(99, 199), 0.0);
        assert_eq!(csr.to_dense().nnz(), 0);
    }

    #[test]
    fn test_csr_validation() {
        // row_ptrs too short
        assert!(CsrBlock::new(vec![0, 1], vec![0], vec![1.0], [2, 2]).is_err());
        // column out of bounds
        let err = CsrBlock::new(vec![0, 1, 1], vec![5], vec![1.0], [2, 2]).unwrap_err();
        assert_eq!(err, Error::IndexOutOfBounds { index: 5, size: 2 });
        // unsorted row
        assert!(CsrBlock::new(vec![0, 2, 2], vec![1, 0], vec![1.0, 2.0], [2, 2]).is_err());
        // explicit zero
        assert!(CsrBlock::new(vec![0, 1, 1], vec![0], vec![0.0], [2, 2]).is_err());
    }

    #[test]
    fn test_from_triplets_sums_duplicates_and_drops_zeros() {
        let csr = CsrBlock::from_triplets(
            [2, 3],
            &[(1, 2, 1.0), (0, 1, 2.0), (1, 2, 4.0), (0, 0, 3.0), (0, 0, -3.0)],
        )
        .unwrap();
        assert_eq!(csr.row_ptrs(), &[0, 1, 2]);
        assert_eq!(csr.col_indices(), &[1, 2]);
        assert_eq!(csr.values(), &[2.0, 5.0]);

        assert!(CsrBlock::from_triplets([2, 2], &[(2, 0, 1.0)]).is_err());
    }

    #[test]
    fn test_dense_round_trip_preserves_values() {
        let dense = DenseBlock::from_rows(&[[0.0, 1.5, 0.0], [2.5, 0.0, 0.0]]).unwrap();
        let csr = CsrBlock::from_dense(&dense);
        assert_eq!(csr.nnz(), 2);
        assert_eq!(csr.to_dense(), dense);
    }
}
