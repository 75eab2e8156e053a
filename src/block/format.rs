//! Block format definitions and traits

/// Density below which a block is cheaper to hold in CSR form
pub const SPARSITY_TURN_POINT: f64 = 0.4;

/// Blocks with at most this many columns are always held dense
///
/// Row pointers dominate CSR storage for skinny blocks such as factor slices.
pub const SKINNY_TURN_POINT: usize = 4;

/// Block storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockFormat {
    /// Row-major dense values
    ///
    /// Best for: factor slices, high-density weights, sequential scans
    /// Storage: O(nrows * ncols)
    Dense,

    /// Compressed Sparse Row (CSR)
    ///
    /// Row pointers + column indices + values.
    /// Best for: sparse weights, row-wise nonzero iteration
    /// Storage: O(2 * nnz + nrows + 1)
    Csr,
}

impl BlockFormat {
    /// Returns true for the compressed representation
    #[inline]
    pub fn is_sparse(&self) -> bool {
        matches!(self, BlockFormat::Csr)
    }

    /// Returns the format name as a string
    pub fn name(&self) -> &'static str {
        match self {
            BlockFormat::Dense => "DENSE",
            BlockFormat::Csr => "CSR",
        }
    }

    /// Pick the cheaper representation for a block of the given shape and nnz
    pub fn preferred(nrows: usize, ncols: usize, nnz: usize) -> Self {
        let total = nrows * ncols;
        if total == 0 {
            return BlockFormat::Csr;
        }
        let density = nnz as f64 / total as f64;
        if density < SPARSITY_TURN_POINT && ncols > SKINNY_TURN_POINT {
            BlockFormat::Csr
        } else {
            BlockFormat::Dense
        }
    }
}

impl std::fmt::Display for BlockFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait for block storage backends
///
/// Common interface of the dense and compressed block representations.
pub trait BlockStorage {
    /// Returns the storage format
    fn format(&self) -> BlockFormat;

    /// Returns the shape as [nrows, ncols]
    fn shape(&self) -> [usize; 2];

    /// Returns the number of rows
    #[inline]
    fn nrows(&self) -> usize {
        self.shape()[0]
    }

    /// Returns the number of columns
    #[inline]
    fn ncols(&self) -> usize {
        self.shape()[1]
    }

    /// Returns the number of non-zero elements
    fn nnz(&self) -> usize;

    /// Returns the sparsity ratio (fraction of zeros)
    #[inline]
    fn sparsity(&self) -> f64 {
        let total = (self.nrows() * self.ncols()) as f64;
        if total == 0.0 {
            0.0
        } else {
            1.0 - (self.nnz() as f64 / total)
        }
    }

    /// Returns the density ratio (fraction of non-zeros)
    #[inline]
    fn density(&self) -> f64 {
        1.0 - self.sparsity()
    }

    /// Returns true if the block holds no non-zeros
    #[inline]
    fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Returns the memory usage in bytes (approximate)
    fn memory_usage(&self) -> usize;
}

/// Estimated in-memory size of a dense block
pub fn estimate_dense_bytes(nrows: usize, ncols: usize) -> usize {
    nrows
        .saturating_mul(ncols)
        .saturating_mul(std::mem::size_of::<f64>())
}

/// Estimated in-memory size of a CSR block
pub fn estimate_csr_bytes(nrows: usize, nnz: usize) -> usize {
    let ptr_size = (nrows + 1) * std::mem::size_of::<usize>();
    let entry_size = std::mem::size_of::<usize>() + std::mem::size_of::<f64>();
    ptr_size.saturating_add(nnz.saturating_mul(entry_size))
}
