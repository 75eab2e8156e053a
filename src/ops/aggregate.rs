//! Column and row aggregates over blocked matrices
//!
//! Every aggregate is derived from per-column (or per-row)
//! [`CentralMoment`]s computed on the context's backend. Variances and
//! standard deviations use the sample correction `n - 1`.

use tracing::debug;

use crate::algorithm::statistics::{Axis, CentralMoment};
use crate::error::Result;
use crate::matrix::BlockedMatrix;
use crate::runtime::{self, ExecutionContext};

/// Degrees of freedom removed by the sample variance
pub const SAMPLE_CORRECTION: usize = 1;

/// Central moments along `axis`, computed on the context's backend
pub fn moments(ctx: &ExecutionContext, x: &BlockedMatrix, axis: Axis) -> Result<Vec<CentralMoment>> {
    debug!(
        exec_type = %ctx.exec_type(),
        ?axis,
        shape = ?x.shape(),
        nnz = x.nnz(),
        "aggregating moments"
    );
    runtime::dispatch(ctx, |backend| backend.moments(x, axis))
}

/// Per-column central moments
pub fn col_moments(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<CentralMoment>> {
    moments(ctx, x, Axis::Columns)
}

/// Per-row central moments
pub fn row_moments(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<CentralMoment>> {
    moments(ctx, x, Axis::Rows)
}

/// Per-column means
pub fn col_means(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<f64>> {
    Ok(col_moments(ctx, x)?.iter().map(|m| m.mean).collect())
}

/// Per-column sample variances
pub fn col_vars(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<f64>> {
    Ok(col_moments(ctx, x)?
        .iter()
        .map(|m| m.variance(SAMPLE_CORRECTION))
        .collect())
}

/// Per-column sample standard deviations
///
/// Entry `j` is `sqrt(sum_i (x[i,j] - mean_j)^2 / (r - 1))`. A single-row
/// matrix yields zeros, as does a column without spread.
///
/// ```
/// use blockwise::matrix::BlockedMatrix;
/// use blockwise::ops::col_std_devs;
/// use blockwise::runtime::ExecutionContext;
///
/// let x = BlockedMatrix::from_dense(3, 1, &[1.0, 2.0, 3.0], 2, 1)?;
/// let sd = col_std_devs(&ExecutionContext::default(), &x)?;
/// assert!((sd[0] - 1.0).abs() < 1e-12);
/// # Ok::<(), blockwise::error::Error>(())
/// ```
pub fn col_std_devs(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<f64>> {
    Ok(col_moments(ctx, x)?
        .iter()
        .map(|m| m.std_dev(SAMPLE_CORRECTION))
        .collect())
}

/// Per-row sample variances
pub fn row_vars(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<f64>> {
    Ok(row_moments(ctx, x)?
        .iter()
        .map(|m| m.variance(SAMPLE_CORRECTION))
        .collect())
}

/// Per-row sample standard deviations
pub fn row_std_devs(ctx: &ExecutionContext, x: &BlockedMatrix) -> Result<Vec<f64>> {
    Ok(row_moments(ctx, x)?
        .iter()
        .map(|m| m.std_dev(SAMPLE_CORRECTION))
        .collect())
}
