//! Fused weighted sigmoid over block-partitioned matrices
//!
//! Computes `W ⊙ f(U Vᵀ)` without ever materializing `U Vᵀ`: for every stored
//! non-zero `(i, j)` of a weight block the evaluator takes one dot product of
//! row `i` of the `U` slice with row `j` of the `V` slice and applies the
//! [`SigmoidVariant`]. Positions not stored in `W` are zero in the output and
//! never computed, so the cost is `O(nnz(W) * k)`.

use std::sync::Arc;

use tracing::{debug, info};

use crate::block::{BlockStorage, CsrBlock, DenseBlock, DenseView, MatrixBlock};
use crate::error::{Error, Result};
use crate::matrix::{BlockIndex, BlockedMatrix};
use crate::runtime::{self, ExecutionContext, ExecutionReport, select_strategy};

use super::sigmoid::SigmoidVariant;

/// One weighted sigmoid job: weights, factors, optional multiplier, variant
///
/// ```
/// use blockwise::matrix::BlockedMatrix;
/// use blockwise::ops::{SigmoidVariant, WeightedSigmoidJob, weighted_sigmoid};
/// use blockwise::runtime::ExecutionContext;
///
/// let eye = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
/// let w = BlockedMatrix::from_dense(3, 3, &eye, 2, 2)?;
/// let u = BlockedMatrix::from_dense(3, 2, &[0.0; 6], 2, 2)?;
/// let v = BlockedMatrix::from_dense(3, 2, &[0.0; 6], 2, 2)?;
///
/// let job = WeightedSigmoidJob::new(w, u, v, SigmoidVariant::Basic);
/// let out = weighted_sigmoid(&ExecutionContext::default(), &job)?;
/// assert_eq!(out.matrix.get(1, 1)?, 0.5);
/// assert_eq!(out.matrix.get(0, 1)?, 0.0);
/// # Ok::<(), blockwise::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct WeightedSigmoidJob {
    weights: BlockedMatrix,
    u: BlockedMatrix,
    v: BlockedMatrix,
    multiplier: Option<BlockedMatrix>,
    variant: SigmoidVariant,
}

impl WeightedSigmoidJob {
    /// Create a job over `W` (r×c), `U` (r×k) and `V` (c×k)
    pub fn new(
        weights: BlockedMatrix,
        u: BlockedMatrix,
        v: BlockedMatrix,
        variant: SigmoidVariant,
    ) -> Self {
        Self {
            weights,
            u,
            v,
            multiplier: None,
            variant,
        }
    }

    /// Scale outputs by `X[i,j]` instead of `W[i,j]`
    ///
    /// `W` still determines which cells are computed.
    pub fn with_multiplier(mut self, multiplier: BlockedMatrix) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Weight matrix
    #[inline]
    pub fn weights(&self) -> &BlockedMatrix {
        &self.weights
    }

    /// Left factor
    #[inline]
    pub fn u(&self) -> &BlockedMatrix {
        &self.u
    }

    /// Right factor
    #[inline]
    pub fn v(&self) -> &BlockedMatrix {
        &self.v
    }

    /// Optional multiplier
    #[inline]
    pub fn multiplier(&self) -> Option<&BlockedMatrix> {
        self.multiplier.as_ref()
    }

    /// Variant to evaluate
    #[inline]
    pub fn variant(&self) -> SigmoidVariant {
        self.variant
    }

    /// Factorization rank `k`
    #[inline]
    pub fn rank(&self) -> usize {
        self.u.cols()
    }

    /// Whole-job shape and rank checks
    ///
    /// # Errors
    ///
    /// - `ShapeMismatch` if the factors disagree on rank, `U`'s rows differ
    ///   from `W`'s rows, `V`'s rows differ from `W`'s columns, or the
    ///   multiplier's shape or block size differs from `W`'s
    /// - `InvalidRank` if `k = 0`
    pub fn validate(&self) -> Result<()> {
        let [rows, cols] = self.weights.shape();
        if self.u.cols() != self.v.cols() {
            return Err(Error::shape_mismatch(
                "factor rank",
                &[self.u.cols()],
                &[self.v.cols()],
            ));
        }
        if self.rank() == 0 {
            return Err(Error::InvalidRank { rank: 0 });
        }
        if self.u.rows() != rows {
            return Err(Error::shape_mismatch("U rows", &[rows], &[self.u.rows()]));
        }
        if self.v.rows() != cols {
            return Err(Error::shape_mismatch("V rows", &[cols], &[self.v.rows()]));
        }
        if let Some(x) = &self.multiplier {
            if x.shape() != [rows, cols] {
                return Err(Error::shape_mismatch("multiplier", &[rows, cols], &x.shape()));
            }
            let (w, x) = (self.weights.layout(), x.layout());
            if (x.block_rows(), x.block_cols()) != (w.block_rows(), w.block_cols()) {
                return Err(Error::shape_mismatch(
                    "multiplier block size",
                    &[w.block_rows(), w.block_cols()],
                    &[x.block_rows(), x.block_cols()],
                ));
            }
        }
        Ok(())
    }
}

/// Result of a weighted sigmoid job
#[derive(Debug, Clone)]
pub struct JobOutput {
    /// Output with `W`'s block layout and non-zero support
    pub matrix: BlockedMatrix,
    /// How the job was executed
    pub report: ExecutionReport,
}

/// Evaluate the weighted sigmoid over a whole job
///
/// Validates the job, selects a distribution strategy and runs it on the
/// backend named by `ctx`. Every backend and strategy yields the same output.
pub fn weighted_sigmoid(ctx: &ExecutionContext, job: &WeightedSigmoidJob) -> Result<JobOutput> {
    job.validate()?;
    let decision = select_strategy(
        job.weights().layout(),
        job.u().layout(),
        job.v().layout(),
        ctx.strategy_override(),
        ctx.memory_budget(),
    )?;
    debug!(
        variant = %job.variant(),
        rank = job.rank(),
        weight_blocks = job.weights().layout().num_blocks(),
        weight_nnz = job.weights().nnz(),
        "weighted sigmoid job"
    );

    let output = runtime::dispatch(ctx, |backend| backend.weighted_sigmoid(job, &decision))?;
    info!(report = %output.report, "weighted sigmoid complete");
    Ok(output)
}

/// Evaluate one weight block against its factor slices
///
/// `w` is r×c, `u` r×k, `v` c×k and `x`, when given, r×c. The output has the
/// representation of `w`. Computed values that are exactly zero are not
/// stored.
///
/// # Errors
///
/// `InvalidRank` when `k = 0`; `ShapeMismatch` when the slices disagree with
/// `w` or with each other.
pub fn evaluate_block(
    w: &MatrixBlock,
    u: DenseView<'_>,
    v: DenseView<'_>,
    x: Option<&MatrixBlock>,
    variant: SigmoidVariant,
) -> Result<MatrixBlock> {
    let [rows, cols] = w.shape();
    if u.cols() != v.cols() {
        return Err(Error::shape_mismatch("factor rank", &[u.cols()], &[v.cols()]));
    }
    if u.cols() == 0 {
        return Err(Error::InvalidRank { rank: 0 });
    }
    if u.rows() != rows {
        return Err(Error::shape_mismatch("U slice rows", &[rows], &[u.rows()]));
    }
    if v.rows() != cols {
        return Err(Error::shape_mismatch("V slice rows", &[cols], &[v.rows()]));
    }
    if let Some(x) = x {
        if x.shape() != [rows, cols] {
            return Err(Error::shape_mismatch("multiplier block", &[rows, cols], &x.shape()));
        }
    }

    if w.nnz() == 0 {
        return Ok(MatrixBlock::empty([rows, cols]));
    }

    let cell = |i: usize, j: usize, weight: f64| {
        let scale = x.map_or(weight, |x| x.get(i, j));
        variant.apply(dot(u.row(i), v.row(j)), scale)
    };

    Ok(match w {
        MatrixBlock::Dense(dense) => {
            let mut values = vec![0.0; rows * cols];
            let mut nnz = 0;
            dense.for_each_nonzero(|i, j, weight| {
                let out = cell(i, j, weight);
                if out != 0.0 {
                    values[i * cols + j] = out;
                    nnz += 1;
                }
            });
            MatrixBlock::Dense(DenseBlock::from_parts(rows, cols, values, nnz))
        }
        MatrixBlock::Sparse(sparse) => {
            let mut row_ptrs = Vec::with_capacity(rows + 1);
            let mut col_indices = Vec::with_capacity(sparse.nnz());
            let mut values = Vec::with_capacity(sparse.nnz());
            row_ptrs.push(0);
            for i in 0..rows {
                let (row_cols, row_vals) = sparse.row(i);
                for (&j, &weight) in row_cols.iter().zip(row_vals) {
                    let out = cell(i, j, weight);
                    if out != 0.0 {
                        col_indices.push(j);
                        values.push(out);
                    }
                }
                row_ptrs.push(values.len());
            }
            MatrixBlock::Sparse(CsrBlock {
                row_ptrs,
                col_indices,
                values,
                shape: [rows, cols],
            })
        }
    })
}

/// Dot product summed left to right, so every backend rounds identically
#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).fold(0.0, |acc, (x, y)| acc + x * y)
}

/// Full factors shared read-only by every block task of a replicated job
#[derive(Debug, Clone)]
pub(crate) struct ReplicatedFactors {
    u: Arc<DenseBlock>,
    v: Arc<DenseBlock>,
}

impl ReplicatedFactors {
    /// Materialize `U` and `V` once for the whole job
    pub(crate) fn assemble(job: &WeightedSigmoidJob) -> Self {
        Self {
            u: Arc::new(job.u().to_dense()),
            v: Arc::new(job.v().to_dense()),
        }
    }

    /// Dense size of both factors
    pub(crate) fn bytes(&self) -> usize {
        self.u.memory_usage() + self.v.memory_usage()
    }

    /// Evaluate weight block `index` of `job`
    pub(crate) fn evaluate(
        &self,
        job: &WeightedSigmoidJob,
        index: BlockIndex,
    ) -> Result<MatrixBlock> {
        let x = job.multiplier().map(|x| x.block(index)).transpose()?;
        self.evaluate_with(job, index, job.weights().block(index)?, x.map(Arc::as_ref))
    }

    /// Evaluate already fetched blocks at `index`, slicing the full factors
    /// by the block's row and column ranges
    pub(crate) fn evaluate_with(
        &self,
        job: &WeightedSigmoidJob,
        index: BlockIndex,
        w: &MatrixBlock,
        x: Option<&MatrixBlock>,
    ) -> Result<MatrixBlock> {
        let layout = job.weights().layout();
        let row_range = layout.row_range(index.row);
        let col_range = layout.col_range(index.col);
        let u = self.u.row_view(row_range.start, row_range.len())?;
        let v = self.v.row_view(col_range.start, col_range.len())?;
        evaluate_block(w, u, v, x, job.variant())
    }
}

/// Evaluate a weight block against the factor blocks joined to it
pub(crate) fn evaluate_joined(
    w: &MatrixBlock,
    u: &MatrixBlock,
    v: &MatrixBlock,
    x: Option<&MatrixBlock>,
    variant: SigmoidVariant,
) -> Result<MatrixBlock> {
    let u = u.to_dense();
    let v = v.to_dense();
    evaluate_block(w, u.view(), v.view(), x, variant)
}
