//! Common test utilities
#![allow(dead_code)]

use blockwise::matrix::BlockedMatrix;
use blockwise::ops::{SigmoidVariant, WeightedSigmoidJob};
use blockwise::runtime::{ExecType, ExecutionContext, StrategyOverride};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Assert two results agree to the cross-backend tolerance (1e-10)
pub fn assert_parity_f64(a: &[f64], b: &[f64], op: &str) {
    assert_allclose_f64(a, b, 0.0, 1e-10, op);
}

/// Seeded generator so every run sees the same matrices
pub fn rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Random matrix with roughly `density` of its cells set, values in [-1, 1)
pub fn random_sparse(
    rows: usize,
    cols: usize,
    density: f64,
    block_rows: usize,
    block_cols: usize,
    seed: u64,
) -> BlockedMatrix {
    let mut rng = rng(seed);
    let mut triplets = Vec::new();
    for i in 0..rows {
        for j in 0..cols {
            if rng.random::<f64>() < density {
                let v: f64 = rng.random_range(-1.0..1.0);
                if v != 0.0 {
                    triplets.push((i, j, v));
                }
            }
        }
    }
    BlockedMatrix::from_triplets(rows, cols, &triplets, block_rows, block_cols).unwrap()
}

/// Random fully dense matrix, values in [-scale, scale)
pub fn random_dense(
    rows: usize,
    cols: usize,
    scale: f64,
    block_rows: usize,
    block_cols: usize,
    seed: u64,
) -> BlockedMatrix {
    let mut rng = rng(seed);
    let values: Vec<f64> = (0..rows * cols)
        .map(|_| rng.random_range(-scale..scale))
        .collect();
    BlockedMatrix::from_dense(rows, cols, &values, block_rows, block_cols).unwrap()
}

/// Rank-`k` factors blocked to align with `w`, so either strategy applies
pub fn aligned_factors(w: &BlockedMatrix, k: usize, seed: u64) -> (BlockedMatrix, BlockedMatrix) {
    let layout = w.layout();
    let u = random_dense(w.rows(), k, 1.5, layout.block_rows(), k, seed);
    let v = random_dense(w.cols(), k, 1.5, layout.block_cols(), k, seed + 1);
    (u, v)
}

/// Weighted sigmoid job over `w` with random aligned factors
pub fn random_job(w: BlockedMatrix, k: usize, variant: SigmoidVariant, seed: u64) -> WeightedSigmoidJob {
    let (u, v) = aligned_factors(&w, k, seed);
    WeightedSigmoidJob::new(w, u, v, variant)
}

/// Row-major values of a blocked matrix
pub fn dense_values(m: &BlockedMatrix) -> Vec<f64> {
    m.to_dense().into_values()
}

/// Sorted coordinates of the stored non-zeros
pub fn support(m: &BlockedMatrix) -> Vec<(usize, usize)> {
    let mut cells = Vec::new();
    m.for_each_nonzero(|i, j, _| cells.push((i, j)));
    cells.sort_unstable();
    cells
}

/// Every backend paired with every strategy override that forces a strategy
pub fn forced_contexts() -> Vec<ExecutionContext> {
    let mut contexts = Vec::new();
    for exec_type in ExecType::ALL {
        for strategy in [StrategyOverride::ForceReplicate, StrategyOverride::ForcePartitionJoin] {
            contexts.push(ExecutionContext::new(exec_type).with_strategy_override(strategy));
        }
    }
    contexts
}
