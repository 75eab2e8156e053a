//! # blockwise
//!
//! **Sparse-safe fused operators over block-partitioned matrices.**
//!
//! blockwise evaluates the weighted sigmoid `W ⊙ f(U Vᵀ)` on the non-zero
//! support of `W` without materializing `U Vᵀ`, and computes column/row
//! standard deviations, with identical results on an in-process backend and
//! two models of distributed execution.
//!
//! ## Features
//!
//! - **Blocked matrices**: dense and CSR blocks behind one iteration interface
//! - **Weighted sigmoid**: basic, log, minus and log-minus variants, evaluated
//!   with a numerically stable log-sigmoid
//! - **Distribution strategies**: replicated factors or a partition-aligned
//!   join, chosen by a size heuristic or forced per job
//! - **Backends**: in-process (rayon), key-value batch with retried tasks, and
//!   partitioned dataflow with broadcast variables
//! - **Aggregates**: column/row means, variances and standard deviations via
//!   Welford updates merged with Chan's formula
//!
//! ## Quick Start
//!
//! ```rust
//! use blockwise::prelude::*;
//!
//! let w = BlockedMatrix::from_triplets(4, 4, &[(0, 0, 1.0), (3, 2, 2.0)], 2, 2)?;
//! let u = BlockedMatrix::from_dense(4, 1, &[0.5, 0.0, 0.0, 1.0], 2, 2)?;
//! let v = BlockedMatrix::from_dense(4, 1, &[1.0, 0.0, -1.0, 0.0], 2, 2)?;
//!
//! let ctx = ExecutionContext::new(ExecType::DistributedDataflow)
//!     .with_strategy_override(StrategyOverride::ForcePartitionJoin);
//! let job = WeightedSigmoidJob::new(w, u, v, SigmoidVariant::Basic);
//! let out = weighted_sigmoid(&ctx, &job)?;
//!
//! assert_eq!(out.matrix.nnz(), 2);
//! assert_eq!(out.report.opcode, Opcode::RedWSigmoid);
//! # Ok::<(), blockwise::error::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `rayon` (default): multi-threaded block evaluation on the in-process backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod block;
pub mod error;
pub mod matrix;
pub mod ops;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::algorithm::statistics::{Axis, CentralMoment};
    pub use crate::block::{BlockFormat, BlockStorage, CsrBlock, DenseBlock, MatrixBlock};
    pub use crate::error::{Error, Result};
    pub use crate::matrix::{BlockIndex, BlockLayout, BlockedMatrix};
    pub use crate::ops::{
        JobOutput, SigmoidVariant, WeightedSigmoidJob, col_std_devs, row_std_devs,
        weighted_sigmoid,
    };
    pub use crate::runtime::{
        Backend, DistributionStrategy, ExecType, ExecutionContext, ExecutionReport, Opcode,
        StrategyOverride,
    };
}
