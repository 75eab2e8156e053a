//! Operations over blocked matrices
//!
//! ```text
//! ops
//! ├── sigmoid     elementwise variant library (sigmoid, log_sigmoid, variants)
//! ├── quaternary  fused weighted sigmoid: W ⊙ f(U Vᵀ) on W's support
//! └── aggregate   column / row moments, variances, standard deviations
//! ```
//!
//! Job-level entry points take an [`ExecutionContext`](crate::runtime::ExecutionContext)
//! naming the backend; the block-level [`evaluate_block`] is backend-free.

pub mod aggregate;
pub mod quaternary;
pub mod sigmoid;

pub use aggregate::{
    SAMPLE_CORRECTION, col_means, col_moments, col_std_devs, col_vars, moments, row_moments,
    row_std_devs, row_vars,
};
pub use quaternary::{JobOutput, WeightedSigmoidJob, evaluate_block, weighted_sigmoid};
pub use sigmoid::{SIGMOID_BOUND, SigmoidVariant, log_sigmoid, sigmoid};
