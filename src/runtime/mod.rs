//! Execution backends for blocked matrix jobs
//!
//! This module defines the [`Backend`] trait and its three implementations.
//! Every job names its backend through the [`ExecType`] tag of its
//! [`ExecutionContext`]; the tag is resolved to a backend exactly once per job.
//!
//! # Architecture
//!
//! ```text
//! ExecutionContext (per job: ExecType, strategy override, limits)
//! ├── select_strategy  -> StrategyDecision (Replicate | PartitionJoin)
//! └── Backend
//!     ├── LocalBackend     in-process, rayon over weight blocks
//!     ├── BatchBackend     map tasks, keyed shuffle + reduce-side join,
//!     │                    retried tasks, idempotent commit
//!     └── DataflowBackend  partitioned collections, broadcast variables,
//!                          partition-aligned joins
//! ```
//!
//! All backends evaluate blocks with the same pure evaluator and merge
//! aggregation partials in block order, so their outputs are bit-identical.

mod commit;
mod context;
mod diagnostics;
mod strategy;
mod task;

pub mod batch;
pub mod dataflow;
pub mod local;

pub use batch::BatchBackend;
pub use context::{
    DEFAULT_BROADCAST_FRACTION, DEFAULT_MAX_BROADCAST_VOLUME, DEFAULT_MAX_TASK_ATTEMPTS,
    DEFAULT_TASK_MEMORY_BYTES, ExecType, ExecutionContext, MemoryBudget, ParallelismConfig,
};
pub use dataflow::DataflowBackend;
pub use diagnostics::{ExecutionReport, Opcode};
pub use local::LocalBackend;
pub use strategy::{
    DistributionStrategy, StrategyDecision, StrategyOverride, check_alignment, select_strategy,
};
pub use task::{
    FaultPlan, aggregate_task_name, map_task_name, partition_task_name, reduce_task_name,
};

pub(crate) use task::TaskRunner;

use crate::algorithm::statistics::{Axis, CentralMoment};
use crate::error::Result;
use crate::matrix::BlockedMatrix;
use crate::ops::{JobOutput, WeightedSigmoidJob};

/// Core trait for execution backends
///
/// A backend owns how weight blocks become tasks and how factor data reaches
/// them. Block evaluation itself is shared, which keeps every backend
/// numerically identical.
pub trait Backend: Send + Sync {
    /// Human-readable name of this backend
    fn name(&self) -> &'static str;

    /// The tag this backend is selected by
    fn exec_type(&self) -> ExecType;

    /// Evaluate a validated weighted sigmoid job with a selected strategy
    fn weighted_sigmoid(
        &self,
        job: &WeightedSigmoidJob,
        decision: &StrategyDecision,
    ) -> Result<JobOutput>;

    /// Per-column (or per-row) central moments of `x`
    fn moments(&self, x: &BlockedMatrix, axis: Axis) -> Result<Vec<CentralMoment>>;
}

/// Resolve the context's backend and hand it to `f`
pub(crate) fn dispatch<T>(
    ctx: &ExecutionContext,
    f: impl FnOnce(&dyn Backend) -> Result<T>,
) -> Result<T> {
    match ctx.exec_type() {
        ExecType::InProcess => f(&LocalBackend::from_context(ctx)),
        ExecType::DistributedBatch => f(&BatchBackend::from_context(ctx)),
        ExecType::DistributedDataflow => f(&DataflowBackend::from_context(ctx)),
    }
}
