//! Distributed batch backend
//!
//! Models a key-value batch engine on top of the block grid:
//!
//! - **Replicate**: one map task per weight block. `U` and `V` travel as
//!   broadcast side inputs, assembled once and localized by every task.
//! - **Partition-join**: mappers emit `(block index, W block)`, every `U`
//!   slice keyed to each block of its block row, and every `V` slice keyed to
//!   each block of its block column. One shuffle groups them, and a reduce
//!   task per weight block evaluates the joined inputs.
//!
//! Tasks run through a retrying task runner. Since evaluation is pure, a
//! retried or speculatively duplicated task produces the same block, and the
//! output committer keeps exactly one block per index.

mod shuffle;

use std::sync::Arc;

use tracing::debug;

use crate::algorithm::statistics::{Axis, CentralMoment, assemble_moments, block_moments};
use crate::error::Result;
use crate::matrix::{BlockIndex, BlockedMatrix};
use crate::ops::quaternary::{ReplicatedFactors, evaluate_joined};
use crate::ops::{JobOutput, WeightedSigmoidJob};

use shuffle::{JoinInput, JoinedBlock, KeyedStream};

use super::commit::OutputCommitter;
use super::{
    Backend, DEFAULT_MAX_TASK_ATTEMPTS, DistributionStrategy, ExecType, ExecutionContext,
    ExecutionReport, FaultPlan, StrategyDecision, TaskRunner, aggregate_task_name, map_task_name,
    reduce_task_name,
};

/// Key-value batch backend with retried tasks and idempotent commit
#[derive(Debug, Clone)]
pub struct BatchBackend {
    max_attempts: usize,
    fault_plan: Option<Arc<FaultPlan>>,
}

impl Default for BatchBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TASK_ATTEMPTS)
    }
}

impl BatchBackend {
    /// Create a backend allowing `max_attempts` attempts per task
    pub fn new(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            fault_plan: None,
        }
    }

    /// Create a backend from a job context
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        Self {
            max_attempts: ctx.max_task_attempts(),
            fault_plan: ctx.fault_plan().cloned(),
        }
    }

    /// Inject deterministic task failures
    pub fn with_fault_plan(mut self, plan: FaultPlan) -> Self {
        self.fault_plan = Some(Arc::new(plan));
        self
    }

    fn runner(&self) -> TaskRunner<'_> {
        TaskRunner::new(self.name(), self.max_attempts, self.fault_plan.as_deref())
    }

    /// Map side of the partition-join: tag every input with its join key
    fn emit_join_inputs(job: &WeightedSigmoidJob) -> Result<KeyedStream<BlockIndex, JoinInput>> {
        let layout = job.weights().layout();
        let mut stream = KeyedStream::new();

        for (index, block) in job.weights().blocks() {
            stream.emit(index, JoinInput::Weight(Arc::clone(block)));
        }
        if let Some(x) = job.multiplier() {
            for (index, block) in x.blocks() {
                stream.emit(index, JoinInput::Multiplier(Arc::clone(block)));
            }
        }
        for bi in 0..layout.num_row_blocks() {
            let slice = job.u().block(BlockIndex::new(bi, 0))?;
            for bj in 0..layout.num_col_blocks() {
                stream.emit(BlockIndex::new(bi, bj), JoinInput::Left(Arc::clone(slice)));
            }
        }
        for bj in 0..layout.num_col_blocks() {
            let slice = job.v().block(BlockIndex::new(bj, 0))?;
            for bi in 0..layout.num_row_blocks() {
                stream.emit(BlockIndex::new(bi, bj), JoinInput::Right(Arc::clone(slice)));
            }
        }
        Ok(stream)
    }
}

impl Backend for BatchBackend {
    fn name(&self) -> &'static str {
        ExecType::DistributedBatch.name()
    }

    fn exec_type(&self) -> ExecType {
        ExecType::DistributedBatch
    }

    fn weighted_sigmoid(
        &self,
        job: &WeightedSigmoidJob,
        decision: &StrategyDecision,
    ) -> Result<JobOutput> {
        let layout = *job.weights().layout();
        let runner = self.runner();
        let mut committer = OutputCommitter::new(layout);
        let mut report = ExecutionReport::new(self.exec_type(), decision.strategy, job.variant());

        match decision.strategy {
            DistributionStrategy::Replicate => {
                let cache = ReplicatedFactors::assemble(job);
                for index in layout.indices() {
                    let task = map_task_name(index);
                    for block in runner.run(&task, || cache.evaluate(job, index))? {
                        committer.commit(index, block);
                    }
                }
                report.factor_bytes_shipped = cache.bytes() * layout.num_blocks();
            }
            DistributionStrategy::PartitionJoin => {
                let stream = Self::emit_join_inputs(job)?;
                debug!(records = stream.len(), "shuffling join inputs");
                report.shuffles = 1;
                for (index, inputs) in stream.shuffle() {
                    let joined = JoinedBlock::from_inputs(index, inputs)?;
                    report.factor_bytes_shipped += joined.factor_bytes();
                    let task = reduce_task_name(index);
                    let outputs = runner.run(&task, || {
                        evaluate_joined(
                            &joined.weights,
                            &joined.u,
                            &joined.v,
                            joined.multiplier.as_deref(),
                            job.variant(),
                        )
                    })?;
                    for block in outputs {
                        committer.commit(index, block);
                    }
                }
            }
        }

        report.blocks_evaluated = committer.len();
        report.cells_evaluated = job.weights().nnz();
        report.task_attempts = runner.attempts();
        debug!(
            committed = committer.len(),
            duplicates = committer.duplicates(),
            attempts = report.task_attempts,
            "batch job committed"
        );
        let matrix = committer.finish()?;
        Ok(JobOutput { matrix, report })
    }

    fn moments(&self, x: &BlockedMatrix, axis: Axis) -> Result<Vec<CentralMoment>> {
        let runner = self.runner();
        let mut partials = Vec::with_capacity(x.layout().num_blocks());
        for (index, block) in x.blocks() {
            let task = aggregate_task_name(index);
            for moments in runner.run(&task, || Ok(block_moments(block, axis)))? {
                partials.push((index, moments));
            }
        }
        assemble_moments(x.layout(), axis, partials)
    }
}
