//! Distributed dataflow backend
//!
//! Models an in-memory dataflow engine: matrices become
//! [`PartitionedCollection`]s of blocks keyed by [`BlockIndex`], placed by a
//! [`BlockPartitioner`]. Each partition is one task.
//!
//! - **Replicate**: `U` and `V` are wrapped in a [`Broadcast`] and every
//!   partition slices them for its own weight blocks.
//! - **Partition-join**: `U` slices are flat-mapped to every key `(bi, *)` and
//!   `V` slices to every key `(*, bj)`, placed with the weight matrix's
//!   partitioner, and joined partition by partition. Matching partitioners
//!   join without moving data; a mismatch costs one shuffle.

mod collection;

pub use collection::{BlockPartitioner, Broadcast, PartitionedCollection};

use std::sync::Arc;

use tracing::debug;

use crate::algorithm::statistics::{Axis, CentralMoment, assemble_moments, block_moments};
use crate::block::{BlockStorage, MatrixBlock};
use crate::error::Result;
use crate::matrix::{BlockIndex, BlockLayout, BlockedMatrix};
use crate::ops::quaternary::{ReplicatedFactors, evaluate_joined};
use crate::ops::{JobOutput, WeightedSigmoidJob};

use super::commit::OutputCommitter;
use super::{
    Backend, DEFAULT_MAX_TASK_ATTEMPTS, DistributionStrategy, ExecType, ExecutionContext,
    ExecutionReport, FaultPlan, StrategyDecision, TaskRunner, partition_task_name,
};

/// Upper bound on partitions when none is configured
pub const DEFAULT_MAX_PARTITIONS: usize = 64;

/// Stage name of the column/row aggregation tasks
const MOMENTS_STAGE: &str = "moments";

/// Partitioned-collection backend with broadcast variables
#[derive(Debug, Clone)]
pub struct DataflowBackend {
    num_partitions: Option<usize>,
    max_attempts: usize,
    fault_plan: Option<Arc<FaultPlan>>,
}

impl Default for DataflowBackend {
    fn default() -> Self {
        Self {
            num_partitions: None,
            max_attempts: DEFAULT_MAX_TASK_ATTEMPTS,
            fault_plan: None,
        }
    }
}

impl DataflowBackend {
    /// Create a backend from a job context
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        Self {
            num_partitions: ctx.num_partitions(),
            max_attempts: ctx.max_task_attempts(),
            fault_plan: ctx.fault_plan().cloned(),
        }
    }

    /// Use exactly `partitions` partitions (at least 1)
    pub fn with_num_partitions(mut self, partitions: usize) -> Self {
        self.num_partitions = Some(partitions.max(1));
        self
    }

    /// Inject deterministic task failures
    pub fn with_fault_plan(mut self, plan: FaultPlan) -> Self {
        self.fault_plan = Some(Arc::new(plan));
        self
    }

    /// Partitioner for a matrix with `layout`
    ///
    /// Without a configured count, one partition per block up to
    /// [`DEFAULT_MAX_PARTITIONS`].
    pub fn partitioner(&self, layout: &BlockLayout) -> BlockPartitioner {
        let partitions = self
            .num_partitions
            .unwrap_or_else(|| layout.num_blocks().clamp(1, DEFAULT_MAX_PARTITIONS));
        BlockPartitioner::new(layout, partitions)
    }

    fn runner(&self) -> TaskRunner<'_> {
        TaskRunner::new(self.name(), self.max_attempts, self.fault_plan.as_deref())
    }

    /// Run `f` once per partition as task `stage[p]`, gathering every output
    fn run_stage<T, R, F>(
        runner: &TaskRunner<'_>,
        stage: &str,
        collection: &PartitionedCollection<T>,
        f: F,
    ) -> Result<Vec<(BlockIndex, R)>>
    where
        F: Fn(&[(BlockIndex, T)]) -> Result<Vec<(BlockIndex, R)>>,
    {
        let mut out = Vec::with_capacity(collection.len());
        for (partition, records) in collection.partitions().iter().enumerate() {
            let task = partition_task_name(stage, partition);
            for output in runner.run(&task, || f(records))? {
                out.extend(output);
            }
        }
        Ok(out)
    }

    /// Flat-map factor slices to every weight block key they take part in
    fn factor_collections(
        job: &WeightedSigmoidJob,
        partitioner: BlockPartitioner,
    ) -> Result<(
        PartitionedCollection<Arc<MatrixBlock>>,
        PartitionedCollection<Arc<MatrixBlock>>,
    )> {
        let layout = job.weights().layout();
        let (nrb, ncb) = (layout.num_row_blocks(), layout.num_col_blocks());

        let mut u_records = Vec::with_capacity(layout.num_blocks());
        for bi in 0..nrb {
            let slice = job.u().block(BlockIndex::new(bi, 0))?;
            u_records.extend((0..ncb).map(|bj| (BlockIndex::new(bi, bj), Arc::clone(slice))));
        }
        let mut v_records = Vec::with_capacity(layout.num_blocks());
        for bj in 0..ncb {
            let slice = job.v().block(BlockIndex::new(bj, 0))?;
            v_records.extend((0..nrb).map(|bi| (BlockIndex::new(bi, bj), Arc::clone(slice))));
        }
        Ok((
            PartitionedCollection::from_records(u_records, partitioner),
            PartitionedCollection::from_records(v_records, partitioner),
        ))
    }
}

/// A weight block with its optional multiplier block
type WeightRecord = (Arc<MatrixBlock>, Option<Arc<MatrixBlock>>);

impl Backend for DataflowBackend {
    fn name(&self) -> &'static str {
        ExecType::DistributedDataflow.name()
    }

    fn exec_type(&self) -> ExecType {
        ExecType::DistributedDataflow
    }

    fn weighted_sigmoid(
        &self,
        job: &WeightedSigmoidJob,
        decision: &StrategyDecision,
    ) -> Result<JobOutput> {
        let layout = *job.weights().layout();
        let partitioner = self.partitioner(&layout);
        let runner = self.runner();
        let mut report = ExecutionReport::new(self.exec_type(), decision.strategy, job.variant());
        let stage = report.opcode.as_str();
        let mut shuffles = 0;

        let weights = PartitionedCollection::from_matrix(job.weights(), partitioner);
        let weights: PartitionedCollection<WeightRecord> = match job.multiplier() {
            Some(x) => {
                let x = PartitionedCollection::from_matrix(x, self.partitioner(x.layout()));
                weights.left_join(x, &mut shuffles)
            }
            None => weights.map_values(|w| (w, None)),
        };

        let outputs = match decision.strategy {
            DistributionStrategy::Replicate => {
                let factors = Broadcast::new(ReplicatedFactors::assemble(job));
                report.factor_bytes_shipped =
                    factors.value().bytes() * partitioner.num_partitions();
                Self::run_stage(&runner, stage, &weights, |records| {
                    records
                        .iter()
                        .map(|(index, (w, x))| {
                            let out = factors.value().evaluate_with(job, *index, w, x.as_deref())?;
                            Ok((*index, out))
                        })
                        .collect()
                })?
            }
            DistributionStrategy::PartitionJoin => {
                let (u, v) = Self::factor_collections(job, partitioner)?;
                let joined = weights.join(u, &mut shuffles).join(v, &mut shuffles);
                report.factor_bytes_shipped = joined
                    .partitions()
                    .iter()
                    .flatten()
                    .map(|(_, ((_, u), v))| u.memory_usage() + v.memory_usage())
                    .sum();
                Self::run_stage(&runner, stage, &joined, |records| {
                    records
                        .iter()
                        .map(|(index, (((w, x), u), v))| {
                            let out = evaluate_joined(w, u, v, x.as_deref(), job.variant())?;
                            Ok((*index, out))
                        })
                        .collect()
                })?
            }
        };

        let mut committer = OutputCommitter::new(layout);
        for (index, block) in outputs {
            committer.commit(index, block);
        }

        report.blocks_evaluated = committer.len();
        report.cells_evaluated = job.weights().nnz();
        report.task_attempts = runner.attempts();
        report.shuffles = shuffles;
        debug!(
            partitions = partitioner.num_partitions(),
            shuffles,
            duplicates = committer.duplicates(),
            "dataflow job committed"
        );
        let matrix = committer.finish()?;
        Ok(JobOutput { matrix, report })
    }

    fn moments(&self, x: &BlockedMatrix, axis: Axis) -> Result<Vec<CentralMoment>> {
        let runner = self.runner();
        let blocks = PartitionedCollection::from_matrix(x, self.partitioner(x.layout()));
        let partials = Self::run_stage(&runner, MOMENTS_STAGE, &blocks, |records| {
            Ok(records
                .iter()
                .map(|(index, block)| (*index, block_moments(block, axis)))
                .collect())
        })?;
        assemble_moments(x.layout(), axis, partials)
    }
}
