//! In-process backend
//!
//! Evaluates every weight block in the calling process, in parallel on a rayon
//! pool when the `rayon` feature is enabled.

use std::sync::Arc;

use tracing::trace;

use crate::algorithm::statistics::{Axis, CentralMoment, assemble_moments, block_moments};
use crate::error::Result;
use crate::matrix::{BlockIndex, BlockedMatrix};
use crate::ops::quaternary::{ReplicatedFactors, evaluate_joined};
use crate::ops::{JobOutput, WeightedSigmoidJob};

use super::{
    Backend, DistributionStrategy, ExecType, ExecutionContext, ExecutionReport,
    ParallelismConfig, StrategyDecision,
};

/// Single-process backend, optionally multi-threaded over blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend {
    parallelism: ParallelismConfig,
}

impl LocalBackend {
    /// Create a backend with the given thread configuration
    pub fn new(parallelism: ParallelismConfig) -> Self {
        Self { parallelism }
    }

    /// Create a backend from a job context
    pub fn from_context(ctx: &ExecutionContext) -> Self {
        Self::new(ctx.parallelism())
    }

    /// The thread configuration
    pub fn parallelism(&self) -> ParallelismConfig {
        self.parallelism
    }

    /// Apply `f` to every block index, keeping input order in the output
    fn map_blocks<T, F>(&self, indices: &[BlockIndex], f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(BlockIndex) -> Result<T> + Sync + Send,
    {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;

            let min_len = self.parallelism.min_len();
            let run = || {
                indices
                    .par_iter()
                    .with_min_len(min_len)
                    .map(|&index| f(index))
                    .collect::<Result<Vec<_>>>()
            };
            match self.parallelism.max_threads {
                Some(1) => indices.iter().map(|&index| f(index)).collect(),
                Some(threads) => {
                    let pool = rayon::ThreadPoolBuilder::new()
                        .num_threads(threads)
                        .build()
                        .map_err(|e| crate::error::Error::Backend(format!("thread pool: {e}")))?;
                    pool.install(run)
                }
                None => run(),
            }
        }

        #[cfg(not(feature = "rayon"))]
        {
            indices.iter().map(|&index| f(index)).collect()
        }
    }
}

impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        ExecType::InProcess.name()
    }

    fn exec_type(&self) -> ExecType {
        ExecType::InProcess
    }

    fn weighted_sigmoid(
        &self,
        job: &WeightedSigmoidJob,
        decision: &StrategyDecision,
    ) -> Result<JobOutput> {
        let weights = job.weights();
        let indices: Vec<BlockIndex> = weights.layout().indices().collect();
        let mut report = ExecutionReport::new(self.exec_type(), decision.strategy, job.variant());

        let blocks = match decision.strategy {
            DistributionStrategy::Replicate => {
                let factors = ReplicatedFactors::assemble(job);
                // one shared copy for every block
                report.factor_bytes_shipped = factors.bytes();
                self.map_blocks(&indices, |index| {
                    trace!(block = %index, "evaluate replicated block");
                    factors.evaluate(job, index)
                })?
            }
            DistributionStrategy::PartitionJoin => self.map_blocks(&indices, |index| {
                trace!(block = %index, "evaluate joined block");
                let x = job.multiplier().map(|x| x.block(index)).transpose()?;
                evaluate_joined(
                    weights.block(index)?,
                    job.u().block(BlockIndex::new(index.row, 0))?,
                    job.v().block(BlockIndex::new(index.col, 0))?,
                    x.map(Arc::as_ref),
                    job.variant(),
                )
            })?,
        };

        report.blocks_evaluated = indices.len();
        report.cells_evaluated = weights.nnz();
        let matrix = BlockedMatrix::from_blocks(*weights.layout(), blocks)?;
        Ok(JobOutput { matrix, report })
    }

    fn moments(&self, x: &BlockedMatrix, axis: Axis) -> Result<Vec<CentralMoment>> {
        let indices: Vec<BlockIndex> = x.layout().indices().collect();
        let partials = self.map_blocks(&indices, |index| {
            Ok((index, block_moments(x.block(index)?, axis)))
        })?;
        assemble_moments(x.layout(), axis, partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockStorage;
    use crate::ops::SigmoidVariant;
    use crate::runtime::{MemoryBudget, StrategyOverride, select_strategy};

    fn job() -> WeightedSigmoidJob {
        let w = BlockedMatrix::from_triplets(5, 4, &[(0, 0, 1.0), (4, 3, 2.0), (2, 1, -1.0)], 2, 2)
            .unwrap();
        let u: Vec<f64> = (0..10).map(|v| v as f64 * 0.1).collect();
        let v: Vec<f64> = (0..8).map(|v| 0.4 - v as f64 * 0.1).collect();
        WeightedSigmoidJob::new(
            w,
            BlockedMatrix::from_dense(5, 2, &u, 2, 2).unwrap(),
            BlockedMatrix::from_dense(4, 2, &v, 2, 2).unwrap(),
            SigmoidVariant::Basic,
        )
    }

    fn decide(job: &WeightedSigmoidJob, strategy_override: StrategyOverride) -> StrategyDecision {
        select_strategy(
            job.weights().layout(),
            job.u().layout(),
            job.v().layout(),
            strategy_override,
            &MemoryBudget::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_thread_configs_agree() {
        let job = job();
        let decision = decide(&job, StrategyOverride::None);
        let sequential = LocalBackend::new(ParallelismConfig::sequential())
            .weighted_sigmoid(&job, &decision)
            .unwrap();
        let pooled = LocalBackend::new(ParallelismConfig::new(Some(3), Some(2)))
            .weighted_sigmoid(&job, &decision)
            .unwrap();
        assert_eq!(
            sequential.matrix.to_dense().values(),
            pooled.matrix.to_dense().values()
        );
        assert_eq!(sequential.matrix.nnz(), 3);
        assert_eq!(sequential.report.blocks_evaluated, 6);
        assert_eq!(sequential.report.cells_evaluated, 3);
    }

    #[test]
    fn test_strategies_agree() {
        let job = job();
        let backend = LocalBackend::default();
        let replicated = backend
            .weighted_sigmoid(&job, &decide(&job, StrategyOverride::ForceReplicate))
            .unwrap();
        let joined = backend
            .weighted_sigmoid(&job, &decide(&job, StrategyOverride::ForcePartitionJoin))
            .unwrap();
        assert_eq!(replicated.report.strategy, DistributionStrategy::Replicate);
        assert_eq!(joined.report.strategy, DistributionStrategy::PartitionJoin);
        for (index, block) in replicated.matrix.blocks() {
            let other = joined.matrix.block(index).unwrap();
            assert_eq!(block.to_dense().values(), other.to_dense().values());
            assert_eq!(block.nnz(), other.nnz());
        }
    }

    #[test]
    fn test_moments_cover_every_column() {
        let x = BlockedMatrix::from_dense(3, 1, &[1.0, 2.0, 3.0], 2, 1).unwrap();
        let moments = LocalBackend::default().moments(&x, Axis::Columns).unwrap();
        assert_eq!(moments.len(), 1);
        assert_eq!(moments[0].count, 3);
        assert!((moments[0].std_dev(1) - 1.0).abs() < 1e-12);
    }
}
