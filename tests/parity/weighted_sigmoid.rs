//! Weighted sigmoid parity across backends and strategies

use blockwise::ops::{SigmoidVariant, WeightedSigmoidJob, weighted_sigmoid};
use blockwise::runtime::{
    DistributionStrategy, ExecType, ExecutionContext, Opcode, ParallelismConfig, StrategyOverride,
};

use crate::common::{
    aligned_factors, assert_parity_f64, dense_values, forced_contexts, random_dense, random_job,
    random_sparse, support,
};

fn reference(job: &WeightedSigmoidJob) -> Vec<f64> {
    let ctx = ExecutionContext::new(ExecType::InProcess)
        .with_strategy_override(StrategyOverride::ForceReplicate)
        .with_parallelism(ParallelismConfig::sequential());
    dense_values(&weighted_sigmoid(&ctx, job).unwrap().matrix)
}

#[test]
fn test_all_variants_agree_across_backends() {
    for (seed, variant) in SigmoidVariant::ALL.into_iter().enumerate() {
        let w = random_sparse(30, 22, 0.15, 7, 5, 100 + seed as u64);
        let job = random_job(w, 3, variant, 200 + seed as u64);
        let expected = reference(&job);

        for ctx in forced_contexts() {
            let out = weighted_sigmoid(&ctx, &job).unwrap();
            let label = format!("{} {}", variant, out.report);
            assert_parity_f64(&dense_values(&out.matrix), &expected, &label);
            assert_eq!(support(&out.matrix), support(job.weights()), "{}", label);
        }
    }
}

#[test]
fn test_replicate_matches_join_on_sparse_weights() {
    let w = random_sparse(50, 50, 0.05, 10, 10, 7);
    let job = random_job(w, 4, SigmoidVariant::Basic, 8);
    for exec_type in ExecType::ALL {
        let replicate = ExecutionContext::new(exec_type)
            .with_strategy_override(StrategyOverride::ForceReplicate);
        let join = ExecutionContext::new(exec_type)
            .with_strategy_override(StrategyOverride::ForcePartitionJoin);
        let a = weighted_sigmoid(&replicate, &job).unwrap();
        let b = weighted_sigmoid(&join, &job).unwrap();

        assert_eq!(a.report.strategy, DistributionStrategy::Replicate);
        assert_eq!(b.report.strategy, DistributionStrategy::PartitionJoin);
        assert_parity_f64(
            &dense_values(&a.matrix),
            &dense_values(&b.matrix),
            exec_type.name(),
        );
        assert_eq!(a.matrix.nnz(), b.matrix.nnz());
    }
}

#[test]
fn test_dense_weights_with_multiplier_agree() {
    let w = random_dense(16, 12, 1.0, 5, 4, 61);
    let x = random_sparse(16, 12, 0.5, 5, 4, 62);
    let (u, v) = aligned_factors(&w, 5, 63);
    let job = WeightedSigmoidJob::new(w, u, v, SigmoidVariant::LogMinus).with_multiplier(x);
    let expected = reference(&job);
    for ctx in forced_contexts() {
        let out = weighted_sigmoid(&ctx, &job).unwrap();
        assert_parity_f64(&dense_values(&out.matrix), &expected, &out.report.to_string());
    }
}

#[test]
fn test_partition_count_does_not_change_output() {
    let w = random_sparse(24, 24, 0.2, 4, 4, 71);
    let job = random_job(w, 2, SigmoidVariant::Minus, 72);
    let expected = reference(&job);
    for partitions in [1, 3, 36, 100] {
        for strategy in [StrategyOverride::ForceReplicate, StrategyOverride::ForcePartitionJoin] {
            let ctx = ExecutionContext::new(ExecType::DistributedDataflow)
                .with_num_partitions(partitions)
                .with_strategy_override(strategy);
            let out = weighted_sigmoid(&ctx, &job).unwrap();
            assert_parity_f64(
                &dense_values(&out.matrix),
                &expected,
                &format!("{} partitions", partitions),
            );
        }
    }
}

#[test]
fn test_thread_limits_do_not_change_output() {
    let w = random_sparse(40, 40, 0.1, 5, 5, 81);
    let job = random_job(w, 3, SigmoidVariant::Log, 82);
    let expected = reference(&job);
    for parallelism in [
        ParallelismConfig::new(Some(1), None),
        ParallelismConfig::new(Some(3), Some(2)),
        ParallelismConfig::new(None, Some(16)),
    ] {
        let ctx = ExecutionContext::new(ExecType::InProcess).with_parallelism(parallelism);
        let out = weighted_sigmoid(&ctx, &job).unwrap();
        assert_eq!(dense_values(&out.matrix), expected);
    }
}

#[test]
fn test_reports_name_backend_opcodes() {
    let w = random_sparse(20, 20, 0.1, 5, 5, 91);
    let job = random_job(w, 2, SigmoidVariant::Basic, 92);
    let cases = [
        (ExecType::InProcess, StrategyOverride::ForceReplicate, Opcode::WSigmoid),
        (ExecType::InProcess, StrategyOverride::ForcePartitionJoin, Opcode::WSigmoid),
        (ExecType::DistributedBatch, StrategyOverride::ForceReplicate, Opcode::MapWSigmoid),
        (ExecType::DistributedBatch, StrategyOverride::ForcePartitionJoin, Opcode::RedWSigmoid),
        (ExecType::DistributedDataflow, StrategyOverride::ForceReplicate, Opcode::MapWSigmoid),
        (ExecType::DistributedDataflow, StrategyOverride::ForcePartitionJoin, Opcode::RedWSigmoid),
    ];
    for (exec_type, strategy, opcode) in cases {
        let ctx = ExecutionContext::new(exec_type).with_strategy_override(strategy);
        let out = weighted_sigmoid(&ctx, &job).unwrap();
        assert_eq!(out.report.opcode, opcode, "{}", out.report);
        assert_eq!(out.report.exec_type, exec_type);
        assert_eq!(out.report.blocks_evaluated, 16);
    }
}

#[test]
fn test_shuffle_counts() {
    let w = random_sparse(20, 20, 0.1, 5, 5, 93);
    let job = random_job(w, 2, SigmoidVariant::Basic, 94);
    let join = StrategyOverride::ForcePartitionJoin;

    let batch = ExecutionContext::new(ExecType::DistributedBatch).with_strategy_override(join);
    assert_eq!(weighted_sigmoid(&batch, &job).unwrap().report.shuffles, 1);

    // W and both factors share one partitioner, so the joins stay narrow
    let dataflow = ExecutionContext::new(ExecType::DistributedDataflow).with_strategy_override(join);
    assert_eq!(weighted_sigmoid(&dataflow, &job).unwrap().report.shuffles, 0);

    let replicate = ExecutionContext::new(ExecType::DistributedBatch)
        .with_strategy_override(StrategyOverride::ForceReplicate);
    let out = weighted_sigmoid(&replicate, &job).unwrap();
    assert_eq!(out.report.shuffles, 0);
    assert!(out.report.factor_bytes_shipped > 0);
}
