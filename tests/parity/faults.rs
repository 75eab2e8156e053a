//! Retries and speculative duplicates on the distributed backends

use blockwise::error::Error;
use blockwise::matrix::BlockIndex;
use blockwise::ops::{SigmoidVariant, col_std_devs, weighted_sigmoid};
use blockwise::runtime::{
    ExecType, ExecutionContext, FaultPlan, StrategyOverride, aggregate_task_name, map_task_name,
    partition_task_name, reduce_task_name,
};

use crate::common::{assert_parity_f64, dense_values, random_dense, random_job, random_sparse};

fn flaky_plan(exec_type: ExecType, strategy: StrategyOverride) -> FaultPlan {
    let (flaky, duplicate) = match (exec_type, strategy) {
        (ExecType::DistributedBatch, StrategyOverride::ForcePartitionJoin) => (
            reduce_task_name(BlockIndex::new(0, 1)),
            reduce_task_name(BlockIndex::new(2, 2)),
        ),
        (ExecType::DistributedBatch, _) => (
            map_task_name(BlockIndex::new(0, 1)),
            map_task_name(BlockIndex::new(2, 2)),
        ),
        (_, StrategyOverride::ForcePartitionJoin) => (
            partition_task_name("redwsigmoid", 0),
            partition_task_name("redwsigmoid", 1),
        ),
        _ => (
            partition_task_name("mapwsigmoid", 0),
            partition_task_name("mapwsigmoid", 1),
        ),
    };
    FaultPlan::new().fail_attempts(flaky, 2).speculate(duplicate)
}

#[test]
fn test_faults_leave_outputs_unchanged() {
    let w = random_sparse(15, 15, 0.3, 5, 5, 301);
    let job = random_job(w, 3, SigmoidVariant::Basic, 302);

    for exec_type in [ExecType::DistributedBatch, ExecType::DistributedDataflow] {
        for strategy in [StrategyOverride::ForceReplicate, StrategyOverride::ForcePartitionJoin] {
            let clean = ExecutionContext::new(exec_type)
                .with_strategy_override(strategy)
                .with_num_partitions(2);
            let faulty = clean.clone().with_fault_plan(flaky_plan(exec_type, strategy));

            let a = weighted_sigmoid(&clean, &job).unwrap();
            let b = weighted_sigmoid(&faulty, &job).unwrap();
            assert_eq!(dense_values(&a.matrix), dense_values(&b.matrix), "{}", b.report);
            assert_eq!(a.matrix.nnz(), b.matrix.nnz());
            assert_eq!(b.report.blocks_evaluated, 9);
            // two failed attempts and one duplicate
            assert_eq!(b.report.task_attempts, a.report.task_attempts + 3);
        }
    }
}

#[test]
fn test_exhausted_retries_surface_backend_error() {
    let w = random_sparse(10, 10, 0.3, 5, 5, 311);
    let job = random_job(w, 2, SigmoidVariant::Log, 312);
    let plan = FaultPlan::new().fail_attempts(map_task_name(BlockIndex::new(1, 0)), 100);
    let ctx = ExecutionContext::new(ExecType::DistributedBatch)
        .with_strategy_override(StrategyOverride::ForceReplicate)
        .with_max_task_attempts(3)
        .with_fault_plan(plan);

    match weighted_sigmoid(&ctx, &job).unwrap_err() {
        Error::BackendExecution { backend, task, attempts, .. } => {
            assert_eq!(backend, "distributed-batch");
            assert_eq!(task, "map(1,0)");
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_duplicate_aggregation_is_idempotent() {
    let x = random_dense(12, 4, 2.0, 3, 2, 321);
    let expected = col_std_devs(&ExecutionContext::default(), &x).unwrap();

    let mut plan = FaultPlan::new();
    for index in x.layout().indices() {
        plan = plan.speculate(aggregate_task_name(index));
    }
    plan = plan.fail_attempts(aggregate_task_name(BlockIndex::new(3, 1)), 1);
    let batch = ExecutionContext::new(ExecType::DistributedBatch).with_fault_plan(plan);
    let got = col_std_devs(&batch, &x).unwrap();
    assert_parity_f64(&got, &expected, "batch col_std_devs");

    let plan = FaultPlan::new()
        .speculate(partition_task_name("moments", 0))
        .fail_attempts(partition_task_name("moments", 1), 2);
    let dataflow = ExecutionContext::new(ExecType::DistributedDataflow)
        .with_num_partitions(2)
        .with_fault_plan(plan);
    let got = col_std_devs(&dataflow, &x).unwrap();
    assert_parity_f64(&got, &expected, "dataflow col_std_devs");
}
