//! Diagnostics reported after a job completes

use std::fmt;

use crate::ops::sigmoid::SigmoidVariant;

use super::context::ExecType;
use super::strategy::DistributionStrategy;

/// Physical operator that executed a weighted sigmoid job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// In-process fused operator
    WSigmoid,
    /// Distributed, factors broadcast to every map task
    MapWSigmoid,
    /// Distributed, factor slices joined to weight blocks by block coordinates
    RedWSigmoid,
}

impl Opcode {
    /// Opcode for a backend and strategy combination
    pub fn for_execution(exec_type: ExecType, strategy: DistributionStrategy) -> Self {
        match (exec_type.is_distributed(), strategy) {
            (false, _) => Opcode::WSigmoid,
            (true, DistributionStrategy::Replicate) => Opcode::MapWSigmoid,
            (true, DistributionStrategy::PartitionJoin) => Opcode::RedWSigmoid,
        }
    }

    /// Opcode string
    pub fn as_str(&self) -> &'static str {
        match self {
            Opcode::WSigmoid => "wsigmoid",
            Opcode::MapWSigmoid => "mapwsigmoid",
            Opcode::RedWSigmoid => "redwsigmoid",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What ran, and how much work it took
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// Backend that executed the job
    pub exec_type: ExecType,
    /// Distribution strategy used
    pub strategy: DistributionStrategy,
    /// Physical operator
    pub opcode: Opcode,
    /// Variant evaluated
    pub variant: SigmoidVariant,
    /// Weight blocks evaluated (distinct, duplicates excluded)
    pub blocks_evaluated: usize,
    /// Weight non-zeros visited, i.e. dot products computed
    pub cells_evaluated: usize,
    /// Task attempts including retries and duplicates (0 in-process)
    pub task_attempts: usize,
    /// Shuffles performed by joins
    pub shuffles: usize,
    /// Bytes of factor data shipped to tasks
    pub factor_bytes_shipped: usize,
}

impl ExecutionReport {
    /// Start a report for a job
    pub fn new(exec_type: ExecType, strategy: DistributionStrategy, variant: SigmoidVariant) -> Self {
        Self {
            exec_type,
            strategy,
            opcode: Opcode::for_execution(exec_type, strategy),
            variant,
            blocks_evaluated: 0,
            cells_evaluated: 0,
            task_attempts: 0,
            shuffles: 0,
            factor_bytes_shipped: 0,
        }
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] on {} via {}: {} blocks, {} cells, {} attempts, {} shuffles",
            self.opcode,
            self.variant,
            self.exec_type,
            self.strategy,
            self.blocks_evaluated,
            self.cells_evaluated,
            self.task_attempts,
            self.shuffles
        )
    }
}
