//! Per-job execution context and configuration

use std::fmt;
use std::sync::Arc;

use super::strategy::StrategyOverride;
use super::task::FaultPlan;

/// Which backend executes a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecType {
    /// Single process, optionally multi-threaded over blocks
    #[default]
    InProcess,
    /// Key-value batch execution: one map task per weight block
    DistributedBatch,
    /// Partitioned in-memory collections with broadcast variables
    DistributedDataflow,
}

impl ExecType {
    /// All backends
    pub const ALL: [ExecType; 3] = [
        ExecType::InProcess,
        ExecType::DistributedBatch,
        ExecType::DistributedDataflow,
    ];

    /// Returns true for the distributed backends
    #[inline]
    pub fn is_distributed(&self) -> bool {
        !matches!(self, ExecType::InProcess)
    }

    /// Short backend name
    pub fn name(&self) -> &'static str {
        match self {
            ExecType::InProcess => "in-process",
            ExecType::DistributedBatch => "distributed-batch",
            ExecType::DistributedDataflow => "distributed-dataflow",
        }
    }
}

impl fmt::Display for ExecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Thread configuration for block-parallel execution
///
/// `max_threads: None` uses the global rayon pool; `min_blocks_per_task`
/// bounds how finely the block list is split across workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParallelismConfig {
    /// Upper bound on worker threads
    pub max_threads: Option<usize>,
    /// Minimum number of blocks handed to one worker at a time
    pub min_blocks_per_task: Option<usize>,
}

impl ParallelismConfig {
    /// Create a parallelism configuration
    pub fn new(max_threads: Option<usize>, min_blocks_per_task: Option<usize>) -> Self {
        Self {
            max_threads,
            min_blocks_per_task,
        }
    }

    /// Run everything on the calling thread
    pub fn sequential() -> Self {
        Self::new(Some(1), None)
    }

    /// Minimum split length, never zero
    #[inline]
    pub fn min_len(&self) -> usize {
        self.min_blocks_per_task.unwrap_or(1).max(1)
    }
}

/// Default memory available to one task (1 GiB)
pub const DEFAULT_TASK_MEMORY_BYTES: usize = 1 << 30;

/// Default share of task memory that broadcast factors may occupy
pub const DEFAULT_BROADCAST_FRACTION: f64 = 0.15;

/// Default cap on total broadcast volume across all weight blocks (8 GiB)
pub const DEFAULT_MAX_BROADCAST_VOLUME: usize = 8 << 30;

/// Default number of attempts per distributed task
pub const DEFAULT_MAX_TASK_ATTEMPTS: usize = 4;

/// Memory limits consulted by the strategy selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryBudget {
    /// Memory available to one task
    pub task_memory_bytes: usize,
    /// Share of task memory that broadcast factors may occupy
    pub broadcast_fraction: f64,
    /// Cap on factor bytes times number of weight blocks
    pub max_broadcast_volume: usize,
}

impl MemoryBudget {
    /// Bytes a single task may spend on broadcast factors
    pub fn broadcast_budget(&self) -> usize {
        (self.task_memory_bytes as f64 * self.broadcast_fraction.clamp(0.0, 1.0)) as usize
    }
}

impl Default for MemoryBudget {
    fn default() -> Self {
        Self {
            task_memory_bytes: DEFAULT_TASK_MEMORY_BYTES,
            broadcast_fraction: DEFAULT_BROADCAST_FRACTION,
            max_broadcast_volume: DEFAULT_MAX_BROADCAST_VOLUME,
        }
    }
}

/// Configuration for one job
///
/// Contexts are plain values: build one per job and pass it explicitly.
/// Forcing a strategy for a test means building a context with the override;
/// dropping the context restores nothing because nothing global was changed.
///
/// ```
/// use blockwise::runtime::{ExecType, ExecutionContext, StrategyOverride};
///
/// let ctx = ExecutionContext::new(ExecType::DistributedBatch)
///     .with_strategy_override(StrategyOverride::ForcePartitionJoin)
///     .with_max_task_attempts(2);
/// assert_eq!(ctx.exec_type(), ExecType::DistributedBatch);
/// assert_eq!(ctx.max_task_attempts(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    exec_type: ExecType,
    strategy_override: StrategyOverride,
    parallelism: ParallelismConfig,
    memory_budget: MemoryBudget,
    max_task_attempts: Option<usize>,
    num_partitions: Option<usize>,
    fault_plan: Option<Arc<FaultPlan>>,
}

impl ExecutionContext {
    /// Create a context for the given backend with default settings
    pub fn new(exec_type: ExecType) -> Self {
        Self {
            exec_type,
            ..Self::default()
        }
    }

    /// Force or release the distribution strategy
    pub fn with_strategy_override(mut self, strategy_override: StrategyOverride) -> Self {
        self.strategy_override = strategy_override;
        self
    }

    /// Set the in-process thread configuration
    pub fn with_parallelism(mut self, parallelism: ParallelismConfig) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set the memory limits used by the strategy selector
    pub fn with_memory_budget(mut self, memory_budget: MemoryBudget) -> Self {
        self.memory_budget = memory_budget;
        self
    }

    /// Set how many times a distributed task may be attempted (at least 1)
    pub fn with_max_task_attempts(mut self, attempts: usize) -> Self {
        self.max_task_attempts = Some(attempts.max(1));
        self
    }

    /// Set the number of partitions used by the dataflow backend
    pub fn with_num_partitions(mut self, partitions: usize) -> Self {
        self.num_partitions = Some(partitions.max(1));
        self
    }

    /// Inject deterministic task failures (diagnostics and tests)
    pub fn with_fault_plan(mut self, plan: FaultPlan) -> Self {
        self.fault_plan = Some(Arc::new(plan));
        self
    }

    /// The backend this job runs on
    #[inline]
    pub fn exec_type(&self) -> ExecType {
        self.exec_type
    }

    /// The strategy override
    #[inline]
    pub fn strategy_override(&self) -> StrategyOverride {
        self.strategy_override
    }

    /// The thread configuration
    #[inline]
    pub fn parallelism(&self) -> ParallelismConfig {
        self.parallelism
    }

    /// The memory limits
    #[inline]
    pub fn memory_budget(&self) -> &MemoryBudget {
        &self.memory_budget
    }

    /// Attempts allowed per distributed task
    #[inline]
    pub fn max_task_attempts(&self) -> usize {
        self.max_task_attempts.unwrap_or(DEFAULT_MAX_TASK_ATTEMPTS)
    }

    /// Requested dataflow partition count, if any
    #[inline]
    pub fn num_partitions(&self) -> Option<usize> {
        self.num_partitions
    }

    /// The injected fault plan, if any
    pub fn fault_plan(&self) -> Option<&Arc<FaultPlan>> {
        self.fault_plan.as_ref()
    }
}
