//! Task attempts, retries and fault injection for the distributed backends
//!
//! Both distributed backends run units of work ("tasks") through a
//! [`TaskRunner`]. A task that fails with a retryable error is attempted
//! again up to the configured limit; because the evaluator is pure, a retried
//! or duplicated attempt produces exactly the same output as the first.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::matrix::BlockIndex;

/// Task name of the batch map task for weight block `index`
pub fn map_task_name(index: BlockIndex) -> String {
    format!("map{}", index)
}

/// Task name of the batch reduce task joined on weight block `index`
pub fn reduce_task_name(index: BlockIndex) -> String {
    format!("reduce{}", index)
}

/// Task name of the batch aggregation task for input block `index`
pub fn aggregate_task_name(index: BlockIndex) -> String {
    format!("agg{}", index)
}

/// Task name of partition `partition` in dataflow stage `stage`
pub fn partition_task_name(stage: &str, partition: usize) -> String {
    format!("{}[{}]", stage, partition)
}

/// Deterministic plan of injected task failures
///
/// ```
/// use blockwise::matrix::BlockIndex;
/// use blockwise::runtime::{FaultPlan, map_task_name};
///
/// let plan = FaultPlan::new()
///     .fail_attempts(map_task_name(BlockIndex::new(0, 1)), 2)
///     .speculate(map_task_name(BlockIndex::new(1, 1)));
/// assert!(plan.should_fail("map(0,1)", 2));
/// assert!(!plan.should_fail("map(0,1)", 3));
/// assert!(plan.is_speculative("map(1,1)"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    failures: HashMap<String, usize>,
    speculative: HashSet<String>,
}

impl FaultPlan {
    /// An empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the first `attempts` attempts of `task` fail
    pub fn fail_attempts(mut self, task: impl Into<String>, attempts: usize) -> Self {
        self.failures.insert(task.into(), attempts);
        self
    }

    /// Launch a duplicate attempt of `task` after it succeeds
    pub fn speculate(mut self, task: impl Into<String>) -> Self {
        self.speculative.insert(task.into());
        self
    }

    /// Whether attempt number `attempt` (1-based) of `task` is set to fail
    pub fn should_fail(&self, task: &str, attempt: usize) -> bool {
        self.failures.get(task).is_some_and(|&n| attempt <= n)
    }

    /// Whether `task` gets a speculative duplicate
    pub fn is_speculative(&self, task: &str) -> bool {
        self.speculative.contains(task)
    }
}

/// Runs tasks with retries and counts attempts
#[derive(Debug)]
pub(crate) struct TaskRunner<'a> {
    backend: &'static str,
    max_attempts: usize,
    fault_plan: Option<&'a FaultPlan>,
    attempts: AtomicUsize,
}

impl<'a> TaskRunner<'a> {
    pub(crate) fn new(
        backend: &'static str,
        max_attempts: usize,
        fault_plan: Option<&'a FaultPlan>,
    ) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
            fault_plan,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Total attempts made so far, including failed and duplicate ones
    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Run `task` until an attempt succeeds
    ///
    /// Returns the output of every successful attempt: one normally, two when
    /// the task is speculatively duplicated. Non-retryable errors are returned
    /// immediately; exhausting the attempts yields `BackendExecution`.
    pub(crate) fn run<T, F>(&self, task: &str, f: F) -> Result<Vec<T>>
    where
        F: Fn() -> Result<T>,
    {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            trace!(backend = self.backend, task, attempt, "task attempt");

            let outcome = if self.fault_plan.is_some_and(|p| p.should_fail(task, attempt)) {
                Err(Error::TaskFailed {
                    task: task.to_string(),
                    attempt,
                })
            } else {
                f()
            };

            match outcome {
                Ok(output) => {
                    let mut outputs = vec![output];
                    if self.fault_plan.is_some_and(|p| p.is_speculative(task)) {
                        self.attempts.fetch_add(1, Ordering::Relaxed);
                        outputs.push(f()?);
                    }
                    return Ok(outputs);
                }
                Err(err) if err.is_retryable() => {
                    warn!(backend = self.backend, task, attempt, error = %err, "task attempt failed");
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(Error::BackendExecution {
            backend: self.backend,
            task: task.to_string(),
            attempts: self.max_attempts,
            reason: last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string()),
        })
    }

    /// Run `task` and keep the first successful output
    pub(crate) fn run_once<T, F>(&self, task: &str, f: F) -> Result<T>
    where
        F: Fn() -> Result<T>,
    {
        let mut outputs = self.run(task, f)?;
        // run() never returns an empty Ok
        Ok(outputs.swap_remove(0))
    }
}
