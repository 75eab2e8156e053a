//! Distribution strategy selection
//!
//! Decides, once per job, how factor matrices reach the weight blocks:
//!
//! - [`DistributionStrategy::Replicate`]: every block task sees the complete
//!   `U` and `V`. No join is needed, at the cost of shipping the factors to
//!   every task.
//! - [`DistributionStrategy::PartitionJoin`]: every block task receives only
//!   the row slice of `U` and the row slice of `V` aligned with its block
//!   coordinates, matched by a join on block index.
//!
//! The heuristic replicates when the factors fit the broadcast budget; an
//! explicit [`StrategyOverride`] always wins, which lets small inputs exercise
//! the partition-join path.

use std::fmt;

use tracing::debug;

use crate::block::estimate_dense_bytes;
use crate::error::{Error, Result};
use crate::matrix::BlockLayout;

use super::context::MemoryBudget;

/// How factor matrices are distributed to weight blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionStrategy {
    /// Full factors broadcast to every block task
    Replicate,
    /// Aligned factor slices joined to blocks by block coordinates
    PartitionJoin,
}

impl DistributionStrategy {
    /// Strategy name
    pub fn name(&self) -> &'static str {
        match self {
            DistributionStrategy::Replicate => "replicate",
            DistributionStrategy::PartitionJoin => "partition-join",
        }
    }
}

impl fmt::Display for DistributionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Caller control over strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyOverride {
    /// Let the size heuristic decide
    #[default]
    None,
    /// Always replicate
    ForceReplicate,
    /// Always partition-join; fails if the layouts do not align
    ForcePartitionJoin,
}

/// The selected strategy and the estimates behind it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyDecision {
    /// Selected strategy
    pub strategy: DistributionStrategy,
    /// Dense size of `U` plus `V`
    pub factor_bytes: usize,
    /// `factor_bytes` times the number of weight blocks
    pub broadcast_volume: usize,
    /// Whether factor slices align with the weight blocks
    pub aligned: bool,
    /// Whether an override made the choice
    pub forced: bool,
}

/// Check that `U` and `V` can be sliced along `W`'s block boundaries
///
/// Requires `U`'s block rows to match `W`'s block rows, `V`'s block rows to
/// match `W`'s block columns, and each factor to fit in one column block.
pub fn check_alignment(w: &BlockLayout, u: &BlockLayout, v: &BlockLayout) -> Result<()> {
    if u.block_rows() != w.block_rows() {
        return Err(Error::strategy_configuration(format!(
            "U block rows {} do not match W block rows {}",
            u.block_rows(),
            w.block_rows()
        )));
    }
    if v.block_rows() != w.block_cols() {
        return Err(Error::strategy_configuration(format!(
            "V block rows {} do not match W block columns {}",
            v.block_rows(),
            w.block_cols()
        )));
    }
    for (name, factor) in [("U", u), ("V", v)] {
        if factor.num_col_blocks() > 1 {
            return Err(Error::strategy_configuration(format!(
                "{} rank {} spans {} column blocks of width {}",
                name,
                factor.cols(),
                factor.num_col_blocks(),
                factor.block_cols()
            )));
        }
    }
    Ok(())
}

/// Choose the distribution strategy for one job
///
/// # Errors
///
/// Returns `StrategyConfiguration` when partition-join is forced on layouts
/// that do not align, or when the factors neither fit the broadcast budget
/// nor align for a join.
pub fn select_strategy(
    w: &BlockLayout,
    u: &BlockLayout,
    v: &BlockLayout,
    strategy_override: StrategyOverride,
    budget: &MemoryBudget,
) -> Result<StrategyDecision> {
    let factor_bytes =
        estimate_dense_bytes(u.rows(), u.cols()).saturating_add(estimate_dense_bytes(v.rows(), v.cols()));
    let broadcast_volume = factor_bytes.saturating_mul(w.num_blocks());
    let alignment = check_alignment(w, u, v);
    let aligned = alignment.is_ok();

    let fits_broadcast =
        factor_bytes <= budget.broadcast_budget() && broadcast_volume <= budget.max_broadcast_volume;

    let (strategy, forced) = match strategy_override {
        StrategyOverride::ForceReplicate => (DistributionStrategy::Replicate, true),
        StrategyOverride::ForcePartitionJoin => {
            alignment?;
            (DistributionStrategy::PartitionJoin, true)
        }
        StrategyOverride::None if fits_broadcast => (DistributionStrategy::Replicate, false),
        StrategyOverride::None => match alignment {
            Ok(()) => (DistributionStrategy::PartitionJoin, false),
            Err(err) => {
                return Err(Error::strategy_configuration(format!(
                    "factors of {} bytes exceed the broadcast budget of {} bytes and cannot be joined: {}",
                    factor_bytes,
                    budget.broadcast_budget(),
                    err
                )));
            }
        },
    };

    debug!(
        %strategy,
        forced,
        aligned,
        factor_bytes,
        broadcast_volume,
        weight_blocks = w.num_blocks(),
        "selected distribution strategy"
    );

    Ok(StrategyDecision {
        strategy,
        factor_bytes,
        broadcast_volume,
        aligned,
        forced,
    })
}
