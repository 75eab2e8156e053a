//! Idempotent output commit keyed by block index

use std::collections::BTreeMap;

use tracing::trace;

use crate::block::MatrixBlock;
use crate::error::{Error, Result};
use crate::matrix::{BlockIndex, BlockLayout, BlockedMatrix};

/// Collects task outputs; the first commit for a block wins
#[derive(Debug)]
pub(crate) struct OutputCommitter {
    layout: BlockLayout,
    committed: BTreeMap<BlockIndex, MatrixBlock>,
    duplicates: usize,
}

impl OutputCommitter {
    pub(crate) fn new(layout: BlockLayout) -> Self {
        Self {
            layout,
            committed: BTreeMap::new(),
            duplicates: 0,
        }
    }

    /// Commit `block` for `index`; returns false if it was already committed
    pub(crate) fn commit(&mut self, index: BlockIndex, block: MatrixBlock) -> bool {
        if self.committed.contains_key(&index) {
            trace!(block = %index, "discarding duplicate commit");
            self.duplicates += 1;
            return false;
        }
        self.committed.insert(index, block);
        true
    }

    /// Number of distinct blocks committed
    pub(crate) fn len(&self) -> usize {
        self.committed.len()
    }

    /// Number of discarded duplicate commits
    pub(crate) fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Assemble the committed blocks with the committer's layout
    pub(crate) fn finish(self) -> Result<BlockedMatrix> {
        if let Some(missing) = self.layout.indices().find(|i| !self.committed.contains_key(i)) {
            return Err(Error::Backend(format!("no output committed for block {}", missing)));
        }
        // BTreeMap order is row-major block order
        BlockedMatrix::from_blocks(self.layout, self.committed.into_values().collect())
    }
}
