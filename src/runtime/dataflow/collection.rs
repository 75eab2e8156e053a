//! Partitioned in-memory collections keyed by block index

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::block::MatrixBlock;
use crate::matrix::{BlockIndex, BlockLayout, BlockedMatrix};

/// Assigns block indices to partitions by row-major block position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPartitioner {
    num_partitions: usize,
    num_col_blocks: usize,
}

impl BlockPartitioner {
    /// Partition the blocks of `layout` into `num_partitions` (at least 1)
    pub fn new(layout: &BlockLayout, num_partitions: usize) -> Self {
        Self {
            num_partitions: num_partitions.max(1),
            num_col_blocks: layout.num_col_blocks(),
        }
    }

    /// Number of partitions
    #[inline]
    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// Partition holding `index`
    #[inline]
    pub fn partition(&self, index: BlockIndex) -> usize {
        (index.row * self.num_col_blocks + index.col) % self.num_partitions
    }
}

/// Read-only value shipped once to every partition
#[derive(Debug)]
pub struct Broadcast<T> {
    value: Arc<T>,
}

impl<T> Broadcast<T> {
    /// Wrap a value for broadcasting
    pub fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
        }
    }

    /// The broadcast value
    #[inline]
    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
        }
    }
}

/// `(BlockIndex, T)` records spread over partitions by a [`BlockPartitioner`]
///
/// Keys are unique within a collection.
#[derive(Debug, Clone)]
pub struct PartitionedCollection<T> {
    partitioner: BlockPartitioner,
    partitions: Vec<Vec<(BlockIndex, T)>>,
}

impl<T> PartitionedCollection<T> {
    /// Place records into the partitions chosen by `partitioner`
    pub fn from_records<I>(records: I, partitioner: BlockPartitioner) -> Self
    where
        I: IntoIterator<Item = (BlockIndex, T)>,
    {
        let mut partitions: Vec<Vec<(BlockIndex, T)>> =
            (0..partitioner.num_partitions()).map(|_| Vec::new()).collect();
        for (index, value) in records {
            partitions[partitioner.partition(index)].push((index, value));
        }
        Self {
            partitioner,
            partitions,
        }
    }

    /// The partitioner records are placed by
    #[inline]
    pub fn partitioner(&self) -> BlockPartitioner {
        self.partitioner
    }

    /// Records of every partition
    #[inline]
    pub fn partitions(&self) -> &[Vec<(BlockIndex, T)>] {
        &self.partitions
    }

    /// Total number of records
    pub fn len(&self) -> usize {
        self.partitions.iter().map(Vec::len).sum()
    }

    /// Returns true if no partition holds a record
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transform values, keeping keys and placement
    pub fn map_values<U, F: FnMut(T) -> U>(self, mut f: F) -> PartitionedCollection<U> {
        PartitionedCollection {
            partitioner: self.partitioner,
            partitions: self
                .partitions
                .into_iter()
                .map(|p| p.into_iter().map(|(index, value)| (index, f(value))).collect())
                .collect(),
        }
    }

    /// Re-place records under `partitioner`, counting a shuffle if it moves data
    pub fn partition_by(self, partitioner: BlockPartitioner, shuffles: &mut usize) -> Self {
        if self.partitioner == partitioner {
            return self;
        }
        *shuffles += 1;
        trace!(
            from = self.partitioner.num_partitions(),
            to = partitioner.num_partitions(),
            "shuffling collection"
        );
        Self::from_records(self.partitions.into_iter().flatten(), partitioner)
    }

    /// Inner join on block index
    ///
    /// `other` is brought to this collection's partitioner first; when the
    /// partitioners already match the join is partition-local.
    pub fn join<U>(
        self,
        other: PartitionedCollection<U>,
        shuffles: &mut usize,
    ) -> PartitionedCollection<(T, U)> {
        self.join_with(other, shuffles, |left, right| right.map(|r| (left, r)))
    }

    /// Left outer join on block index
    pub fn left_join<U>(
        self,
        other: PartitionedCollection<U>,
        shuffles: &mut usize,
    ) -> PartitionedCollection<(T, Option<U>)> {
        self.join_with(other, shuffles, |left, right| Some((left, right)))
    }

    fn join_with<U, R, F>(
        self,
        other: PartitionedCollection<U>,
        shuffles: &mut usize,
        combine: F,
    ) -> PartitionedCollection<R>
    where
        F: Fn(T, Option<U>) -> Option<R>,
    {
        let other = other.partition_by(self.partitioner, shuffles);
        let partitions = self
            .partitions
            .into_iter()
            .zip(other.partitions)
            .map(|(left, right)| {
                let mut right: BTreeMap<BlockIndex, U> = right.into_iter().collect();
                left.into_iter()
                    .filter_map(|(index, value)| {
                        combine(value, right.remove(&index)).map(|joined| (index, joined))
                    })
                    .collect()
            })
            .collect();
        PartitionedCollection {
            partitioner: self.partitioner,
            partitions,
        }
    }
}

impl PartitionedCollection<Arc<MatrixBlock>> {
    /// Collection of a matrix's blocks
    pub fn from_matrix(matrix: &BlockedMatrix, partitioner: BlockPartitioner) -> Self {
        Self::from_records(
            matrix.blocks().map(|(index, block)| (index, Arc::clone(block))),
            partitioner,
        )
    }
}
