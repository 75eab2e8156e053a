//! Keyed record streams and the reduce-side join

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::block::{BlockStorage, MatrixBlock};
use crate::error::{Error, Result};
use crate::matrix::BlockIndex;

/// Records emitted by a map stage, keyed for the shuffle
#[derive(Debug)]
pub(crate) struct KeyedStream<K, V> {
    records: Vec<(K, V)>,
}

impl<K: Ord, V> KeyedStream<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub(crate) fn emit(&mut self, key: K, value: V) {
        self.records.push((key, value));
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Group records by key, keys ascending, values in emit order
    pub(crate) fn shuffle(self) -> BTreeMap<K, Vec<V>> {
        let mut groups: BTreeMap<K, Vec<V>> = BTreeMap::new();
        for (key, value) in self.records {
            groups.entry(key).or_default().push(value);
        }
        groups
    }
}

/// One tagged input of the weighted sigmoid join
#[derive(Debug, Clone)]
pub(crate) enum JoinInput {
    Weight(Arc<MatrixBlock>),
    Multiplier(Arc<MatrixBlock>),
    Left(Arc<MatrixBlock>),
    Right(Arc<MatrixBlock>),
}

/// Everything one reduce task needs for one weight block
#[derive(Debug, Clone)]
pub(crate) struct JoinedBlock {
    pub(crate) weights: Arc<MatrixBlock>,
    pub(crate) multiplier: Option<Arc<MatrixBlock>>,
    pub(crate) u: Arc<MatrixBlock>,
    pub(crate) v: Arc<MatrixBlock>,
}

impl JoinedBlock {
    /// Match the tagged inputs that arrived under `index`
    pub(crate) fn from_inputs(index: BlockIndex, inputs: Vec<JoinInput>) -> Result<Self> {
        let mut weights = None;
        let mut multiplier = None;
        let mut u = None;
        let mut v = None;
        for input in inputs {
            let (slot, block, side) = match input {
                JoinInput::Weight(b) => (&mut weights, b, "W"),
                JoinInput::Multiplier(b) => (&mut multiplier, b, "X"),
                JoinInput::Left(b) => (&mut u, b, "U"),
                JoinInput::Right(b) => (&mut v, b, "V"),
            };
            if slot.replace(block).is_some() {
                return Err(Error::Backend(format!(
                    "join key {} received {} twice",
                    index, side
                )));
            }
        }
        let missing = |side: &str| Error::Backend(format!("join key {} has no {} input", index, side));
        Ok(Self {
            weights: weights.ok_or_else(|| missing("W"))?,
            multiplier,
            u: u.ok_or_else(|| missing("U"))?,
            v: v.ok_or_else(|| missing("V"))?,
        })
    }

    /// Factor bytes shipped to this reduce task
    pub(crate) fn factor_bytes(&self) -> usize {
        self.u.memory_usage() + self.v.memory_usage()
    }
}
