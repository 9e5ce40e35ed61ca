//! Partition Info Model: how many output partitions each lowered node has.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::{Error, Result};
use shardplan_core::id::{NodeKey, TaskKey};

/// Output partition count of one node. Always at least 1; a count of 1 means
/// the node is evaluated as one indivisible unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct PartitionInfo {
    count: usize,
}

impl PartitionInfo {
    pub fn new(count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::Invariant("partition count must be >= 1".into()));
        }
        Ok(Self { count })
    }

    pub const fn single() -> Self {
        Self { count: 1 }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_single(&self) -> bool {
        self.count == 1
    }

    /// Root-result keys `(node, 0..count)`.
    pub fn keys<'a>(&self, node: &'a NodeKey) -> impl Iterator<Item = TaskKey> + 'a {
        (0..self.count).map(move |i| TaskKey::partition(node, i))
    }
}

impl TryFrom<usize> for PartitionInfo {
    type Error = Error;

    fn try_from(count: usize) -> Result<Self> {
        PartitionInfo::new(count)
    }
}

impl From<PartitionInfo> for usize {
    fn from(p: PartitionInfo) -> usize {
        p.count
    }
}

/// Node → partition count, filled once per node during lowering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionMap {
    counts: BTreeMap<NodeKey, PartitionInfo>,
}

impl PartitionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `info` for `key`. Re-recording the same count is allowed
    /// (structurally equal subtrees share a key); a different one is not.
    pub fn insert(&mut self, key: NodeKey, info: PartitionInfo) -> Result<()> {
        match self.counts.get(&key) {
            Some(existing) if *existing != info => Err(Error::Invariant(format!(
                "{key} already has {} partitions, refusing {}",
                existing.count(),
                info.count()
            ))),
            Some(_) => Ok(()),
            None => {
                self.counts.insert(key, info);
                Ok(())
            }
        }
    }

    /// Look up a node by key. A miss means some node kind escaped lowering.
    pub fn get(&self, key: &NodeKey) -> Result<PartitionInfo> {
        self.counts.get(key).copied().ok_or_else(|| {
            Error::coverage(key.as_str(), "no partition info recorded for this node")
        })
    }

    /// Look up a node by value. Keys the whole subtree, so walks that
    /// already hold the node's key should call [`PartitionMap::get`].
    pub fn partition_count(&self, node: &LogicalPlan) -> Result<PartitionInfo> {
        self.get(&NodeKey::of(node)?)
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.counts.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, &PartitionInfo)> {
        self.counts.iter()
    }
}
