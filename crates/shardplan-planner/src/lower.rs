//! Node Lowering Dispatch: single-partition plan → partition-aware plan.
//!
//! Lowering is bottom-up. Every child is lowered first and its
//! `PartitionInfo` recorded; the node's handler then sees lowered children
//! and their counts, and returns the rewritten node plus its own count.
//! Node kinds without a handler fall back to [`PassThrough`].
//!
//! Each node is keyed once, from its own parameters and the keys its
//! children returned, so the walk never re-hashes a subtree.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use shardplan_core::config::EngineConfig;
use shardplan_core::dag::{LogicalPlan, NodeKind};
use shardplan_core::error::{Error, Result};
use shardplan_core::id::NodeKey;

use crate::join::JoinLowering;
use crate::partition::{PartitionInfo, PartitionMap};
use crate::scan::ScanLowering;
use crate::select::SelectLowering;
use crate::single::SinglePartition;
use crate::union::UnionLowering;

/// Result of lowering one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Lowered {
    pub node: LogicalPlan,
    pub partitions: PartitionInfo,
}

impl Lowered {
    pub fn new(node: LogicalPlan, partitions: PartitionInfo) -> Self {
        Self { node, partitions }
    }
}

/// Read-only view handed to handlers: the config and the counts of the
/// current node's lowered children.
pub struct LoweringContext<'a> {
    pub config: &'a EngineConfig,
    children: &'a [PartitionInfo],
}

impl<'a> LoweringContext<'a> {
    pub fn new(config: &'a EngineConfig, children: &'a [PartitionInfo]) -> Self {
        Self { config, children }
    }

    /// Partitions of the child at `index`.
    pub fn child(&self, index: usize) -> Result<PartitionInfo> {
        self.children.get(index).copied().ok_or_else(|| {
            Error::Invariant(format!(
                "no input {index}; node has {} inputs",
                self.children.len()
            ))
        })
    }

    /// Counts of every child, in order.
    pub fn child_counts(&self) -> Vec<usize> {
        self.children.iter().map(|p| p.count()).collect()
    }
}

/// A lowering rule for one node kind.
///
/// `children` are the node's inputs, already lowered, in positional order.
/// The returned node must keep them as its inputs; its key is derived from
/// theirs.
pub trait LowerNode: Send + Sync {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered>;
}

/// Default policy: a unary node inherits its child's partition count.
///
/// Any other arity has no sensible default and is a coverage gap.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl LowerNode for PassThrough {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        if children.len() != 1 {
            return Err(Error::coverage(
                node.kind().name(),
                format!(
                    "no lowering handler registered and {} inputs (default needs exactly 1)",
                    children.len()
                ),
            ));
        }
        let count = ctx.child(0)?;
        Ok(Lowered::new(node.with_children(children)?, count))
    }
}

/// Open registry of lowering handlers keyed by node kind.
#[derive(Clone)]
pub struct LoweringRegistry {
    handlers: HashMap<NodeKind, Arc<dyn LowerNode>>,
    fallback: Arc<dyn LowerNode>,
}

impl Default for LoweringRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl LoweringRegistry {
    /// Registry with no handlers: everything goes through [`PassThrough`].
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(PassThrough),
        }
    }

    /// Registry with the built-in handlers.
    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register(NodeKind::Scan, ScanLowering);
        reg.register(NodeKind::Select, SelectLowering);
        reg.register(NodeKind::HStack, SelectLowering);
        reg.register(NodeKind::Join, JoinLowering);
        reg.register(NodeKind::Union, UnionLowering);
        for kind in [
            NodeKind::GroupBy,
            NodeKind::Sort,
            NodeKind::Slice,
            NodeKind::Distinct,
        ] {
            reg.register(kind, SinglePartition);
        }
        reg
    }

    /// Install `handler` for `kind`, returning the handler it replaces.
    pub fn register(
        &mut self,
        kind: NodeKind,
        handler: impl LowerNode + 'static,
    ) -> Option<Arc<dyn LowerNode>> {
        self.handlers.insert(kind, Arc::new(handler))
    }

    pub fn is_registered(&self, kind: &NodeKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Lower a whole plan tree.
    pub fn lower(&self, plan: &LogicalPlan, config: &EngineConfig) -> Result<LoweredPlan> {
        config.validate()?;
        let mut partitions = PartitionMap::new();
        let (lowered, root) = self.lower_node(plan, config, &mut partitions)?;
        let output = partitions.get(&root)?;
        debug!(
            root = %root,
            nodes = partitions.len(),
            output_partitions = output.count(),
            "lowered plan"
        );
        Ok(LoweredPlan {
            plan: lowered,
            partitions,
            root,
        })
    }

    fn lower_node(
        &self,
        node: &LogicalPlan,
        config: &EngineConfig,
        partitions: &mut PartitionMap,
    ) -> Result<(LogicalPlan, NodeKey)> {
        let arity = node.arity();
        let mut children = Vec::with_capacity(arity);
        let mut keys = Vec::with_capacity(arity);
        let mut counts = Vec::with_capacity(arity);
        for child in node.children() {
            let (lowered, key) = self.lower_node(child, config, partitions)?;
            counts.push(partitions.get(&key)?);
            children.push(lowered);
            keys.push(key);
        }

        let kind = node.kind();
        let handler = self.handlers.get(&kind).unwrap_or(&self.fallback);
        let ctx = LoweringContext::new(config, &counts);
        let Lowered {
            node: lowered,
            partitions: info,
        } = handler.lower(node, children, &ctx)?;

        let key = NodeKey::derive(&lowered, &keys)?;
        trace!(node = %key, partitions = info.count(), strategy = ?lowered.strategy(), "lowered node");
        partitions.insert(key.clone(), info)?;
        Ok((lowered, key))
    }
}

/// A lowered plan together with the partition count of every node in it.
#[derive(Debug, Clone)]
pub struct LoweredPlan {
    pub plan: LogicalPlan,
    pub partitions: PartitionMap,
    root: NodeKey,
}

impl LoweredPlan {
    pub fn root_key(&self) -> &NodeKey {
        &self.root
    }

    /// Number of result partitions the executor should expect.
    pub fn output_partitions(&self) -> Result<PartitionInfo> {
        self.partitions.get(&self.root)
    }
}

/// Lower `plan` with the built-in handlers.
pub fn lower_plan(plan: &LogicalPlan, config: &EngineConfig) -> Result<LoweredPlan> {
    LoweringRegistry::with_defaults().lower(plan, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardplan_core::expr::{Expr, NamedExpr};
    use shardplan_core::schema::{DataType, Field, Schema};

    fn scan(rows: u64) -> LogicalPlan {
        LogicalPlan::scan(
            format!("t{rows}"),
            Schema::new(vec![Field::new("k", DataType::Int64, false)]),
            Some(rows),
        )
    }

    fn config() -> EngineConfig {
        EngineConfig::default().with_max_rows_per_partition(10)
    }

    #[test]
    fn unary_nodes_without_a_handler_inherit_the_child_count() {
        let plan = LogicalPlan::filter(scan(35), Expr::col("k"));
        let lowered = lower_plan(&plan, &config()).unwrap();
        assert_eq!(lowered.output_partitions().unwrap().count(), 4);
    }

    #[test]
    fn extension_with_two_inputs_is_a_coverage_gap() {
        let plan = LogicalPlan::extension(
            "zip",
            vec![scan(5), scan(6)],
            Default::default(),
            Schema::default(),
        );
        let err = lower_plan(&plan, &config()).unwrap_err();
        assert!(matches!(err, Error::DispatchCoverage { .. }), "{err}");
    }

    struct Collapse;

    impl LowerNode for Collapse {
        fn lower(
            &self,
            node: &LogicalPlan,
            children: Vec<LogicalPlan>,
            _ctx: &LoweringContext<'_>,
        ) -> Result<Lowered> {
            Ok(Lowered::new(
                node.with_children(children)?,
                PartitionInfo::single(),
            ))
        }
    }

    #[test]
    fn registered_handler_overrides_the_default() {
        let plan = LogicalPlan::extension(
            "gather",
            vec![scan(35)],
            Default::default(),
            Schema::default(),
        );
        let mut reg = LoweringRegistry::with_defaults();
        let before = reg.lower(&plan, &config()).unwrap();
        assert_eq!(before.output_partitions().unwrap().count(), 4);
        let kind = NodeKind::Extension("gather".into());
        assert!(reg.register(kind.clone(), Collapse).is_none());
        assert!(reg.is_registered(&kind));
        assert!(reg
            .lower(&plan, &config())
            .unwrap()
            .output_partitions()
            .unwrap()
            .is_single());
    }

    #[test]
    fn every_node_gets_a_count() {
        let plan = LogicalPlan::select(
            LogicalPlan::filter(scan(20), Expr::col("k")),
            vec![NamedExpr::new("k", Expr::col("k"))],
        );
        let lowered = lower_plan(&plan, &config()).unwrap();
        assert_eq!(lowered.partitions.len(), plan.node_count());
        assert_eq!(
            lowered.plan.strategy(),
            shardplan_core::dag::Strategy::PartitionWise
        );
    }

    #[test]
    fn recorded_keys_match_whole_tree_keys() {
        let plan = LogicalPlan::union(vec![
            LogicalPlan::filter(scan(20), Expr::col("k")),
            scan(35),
        ])
        .unwrap();
        let lowered = lower_plan(&plan, &config()).unwrap();
        assert_eq!(lowered.root_key(), &NodeKey::of(&lowered.plan).unwrap());
        let mut stack = vec![&lowered.plan];
        while let Some(node) = stack.pop() {
            assert!(lowered.partitions.contains(&NodeKey::of(node).unwrap()));
            stack.extend(node.children());
        }
        assert_eq!(lowered.partitions.len(), 4);
    }

    #[test]
    fn invalid_config_is_rejected_before_lowering() {
        let bad = EngineConfig::default().with_max_rows_per_partition(0);
        assert!(matches!(lower_plan(&scan(1), &bad), Err(Error::Config(_))));
    }
}
