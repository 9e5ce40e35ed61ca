//! Union lowering: partitions of all inputs, concatenated in input order.

use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::{Error, Result};

use crate::lower::{LowerNode, Lowered, LoweringContext};
use crate::partition::PartitionInfo;

#[derive(Debug, Clone, Copy, Default)]
pub struct UnionLowering;

impl LowerNode for UnionLowering {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        if children.is_empty() {
            return Err(Error::Invariant("union needs at least one input".into()));
        }
        let total: usize = ctx.child_counts().into_iter().sum();
        Ok(Lowered::new(
            node.with_children(children)?,
            PartitionInfo::new(total)?,
        ))
    }
}
