//! Operators that are only correct over the whole input at once.
//!
//! A group-by, sort, slice or distinct evaluated per partition would give
//! per-partition answers, so these nodes accept single-partition inputs only.

use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::{Error, Result};

use crate::lower::{LowerNode, Lowered, LoweringContext};
use crate::partition::PartitionInfo;

#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePartition;

impl LowerNode for SinglePartition {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        let counts = ctx.child_counts();
        if let Some(n) = counts.iter().copied().find(|&n| n > 1) {
            return Err(Error::unsupported(
                node.kind().name(),
                format!("operator requires a single input partition, input has {n}"),
            ));
        }
        Ok(Lowered::new(
            node.with_children(children)?,
            PartitionInfo::single(),
        ))
    }
}
