//! Join lowering: pick a broadcast side from the children's partition counts.
//!
//! Only broadcast joins are produced. The driving side keeps its
//! partitioning and the other side is replicated to each driving partition:
//!
//! | kind         | counts             | strategy        | output count |
//! |--------------|--------------------|-----------------|--------------|
//! | any          | 1 / 1              | `Plain`         | 1            |
//! | inner, left  | left >= right      | `RightBroadcast`| left         |
//! | inner, left  | left < right       | `LeftBroadcast` | right        |
//! | right        | any other          | `LeftBroadcast` | right        |
//!
//! Right joins always broadcast the left side: the right side must drive so
//! that every right row is emitted exactly once.

use tracing::debug;

use shardplan_core::dag::{JoinType, LogicalPlan, Strategy};
use shardplan_core::error::{Error, Result};

use crate::lower::{LowerNode, Lowered, LoweringContext};
use crate::partition::PartitionInfo;

pub fn supports_broadcast(join_type: JoinType) -> bool {
    matches!(join_type, JoinType::Inner | JoinType::Left | JoinType::Right)
}

/// Strategy for a supported join kind given the input partition counts.
pub fn choose_strategy(join_type: JoinType, left: usize, right: usize) -> Strategy {
    if !supports_broadcast(join_type) || (left == 1 && right == 1) {
        Strategy::Plain
    } else if left >= right && matches!(join_type, JoinType::Inner | JoinType::Left) {
        Strategy::RightBroadcast
    } else {
        Strategy::LeftBroadcast
    }
}

/// Output partition count implied by `strategy`.
pub fn output_count(strategy: Strategy, left: usize, right: usize) -> usize {
    match strategy {
        Strategy::RightBroadcast => left,
        Strategy::LeftBroadcast => right,
        Strategy::Plain | Strategy::PartitionWise => 1,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JoinLowering;

impl LowerNode for JoinLowering {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        let LogicalPlan::Join { join_type, .. } = node else {
            return Err(Error::coverage(
                node.kind().name(),
                "join handler received a non-join node",
            ));
        };
        if children.len() != 2 {
            return Err(Error::Invariant(format!(
                "join expects 2 inputs, got {}",
                children.len()
            )));
        }
        let l = ctx.child(0)?.count();
        let r = ctx.child(1)?.count();

        if !supports_broadcast(*join_type) && (l > 1 || r > 1) {
            return Err(Error::unsupported(
                "join",
                format!(
                    "{} join over {l} x {r} partitions has no broadcast lowering",
                    join_type.as_str()
                ),
            ));
        }

        let strategy = choose_strategy(*join_type, l, r);
        let count = output_count(strategy, l, r);
        debug!(
            join_type = join_type.as_str(),
            left_partitions = l,
            right_partitions = r,
            strategy = ?strategy,
            partitions = count,
            "join lowering"
        );
        let lowered = node.with_children(children)?.with_strategy(strategy);
        Ok(Lowered::new(lowered, PartitionInfo::new(count)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_broadcast_right_for_inner_and_left() {
        assert_eq!(choose_strategy(JoinType::Inner, 3, 3), Strategy::RightBroadcast);
        assert_eq!(choose_strategy(JoinType::Left, 3, 3), Strategy::RightBroadcast);
        assert_eq!(choose_strategy(JoinType::Right, 3, 3), Strategy::LeftBroadcast);
    }

    #[test]
    fn single_partition_on_both_sides_stays_plain() {
        for jt in [JoinType::Inner, JoinType::Left, JoinType::Right] {
            assert_eq!(choose_strategy(jt, 1, 1), Strategy::Plain);
        }
        assert_eq!(output_count(Strategy::Plain, 1, 1), 1);
    }

    #[test]
    fn unsupported_kinds_stay_plain() {
        assert_eq!(choose_strategy(JoinType::Full, 4, 2), Strategy::Plain);
        assert_eq!(choose_strategy(JoinType::Semi, 1, 1), Strategy::Plain);
    }
}
