//! Select / HStack lowering.
//!
//! Both nodes evaluate a list of expressions over one input. When every
//! expression is partition-wise (or the input is a single partition) the
//! node runs independently on each input partition.

use tracing::debug;

use shardplan_core::dag::{LogicalPlan, Strategy};
use shardplan_core::error::{Error, Result};
use shardplan_core::expr::NamedExpr;

use crate::classify::check_partition_wise;
use crate::lower::{LowerNode, Lowered, LoweringContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct SelectLowering;

fn output_exprs(node: &LogicalPlan) -> Option<&[NamedExpr]> {
    match node {
        LogicalPlan::Select { exprs, .. } => Some(exprs.as_slice()),
        LogicalPlan::HStack { columns, .. } => Some(columns.as_slice()),
        _ => None,
    }
}

impl LowerNode for SelectLowering {
    fn lower(
        &self,
        node: &LogicalPlan,
        children: Vec<LogicalPlan>,
        ctx: &LoweringContext<'_>,
    ) -> Result<Lowered> {
        let exprs = output_exprs(node).ok_or_else(|| {
            Error::coverage(node.kind().name(), "select handler needs a Select or HStack")
        })?;
        if children.len() != 1 {
            return Err(Error::Invariant(format!(
                "{} expects 1 input, got {}",
                node.kind(),
                children.len()
            )));
        }
        let child_parts = ctx.child(0)?;

        // Rejected, never collapsed to a single partition.
        check_partition_wise(node.kind().name(), exprs, child_parts.count())?;

        debug!(
            node = %node.kind(),
            exprs = exprs.len(),
            partitions = child_parts.count(),
            "partition-wise select"
        );
        let lowered = node
            .with_children(children)?
            .with_strategy(Strategy::PartitionWise);
        Ok(Lowered::new(lowered, child_parts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lower::lower_plan;
    use shardplan_core::config::EngineConfig;
    use shardplan_core::expr::Expr;
    use shardplan_core::schema::{DataType, Field, Schema};

    fn scan(rows: u64) -> LogicalPlan {
        LogicalPlan::scan(
            "t",
            Schema::new(vec![
                Field::new("k", DataType::Int64, false),
                Field::new("v", DataType::Float64, true),
            ]),
            Some(rows),
        )
    }

    #[test]
    fn hstack_of_elementwise_columns_keeps_partitioning() {
        let plan = LogicalPlan::with_columns(
            scan(30),
            vec![NamedExpr::new(
                "v2",
                Expr::cast(Expr::col("v"), DataType::Int64),
            )],
        );
        let cfg = EngineConfig::default().with_max_rows_per_partition(10);
        let lowered = lower_plan(&plan, &cfg).unwrap();
        assert_eq!(lowered.output_partitions().unwrap().count(), 3);
        assert_eq!(lowered.plan.strategy(), Strategy::PartitionWise);
    }

    #[test]
    fn aggregate_nested_in_arithmetic_is_found() {
        let nested = Expr::binary(
            shardplan_core::expr::BinaryOp::Add,
            Expr::col("v"),
            Expr::agg("sum", Expr::col("v")),
        );
        let plan = LogicalPlan::select(scan(30), vec![NamedExpr::new("x", nested)]);
        let cfg = EngineConfig::default().with_max_rows_per_partition(10);
        let err = lower_plan(&plan, &cfg).unwrap_err();
        assert!(err.is_unsupported(), "{err}");
    }
}
