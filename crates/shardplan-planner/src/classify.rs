//! Expression Partition Classifier.
//!
//! An expression is partition-wise when every node in its tree can be
//! evaluated on one partition without seeing the others: element-wise
//! functions and row filters qualify, aggregations/sorts/windows do not.

use shardplan_core::error::{Error, Result};
use shardplan_core::expr::{Expr, ExprKind, NamedExpr};

/// Expression kinds that never need rows from other partitions.
pub const PARTITION_WISE: &[ExprKind] = &[
    ExprKind::Literal,
    ExprKind::LiteralColumn,
    ExprKind::Col,
    ExprKind::ColRef,
    ExprKind::BooleanFunction,
    ExprKind::StringFunction,
    ExprKind::TemporalFunction,
    ExprKind::Filter,
    ExprKind::Cast,
    ExprKind::Ternary,
    ExprKind::BinOp,
    ExprKind::UnaryFunction,
];

pub fn is_partition_wise_kind(kind: ExprKind) -> bool {
    PARTITION_WISE.contains(&kind)
}

/// First node (pre-order) whose kind is not partition-wise, if any.
pub fn first_non_partition_wise(expr: &Expr) -> Option<&Expr> {
    expr.preorder().find(|e| !is_partition_wise_kind(e.kind()))
}

pub fn is_partition_wise(expr: &Expr) -> bool {
    first_non_partition_wise(expr).is_none()
}

/// Check a node's output expressions against its child's partition count.
///
/// With a single input partition everything is allowed. Otherwise the first
/// offending expression is reported as `UnsupportedPartitioning`.
pub fn check_partition_wise(node: &str, exprs: &[NamedExpr], child_count: usize) -> Result<()> {
    if child_count <= 1 {
        return Ok(());
    }
    for ne in exprs {
        if let Some(bad) = first_non_partition_wise(&ne.value) {
            return Err(Error::unsupported(
                node,
                format!(
                    "expression '{}' uses {} which does not support {} partitions",
                    ne.name,
                    bad.kind(),
                    child_count
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shardplan_core::expr::BinaryOp;

    #[test]
    fn aggregation_nested_inside_binop_is_found() {
        let e = Expr::binary(
            BinaryOp::Add,
            Expr::col("a"),
            Expr::agg("sum", Expr::col("b")),
        );
        assert_eq!(first_non_partition_wise(&e).map(Expr::kind), Some(ExprKind::Agg));
        assert!(!is_partition_wise(&e));
    }

    #[test]
    fn elementwise_tree_is_partition_wise() {
        let e = Expr::Ternary {
            predicate: Box::new(Expr::BooleanFunction {
                name: "is_null".into(),
                args: vec![Expr::col("a")],
            }),
            then: Box::new(Expr::lit(0i64)),
            otherwise: Box::new(Expr::StringFunction {
                name: "len".into(),
                args: vec![Expr::col("s")],
            }),
        };
        assert!(is_partition_wise(&e));
    }

    #[test]
    fn single_partition_child_accepts_anything() {
        let exprs = vec![NamedExpr::new("n", Expr::Len)];
        assert!(check_partition_wise("select", &exprs, 1).is_ok());
        let err = check_partition_wise("select", &exprs, 2).unwrap_err();
        assert!(err.is_unsupported());
    }
}
