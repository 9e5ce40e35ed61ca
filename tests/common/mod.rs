//! Plan builders shared by the integration tests.

#![allow(dead_code)]

use shardplan::{DataType, EngineConfig, Expr, Field, JoinType, LogicalPlan, NamedExpr, Schema};

/// Rows per partition used throughout, so `rows / 10` (rounded up) is the
/// scan's partition count.
pub const ROWS_PER_PARTITION: u64 = 10;

pub fn config() -> EngineConfig {
    EngineConfig::default().with_max_rows_per_partition(ROWS_PER_PARTITION)
}

pub fn schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("amount", DataType::Float64, true),
        Field::new("label", DataType::Utf8, true),
    ])
}

/// Scan with exactly `partitions` partitions under [`config`].
pub fn scan(name: &str, partitions: u64) -> LogicalPlan {
    LogicalPlan::scan(name, schema(), Some(partitions * ROWS_PER_PARTITION))
}

pub fn select(input: LogicalPlan, exprs: Vec<(&str, Expr)>) -> LogicalPlan {
    LogicalPlan::select(
        input,
        exprs
            .into_iter()
            .map(|(name, e)| NamedExpr::new(name, e))
            .collect(),
    )
}

pub fn join(left: LogicalPlan, right: LogicalPlan, how: JoinType) -> LogicalPlan {
    LogicalPlan::join(
        left,
        right,
        vec![Expr::col("id")],
        vec![Expr::col("id")],
        how,
    )
}
