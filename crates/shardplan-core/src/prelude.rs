//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::dag::{JoinType, LogicalPlan, NodeKind, Strategy};
pub use crate::error::{Error, Result};
pub use crate::expr::{BinaryOp, Expr, ExprKind, NamedExpr};
pub use crate::id::{NodeKey, TaskKey};
pub use crate::schema::{DataType, Field, Schema};
pub use crate::types::Scalar;
