//! Expression trees bound to a plan node's input.
//!
//! Expressions are immutable; planning code only inspects their shape via
//! [`Expr::kind`] and [`Expr::preorder`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::schema::{DataType, Schema};
use crate::types::Scalar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Scalar),
    LiteralColumn {
        name: String,
        values: Vec<Scalar>,
    },
    Col(String),
    ColRef {
        index: usize,
        name: String,
    },
    BooleanFunction {
        name: String,
        args: Vec<Expr>,
    },
    StringFunction {
        name: String,
        args: Vec<Expr>,
    },
    TemporalFunction {
        name: String,
        args: Vec<Expr>,
    },
    /// Keep rows of `values` where `mask` is true.
    Filter {
        values: Box<Expr>,
        mask: Box<Expr>,
    },
    Cast {
        expr: Box<Expr>,
        dtype: DataType,
    },
    Ternary {
        predicate: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    BinOp {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryFunction {
        name: String,
        args: Vec<Expr>,
    },
    Agg {
        name: String,
        expr: Box<Expr>,
    },
    Sort {
        expr: Box<Expr>,
        descending: bool,
    },
    SortBy {
        expr: Box<Expr>,
        by: Vec<Expr>,
        descending: Vec<bool>,
    },
    Gather {
        values: Box<Expr>,
        indices: Box<Expr>,
    },
    Len,
    Window {
        expr: Box<Expr>,
        partition_by: Vec<Expr>,
    },
}

/// Operator tag of an [`Expr`] node, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprKind {
    Literal,
    LiteralColumn,
    Col,
    ColRef,
    BooleanFunction,
    StringFunction,
    TemporalFunction,
    Filter,
    Cast,
    Ternary,
    BinOp,
    UnaryFunction,
    Agg,
    Sort,
    SortBy,
    Gather,
    Len,
    Window,
}

impl fmt::Display for ExprKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Expr {
    pub fn kind(&self) -> ExprKind {
        use Expr::*;
        match self {
            Literal(_) => ExprKind::Literal,
            LiteralColumn { .. } => ExprKind::LiteralColumn,
            Col(_) => ExprKind::Col,
            ColRef { .. } => ExprKind::ColRef,
            BooleanFunction { .. } => ExprKind::BooleanFunction,
            StringFunction { .. } => ExprKind::StringFunction,
            TemporalFunction { .. } => ExprKind::TemporalFunction,
            Filter { .. } => ExprKind::Filter,
            Cast { .. } => ExprKind::Cast,
            Ternary { .. } => ExprKind::Ternary,
            BinOp { .. } => ExprKind::BinOp,
            UnaryFunction { .. } => ExprKind::UnaryFunction,
            Agg { .. } => ExprKind::Agg,
            Sort { .. } => ExprKind::Sort,
            SortBy { .. } => ExprKind::SortBy,
            Gather { .. } => ExprKind::Gather,
            Len => ExprKind::Len,
            Window { .. } => ExprKind::Window,
        }
    }

    /// Direct child expressions, left to right.
    pub fn children(&self) -> Vec<&Expr> {
        use Expr::*;
        match self {
            Literal(_) | LiteralColumn { .. } | Col(_) | ColRef { .. } | Len => vec![],
            BooleanFunction { args, .. }
            | StringFunction { args, .. }
            | TemporalFunction { args, .. }
            | UnaryFunction { args, .. } => args.iter().collect(),
            Filter { values, mask } => vec![values.as_ref(), mask.as_ref()],
            Cast { expr, .. } | Agg { expr, .. } | Sort { expr, .. } => vec![expr.as_ref()],
            Ternary {
                predicate,
                then,
                otherwise,
            } => vec![predicate.as_ref(), then.as_ref(), otherwise.as_ref()],
            BinOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            SortBy { expr, by, .. } => std::iter::once(expr.as_ref()).chain(by.iter()).collect(),
            Gather { values, indices } => vec![values.as_ref(), indices.as_ref()],
            Window { expr, partition_by } => std::iter::once(expr.as_ref())
                .chain(partition_by.iter())
                .collect(),
        }
    }

    /// Pre-order walk over this expression tree using an explicit stack.
    pub fn preorder(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Best-effort result type against `input`. Used by plan builders to
    /// derive output schemas; unknown shapes fall back to `DataType::Null`.
    pub fn output_type(&self, input: &Schema) -> DataType {
        use Expr::*;
        match self {
            Literal(s) => s.data_type(),
            LiteralColumn { values, .. } => values
                .iter()
                .find(|v| !v.is_null())
                .map(Scalar::data_type)
                .unwrap_or(DataType::Null),
            Col(name) | ColRef { name, .. } => input
                .index_of(name)
                .map(|i| input.fields[i].data_type.clone())
                .unwrap_or(DataType::Null),
            Cast { dtype, .. } => dtype.clone(),
            BooleanFunction { .. } => DataType::Boolean,
            StringFunction { .. } => DataType::Utf8,
            Len => DataType::Int64,
            BinOp { op, left, .. } => match op {
                BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Lt
                | BinaryOp::LtEq
                | BinaryOp::Gt
                | BinaryOp::GtEq
                | BinaryOp::And
                | BinaryOp::Or => DataType::Boolean,
                _ => left.output_type(input),
            },
            Ternary { then, .. } => then.output_type(input),
            other => other
                .children()
                .first()
                .map(|c| c.output_type(input))
                .unwrap_or(DataType::Null),
        }
    }

    pub fn col(name: impl Into<String>) -> Self {
        Expr::Col(name.into())
    }

    pub fn lit(value: impl Into<Scalar>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Expr::BinOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn filter(values: Expr, mask: Expr) -> Self {
        Expr::Filter {
            values: Box::new(values),
            mask: Box::new(mask),
        }
    }

    pub fn cast(expr: Expr, dtype: DataType) -> Self {
        Expr::Cast {
            expr: Box::new(expr),
            dtype,
        }
    }

    pub fn agg(name: impl Into<String>, expr: Expr) -> Self {
        Expr::Agg {
            name: name.into(),
            expr: Box::new(expr),
        }
    }
}

/// Iterator returned by [`Expr::preorder`].
///
/// Depth of the expression never grows the call stack.
pub struct PreOrder<'a> {
    stack: Vec<&'a Expr>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<Self::Item> {
        let e = self.stack.pop()?;
        // Reverse so the leftmost child is visited first.
        self.stack.extend(e.children().into_iter().rev());
        Some(e)
    }
}

/// An output column: name plus the expression computing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExpr {
    pub name: String,
    pub value: Expr,
}

impl NamedExpr {
    pub fn new(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}
