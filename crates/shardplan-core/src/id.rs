//! Strongly-typed identifiers used across the planner and the task graph.
//!
//! Downstream crates should *not* key graphs with raw strings or tuples.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::dag::{JoinType, LogicalPlan, Strategy};
use crate::error::{Error, Result};
use crate::expr::{Expr, NamedExpr};
use crate::hash::hash_serde;
use crate::schema::Schema;

/// Hex digits of the structural digest kept in a [`NodeKey`].
const NODE_DIGEST_HEX: usize = 32;

/// Structural identity of a plan node: `"<kind>-<digest>"`.
///
/// Two nodes with equal contents (children included) get the same key, so a
/// shared subtree is lowered and scheduled once. The digest covers the node's
/// own parameters plus the keys of its inputs, so a walk that already holds
/// the child keys can key each node in time proportional to the node alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(String);

impl NodeKey {
    /// Key a whole subtree. Walks every descendant; bottom-up passes should
    /// call [`NodeKey::derive`] with the keys they already hold.
    pub fn of(node: &LogicalPlan) -> Result<Self> {
        let inputs = node
            .children()
            .into_iter()
            .map(NodeKey::of)
            .collect::<Result<Vec<_>>>()?;
        Self::derive(node, &inputs)
    }

    /// Key `node` given the keys of its inputs, in positional order.
    pub fn derive(node: &LogicalPlan, inputs: &[NodeKey]) -> Result<Self> {
        if inputs.len() != node.arity() {
            return Err(Error::Invariant(format!(
                "{} has {} inputs, {} keys given",
                node.kind(),
                node.arity(),
                inputs.len()
            )));
        }
        let digest = hash_serde(&(header(node), inputs))?;
        Ok(Self(format!(
            "{}-{}",
            node.kind().name(),
            digest.short_hex(NODE_DIGEST_HEX)
        )))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A node's parameters without its inputs.
#[derive(Serialize)]
enum Header<'a> {
    Scan {
        source: &'a str,
        schema: &'a Schema,
        num_rows: Option<u64>,
    },
    Select {
        exprs: &'a [NamedExpr],
        schema: &'a Schema,
        strategy: Strategy,
    },
    HStack {
        columns: &'a [NamedExpr],
        schema: &'a Schema,
        strategy: Strategy,
    },
    Filter {
        predicate: &'a Expr,
        schema: &'a Schema,
    },
    Projection {
        schema: &'a Schema,
    },
    Join {
        left_on: &'a [Expr],
        right_on: &'a [Expr],
        join_type: JoinType,
        schema: &'a Schema,
        strategy: Strategy,
    },
    Union {
        schema: &'a Schema,
    },
    GroupBy {
        keys: &'a [NamedExpr],
        aggs: &'a [NamedExpr],
        schema: &'a Schema,
    },
    Sort {
        by: &'a [Expr],
        descending: &'a [bool],
        schema: &'a Schema,
    },
    Slice {
        offset: i64,
        length: Option<u64>,
        schema: &'a Schema,
    },
    Distinct {
        subset: Option<&'a [String]>,
        schema: &'a Schema,
    },
    Extension {
        name: &'a str,
        params: &'a BTreeMap<String, String>,
        schema: &'a Schema,
    },
}

fn header(node: &LogicalPlan) -> Header<'_> {
    use LogicalPlan as P;
    match node {
        P::Scan {
            source,
            schema,
            num_rows,
        } => Header::Scan {
            source,
            schema,
            num_rows: *num_rows,
        },
        P::Select {
            exprs,
            schema,
            strategy,
            ..
        } => Header::Select {
            exprs,
            schema,
            strategy: *strategy,
        },
        P::HStack {
            columns,
            schema,
            strategy,
            ..
        } => Header::HStack {
            columns,
            schema,
            strategy: *strategy,
        },
        P::Filter {
            predicate, schema, ..
        } => Header::Filter { predicate, schema },
        P::Projection { schema, .. } => Header::Projection { schema },
        P::Join {
            left_on,
            right_on,
            join_type,
            schema,
            strategy,
            ..
        } => Header::Join {
            left_on,
            right_on,
            join_type: *join_type,
            schema,
            strategy: *strategy,
        },
        P::Union { schema, .. } => Header::Union { schema },
        P::GroupBy {
            keys, aggs, schema, ..
        } => Header::GroupBy { keys, aggs, schema },
        P::Sort {
            by,
            descending,
            schema,
            ..
        } => Header::Sort {
            by,
            descending,
            schema,
        },
        P::Slice {
            offset,
            length,
            schema,
            ..
        } => Header::Slice {
            offset: *offset,
            length: *length,
            schema,
        },
        P::Distinct { subset, schema, .. } => Header::Distinct {
            subset: subset.as_deref(),
            schema,
        },
        P::Extension {
            name,
            params,
            schema,
            ..
        } => Header::Extension {
            name,
            params,
            schema,
        },
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key of one task in a task graph.
///
/// `Fanin` keys exist only for broadcast-join sub-tasks; `Collect` is the
/// optional whole-result key added on top of a node's partitions. Distinct
/// variants mean a 2-part key can never collide with a 3-part one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKey {
    Partition { node: NodeKey, index: usize },
    Fanin { node: NodeKey, index: usize, sub: usize },
    Collect { node: NodeKey },
}

impl TaskKey {
    pub fn partition(node: &NodeKey, index: usize) -> Self {
        TaskKey::Partition {
            node: node.clone(),
            index,
        }
    }

    pub fn fanin(node: &NodeKey, index: usize, sub: usize) -> Self {
        TaskKey::Fanin {
            node: node.clone(),
            index,
            sub,
        }
    }

    pub fn collect(node: &NodeKey) -> Self {
        TaskKey::Collect { node: node.clone() }
    }

    pub fn node(&self) -> &NodeKey {
        match self {
            TaskKey::Partition { node, .. }
            | TaskKey::Fanin { node, .. }
            | TaskKey::Collect { node } => node,
        }
    }

    /// Output partition index, if this key addresses one.
    pub fn index(&self) -> Option<usize> {
        match self {
            TaskKey::Partition { index, .. } | TaskKey::Fanin { index, .. } => Some(*index),
            TaskKey::Collect { .. } => None,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Partition { node, index } => write!(f, "({node}, {index})"),
            TaskKey::Fanin { node, index, sub } => write!(f, "({node}, {index}, {sub})"),
            TaskKey::Collect { node } => write!(f, "({node})"),
        }
    }
}
