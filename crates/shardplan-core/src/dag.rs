//! Logical plan nodes, before and after partition lowering.
//!
//! Upstream planning produces a single-partition `LogicalPlan` tree. Lowering
//! (in `shardplan-planner`) returns the same node type with a [`Strategy`]
//! tag filled in, so a lowered plan can go anywhere a logical plan can.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::expr::{Expr, NamedExpr};
use crate::schema::{Field, Schema};

/// Suffix given to right-side join columns whose names clash with the left.
pub const JOIN_SUFFIX: &str = "_right";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Semi,
    Anti,
    Cross,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Full => "full",
            JoinType::Semi => "semi",
            JoinType::Anti => "anti",
            JoinType::Cross => "cross",
        }
    }
}

/// Partitioning strategy chosen for a node during lowering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Not specialised; evaluated by the default generator.
    #[default]
    Plain,
    /// Evaluated independently on every partition of its input.
    PartitionWise,
    /// Left input replicated to every partition of the right input.
    LeftBroadcast,
    /// Right input replicated to every partition of the left input.
    RightBroadcast,
}

impl Strategy {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Strategy::LeftBroadcast | Strategy::RightBroadcast)
    }
}

/// Operator tag used to dispatch lowering and task generation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scan,
    Select,
    HStack,
    Filter,
    Projection,
    Join,
    Union,
    GroupBy,
    Sort,
    Slice,
    Distinct,
    Extension(String),
}

impl NodeKind {
    pub fn name(&self) -> &str {
        match self {
            NodeKind::Scan => "scan",
            NodeKind::Select => "select",
            NodeKind::HStack => "hstack",
            NodeKind::Filter => "filter",
            NodeKind::Projection => "projection",
            NodeKind::Join => "join",
            NodeKind::Union => "union",
            NodeKind::GroupBy => "groupby",
            NodeKind::Sort => "sort",
            NodeKind::Slice => "slice",
            NodeKind::Distinct => "distinct",
            NodeKind::Extension(name) => name,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Relational plan node. Children are owned, so plans are trees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogicalPlan {
    Scan {
        source: String,
        schema: Schema,
        /// Row count, when the source knows it. Drives scan splitting.
        #[serde(default)]
        num_rows: Option<u64>,
    },
    Select {
        input: Box<LogicalPlan>,
        exprs: Vec<NamedExpr>,
        schema: Schema,
        #[serde(default)]
        strategy: Strategy,
    },
    /// Append or replace columns, keeping the rest of the input.
    HStack {
        input: Box<LogicalPlan>,
        columns: Vec<NamedExpr>,
        schema: Schema,
        #[serde(default)]
        strategy: Strategy,
    },
    Filter {
        input: Box<LogicalPlan>,
        predicate: Expr,
        schema: Schema,
    },
    Projection {
        input: Box<LogicalPlan>,
        schema: Schema,
    },
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        join_type: JoinType,
        schema: Schema,
        #[serde(default)]
        strategy: Strategy,
    },
    Union {
        inputs: Vec<LogicalPlan>,
        schema: Schema,
    },
    GroupBy {
        input: Box<LogicalPlan>,
        keys: Vec<NamedExpr>,
        aggs: Vec<NamedExpr>,
        schema: Schema,
    },
    Sort {
        input: Box<LogicalPlan>,
        by: Vec<Expr>,
        descending: Vec<bool>,
        schema: Schema,
    },
    Slice {
        input: Box<LogicalPlan>,
        offset: i64,
        length: Option<u64>,
        schema: Schema,
    },
    Distinct {
        input: Box<LogicalPlan>,
        subset: Option<Vec<String>>,
        schema: Schema,
    },
    /// Operator kinds this crate does not know about.
    Extension {
        name: String,
        inputs: Vec<LogicalPlan>,
        #[serde(default)]
        params: BTreeMap<String, String>,
        schema: Schema,
    },
}

impl LogicalPlan {
    pub fn kind(&self) -> NodeKind {
        use LogicalPlan::*;
        match self {
            Scan { .. } => NodeKind::Scan,
            Select { .. } => NodeKind::Select,
            HStack { .. } => NodeKind::HStack,
            Filter { .. } => NodeKind::Filter,
            Projection { .. } => NodeKind::Projection,
            Join { .. } => NodeKind::Join,
            Union { .. } => NodeKind::Union,
            GroupBy { .. } => NodeKind::GroupBy,
            Sort { .. } => NodeKind::Sort,
            Slice { .. } => NodeKind::Slice,
            Distinct { .. } => NodeKind::Distinct,
            Extension { name, .. } => NodeKind::Extension(name.clone()),
        }
    }

    pub fn schema(&self) -> &Schema {
        use LogicalPlan::*;
        match self {
            Scan { schema, .. }
            | Select { schema, .. }
            | HStack { schema, .. }
            | Filter { schema, .. }
            | Projection { schema, .. }
            | Join { schema, .. }
            | Union { schema, .. }
            | GroupBy { schema, .. }
            | Sort { schema, .. }
            | Slice { schema, .. }
            | Distinct { schema, .. }
            | Extension { schema, .. } => schema,
        }
    }

    /// Inputs of this node, in positional order.
    pub fn children(&self) -> Vec<&LogicalPlan> {
        use LogicalPlan::*;
        match self {
            Scan { .. } => vec![],
            Select { input, .. }
            | HStack { input, .. }
            | Filter { input, .. }
            | Projection { input, .. }
            | GroupBy { input, .. }
            | Sort { input, .. }
            | Slice { input, .. }
            | Distinct { input, .. } => vec![input.as_ref()],
            Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Union { inputs, .. } | Extension { inputs, .. } => inputs.iter().collect(),
        }
    }

    /// Returns the number of inputs for this node.
    pub fn arity(&self) -> usize {
        self.children().len()
    }

    /// Rebuild this node over new inputs, keeping every parameter.
    ///
    /// The replacement list must have the node's arity.
    pub fn with_children(&self, children: Vec<LogicalPlan>) -> Result<LogicalPlan> {
        if children.len() != self.arity() {
            return Err(Error::Invariant(format!(
                "{} expects {} inputs, got {}",
                self.kind(),
                self.arity(),
                children.len()
            )));
        }
        let mut node = self.clone();
        let mut it = children.into_iter();
        // `it` holds exactly arity() plans, checked above.
        let mut next = || it.next().map(Box::new);
        use LogicalPlan::*;
        match &mut node {
            Scan { .. } => {}
            Select { input, .. }
            | HStack { input, .. }
            | Filter { input, .. }
            | Projection { input, .. }
            | GroupBy { input, .. }
            | Sort { input, .. }
            | Slice { input, .. }
            | Distinct { input, .. } => {
                if let Some(c) = next() {
                    *input = c;
                }
            }
            Join { left, right, .. } => {
                if let Some(c) = next() {
                    *left = c;
                }
                if let Some(c) = next() {
                    *right = c;
                }
            }
            Union { inputs, .. } | Extension { inputs, .. } => {
                *inputs = std::iter::from_fn(|| next().map(|b| *b)).collect();
            }
        }
        Ok(node)
    }

    pub fn strategy(&self) -> Strategy {
        match self {
            LogicalPlan::Select { strategy, .. }
            | LogicalPlan::HStack { strategy, .. }
            | LogicalPlan::Join { strategy, .. } => *strategy,
            _ => Strategy::Plain,
        }
    }

    /// Same node tagged with `strategy`. Nodes without a strategy slot are
    /// returned unchanged.
    pub fn with_strategy(mut self, new: Strategy) -> LogicalPlan {
        match &mut self {
            LogicalPlan::Select { strategy, .. }
            | LogicalPlan::HStack { strategy, .. }
            | LogicalPlan::Join { strategy, .. } => *strategy = new,
            _ => {}
        }
        self
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        let mut n = 0;
        let mut stack = vec![self];
        while let Some(p) = stack.pop() {
            n += 1;
            stack.extend(p.children());
        }
        n
    }
}

// Builders. Output schemas are derived from the inputs.
impl LogicalPlan {
    pub fn scan(source: impl Into<String>, schema: Schema, num_rows: Option<u64>) -> Self {
        LogicalPlan::Scan {
            source: source.into(),
            schema,
            num_rows,
        }
    }

    pub fn select(input: LogicalPlan, exprs: Vec<NamedExpr>) -> Self {
        let schema = named_schema(input.schema(), &exprs);
        LogicalPlan::Select {
            input: Box::new(input),
            exprs,
            schema,
            strategy: Strategy::Plain,
        }
    }

    pub fn with_columns(input: LogicalPlan, columns: Vec<NamedExpr>) -> Self {
        let mut schema = input.schema().clone();
        for f in named_schema(input.schema(), &columns).fields {
            match schema.index_of(&f.name) {
                Some(i) => schema.fields[i] = f,
                None => schema.fields.push(f),
            }
        }
        LogicalPlan::HStack {
            input: Box::new(input),
            columns,
            schema,
            strategy: Strategy::Plain,
        }
    }

    pub fn filter(input: LogicalPlan, predicate: Expr) -> Self {
        let schema = input.schema().clone();
        LogicalPlan::Filter {
            input: Box::new(input),
            predicate,
            schema,
        }
    }

    pub fn project(input: LogicalPlan, columns: &[String]) -> Result<Self> {
        let schema = input.schema().project(columns)?;
        Ok(LogicalPlan::Projection {
            input: Box::new(input),
            schema,
        })
    }

    pub fn join(
        left: LogicalPlan,
        right: LogicalPlan,
        left_on: Vec<Expr>,
        right_on: Vec<Expr>,
        join_type: JoinType,
    ) -> Self {
        let schema = match join_type {
            JoinType::Semi | JoinType::Anti => left.schema().clone(),
            _ => left.schema().join(right.schema(), JOIN_SUFFIX),
        };
        LogicalPlan::Join {
            left: Box::new(left),
            right: Box::new(right),
            left_on,
            right_on,
            join_type,
            schema,
            strategy: Strategy::Plain,
        }
    }

    pub fn union(inputs: Vec<LogicalPlan>) -> Result<Self> {
        let schema = inputs
            .first()
            .map(|p| p.schema().clone())
            .ok_or_else(|| Error::Schema("union needs at least one input".into()))?;
        if let Some(bad) = inputs.iter().find(|p| p.schema() != &schema) {
            return Err(Error::Schema(format!(
                "union input {} does not match the first input's schema",
                bad.kind()
            )));
        }
        Ok(LogicalPlan::Union { inputs, schema })
    }

    pub fn group_by(input: LogicalPlan, keys: Vec<NamedExpr>, aggs: Vec<NamedExpr>) -> Self {
        let mut schema = named_schema(input.schema(), &keys);
        schema
            .fields
            .extend(named_schema(input.schema(), &aggs).fields);
        LogicalPlan::GroupBy {
            input: Box::new(input),
            keys,
            aggs,
            schema,
        }
    }

    pub fn sort(input: LogicalPlan, by: Vec<Expr>, descending: Vec<bool>) -> Self {
        let schema = input.schema().clone();
        LogicalPlan::Sort {
            input: Box::new(input),
            by,
            descending,
            schema,
        }
    }

    pub fn slice(input: LogicalPlan, offset: i64, length: Option<u64>) -> Self {
        let schema = input.schema().clone();
        LogicalPlan::Slice {
            input: Box::new(input),
            offset,
            length,
            schema,
        }
    }

    pub fn distinct(input: LogicalPlan, subset: Option<Vec<String>>) -> Self {
        let schema = input.schema().clone();
        LogicalPlan::Distinct {
            input: Box::new(input),
            subset,
            schema,
        }
    }

    pub fn extension(
        name: impl Into<String>,
        inputs: Vec<LogicalPlan>,
        params: BTreeMap<String, String>,
        schema: Schema,
    ) -> Self {
        LogicalPlan::Extension {
            name: name.into(),
            inputs,
            params,
            schema,
        }
    }
}

fn named_schema(input: &Schema, exprs: &[NamedExpr]) -> Schema {
    Schema::new(
        exprs
            .iter()
            .map(|ne| Field::new(ne.name.clone(), ne.value.output_type(input), true))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn scan(name: &str) -> LogicalPlan {
        LogicalPlan::scan(
            name,
            Schema::new(vec![Field::new("k", DataType::Int64, false)]),
            None,
        )
    }

    #[test]
    fn with_children_replaces_inputs_in_order() {
        let join = LogicalPlan::join(
            scan("a"),
            scan("b"),
            vec![Expr::col("k")],
            vec![Expr::col("k")],
            JoinType::Inner,
        );
        let swapped = join.with_children(vec![scan("b"), scan("a")]).unwrap();
        match swapped {
            LogicalPlan::Join { left, right, .. } => {
                assert_eq!(*left, scan("b"));
                assert_eq!(*right, scan("a"));
            }
            other => panic!("expected join, got {other:?}"),
        }
        assert!(join.with_children(vec![scan("a")]).is_err());
    }

    #[test]
    fn strategy_tag_only_lands_on_tagged_nodes() {
        let f = LogicalPlan::filter(scan("a"), Expr::lit(true));
        assert_eq!(
            f.clone().with_strategy(Strategy::PartitionWise),
            f,
            "filter carries no strategy"
        );
        let s = LogicalPlan::select(scan("a"), vec![NamedExpr::new("k", Expr::col("k"))]);
        assert_eq!(
            s.with_strategy(Strategy::PartitionWise).strategy(),
            Strategy::PartitionWise
        );
    }

    #[test]
    fn union_rejects_mismatched_schemas() {
        let other = LogicalPlan::scan("c", Schema::default(), None);
        assert!(LogicalPlan::union(vec![scan("a"), other]).is_err());
        assert_eq!(
            LogicalPlan::union(vec![scan("a"), scan("b")])
                .unwrap()
                .arity(),
            2
        );
    }
}
