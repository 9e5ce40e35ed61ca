//! YAML → LogicalPlan parser for plan *trees*.
//!
//! Example:
//! ```yaml
//! config:
//!   max_rows_per_partition: 100
//! plan:
//!   op: join
//!   how: inner
//!   left_on: [id]
//!   right_on: [id]
//!   left:
//!     op: scan
//!     source: "data/orders.parquet"
//!     num_rows: 400
//!     schema:
//!       - { name: "id",    type: "Int64" }
//!       - { name: "total", type: "Float64", nullable: true }
//!   right:
//!     op: scan
//!     source: "data/users.parquet"
//!     schema: [ { name: "id", type: "Int64" } ]
//! ```
//!
//! Expressions are either a bare column name or a full `Expr` in serde's
//! externally tagged form, e.g. `{ BinOp: { op: Gt, left: { Col: total },
//! right: { Literal: { F64: 10.0 } } } }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use shardplan_core::config::EngineConfig;
use shardplan_core::dag::{JoinType, LogicalPlan};
use shardplan_core::error::{Error, Result};
use shardplan_core::expr::{Expr, NamedExpr};
use shardplan_core::schema::{DataType, Field, Schema};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    #[serde(default)]
    pub config: Option<PlanConfig>,
    pub plan: PlanDef,
}

/// Overrides applied on top of a base `EngineConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    pub executor: Option<String>,
    pub max_rows_per_partition: Option<u64>,
    pub options: BTreeMap<String, String>,
}

impl PlanConfig {
    pub fn apply(&self, mut base: EngineConfig) -> EngineConfig {
        if let Some(executor) = &self.executor {
            base.executor = executor.clone();
        }
        if let Some(rows) = self.max_rows_per_partition {
            base.max_rows_per_partition = rows;
        }
        base.options
            .extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        base
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum PlanDef {
    Scan {
        source: String,
        schema: Vec<FieldDef>,
        #[serde(default)]
        num_rows: Option<u64>,
    },
    Select {
        input: Box<PlanDef>,
        exprs: Vec<NamedExprDef>,
    },
    WithColumns {
        input: Box<PlanDef>,
        columns: Vec<NamedExprDef>,
    },
    Filter {
        input: Box<PlanDef>,
        predicate: ExprDef,
    },
    Project {
        input: Box<PlanDef>,
        columns: Vec<String>,
    },
    Join {
        left: Box<PlanDef>,
        right: Box<PlanDef>,
        left_on: Vec<ExprDef>,
        right_on: Vec<ExprDef>,
        #[serde(default = "default_how")]
        how: JoinType,
    },
    Union {
        inputs: Vec<PlanDef>,
    },
    GroupBy {
        input: Box<PlanDef>,
        keys: Vec<NamedExprDef>,
        aggs: Vec<NamedExprDef>,
    },
    Sort {
        input: Box<PlanDef>,
        by: Vec<ExprDef>,
        #[serde(default)]
        descending: Vec<bool>,
    },
    Slice {
        input: Box<PlanDef>,
        #[serde(default)]
        offset: i64,
        #[serde(default)]
        length: Option<u64>,
    },
    Distinct {
        input: Box<PlanDef>,
        #[serde(default)]
        subset: Option<Vec<String>>,
    },
    Extension {
        name: String,
        #[serde(default)]
        inputs: Vec<PlanDef>,
        #[serde(default)]
        params: BTreeMap<String, String>,
        schema: Vec<FieldDef>,
    },
}

fn default_how() -> JoinType {
    JoinType::Inner
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExprDef {
    Column(String),
    Expr(Expr),
}

impl From<ExprDef> for Expr {
    fn from(def: ExprDef) -> Self {
        match def {
            ExprDef::Column(name) => Expr::Col(name),
            ExprDef::Expr(e) => e,
        }
    }
}

/// Output column; `expr` defaults to the column of the same name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedExprDef {
    pub name: String,
    #[serde(default)]
    pub expr: Option<ExprDef>,
}

impl From<NamedExprDef> for NamedExpr {
    fn from(def: NamedExprDef) -> Self {
        let value = match def.expr {
            Some(e) => e.into(),
            None => Expr::Col(def.name.clone()),
        };
        NamedExpr::new(def.name, value)
    }
}

fn to_schema(fields: &[FieldDef]) -> Result<Schema> {
    fields
        .iter()
        .map(|f| {
            Ok(Field::new(
                f.name.clone(),
                DataType::parse(&f.data_type)?,
                f.nullable,
            ))
        })
        .collect::<Result<Vec<_>>>()
        .map(Schema::new)
}

fn named(defs: Vec<NamedExprDef>) -> Vec<NamedExpr> {
    defs.into_iter().map(Into::into).collect()
}

fn exprs(defs: Vec<ExprDef>) -> Vec<Expr> {
    defs.into_iter().map(Into::into).collect()
}

fn to_plan(def: PlanDef) -> Result<LogicalPlan> {
    use PlanDef as P;
    Ok(match def {
        P::Scan {
            source,
            schema,
            num_rows,
        } => LogicalPlan::scan(source, to_schema(&schema)?, num_rows),
        P::Select { input, exprs } => LogicalPlan::select(to_plan(*input)?, named(exprs)),
        P::WithColumns { input, columns } => {
            LogicalPlan::with_columns(to_plan(*input)?, named(columns))
        }
        P::Filter { input, predicate } => LogicalPlan::filter(to_plan(*input)?, predicate.into()),
        P::Project { input, columns } => LogicalPlan::project(to_plan(*input)?, &columns)?,
        P::Join {
            left,
            right,
            left_on,
            right_on,
            how,
        } => {
            if left_on.len() != right_on.len() {
                return Err(Error::Schema(format!(
                    "join has {} left keys but {} right keys",
                    left_on.len(),
                    right_on.len()
                )));
            }
            LogicalPlan::join(
                to_plan(*left)?,
                to_plan(*right)?,
                exprs(left_on),
                exprs(right_on),
                how,
            )
        }
        P::Union { inputs } => LogicalPlan::union(
            inputs
                .into_iter()
                .map(to_plan)
                .collect::<Result<Vec<_>>>()?,
        )?,
        P::GroupBy { input, keys, aggs } => {
            LogicalPlan::group_by(to_plan(*input)?, named(keys), named(aggs))
        }
        P::Sort {
            input,
            by,
            descending,
        } => {
            let by = exprs(by);
            let descending = if descending.is_empty() {
                vec![false; by.len()]
            } else {
                descending
            };
            if descending.len() != by.len() {
                return Err(Error::Schema(format!(
                    "sort has {} keys but {} descending flags",
                    by.len(),
                    descending.len()
                )));
            }
            LogicalPlan::sort(to_plan(*input)?, by, descending)
        }
        P::Slice {
            input,
            offset,
            length,
        } => LogicalPlan::slice(to_plan(*input)?, offset, length),
        P::Distinct { input, subset } => LogicalPlan::distinct(to_plan(*input)?, subset),
        P::Extension {
            name,
            inputs,
            params,
            schema,
        } => LogicalPlan::extension(
            name,
            inputs
                .into_iter()
                .map(to_plan)
                .collect::<Result<Vec<_>>>()?,
            params,
            to_schema(&schema)?,
        ),
    })
}

#[derive(Debug, Clone)]
pub struct ParsedPlan {
    pub plan: LogicalPlan,
    pub config: EngineConfig,
}

/// Parse a YAML plan document, applying its `config:` block to the defaults.
pub fn parse_yaml_plan(yaml_src: &str) -> Result<ParsedPlan> {
    parse_yaml_plan_with(yaml_src, EngineConfig::default())
}

/// Parse a YAML plan document, applying its `config:` block to `base`.
pub fn parse_yaml_plan_with(yaml_src: &str, base: EngineConfig) -> Result<ParsedPlan> {
    let doc: PlanDocument = serde_yaml::from_str(yaml_src)
        .map_err(|e| Error::Schema(format!("invalid plan document: {e}")))?;
    let config = match &doc.config {
        Some(overrides) => overrides.apply(base),
        None => base,
    };
    config.validate()?;
    Ok(ParsedPlan {
        plan: to_plan(doc.plan)?,
        config,
    })
}
