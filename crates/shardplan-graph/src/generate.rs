//! Task Graph Generator: lowered plan → task graph.
//!
//! Generation is bottom-up like lowering. Each distinct node (by `NodeKey`)
//! is generated once, after all of its children, and its generator sees the
//! graph built so far. Generators return their entries in insertion order
//! (fan-in sub-tasks before the task that concatenates them).
//!
//! Keys are derived from the child keys the walk already holds, so each
//! node is hashed once per visit.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, trace};

use shardplan_core::config::EngineConfig;
use shardplan_core::dag::{LogicalPlan, NodeKind};
use shardplan_core::error::{Error, Result};
use shardplan_core::id::{NodeKey, TaskKey};
use shardplan_planner::partition::{PartitionInfo, PartitionMap};
use shardplan_planner::scan::scan_ranges;
use shardplan_planner::LoweredPlan;

use crate::broadcast::BroadcastJoinTasks;
use crate::graph::TaskGraph;
use crate::task::{TaskArg, TaskDescription};

pub type TaskEntries = Vec<(TaskKey, TaskDescription)>;

/// What a generator may look at while emitting a node's tasks.
pub struct GenerateContext<'a> {
    pub config: &'a EngineConfig,
    /// Tasks of every node generated so far (all children included).
    pub graph: &'a TaskGraph,
    /// Partitions of the node being generated.
    pub output: PartitionInfo,
    /// Key and partition count of each input, in positional order.
    pub inputs: &'a [(NodeKey, usize)],
}

impl<'a> GenerateContext<'a> {
    pub fn count(&self) -> usize {
        self.output.count()
    }

    pub fn input(&self, index: usize) -> Result<(&NodeKey, usize)> {
        self.inputs
            .get(index)
            .map(|(key, n)| (key, *n))
            .ok_or_else(|| {
                Error::Invariant(format!(
                    "no input {index}; node has {} inputs",
                    self.inputs.len()
                ))
            })
    }
}

/// Emits the tasks computing every output partition of one node kind.
///
/// The entries must include `TaskKey::Partition(key, i)` for each `i` in
/// `0..ctx.count()`.
pub trait GenerateTasks: Send + Sync {
    fn generate(
        &self,
        node: &LogicalPlan,
        key: &NodeKey,
        ctx: &GenerateContext<'_>,
    ) -> Result<TaskEntries>;
}

/// Default generator: task `i` evaluates the node on partition `i` of every
/// child. All children must have the node's partition count.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartitionWiseTasks;

impl GenerateTasks for PartitionWiseTasks {
    fn generate(
        &self,
        node: &LogicalPlan,
        key: &NodeKey,
        ctx: &GenerateContext<'_>,
    ) -> Result<TaskEntries> {
        let count = ctx.count();
        let children = ctx.inputs;
        if let Some((child, n)) = children.iter().find(|(_, n)| *n != count) {
            return Err(Error::SchemaMismatch(format!(
                "{key} has {count} partitions but input {child} has {n}"
            )));
        }
        Ok((0..count)
            .map(|i| {
                let mut args = Vec::with_capacity(children.len() + 1);
                args.push(TaskArg::Config);
                args.extend(
                    children
                        .iter()
                        .map(|(child, _)| TaskArg::Key(TaskKey::partition(child, i))),
                );
                (
                    TaskKey::partition(key, i),
                    TaskDescription::evaluate(key, args),
                )
            })
            .collect())
    }
}

/// Scan tasks read one row range each.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanTasks;

impl GenerateTasks for ScanTasks {
    fn generate(
        &self,
        node: &LogicalPlan,
        key: &NodeKey,
        ctx: &GenerateContext<'_>,
    ) -> Result<TaskEntries> {
        let LogicalPlan::Scan { num_rows, .. } = node else {
            return Err(Error::coverage(
                node.kind().name(),
                "scan generator received a non-scan node",
            ));
        };
        let count = ctx.count();
        let Some(rows) = num_rows else {
            if count != 1 {
                return Err(Error::Invariant(format!(
                    "{key} has unknown size but {count} partitions"
                )));
            }
            return Ok(vec![(
                TaskKey::partition(key, 0),
                TaskDescription::evaluate(key, vec![TaskArg::Config]),
            )]);
        };
        let ranges = scan_ranges(*rows, ctx.config.max_rows_per_partition);
        if ranges.len() != count {
            return Err(Error::Invariant(format!(
                "{key} lowered to {count} partitions but splits into {}",
                ranges.len()
            )));
        }
        Ok(ranges
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                let range = json!({ "offset": r.start, "length": r.end - r.start });
                (
                    TaskKey::partition(key, i),
                    TaskDescription::evaluate(key, vec![TaskArg::Config, TaskArg::Literal(range)]),
                )
            })
            .collect())
    }
}

/// Union partition `k` forwards the `k`-th partition across all inputs.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnionTasks;

impl GenerateTasks for UnionTasks {
    fn generate(
        &self,
        node: &LogicalPlan,
        key: &NodeKey,
        ctx: &GenerateContext<'_>,
    ) -> Result<TaskEntries> {
        let count = ctx.count();
        let sources: Vec<TaskKey> = ctx
            .inputs
            .iter()
            .flat_map(|(child, n)| (0..*n).map(move |j| TaskKey::partition(child, j)))
            .collect();
        if sources.len() != count {
            return Err(Error::SchemaMismatch(format!(
                "{key} has {count} partitions but its inputs provide {}",
                sources.len()
            )));
        }
        Ok(sources
            .into_iter()
            .enumerate()
            .map(|(k, src)| (TaskKey::partition(key, k), TaskDescription::alias(src)))
            .collect())
    }
}

/// Open registry of generators keyed by node kind.
#[derive(Clone)]
pub struct GeneratorRegistry {
    handlers: HashMap<NodeKind, Arc<dyn GenerateTasks>>,
    fallback: Arc<dyn GenerateTasks>,
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl GeneratorRegistry {
    /// Registry where every node uses [`PartitionWiseTasks`].
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(PartitionWiseTasks),
        }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register(NodeKind::Scan, ScanTasks);
        reg.register(NodeKind::Union, UnionTasks);
        reg.register(NodeKind::Join, BroadcastJoinTasks);
        reg
    }

    pub fn register(
        &mut self,
        kind: NodeKind,
        generator: impl GenerateTasks + 'static,
    ) -> Option<Arc<dyn GenerateTasks>> {
        self.handlers.insert(kind, Arc::new(generator))
    }

    /// Build the task graph of a lowered plan.
    pub fn generate(&self, lowered: &LoweredPlan, config: &EngineConfig) -> Result<TaskGraph> {
        let mut graph = TaskGraph::new(config.clone());
        self.visit(&lowered.plan, &lowered.partitions, config, &mut graph)?;
        debug!(
            tasks = graph.len(),
            nodes = graph.bindings().count(),
            "generated task graph"
        );
        Ok(graph)
    }

    fn visit(
        &self,
        node: &LogicalPlan,
        partitions: &PartitionMap,
        config: &EngineConfig,
        graph: &mut TaskGraph,
    ) -> Result<NodeKey> {
        let mut inputs = Vec::with_capacity(node.arity());
        for child in node.children() {
            let child_key = self.visit(child, partitions, config, graph)?;
            let n = partitions.get(&child_key)?.count();
            inputs.push((child_key, n));
        }
        let keys: Vec<NodeKey> = inputs.iter().map(|(k, _)| k.clone()).collect();
        let key = NodeKey::derive(node, &keys)?;
        if graph.is_bound(&key) {
            // Shared subtree, already generated.
            return Ok(key);
        }

        let info = partitions.get(&key)?;
        let handler = self.handlers.get(&node.kind()).unwrap_or(&self.fallback);
        let entries = {
            let ctx = GenerateContext {
                config,
                graph: &*graph,
                output: info,
                inputs: &inputs,
            };
            handler.generate(node, &key, &ctx)?
        };
        trace!(node = %key, tasks = entries.len(), "generated node tasks");

        graph.bind(key.clone(), node.clone())?;
        graph.extend(entries)?;
        ensure_outputs(graph, &key, info)?;
        Ok(key)
    }
}

/// Every output partition `(key, 0..count)` must exist after generation.
pub fn ensure_outputs(graph: &TaskGraph, key: &NodeKey, info: PartitionInfo) -> Result<()> {
    match info.keys(key).find(|k| !graph.contains(k)) {
        Some(missing) => Err(Error::coverage(
            key.as_str(),
            format!("generator did not emit output task {missing}"),
        )),
        None => Ok(()),
    }
}

/// Build the task graph of a lowered plan with the built-in generators.
pub fn generate_task_graph(lowered: &LoweredPlan, config: &EngineConfig) -> Result<TaskGraph> {
    GeneratorRegistry::with_defaults().generate(lowered, config)
}
