//! One-call compilation: lower, generate, verify.

use tracing::info;

use shardplan_core::config::EngineConfig;
use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::Result;
use shardplan_core::id::{NodeKey, TaskKey};
use shardplan_core::VERSION;
use shardplan_planner::lower::LoweringRegistry;
use shardplan_planner::partition::{PartitionInfo, PartitionMap};

use crate::generate::GeneratorRegistry;
use crate::graph::TaskGraph;
use crate::task::TaskDescription;
use crate::verify::{verify_graph, verify_outputs};

/// Everything an executor needs to run one query.
#[derive(Debug, Clone)]
pub struct CompiledQuery {
    /// The lowered plan; `graph` binds every node of it by key.
    pub plan: LogicalPlan,
    pub partitions: PartitionMap,
    pub graph: TaskGraph,
    /// Root result keys `(root, 0..count)`, in partition order.
    pub outputs: Vec<TaskKey>,
    root: NodeKey,
}

impl CompiledQuery {
    pub fn root_key(&self) -> &NodeKey {
        &self.root
    }

    pub fn output_partitions(&self) -> Result<PartitionInfo> {
        self.partitions.get(&self.root)
    }

    /// Single key holding the whole result.
    ///
    /// With one output partition that partition is the result. Otherwise a
    /// `Collect(root)` task concatenating all outputs is added.
    pub fn with_collect(&mut self) -> Result<TaskKey> {
        if let [only] = self.outputs.as_slice() {
            return Ok(only.clone());
        }
        let key = TaskKey::collect(&self.root);
        self.graph
            .insert(key.clone(), TaskDescription::concat(self.outputs.clone()))?;
        Ok(key)
    }
}

/// Lowering and generation registries used together.
#[derive(Clone, Default)]
pub struct Compiler {
    pub lowering: LoweringRegistry,
    pub generators: GeneratorRegistry,
}

impl Compiler {
    pub fn new(lowering: LoweringRegistry, generators: GeneratorRegistry) -> Self {
        Self {
            lowering,
            generators,
        }
    }

    pub fn compile(&self, plan: &LogicalPlan, config: &EngineConfig) -> Result<CompiledQuery> {
        let lowered = self.lowering.lower(plan, config)?;
        let graph = self.generators.generate(&lowered, config)?;
        let root = lowered.root_key().clone();
        let output = lowered.output_partitions()?;

        verify_graph(&graph)?;
        verify_outputs(&graph, &root, output)?;

        info!(
            version = VERSION,
            root = %root,
            nodes = lowered.partitions.len(),
            tasks = graph.len(),
            output_partitions = output.count(),
            "compiled query"
        );
        Ok(CompiledQuery {
            outputs: output.keys(&root).collect(),
            plan: lowered.plan,
            partitions: lowered.partitions,
            graph,
            root,
        })
    }
}

/// Compile `plan` with the built-in lowering handlers and generators.
pub fn compile(plan: &LogicalPlan, config: &EngineConfig) -> Result<CompiledQuery> {
    Compiler::default().compile(plan, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskFn;
    use shardplan_core::schema::{DataType, Field, Schema};

    fn scan(rows: u64) -> LogicalPlan {
        LogicalPlan::scan(
            "t",
            Schema::new(vec![Field::new("x", DataType::Int64, false)]),
            Some(rows),
        )
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default().with_max_rows_per_partition(10)
    }

    #[test]
    fn collect_concatenates_all_outputs() {
        let mut q = compile(&scan(30), &cfg()).unwrap();
        assert_eq!(q.output_partitions().unwrap().count(), 3);
        let key = q.with_collect().unwrap();
        assert_eq!(key, TaskKey::collect(q.root_key()));
        let task = q.graph.get(&key).unwrap();
        assert_eq!(task.func, TaskFn::Concat);
        assert_eq!(task.references().cloned().collect::<Vec<_>>(), q.outputs);
        // adding it twice is harmless
        assert_eq!(q.with_collect().unwrap(), key);
        verify_graph(&q.graph).unwrap();
    }

    #[test]
    fn single_output_is_its_own_result() {
        let mut q = compile(&scan(5), &cfg()).unwrap();
        let before = q.graph.len();
        assert_eq!(q.with_collect().unwrap(), q.outputs[0]);
        assert_eq!(q.graph.len(), before);
    }

    #[test]
    fn compiled_graph_is_deterministic() {
        let a = compile(&scan(95), &cfg()).unwrap();
        let b = compile(&scan(95), &cfg()).unwrap();
        assert_eq!(a.graph.fingerprint().unwrap(), b.graph.fingerprint().unwrap());
        assert_eq!(
            a.graph.evaluation_order().unwrap(),
            b.graph.evaluation_order().unwrap()
        );
    }
}
