//! The task graph handed to the executor.
//!
//! Entries are only ever added, and only after every key they reference is
//! already present, so the graph is a DAG by construction. `BTreeMap`s keep
//! iteration (and therefore fingerprints) deterministic.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::Serialize;

use shardplan_core::config::EngineConfig;
use shardplan_core::dag::LogicalPlan;
use shardplan_core::error::{Error, Result};
use shardplan_core::hash::{hash_serde, Hash256};
use shardplan_core::id::{NodeKey, TaskKey};

use crate::task::TaskDescription;

#[derive(Debug, Clone, PartialEq)]
pub struct TaskGraph {
    tasks: BTreeMap<TaskKey, TaskDescription>,
    bindings: BTreeMap<NodeKey, LogicalPlan>,
    config: EngineConfig,
}

impl TaskGraph {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            tasks: BTreeMap::new(),
            bindings: BTreeMap::new(),
            config,
        }
    }

    /// Shared config every `TaskArg::Config` resolves to.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register the node that `TaskFn::Evaluate(key)` tasks run.
    pub fn bind(&mut self, key: NodeKey, node: LogicalPlan) -> Result<()> {
        match self.bindings.entry(key) {
            Entry::Occupied(e) if e.get() != &node => Err(Error::Invariant(format!(
                "{} is already bound to a different node",
                e.key()
            ))),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(node);
                Ok(())
            }
        }
    }

    pub fn binding(&self, key: &NodeKey) -> Option<&LogicalPlan> {
        self.bindings.get(key)
    }

    pub fn is_bound(&self, key: &NodeKey) -> bool {
        self.bindings.contains_key(key)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&NodeKey, &LogicalPlan)> {
        self.bindings.iter()
    }

    /// Add one task. Every key it references must already be in the graph.
    pub fn insert(&mut self, key: TaskKey, task: TaskDescription) -> Result<()> {
        if let Some(missing) = task.references().find(|r| !self.tasks.contains_key(*r)) {
            return Err(Error::SchemaMismatch(format!(
                "task {key} references {missing}, which is not in the graph"
            )));
        }
        if task.references().any(|r| r == &key) {
            return Err(Error::Invariant(format!("task {key} references itself")));
        }
        match self.tasks.entry(key) {
            Entry::Occupied(e) if e.get() != &task => Err(Error::Invariant(format!(
                "task {} already exists with a different description",
                e.key()
            ))),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(task);
                Ok(())
            }
        }
    }

    /// Insert entries in order; a fan-in task must follow its sub-tasks.
    pub fn extend(
        &mut self,
        entries: impl IntoIterator<Item = (TaskKey, TaskDescription)>,
    ) -> Result<()> {
        for (key, task) in entries {
            self.insert(key, task)?;
        }
        Ok(())
    }

    /// Fold another graph into this one. Both must carry the same config.
    pub fn merge(&mut self, other: TaskGraph) -> Result<()> {
        if other.config != self.config {
            return Err(Error::Config(
                "cannot merge task graphs built with different configs".into(),
            ));
        }
        let order: Vec<TaskKey> = other.evaluation_order()?.into_iter().cloned().collect();
        let TaskGraph {
            mut tasks,
            bindings,
            ..
        } = other;
        for (key, node) in bindings {
            self.bind(key, node)?;
        }
        for key in order {
            if let Some(task) = tasks.remove(&key) {
                self.insert(key, task)?;
            }
        }
        Ok(())
    }

    pub fn get(&self, key: &TaskKey) -> Option<&TaskDescription> {
        self.tasks.get(key)
    }

    pub fn contains(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TaskKey, &TaskDescription)> {
        self.tasks.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.tasks.keys()
    }

    /// Tasks belonging to `node`, in key order.
    pub fn tasks_for<'a>(
        &'a self,
        node: &'a NodeKey,
    ) -> impl Iterator<Item = (&'a TaskKey, &'a TaskDescription)> + 'a {
        self.tasks.iter().filter(move |(k, _)| k.node() == node)
    }

    /// Stable digest of all tasks and bindings.
    pub fn fingerprint(&self) -> Result<Hash256> {
        #[derive(Serialize)]
        struct View<'a> {
            tasks: Vec<(&'a TaskKey, &'a TaskDescription)>,
            bindings: Vec<(&'a NodeKey, &'a LogicalPlan)>,
            config: &'a EngineConfig,
        }
        hash_serde(&View {
            tasks: self.tasks.iter().collect(),
            bindings: self.bindings.iter().collect(),
            config: &self.config,
        })
    }
}
