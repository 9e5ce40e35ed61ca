//! Task descriptions: what the executor runs for one `TaskKey`.

use serde::{Deserialize, Serialize};

use shardplan_core::id::{NodeKey, TaskKey};

/// The function a task invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFn {
    /// Per-partition evaluator of the node bound under this key.
    Evaluate(NodeKey),
    /// Concatenate the referenced results in list order.
    Concat,
    /// Forward one referenced result unchanged.
    Alias,
}

/// One argument of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TaskArg {
    /// The query's shared `EngineConfig`.
    Config,
    Literal(serde_json::Value),
    /// Result of another task; resolved by the executor before this task runs.
    Key(TaskKey),
    /// Ordered results of several tasks.
    Keys(Vec<TaskKey>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription {
    pub func: TaskFn,
    pub args: Vec<TaskArg>,
}

impl TaskDescription {
    pub fn evaluate(node: &NodeKey, args: Vec<TaskArg>) -> Self {
        Self {
            func: TaskFn::Evaluate(node.clone()),
            args,
        }
    }

    pub fn concat(parts: Vec<TaskKey>) -> Self {
        Self {
            func: TaskFn::Concat,
            args: vec![TaskArg::Keys(parts)],
        }
    }

    pub fn alias(target: TaskKey) -> Self {
        Self {
            func: TaskFn::Alias,
            args: vec![TaskArg::Key(target)],
        }
    }

    /// Every task key this task depends on, in argument order.
    pub fn references(&self) -> impl Iterator<Item = &TaskKey> {
        self.args.iter().flat_map(|a| match a {
            TaskArg::Key(k) => std::slice::from_ref(k).iter(),
            TaskArg::Keys(ks) => ks.iter(),
            TaskArg::Config | TaskArg::Literal(_) => [].iter(),
        })
    }

    pub fn evaluates(&self) -> Option<&NodeKey> {
        match &self.func {
            TaskFn::Evaluate(node) => Some(node),
            TaskFn::Concat | TaskFn::Alias => None,
        }
    }
}
