#![forbid(unsafe_code)]
//! shardplan-graph: partition-aware plan → executable task graph.
//!
//! Design:
//! - `TaskGraph` is an append-only map `TaskKey -> TaskDescription`; every
//!   entry is inserted after the keys it references, so it is acyclic by
//!   construction.
//! - `generate` walks the lowered plan bottom-up and dispatches per node
//!   kind through an open `GeneratorRegistry`; the default evaluates each
//!   partition against the same-index partition of every child.
//! - `broadcast` emits broadcast-join tasks, with fan-in concatenation when
//!   the broadcast side has several partitions.
//! - `order` gives a deterministic topological order and stage grouping.
//! - `compile` ties lowering, generation and `verify` together.

pub mod broadcast;
pub mod compile;
pub mod generate;
pub mod graph;
pub mod order;
pub mod task;
pub mod verify;

pub use broadcast::BroadcastJoinTasks;
pub use compile::{compile, CompiledQuery, Compiler};
pub use generate::{
    generate_task_graph, GenerateContext, GenerateTasks, GeneratorRegistry, PartitionWiseTasks,
    ScanTasks, TaskEntries, UnionTasks,
};
pub use graph::TaskGraph;
pub use task::{TaskArg, TaskDescription, TaskFn};
pub use verify::{assert_topological, verify_graph, verify_outputs};
