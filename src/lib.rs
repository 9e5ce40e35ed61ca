#![forbid(unsafe_code)]
//! shardplan: lower single-partition query plans into partition-aware plans
//! and build the task graphs that execute them.
//!
//! ```text
//! LogicalPlan ──lower──▶ LogicalPlan + PartitionMap ──generate──▶ TaskGraph
//! ```
//!
//! The pieces live in three crates re-exported here: `shardplan_core` (plan
//! nodes, expressions, keys, config, errors), `shardplan_planner` (partition
//! counts and lowering) and `shardplan_graph` (task generation, ordering,
//! verification).

pub use shardplan_core;
pub use shardplan_graph;
pub use shardplan_planner;

pub use shardplan_core::prelude::*;
pub use shardplan_graph::{
    compile, verify_graph, CompiledQuery, Compiler, GeneratorRegistry, TaskArg, TaskDescription,
    TaskFn, TaskGraph,
};
pub use shardplan_planner::{
    lower_plan, parse_yaml_plan, LoweredPlan, LoweringRegistry, PartitionInfo, PartitionMap,
};
