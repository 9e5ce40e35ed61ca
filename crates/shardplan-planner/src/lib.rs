#![forbid(unsafe_code)]
//! shardplan-planner: single-partition logical plan → partition-aware plan.
//!
//! Design:
//! - `partition`: `PartitionInfo` per node and the `PartitionMap` query surface.
//! - `classify`: which expressions can run independently per partition.
//! - `lower`: the bottom-up dispatch over an open `LoweringRegistry`; node
//!   kinds without a handler inherit their single child's count.
//! - Built-in handlers: `scan` (row-range splitting), `select` (Select and
//!   HStack), `join` (broadcast side selection), `union`, and `single` for
//!   operators that need the whole input.
//! - `dsl`: a small YAML plan format, handy for tests and tooling.
//!
//! Lowering never mutates its input and stops at the first error; there is
//! no partially lowered result.

pub mod classify;
pub mod dsl;
pub mod join;
pub mod lower;
pub mod partition;
pub mod scan;
pub mod select;
pub mod single;
pub mod union;

pub use classify::{check_partition_wise, is_partition_wise, PARTITION_WISE};
pub use dsl::yaml::{parse_yaml_plan, parse_yaml_plan_with, ParsedPlan};
pub use join::choose_strategy;
pub use lower::{
    lower_plan, LowerNode, Lowered, LoweredPlan, LoweringContext, LoweringRegistry, PassThrough,
};
pub use partition::{PartitionInfo, PartitionMap};
pub use scan::scan_ranges;
