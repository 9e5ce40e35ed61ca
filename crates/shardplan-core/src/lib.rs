#![forbid(unsafe_code)]
//! shardplan-core: shared vocabulary for partition lowering and task graphs.
//!
//! Contents:
//! - `LogicalPlan` nodes and `Expr` trees (immutable, structurally keyed)
//! - `NodeKey` / `TaskKey` identifiers
//! - `EngineConfig`, the per-query config threaded into every task
//! - the crate-wide `Error`
//!
//! No lowering or graph logic lives here; see `shardplan-planner` and
//! `shardplan-graph`.

pub mod config;
pub mod dag;
pub mod error;
pub mod expr;
pub mod hash;
pub mod id;
pub mod prelude;
pub mod schema;
pub mod types;

pub use error::{Error, Result};

/// Crate version, recorded by callers that log compiled graphs.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
