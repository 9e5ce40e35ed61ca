//! Structural checks on a finished task graph.

use shardplan_core::error::{Error, Result};
use shardplan_core::id::{NodeKey, TaskKey};
use shardplan_planner::partition::PartitionInfo;

use crate::graph::TaskGraph;

/// No dangling references, no cycles, and every evaluated node is bound.
pub fn verify_graph(graph: &TaskGraph) -> Result<()> {
    // Reports dangling references and cycles.
    graph.evaluation_order()?;
    for (key, task) in graph.iter() {
        if let Some(node) = task.evaluates() {
            if !graph.is_bound(node) {
                return Err(Error::Invariant(format!(
                    "task {key} evaluates {node}, which has no bound plan node"
                )));
            }
        }
    }
    Ok(())
}

/// The graph holds exactly the output keys `(node, 0..count)`, and nothing
/// past `count`.
pub fn verify_outputs(graph: &TaskGraph, node: &NodeKey, info: PartitionInfo) -> Result<()> {
    if let Some(missing) = info.keys(node).find(|k| !graph.contains(k)) {
        return Err(Error::SchemaMismatch(format!(
            "output partition {missing} is missing"
        )));
    }
    let extra = graph
        .tasks_for(node)
        .filter_map(|(k, _)| match k {
            TaskKey::Partition { index, .. } if *index >= info.count() => Some(k),
            _ => None,
        })
        .next();
    match extra {
        Some(k) => Err(Error::SchemaMismatch(format!(
            "{node} has {} partitions but the graph also holds {k}",
            info.count()
        ))),
        None => Ok(()),
    }
}

/// Panics if `order` does not place every task after its references.
/// Meant for tests.
pub fn assert_topological(graph: &TaskGraph, order: &[&TaskKey]) {
    use std::collections::HashMap;
    let pos: HashMap<&TaskKey, usize> = order.iter().enumerate().map(|(i, k)| (*k, i)).collect();
    assert_eq!(pos.len(), graph.len(), "order must cover every task once");
    for (key, task) in graph.iter() {
        let at = pos[key];
        for dep in task.references() {
            assert!(
                pos[dep] < at,
                "{dep} must come before {key} in the evaluation order"
            );
        }
    }
}
