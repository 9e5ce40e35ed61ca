//! Deterministic evaluation order over a task graph.
//!
//! Kahn's algorithm with an ordered ready set: among tasks whose inputs are
//! all done, the smallest key goes next. The same graph always yields the
//! same order.

use std::collections::{BTreeSet, HashMap};

use shardplan_core::error::{Error, Result};
use shardplan_core::id::TaskKey;

use crate::graph::TaskGraph;

impl TaskGraph {
    /// Every key appears after all keys it references.
    ///
    /// Fails on dangling references or cycles (neither can be built through
    /// `insert`, but graphs assembled elsewhere are checked the same way).
    pub fn evaluation_order(&self) -> Result<Vec<&TaskKey>> {
        let mut pending: HashMap<&TaskKey, usize> = HashMap::with_capacity(self.len());
        let mut dependents: HashMap<&TaskKey, Vec<&TaskKey>> = HashMap::new();

        for (key, task) in self.iter() {
            let deps: BTreeSet<&TaskKey> = task.references().collect();
            for dep in &deps {
                if !self.contains(dep) {
                    return Err(Error::SchemaMismatch(format!(
                        "task {key} references missing task {dep}"
                    )));
                }
                dependents.entry(*dep).or_default().push(key);
            }
            pending.insert(key, deps.len());
        }

        let mut ready: BTreeSet<&TaskKey> = pending
            .iter()
            .filter(|(_, n)| **n == 0)
            .map(|(k, _)| *k)
            .collect();
        let mut order = Vec::with_capacity(self.len());

        while let Some(key) = ready.pop_first() {
            order.push(key);
            for next in dependents.get(key).into_iter().flatten() {
                if let Some(n) = pending.get_mut(next) {
                    *n -= 1;
                    if *n == 0 {
                        ready.insert(*next);
                    }
                }
            }
        }

        if order.len() != self.len() {
            return Err(Error::Invariant(format!(
                "task graph has a cycle ({} of {} tasks orderable)",
                order.len(),
                self.len()
            )));
        }
        Ok(order)
    }

    /// Tasks grouped by dependency depth. Tasks within one stage do not
    /// depend on each other.
    pub fn stages(&self) -> Result<Vec<Vec<&TaskKey>>> {
        let order = self.evaluation_order()?;
        let mut depth: HashMap<&TaskKey, usize> = HashMap::with_capacity(order.len());
        let mut stages: Vec<Vec<&TaskKey>> = Vec::new();
        for key in order {
            let d = self
                .get(key)
                .into_iter()
                .flat_map(|t| t.references())
                .filter_map(|r| depth.get(r).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(key, d);
            if stages.len() <= d {
                stages.resize_with(d + 1, Vec::new);
            }
            stages[d].push(key);
        }
        Ok(stages)
    }
}
