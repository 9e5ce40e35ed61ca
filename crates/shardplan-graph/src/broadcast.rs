//! Broadcast join tasks.
//!
//! With N driving partitions and M broadcast partitions, driving partition
//! `i` is joined against every broadcast partition `j`. For M > 1 the
//! per-`j` results are fan-in sub-tasks `(node, i, j)` and `(node, i)`
//! concatenates them in ascending `j`.

use serde_json::Value;

use shardplan_core::dag::{LogicalPlan, Strategy};
use shardplan_core::error::{Error, Result};
use shardplan_core::id::{NodeKey, TaskKey};
use shardplan_planner::join::output_count;

use crate::generate::{GenerateContext, GenerateTasks, PartitionWiseTasks, TaskEntries};
use crate::task::{TaskArg, TaskDescription};

#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastJoinTasks;

impl GenerateTasks for BroadcastJoinTasks {
    fn generate(
        &self,
        node: &LogicalPlan,
        key: &NodeKey,
        ctx: &GenerateContext<'_>,
    ) -> Result<TaskEntries> {
        let LogicalPlan::Join {
            left_on,
            right_on,
            join_type,
            strategy,
            ..
        } = node
        else {
            return Err(Error::coverage(
                node.kind().name(),
                "broadcast generator received a non-join node",
            ));
        };
        if !strategy.is_broadcast() {
            return PartitionWiseTasks.generate(node, key, ctx);
        }

        let (left_key, l) = ctx.input(0)?;
        let (right_key, r) = ctx.input(1)?;
        let count = ctx.count();
        if output_count(*strategy, l, r) != count {
            return Err(Error::SchemaMismatch(format!(
                "{key} has {count} partitions but a {strategy:?} over {l} x {r} gives {}",
                output_count(*strategy, l, r)
            )));
        }

        let (n, m) = match strategy {
            Strategy::RightBroadcast => (l, r),
            _ => (r, l),
        };
        let shared = [
            TaskArg::Config,
            TaskArg::Literal(serde_json::to_value(left_on)?),
            TaskArg::Literal(serde_json::to_value(right_on)?),
            TaskArg::Literal(Value::String(join_type.as_str().to_string())),
        ];
        let join_task = |i: usize, j: usize| {
            let (li, ri) = match strategy {
                Strategy::RightBroadcast => (i, j),
                _ => (j, i),
            };
            let mut args = shared.to_vec();
            args.push(TaskArg::Key(TaskKey::partition(left_key, li)));
            args.push(TaskArg::Key(TaskKey::partition(right_key, ri)));
            TaskDescription::evaluate(key, args)
        };

        let mut entries = Vec::with_capacity(if m == 1 { n } else { n * (m + 1) });
        for i in 0..n {
            if m == 1 {
                entries.push((TaskKey::partition(key, i), join_task(i, 0)));
                continue;
            }
            let parts: Vec<TaskKey> = (0..m).map(|j| TaskKey::fanin(key, i, j)).collect();
            for (j, part) in parts.iter().enumerate() {
                entries.push((part.clone(), join_task(i, j)));
            }
            entries.push((TaskKey::partition(key, i), TaskDescription::concat(parts)));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::compile;
    use crate::graph::TaskGraph;
    use crate::task::TaskFn;
    use shardplan_planner::partition::PartitionInfo;
    use shardplan_core::config::EngineConfig;
    use shardplan_core::dag::JoinType;
    use shardplan_core::expr::Expr;
    use shardplan_core::schema::{DataType, Field, Schema};

    fn scan(name: &str, rows: u64) -> LogicalPlan {
        LogicalPlan::scan(
            name,
            Schema::new(vec![Field::new("id", DataType::Int64, false)]),
            Some(rows),
        )
    }

    fn join(l: u64, r: u64, how: JoinType) -> LogicalPlan {
        LogicalPlan::join(
            scan("l", l),
            scan("r", r),
            vec![Expr::col("id")],
            vec![Expr::col("id")],
            how,
        )
    }

    fn cfg() -> EngineConfig {
        EngineConfig::default().with_max_rows_per_partition(10)
    }

    fn input_keys(task: &TaskDescription) -> Vec<TaskKey> {
        task.references().cloned().collect()
    }

    #[test]
    fn fan_in_concatenates_sub_tasks_in_order() {
        // left 2 partitions drives, right 3 is broadcast
        let (l, r) = (scan("l", 20), scan("r", 25));
        let node = LogicalPlan::join(
            l.clone(),
            r.clone(),
            vec![Expr::col("id")],
            vec![Expr::col("id")],
            JoinType::Inner,
        )
        .with_strategy(Strategy::RightBroadcast);
        let (lk, rk, jk) = (
            NodeKey::of(&l).unwrap(),
            NodeKey::of(&r).unwrap(),
            NodeKey::of(&node).unwrap(),
        );
        let inputs = [(lk.clone(), 2), (rk.clone(), 3)];
        let config = cfg();
        let graph = TaskGraph::new(config.clone());
        let ctx = GenerateContext {
            config: &config,
            graph: &graph,
            output: PartitionInfo::new(2).unwrap(),
            inputs: &inputs,
        };

        let entries = BroadcastJoinTasks.generate(&node, &jk, &ctx).unwrap();
        assert_eq!(entries.len(), 2 * (3 + 1));
        for i in 0..2 {
            let block = &entries[i * 4..(i + 1) * 4];
            let subs: Vec<TaskKey> = (0..3).map(|j| TaskKey::fanin(&jk, i, j)).collect();
            for (j, (key, task)) in block[..3].iter().enumerate() {
                assert_eq!(key, &subs[j]);
                assert_eq!(
                    input_keys(task),
                    vec![TaskKey::partition(&lk, i), TaskKey::partition(&rk, j)]
                );
            }
            let (key, concat) = &block[3];
            assert_eq!(key, &TaskKey::partition(&jk, i));
            assert_eq!(concat.func, TaskFn::Concat);
            assert_eq!(input_keys(concat), subs);
        }
    }

    #[test]
    fn mismatched_output_count_is_rejected() {
        let node = join(20, 25, JoinType::Inner).with_strategy(Strategy::RightBroadcast);
        let LogicalPlan::Join { left, right, .. } = &node else {
            panic!("expected join");
        };
        let jk = NodeKey::of(&node).unwrap();
        let inputs = [
            (NodeKey::of(left).unwrap(), 2),
            (NodeKey::of(right).unwrap(), 3),
        ];
        let config = cfg();
        let graph = TaskGraph::new(config.clone());
        let ctx = GenerateContext {
            config: &config,
            graph: &graph,
            output: PartitionInfo::new(3).unwrap(),
            inputs: &inputs,
        };
        assert!(matches!(
            BroadcastJoinTasks.generate(&node, &jk, &ctx),
            Err(Error::SchemaMismatch(_))
        ));
    }

    #[test]
    fn compiled_fan_in_is_wired_through_the_graph() {
        // right join over 4 x 1: the right side drives, the left is broadcast
        let q = compile(&join(40, 5, JoinType::Right), &cfg()).unwrap();
        assert_eq!(q.plan.strategy(), Strategy::LeftBroadcast);
        assert_eq!(q.outputs.len(), 1);
        let jk = q.root_key();
        assert_eq!(q.graph.tasks_for(jk).count(), 4 + 1);
        let LogicalPlan::Join { left, right, .. } = &q.plan else {
            panic!("expected join");
        };
        let t3 = q.graph.get(&TaskKey::fanin(jk, 0, 3)).unwrap();
        assert_eq!(
            input_keys(t3),
            vec![
                TaskKey::partition(&NodeKey::of(left).unwrap(), 3),
                TaskKey::partition(&NodeKey::of(right).unwrap(), 0),
            ]
        );
        assert!(!q.graph.contains(&TaskKey::partition(jk, 1)));
    }

    #[test]
    fn single_broadcast_partition_needs_no_fan_in() {
        let q = compile(&join(40, 5, JoinType::Inner), &cfg()).unwrap();
        assert_eq!(q.plan.strategy(), Strategy::RightBroadcast);
        let keys: Vec<&TaskKey> = q.graph.tasks_for(q.root_key()).map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 4);
        assert!(keys.iter().all(|k| matches!(k, TaskKey::Partition { .. })));
    }

    #[test]
    fn join_task_carries_keys_and_kind_as_literals() {
        let q = compile(&join(20, 5, JoinType::Left), &cfg()).unwrap();
        let task = q.graph.get(&TaskKey::partition(q.root_key(), 1)).unwrap();
        assert_eq!(task.evaluates(), Some(q.root_key()));
        assert_eq!(task.args[0], TaskArg::Config);
        assert_eq!(
            task.args[1],
            TaskArg::Literal(serde_json::to_value(vec![Expr::col("id")]).unwrap())
        );
        assert_eq!(task.args[3], TaskArg::Literal(Value::String("left".into())));
        assert_eq!(task.args.len(), 6);
    }

    #[test]
    fn plain_join_uses_one_partition_wise_task() {
        let q = compile(&join(5, 5, JoinType::Full), &cfg()).unwrap();
        assert_eq!(q.plan.strategy(), Strategy::Plain);
        assert_eq!(q.graph.tasks_for(q.root_key()).count(), 1);
    }
}
