use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use shardplan::{
    compile, lower_plan, DataType, EngineConfig, Expr, Field, JoinType, LogicalPlan, NamedExpr,
    Schema,
};

fn schema() -> Schema {
    Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("value", DataType::Float64, true),
    ])
}

/// A left-deep chain of `depth` broadcast joins over a wide fact scan.
fn join_chain(depth: usize, fact_rows: u64) -> LogicalPlan {
    let project = |p: LogicalPlan| {
        LogicalPlan::select(
            p,
            vec![
                NamedExpr::new("id", Expr::col("id")),
                NamedExpr::new("value", Expr::col("value")),
            ],
        )
    };
    let mut plan = project(LogicalPlan::scan("fact", schema(), Some(fact_rows)));
    for i in 0..depth {
        let dim = LogicalPlan::scan(format!("dim{i}"), schema(), Some(2_500));
        plan = project(LogicalPlan::join(
            plan,
            dim,
            vec![Expr::col("id")],
            vec![Expr::col("id")],
            JoinType::Inner,
        ));
    }
    plan
}

fn bench_lowering(c: &mut Criterion) {
    let config = EngineConfig::default().with_max_rows_per_partition(1_000);
    let mut group = c.benchmark_group("lower");
    for depth in [4, 16, 64] {
        let plan = join_chain(depth, 64_000);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &plan, |b, plan| {
            b.iter(|| lower_plan(plan, &config).unwrap())
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let config = EngineConfig::default().with_max_rows_per_partition(1_000);
    let mut group = c.benchmark_group("compile");
    for depth in [4, 16] {
        let plan = join_chain(depth, 64_000);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &plan, |b, plan| {
            b.iter(|| {
                let q = compile(plan, &config).unwrap();
                q.graph.evaluation_order().unwrap().len()
            })
        });
    }
    group.finish();
}

criterion_group!(planning, bench_lowering, bench_compile);
criterion_main!(planning);
