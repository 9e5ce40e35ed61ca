//! YAML plan documents compiled end to end.

use shardplan::{compile, parse_yaml_plan, Error, Strategy};

const BROADCAST_JOIN: &str = r#"
config:
  max_rows_per_partition: 100
plan:
  op: with_columns
  columns:
    - name: big
      expr: { BinOp: { op: Gt, left: { Col: total }, right: { Literal: { F64: 10.0 } } } }
  input:
    op: join
    how: inner
    left_on: [id]
    right_on: [id]
    left:
      op: scan
      source: "data/orders.parquet"
      num_rows: 400
      schema:
        - { name: id, type: Int64 }
        - { name: total, type: Float64, nullable: true }
    right:
      op: scan
      source: "data/users.parquet"
      num_rows: 150
      schema:
        - { name: id, type: Int64 }
        - { name: name, type: Utf8 }
"#;

#[test]
fn test_yaml_join_compiles_to_broadcast() {
    let parsed = parse_yaml_plan(BROADCAST_JOIN).unwrap();
    assert_eq!(parsed.config.max_rows_per_partition, 100);
    let q = compile(&parsed.plan, &parsed.config).unwrap();
    assert_eq!(q.output_partitions().unwrap().count(), 4);
    assert_eq!(q.plan.strategy(), Strategy::PartitionWise);
    // 4 + 2 scan tasks, 4 x (2 + 1) join tasks, 4 hstack tasks
    assert_eq!(q.graph.len(), 6 + 12 + 4);
}

#[test]
fn test_yaml_group_by_over_partitions_is_rejected() {
    let yaml = r#"
config: { max_rows_per_partition: 10 }
plan:
  op: group_by
  keys: [ { name: k } ]
  aggs:
    - name: n
      expr: { Agg: { name: count, expr: { Col: k } } }
  input:
    op: scan
    source: t
    num_rows: 25
    schema: [ { name: k, type: Utf8 } ]
"#;
    let parsed = parse_yaml_plan(yaml).unwrap();
    match compile(&parsed.plan, &parsed.config) {
        Err(Error::UnsupportedPartitioning { node, .. }) => assert_eq!(node, "groupby"),
        other => panic!("expected UnsupportedPartitioning, got {other:?}"),
    }
}

#[test]
fn test_yaml_sorted_slice_on_one_partition() {
    let yaml = r#"
plan:
  op: slice
  offset: 0
  length: 10
  input:
    op: sort
    by: [score]
    descending: [true]
    input:
      op: scan
      source: scores
      num_rows: 50
      schema: [ { name: score, type: f64 } ]
"#;
    let parsed = parse_yaml_plan(yaml).unwrap();
    let q = compile(&parsed.plan, &parsed.config).unwrap();
    assert_eq!(q.outputs.len(), 1);
    assert_eq!(q.graph.len(), 3);
}

#[test]
fn test_yaml_union_and_projection() {
    let yaml = r#"
config: { max_rows_per_partition: 10 }
plan:
  op: project
  columns: [a]
  input:
    op: union
    inputs:
      - { op: scan, source: x, num_rows: 20, schema: [ { name: a, type: Int64 }, { name: b, type: Int64 } ] }
      - { op: scan, source: y, num_rows: 5,  schema: [ { name: a, type: Int64 }, { name: b, type: Int64 } ] }
"#;
    let parsed = parse_yaml_plan(yaml).unwrap();
    assert_eq!(parsed.plan.schema().len(), 1);
    let q = compile(&parsed.plan, &parsed.config).unwrap();
    assert_eq!(q.outputs.len(), 3);
}
