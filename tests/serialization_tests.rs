//! JSON plan interchange: hand-written plans, optional fields, and stats output.

use plan_pruner::plan::{JoinType, PlanBuilder, PlanNode};
use plan_pruner::symbol::DataType;
use plan_pruner::{prune, validate_plan, Expression, Optimizer, OptimizerContext};
use serde_json::json;

fn var(name: &str) -> serde_json::Value {
    json!({ "name": name, "data_type": "bigint" })
}

fn scan_json(id: &str, columns: &[&str]) -> serde_json::Value {
    let assignments: Vec<serde_json::Value> = columns.iter().map(|c| json!([var(c), c])).collect();
    json!({ "type": "table_scan", "id": id, "table": "t", "assignments": assignments })
}

fn sample_plan_json() -> serde_json::Value {
    json!({
        "type": "output",
        "id": "3",
        "column_names": ["x"],
        "output_variables": [var("x")],
        "source": {
            "type": "project",
            "id": "2",
            "assignments": [[
                var("x"),
                { "arithmetic": { "op": "add", "left": { "variable": var("a") }, "right": { "variable": var("b") } } }
            ]],
            "source": {
                "type": "filter",
                "id": "1",
                "predicate": {
                    "comparison": { "op": "gt", "left": { "variable": var("c") }, "right": { "constant": { "bigint": 0 } } }
                },
                "source": scan_json("0", &["a", "b", "c", "d"])
            }
        }
    })
}

#[test]
fn test_hand_written_plan_parses_and_prunes() {
    let plan: PlanNode = serde_json::from_value(sample_plan_json()).expect("Deserialization failed");
    validate_plan(&plan).unwrap();
    assert_eq!(plan.node_count(), 4);

    let pruned = prune(plan).unwrap();
    let scan = pruned.iter().last().unwrap();
    let names: Vec<String> = scan.output_symbols().iter().map(|s| s.to_string()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_pruned_plan_json_roundtrip() {
    let plan: PlanNode = serde_json::from_value(sample_plan_json()).unwrap();
    let pruned = prune(plan).unwrap();

    let json = serde_json::to_string(&pruned).expect("Serialization failed");
    let back: PlanNode = serde_json::from_str(&json).expect("Deserialization failed");
    assert_eq!(back, pruned);
}

#[test]
fn test_node_type_tag_is_snake_case() {
    let mut p = PlanBuilder::new();
    let a = p.variable("a", DataType::Bigint);
    let scan = p.table_scan("t", &[a.clone()]);
    let top_n = p.top_n(scan, 3, &[a]);

    let value = serde_json::to_value(&top_n).unwrap();
    assert_eq!(value["type"], "top_n");
    assert_eq!(value["source"]["type"], "table_scan");
    assert_eq!(value["id"], "1");
}

#[test]
fn test_optional_join_fields_default_when_absent() {
    let join = json!({
        "type": "join",
        "id": "2",
        "join_type": "inner",
        "left": scan_json("0", &["a"]),
        "right": scan_json("1", &["b"]),
        "criteria": [{ "left": var("a"), "right": var("b") }],
        "output_variables": [var("a"), var("b")]
    });
    let plan: PlanNode = serde_json::from_value(join).expect("Deserialization failed");
    match &plan {
        PlanNode::Join(node) => {
            assert_eq!(node.join_type, JoinType::Inner);
            assert!(node.filter.is_none());
            assert!(node.left_hash_variable.is_none());
            assert!(node.distribution_type.is_none());
        }
        other => panic!("expected join, got {}", other.kind()),
    }
    validate_plan(&plan).unwrap();
}

#[test]
fn test_unknown_node_type_is_rejected() {
    let bogus = json!({ "type": "teleport", "id": "0" });
    assert!(serde_json::from_value::<PlanNode>(bogus).is_err());
}

#[test]
fn test_expression_json_shape() {
    let mut p = PlanBuilder::new();
    let a = p.variable("a", DataType::Bigint);
    let expression = Expression::call("abs", vec![Expression::variable(&a)], DataType::Bigint);
    let value = serde_json::to_value(&expression).unwrap();
    assert_eq!(value["call"]["function"], "abs");
    assert_eq!(value["call"]["arguments"][0]["variable"]["name"], "a");
}

#[test]
fn test_optimization_stats_serialize() {
    let plan: PlanNode = serde_json::from_value(sample_plan_json()).unwrap();
    let optimized = Optimizer::default()
        .optimize(plan, &mut OptimizerContext::default())
        .unwrap();

    let value = serde_json::to_value(&optimized.stats).unwrap();
    assert_eq!(value["nodes_before"], 4);
    assert_eq!(value["nodes_after"], 4);
    assert_eq!(value["nodes_elided"], 0);
    assert_eq!(value["passes"][0], "prune_unreferenced_outputs");
    assert!(value["elapsed"].is_u64());
}
