//! Concurrent Optimization Tests
//!
//! Tests for:
//! - Batch optimization on the rayon pool
//! - One failing plan not affecting the rest of a batch
//! - A shared optimizer used from many threads

use plan_pruner::expr::Expression;
use plan_pruner::plan::{PlanBuilder, PlanNode};
use plan_pruner::symbol::DataType;
use plan_pruner::{prune, Optimizer, OptimizerConfig, OptimizerContext, PlanError};
use std::sync::Arc;
use std::thread;

// ============================================================================
// Test Helpers
// ============================================================================

/// `SELECT x FROM (SELECT a AS x, b AS y FROM t)`, with `width` extra scan columns
fn wide_plan(width: usize) -> PlanNode {
    let mut p = PlanBuilder::new();
    let columns: Vec<_> = (0..width.max(2)).map(|_| p.variable("c", DataType::Bigint)).collect();
    let x = p.variable("x", DataType::Bigint);
    let y = p.variable("y", DataType::Bigint);
    let scan = p.table_scan("t", &columns);
    let project = p.project(
        scan,
        [
            (x.clone(), Expression::variable(&columns[0])),
            (y, Expression::variable(&columns[1])),
        ],
    );
    p.output(project, &[("x", x)])
}

fn broken_plan() -> PlanNode {
    let mut p = PlanBuilder::new();
    let a = p.variable("a", DataType::Bigint);
    let missing = p.variable("missing", DataType::Bigint);
    let scan = p.table_scan("t", &[a.clone()]);
    let filter = p.filter(scan, Expression::variable(&missing));
    p.output(filter, &[("a", a)])
}

fn scan_width(plan: &PlanNode) -> usize {
    plan.iter().last().map_or(0, |scan| scan.output_symbols().len())
}

// ============================================================================
// Batch Tests
// ============================================================================

#[test]
fn test_optimize_all_returns_results_in_input_order() {
    let plans: Vec<PlanNode> = (0..32).map(|i| wide_plan(2 + i)).collect();
    let results = Optimizer::default().optimize_all(plans);

    assert_eq!(results.len(), 32);
    for (i, result) in results.iter().enumerate() {
        let optimized = result.as_ref().unwrap();
        assert_eq!(optimized.stats.nodes_before, 3);
        assert_eq!(scan_width(&optimized.plan), 1, "plan {i} kept extra columns");
    }
}

#[test]
fn test_optimize_all_isolates_failures() {
    let plans = vec![wide_plan(4), broken_plan(), wide_plan(5)];
    let results = Optimizer::default().optimize_all(plans);

    assert!(results[0].is_ok());
    assert!(matches!(results[1], Err(PlanError::DanglingReference { .. })));
    assert!(results[2].is_ok());
}

#[test]
fn test_optimize_all_with_dedicated_pool() {
    let config = OptimizerConfig {
        num_threads: 3,
        ..OptimizerConfig::default()
    };
    let plans: Vec<PlanNode> = (0..16).map(|i| wide_plan(3 + i)).collect();
    let expected: Vec<PlanNode> = plans.iter().cloned().map(|p| prune(p).unwrap()).collect();

    let results = Optimizer::new(config).optimize_all(plans);
    let actual: Vec<PlanNode> = results.into_iter().map(|r| r.unwrap().plan).collect();
    assert_eq!(actual, expected);
}

#[test]
fn test_optimize_all_empty_batch() {
    assert!(Optimizer::default().optimize_all(Vec::new()).is_empty());
}

// ============================================================================
// Shared Optimizer Tests
// ============================================================================

#[test]
fn test_shared_optimizer_across_threads() {
    let optimizer = Arc::new(Optimizer::default());
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let optimizer = Arc::clone(&optimizer);
            thread::spawn(move || {
                let mut context = OptimizerContext::default();
                (0..20)
                    .map(|j| optimizer.optimize(wide_plan(2 + i + j), &mut context).unwrap())
                    .map(|optimized| scan_width(&optimized.plan))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        let widths = handle.join().unwrap();
        assert!(widths.iter().all(|w| *w == 1));
    }
}
