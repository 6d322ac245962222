//! Property-based pruning tests (proptest).
//!
//! Plans are generated from a recipe: a starting scan width plus a list of
//! operator steps stacked on top of it, finished with an `Output` that selects
//! a random subset of the final columns.

use proptest::prelude::*;
use std::collections::HashSet;

use plan_pruner::expr::{ArithmeticOp, ComparisonOp, Expression};
use plan_pruner::plan::{validate_plan, Aggregation, JoinType, PlanBuilder, PlanNode, WindowFunction};
use plan_pruner::symbol::{DataType, Symbol, SymbolSet, Variable};
use plan_pruner::{prune, prune_with_required};

/// One operator stacked on the current plan; the two parameters pick columns
#[derive(Debug, Clone, Copy)]
struct Step {
    op: u8,
    x: usize,
    y: usize,
}

fn step_strategy() -> impl Strategy<Value = Step> {
    (0u8..11, any::<usize>(), any::<usize>()).prop_map(|(op, x, y)| Step { op, x, y })
}

struct PlanGen {
    p: PlanBuilder,
}

impl PlanGen {
    fn new() -> Self {
        PlanGen { p: PlanBuilder::new() }
    }

    fn columns(&mut self, hint: &str, count: usize) -> Vec<Variable> {
        (0..count).map(|_| self.p.variable(hint, DataType::Bigint)).collect()
    }

    fn scan(&mut self, count: usize) -> PlanNode {
        let columns = self.columns("c", count);
        self.p.table_scan("t", &columns)
    }

    fn apply(&mut self, plan: PlanNode, step: Step) -> PlanNode {
        let outputs = plan.output_variables();
        let pick = |i: usize| outputs[i % outputs.len()].clone();
        let (first, second) = (pick(step.x), pick(step.y));

        match step.op {
            0 => {
                let predicate = Expression::comparison(
                    ComparisonOp::Gt,
                    Expression::variable(&first),
                    Expression::bigint(0),
                );
                self.p.filter(plan, predicate)
            }
            1 => {
                let sum = self.p.variable("sum", DataType::Bigint);
                let mut assignments = vec![(
                    sum,
                    Expression::arithmetic(ArithmeticOp::Add, Expression::variable(&first), Expression::variable(&second)),
                )];
                for (i, v) in outputs.iter().enumerate() {
                    if step.y >> (i % 32) & 1 == 1 {
                        assignments.push((v.clone(), Expression::variable(v)));
                    }
                }
                self.p.project(plan, assignments)
            }
            2 => {
                let total = self.p.variable("total", DataType::Bigint);
                let aggregate = Aggregation::new("sum", vec![Expression::variable(&second)], DataType::Bigint);
                self.p.aggregation(plan, &[first], vec![(total, aggregate)])
            }
            3 => {
                let marker = self.p.variable("marker", DataType::Boolean);
                self.p.mark_distinct(plan, marker, &[first])
            }
            4 => {
                let rank = self.p.variable("rank", DataType::Bigint);
                let running = self.p.variable("running", DataType::Bigint);
                self.p.window(
                    plan,
                    &[first],
                    vec![
                        (rank, WindowFunction::new("rank", vec![], DataType::Bigint)),
                        (running, WindowFunction::new("sum", vec![Expression::variable(&second)], DataType::Bigint)),
                    ],
                )
            }
            5 => {
                let right = self.scan(1 + step.y % 3);
                let key = right.output_variables()[0].clone();
                if step.y % 2 == 0 {
                    self.p.join(JoinType::Inner, plan, right, &[], None)
                } else {
                    self.p.join(JoinType::Inner, plan, right, &[(first, key)], None)
                }
            }
            6 => {
                let unique = self.p.variable("unique", DataType::Bigint);
                self.p.assign_unique_id(plan, unique)
            }
            7 => self.p.sort(plan, &[first]),
            8 => self.p.limit(plan, (step.x % 100) as u64),
            9 => {
                let other = self.scan(outputs.len());
                let other_outputs = other.output_variables();
                let mapping = outputs
                    .iter()
                    .zip(other_outputs)
                    .map(|(v, w)| (self.p.variable("u", DataType::Bigint), vec![v.clone(), w]))
                    .collect();
                self.p.union(vec![plan, other], mapping)
            }
            _ => {
                let rn = self.p.variable("rn", DataType::Bigint);
                self.p.row_number(plan, &[first], rn)
            }
        }
    }

    fn build(mut self, width: usize, steps: &[Step], selection: usize) -> PlanNode {
        let mut plan = self.scan(width);
        for step in steps {
            plan = self.apply(plan, *step);
        }
        let outputs = plan.output_variables();
        let mut selected: Vec<Variable> = outputs
            .iter()
            .enumerate()
            .filter(|(i, _)| selection >> (i % 32) & 1 == 1)
            .map(|(_, v)| v.clone())
            .collect();
        if selected.is_empty() {
            selected.push(outputs[selection % outputs.len()].clone());
        }
        let columns: Vec<(&str, Variable)> = selected.iter().map(|v| (v.name(), v.clone())).collect();
        self.p.output(plan, &columns)
    }
}

fn plan_strategy() -> impl Strategy<Value = PlanNode> {
    (1usize..6, prop::collection::vec(step_strategy(), 0..10), any::<usize>())
        .prop_map(|(width, steps, selection)| PlanGen::new().build(width, &steps, selection))
}

fn output_set(node: &PlanNode) -> HashSet<Symbol> {
    node.output_symbols().into_iter().collect()
}

proptest! {
    #[test]
    fn generated_plans_are_valid(plan in plan_strategy()) {
        prop_assert!(validate_plan(&plan).is_ok());
    }

    #[test]
    fn prune_is_idempotent(plan in plan_strategy()) {
        let once = prune(plan).unwrap();
        let twice = prune(once.clone()).unwrap();
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn prune_preserves_root_outputs(plan in plan_strategy()) {
        let before = plan.output_symbols();
        let pruned = prune(plan).unwrap();
        prop_assert_eq!(pruned.output_symbols(), before);
    }

    #[test]
    fn pruned_plan_references_only_produced_columns(plan in plan_strategy()) {
        let pruned = prune(plan).unwrap();
        prop_assert!(validate_plan(&pruned).is_ok(), "invalid pruned plan:\n{}", pruned);
    }

    #[test]
    fn prune_never_adds_nodes(plan in plan_strategy()) {
        let before = plan.node_count();
        let pruned = prune(plan).unwrap();
        prop_assert!(pruned.node_count() <= before);
    }

    #[test]
    fn smaller_requirement_yields_subset_of_outputs(
        plan in plan_strategy(),
        small_mask in any::<usize>(),
        extra_mask in any::<usize>(),
    ) {
        // Prune the operator under the Output root with two nested requirements
        let body = plan.sources()[0].clone();
        let outputs = body.output_symbols();
        let pick = |mask: usize| -> SymbolSet {
            outputs
                .iter()
                .enumerate()
                .filter(|(i, _)| mask >> (i % 32) & 1 == 1)
                .map(|(_, s)| s.clone())
                .collect()
        };
        let small = pick(small_mask);
        let large: SymbolSet = small.union(&pick(extra_mask)).cloned().collect();

        let from_small = prune_with_required(body.clone(), &small).unwrap();
        let from_large = prune_with_required(body, &large).unwrap();
        prop_assert!(output_set(&from_small).is_subset(&output_set(&from_large)));
    }

    #[test]
    fn cross_join_output_count_never_shrinks(
        left_width in 1usize..5,
        right_width in 1usize..5,
        mask in any::<usize>(),
    ) {
        let mut gen = PlanGen::new();
        let left = gen.scan(left_width);
        let right = gen.scan(right_width);
        let join = gen.p.join(JoinType::Inner, left, right, &[], None);
        let required: SymbolSet = join
            .output_symbols()
            .into_iter()
            .enumerate()
            .filter(|(i, _)| mask >> i & 1 == 1)
            .map(|(_, s)| s)
            .collect();

        let before = join.output_symbols().len();
        let pruned = prune_with_required(join, &required).unwrap();
        prop_assert_eq!(pruned.output_symbols().len(), before);
    }
}
