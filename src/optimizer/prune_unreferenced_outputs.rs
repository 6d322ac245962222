//! # Unreferenced Output Pruning
//!
//! Dead-column elimination over a logical plan. Starting from the root's own
//! outputs, each node is visited with the set of symbols its parent still
//! needs ("required set"). A node keeps only the outputs in that set, adds the
//! symbols its retained expressions and keys read, and hands each child the
//! part of that set the child must produce.
//!
//! ```text
//! Output[x]                         Output[x]
//!   Project[x := a + b, y := c]  ->   Project[x := a + b]
//!     TableScan {a, b, c}               TableScan {a, b}
//! ```
//!
//! Nodes whose only distinguishing output is dead (mark-distinct, window,
//! assign-unique-id, apply, scalar lateral sides) are replaced by their
//! rewritten source before a new instance would be built.
//!
//! The pass never changes the meaning of retained columns and the root's
//! output list is preserved exactly.

use super::{OptimizerContext, PlanOptimizer};
use crate::error::{PlanError, PlanResult};
use crate::plan::{
    is_scalar, referenced_symbols_in_subtree, AggregationNode, ApplyNode, AssignUniqueIdNode, Assignments,
    DeleteNode, DistinctLimitNode, ExchangeNode, ExplainAnalyzeNode, FilterNode, GroupIdNode,
    IndexJoinNode, IndexSourceNode, JoinNode, LateralJoinNode, MarkDistinctNode, OutputNode, PlanNode,
    PlanNodeId, ProjectNode, RowNumberNode, SemiJoinNode, SetOperationNode, SortNode, SpatialJoinNode,
    StatisticsWriterNode, TableFinishNode, TableScanNode, TableWriterNode, TopNNode, TopNRowNumberNode,
    UnnestNode, ValuesNode, WindowNode,
};
use crate::symbol::{Symbol, SymbolSet, Variable};
use tracing::{debug, trace};

/// Removes plan outputs that no ancestor consumes
#[derive(Debug, Clone, Copy, Default)]
pub struct PruneUnreferencedOutputs;

impl PruneUnreferencedOutputs {
    pub const NAME: &'static str = "prune_unreferenced_outputs";

    pub fn new() -> Self {
        PruneUnreferencedOutputs
    }
}

impl PlanOptimizer for PruneUnreferencedOutputs {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn optimize(&self, plan: PlanNode, _context: &mut OptimizerContext) -> PlanResult<PlanNode> {
        prune(plan)
    }
}

/// Prune `plan`, requiring exactly the root's declared outputs
pub fn prune(plan: PlanNode) -> PlanResult<PlanNode> {
    let required: SymbolSet = plan.output_symbols().into_iter().collect();
    prune_with_required(plan, &required)
}

/// Prune `plan` as if its parent needed only `required`.
///
/// The result may declare fewer outputs than `plan` does.
pub fn prune_with_required(plan: PlanNode, required: &SymbolSet) -> PlanResult<PlanNode> {
    let mut rewriter = Rewriter::default();
    let pruned = rewriter.visit(plan, required)?;
    debug!(nodes_elided = rewriter.elided, "prune_unreferenced_outputs_complete");
    Ok(pruned)
}

fn is_required(required: &SymbolSet, variable: &Variable) -> bool {
    required.contains(variable.name())
}

fn symbols_of<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> impl Iterator<Item = Symbol> {
    variables.into_iter().map(Variable::symbol)
}

fn output_set(node: &PlanNode) -> SymbolSet {
    node.output_variables().iter().map(Variable::symbol).collect()
}

/// Keep the entries of `variables` that are in `required`, dropping repeats
fn retain_required(variables: Vec<Variable>, required: &SymbolSet) -> Vec<Variable> {
    let mut seen = SymbolSet::new();
    variables
        .into_iter()
        .filter(|v| is_required(required, v) && seen.insert(v.symbol()))
        .collect()
}

/// Per-invocation rewrite state; only counts elisions for logging
#[derive(Debug, Default)]
struct Rewriter {
    elided: usize,
}

impl Rewriter {
    fn visit(&mut self, node: PlanNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        trace!(node_id = %node.id(), kind = node.kind(), required = required.len(), "visit_node");
        match node {
            PlanNode::TableScan(n) => Ok(self.visit_table_scan(n, required)),
            PlanNode::Values(n) => self.visit_values(n, required),
            PlanNode::Filter(n) => self.visit_filter(n, required),
            PlanNode::Project(n) => self.visit_project(n, required),
            PlanNode::Aggregation(n) => self.visit_aggregation(n, required),
            PlanNode::Window(n) => self.visit_window(n, required),
            PlanNode::Sort(n) => self.visit_sort(n, required),
            PlanNode::TopN(n) => self.visit_top_n(n, required),
            PlanNode::RowNumber(n) => self.visit_row_number(n, required),
            PlanNode::TopNRowNumber(n) => self.visit_top_n_row_number(n, required),
            PlanNode::DistinctLimit(n) => self.visit_distinct_limit(n, required),
            PlanNode::MarkDistinct(n) => self.visit_mark_distinct(n, required),
            PlanNode::Unnest(n) => self.visit_unnest(n, required),
            PlanNode::GroupId(n) => self.visit_group_id(n, required),
            PlanNode::AssignUniqueId(n) => self.visit_assign_unique_id(n, required),
            node @ (PlanNode::Limit(_) | PlanNode::EnforceSingleRow(_)) => self.default_rewrite(node, required),
            PlanNode::Exchange(n) => self.visit_exchange(n, required),
            PlanNode::Join(n) => self.visit_join(n, required),
            PlanNode::SemiJoin(n) => self.visit_semi_join(n, required),
            PlanNode::SpatialJoin(n) => self.visit_spatial_join(n, required),
            PlanNode::IndexJoin(n) => self.visit_index_join(n, required),
            PlanNode::IndexSource(n) => Ok(self.visit_index_source(n, required)),
            PlanNode::Apply(n) => self.visit_apply(n, required),
            PlanNode::LateralJoin(n) => self.visit_lateral_join(n, required),
            PlanNode::Union(n) => self.visit_set_operation(n, required).map(PlanNode::Union),
            PlanNode::Intersect(n) => self.visit_set_operation(n, required).map(PlanNode::Intersect),
            PlanNode::Except(n) => self.visit_set_operation(n, required).map(PlanNode::Except),
            PlanNode::Output(n) => self.visit_output(n),
            PlanNode::TableWriter(n) => self.visit_table_writer(n),
            PlanNode::TableFinish(n) => self.visit_table_finish(n),
            PlanNode::StatisticsWriter(n) => self.visit_statistics_writer(n),
            PlanNode::Delete(n) => self.visit_delete(n),
            PlanNode::ExplainAnalyze(n) => self.visit_explain_analyze(n),
        }
    }

    fn visit_boxed(&mut self, source: Box<PlanNode>, required: &SymbolSet) -> PlanResult<Box<PlanNode>> {
        self.visit(*source, required).map(Box::new)
    }

    /// Hand the same required set to every child
    fn default_rewrite(&mut self, node: PlanNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        node.map_sources(|child| self.visit(child, required))
    }

    /// Replace a node by its rewritten source
    fn elide(
        &mut self,
        id: &PlanNodeId,
        kind: &'static str,
        reason: &'static str,
        source: PlanNode,
        required: &SymbolSet,
    ) -> PlanResult<PlanNode> {
        debug!(node_id = %id, kind, reason, "node_elided");
        self.elided += 1;
        self.visit(source, required)
    }

    // Leaves

    fn visit_table_scan(&mut self, mut node: TableScanNode, required: &SymbolSet) -> PlanNode {
        node.assignments.retain(|(v, _)| is_required(required, v));
        PlanNode::TableScan(node)
    }

    fn visit_values(&mut self, mut node: ValuesNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let width = node.output_variables.len();
        if let Some(row) = node.rows.iter().position(|row| row.len() != width) {
            return Err(PlanError::MalformedNode {
                node_id: node.id.clone(),
                kind: "Values",
                reason: format!("row {row} has {} values for {width} columns", node.rows[row].len()),
            });
        }

        let keep: Vec<bool> = node
            .output_variables
            .iter()
            .map(|v| is_required(required, v))
            .collect();
        node.output_variables.retain(|v| is_required(required, v));
        for row in &mut node.rows {
            let mut position = 0;
            row.retain(|_| {
                let kept = keep.get(position).copied().unwrap_or(false);
                position += 1;
                kept
            });
        }
        Ok(PlanNode::Values(node))
    }

    fn visit_index_source(&mut self, mut node: IndexSourceNode, required: &SymbolSet) -> PlanNode {
        node.assignments.retain(|(v, _)| is_required(required, v));
        node.lookup_variables.retain(|v| is_required(required, v));
        PlanNode::IndexSource(node)
    }

    // Single-source operators

    fn visit_filter(&mut self, mut node: FilterNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut expected = required.clone();
        node.predicate.collect_symbols(&mut expected);
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Filter(node))
    }

    fn visit_project(&mut self, node: ProjectNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let ProjectNode { id, source, assignments } = node;
        let mut expected = SymbolSet::new();
        let mut retained = Assignments::new();
        for (output, expression) in assignments {
            if is_required(required, &output) {
                expression.collect_symbols(&mut expected);
                retained.put(output, expression);
            }
        }
        let source = self.visit_boxed(source, &expected)?;
        Ok(PlanNode::Project(ProjectNode {
            id,
            source,
            assignments: retained,
        }))
    }

    fn visit_aggregation(&mut self, mut node: AggregationNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        node.aggregations.retain(|(v, _)| is_required(required, v));

        let mut expected: SymbolSet = symbols_of(node.grouping_keys()).collect();
        expected.extend(symbols_of(&node.hash_variable));
        expected.extend(symbols_of(&node.group_id_variable));
        for (_, aggregation) in &node.aggregations {
            expected.extend(aggregation.referenced_symbols());
        }

        // The source is re-pruned, so its grouping properties are no longer known
        node.pre_grouped_variables.clear();
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Aggregation(node))
    }

    fn visit_window(&mut self, mut node: WindowNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let frame_symbols: SymbolSet = node
            .window_functions
            .iter()
            .flat_map(|(_, f)| f.frame.symbols())
            .collect();

        node.window_functions.retain(|(v, _)| is_required(required, v));
        if node.window_functions.is_empty() {
            return self.elide(&node.id, "Window", "no window function is referenced", *node.source, required);
        }

        let mut expected = required.clone();
        expected.extend(node.specification.symbols());
        expected.extend(frame_symbols);
        expected.extend(symbols_of(&node.hash_variable));
        for (_, function) in &node.window_functions {
            expected.extend(function.referenced_symbols());
        }
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Window(node))
    }

    fn visit_sort(&mut self, mut node: SortNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut expected = required.clone();
        expected.extend(node.ordering_scheme.symbols());
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Sort(node))
    }

    fn visit_top_n(&mut self, mut node: TopNNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut expected = required.clone();
        expected.extend(node.ordering_scheme.symbols());
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::TopN(node))
    }

    fn visit_row_number(&mut self, mut node: RowNumberNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut expected = required.clone();
        expected.extend(symbols_of(&node.partition_by));
        expected.extend(symbols_of(&node.hash_variable));
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::RowNumber(node))
    }

    fn visit_top_n_row_number(&mut self, mut node: TopNRowNumberNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut expected = required.clone();
        expected.extend(node.specification.symbols());
        expected.extend(symbols_of(&node.hash_variable));
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::TopNRowNumber(node))
    }

    fn visit_distinct_limit(&mut self, mut node: DistinctLimitNode, _required: &SymbolSet) -> PlanResult<PlanNode> {
        let expected: SymbolSet = symbols_of(&node.distinct_variables)
            .chain(symbols_of(&node.hash_variable))
            .collect();
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::DistinctLimit(node))
    }

    fn visit_mark_distinct(&mut self, mut node: MarkDistinctNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        if !is_required(required, &node.marker_variable) {
            return self.elide(&node.id, "MarkDistinct", "marker is not referenced", *node.source, required);
        }

        let mut expected = required.clone();
        expected.remove(node.marker_variable.name());
        expected.extend(symbols_of(&node.distinct_variables));
        expected.extend(symbols_of(&node.hash_variable));
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::MarkDistinct(node))
    }

    fn visit_unnest(&mut self, mut node: UnnestNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        node.replicate_variables.retain(|v| is_required(required, v));
        if node
            .ordinality_variable
            .as_ref()
            .is_some_and(|v| !is_required(required, v))
        {
            node.ordinality_variable = None;
        }

        // Unnested columns are kept: dropping one would change the row count
        let expected: SymbolSet = symbols_of(&node.replicate_variables)
            .chain(node.unnest_variables.iter().map(|(input, _)| input.symbol()))
            .collect();
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Unnest(node))
    }

    fn visit_group_id(&mut self, mut node: GroupIdNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        node.aggregation_arguments.retain(|v| is_required(required, v));
        let mut expected: SymbolSet = symbols_of(&node.aggregation_arguments).collect();

        let mut used = SymbolSet::new();
        let mut grouping_sets = Vec::with_capacity(node.grouping_sets.len());
        for set in &node.grouping_sets {
            let mut retained = Vec::new();
            for output in set.iter().filter(|v| is_required(required, v)) {
                let input = node.grouping_input(output).ok_or_else(|| PlanError::MalformedNode {
                    node_id: node.id.clone(),
                    kind: "GroupId",
                    reason: format!("grouping set output {output} has no source column"),
                })?;
                expected.insert(input.symbol());
                used.insert(output.symbol());
                retained.push(output.clone());
            }
            grouping_sets.push(retained);
        }
        node.grouping_sets = grouping_sets;

        // Mapping order is the node's output order
        let mut seen = SymbolSet::new();
        node.grouping_columns
            .retain(|(output, _)| used.contains(output.name()) && seen.insert(output.symbol()));

        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::GroupId(node))
    }

    fn visit_assign_unique_id(&mut self, node: AssignUniqueIdNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        if !is_required(required, &node.id_variable) {
            return self.elide(&node.id, "AssignUniqueId", "unique id is not referenced", *node.source, required);
        }
        self.default_rewrite(PlanNode::AssignUniqueId(node), required)
    }

    // N-ary operators

    fn visit_exchange(&mut self, mut node: ExchangeNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        if node.inputs.len() != node.sources.len() {
            return Err(PlanError::MalformedNode {
                node_id: node.id.clone(),
                kind: "Exchange",
                reason: format!("{} input lists for {} sources", node.inputs.len(), node.sources.len()),
            });
        }

        // Routing and ordering columns must survive whatever the parent needs
        let mut expected = required.clone();
        expected.extend(node.partitioning_scheme.symbols());
        if let Some(ordering) = &node.ordering_scheme {
            expected.extend(ordering.symbols());
        }

        let kept: Vec<usize> = node
            .partitioning_scheme
            .output_layout
            .iter()
            .enumerate()
            .filter(|(_, v)| is_required(&expected, v))
            .map(|(position, _)| position)
            .collect();

        let mut inputs = Vec::with_capacity(node.inputs.len());
        for source_inputs in &node.inputs {
            let narrowed = kept
                .iter()
                .map(|&position| {
                    source_inputs.get(position).cloned().ok_or_else(|| PlanError::MalformedNode {
                        node_id: node.id.clone(),
                        kind: "Exchange",
                        reason: format!("no input for output position {position}"),
                    })
                })
                .collect::<PlanResult<Vec<_>>>()?;
            inputs.push(narrowed);
        }

        node.partitioning_scheme.output_layout = kept
            .iter()
            .filter_map(|&position| node.partitioning_scheme.output_layout.get(position).cloned())
            .collect();

        let sources = std::mem::take(&mut node.sources);
        node.sources = sources
            .into_iter()
            .zip(&inputs)
            .map(|(source, source_inputs)| {
                let expected: SymbolSet = symbols_of(source_inputs).collect();
                self.visit(source, &expected)
            })
            .collect::<PlanResult<Vec<_>>>()?;
        node.inputs = inputs;
        Ok(PlanNode::Exchange(node))
    }

    fn visit_set_operation(&mut self, mut node: SetOperationNode, required: &SymbolSet) -> PlanResult<SetOperationNode> {
        node.output_to_inputs.retain(|(output, _)| is_required(required, output));

        let mut per_source = Vec::with_capacity(node.sources.len());
        for index in 0..node.sources.len() {
            let mut expected = SymbolSet::new();
            for (output, inputs) in &node.output_to_inputs {
                let input = inputs.get(index).ok_or_else(|| PlanError::MalformedNode {
                    node_id: node.id.clone(),
                    kind: "SetOperation",
                    reason: format!("output {output} has no column for source {index}"),
                })?;
                expected.insert(input.symbol());
            }
            per_source.push(expected);
        }

        let sources = std::mem::take(&mut node.sources);
        node.sources = sources
            .into_iter()
            .zip(&per_source)
            .map(|(source, expected)| self.visit(source, expected))
            .collect::<PlanResult<Vec<_>>>()?;
        Ok(node)
    }

    // Binary operators

    fn visit_join(&mut self, mut node: JoinNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let left_outputs = output_set(&node.left);
        let right_outputs = output_set(&node.right);

        if node.is_cross_join() {
            // A nested-loop join emits both sides in full, so each side must keep
            // everything the join declares from it.
            let declared: SymbolSet = symbols_of(&node.output_variables).collect();
            let mut left_expected: SymbolSet = declared.intersection(&left_outputs).cloned().collect();
            left_expected.extend(symbols_of(&node.left_hash_variable));
            let mut right_expected: SymbolSet = declared.intersection(&right_outputs).cloned().collect();
            right_expected.extend(symbols_of(&node.right_hash_variable));

            // Declared outputs stay as they are, in their declared order
            node.left = self.visit_boxed(node.left, &left_expected)?;
            node.right = self.visit_boxed(node.right, &right_expected)?;
            return Ok(PlanNode::Join(node));
        }

        let mut needed = required.clone();
        if let Some(filter) = &node.filter {
            filter.collect_symbols(&mut needed);
        }

        let mut left_expected: SymbolSet = needed.intersection(&left_outputs).cloned().collect();
        left_expected.extend(node.criteria.iter().map(|c| c.left.symbol()));
        left_expected.extend(symbols_of(&node.left_hash_variable));

        let mut right_expected: SymbolSet = needed.intersection(&right_outputs).cloned().collect();
        right_expected.extend(node.criteria.iter().map(|c| c.right.symbol()));
        right_expected.extend(symbols_of(&node.right_hash_variable));

        node.left = self.visit_boxed(node.left, &left_expected)?;
        node.right = self.visit_boxed(node.right, &right_expected)?;
        node.output_variables = retain_required(std::mem::take(&mut node.output_variables), required);
        Ok(PlanNode::Join(node))
    }

    fn visit_semi_join(&mut self, mut node: SemiJoinNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let source_outputs = output_set(&node.source);
        let mut source_expected: SymbolSet = required.intersection(&source_outputs).cloned().collect();
        source_expected.insert(node.source_join_variable.symbol());
        source_expected.extend(symbols_of(&node.source_hash_variable));

        let filtering_expected: SymbolSet = std::iter::once(node.filtering_source_join_variable.symbol())
            .chain(symbols_of(&node.filtering_source_hash_variable))
            .collect();

        node.source = self.visit_boxed(node.source, &source_expected)?;
        node.filtering_source = self.visit_boxed(node.filtering_source, &filtering_expected)?;
        Ok(PlanNode::SemiJoin(node))
    }

    fn visit_spatial_join(&mut self, mut node: SpatialJoinNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let mut needed = required.clone();
        node.filter.collect_symbols(&mut needed);

        let left_outputs = output_set(&node.left);
        let mut left_expected: SymbolSet = needed.intersection(&left_outputs).cloned().collect();
        left_expected.extend(symbols_of(&node.left_partition_variable));

        let right_outputs = output_set(&node.right);
        let mut right_expected: SymbolSet = needed.intersection(&right_outputs).cloned().collect();
        right_expected.extend(symbols_of(&node.right_partition_variable));

        node.left = self.visit_boxed(node.left, &left_expected)?;
        node.right = self.visit_boxed(node.right, &right_expected)?;
        node.output_variables = retain_required(std::mem::take(&mut node.output_variables), required);
        Ok(PlanNode::SpatialJoin(node))
    }

    fn visit_index_join(&mut self, mut node: IndexJoinNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let probe_outputs = output_set(&node.probe_source);
        let mut probe_expected: SymbolSet = required.intersection(&probe_outputs).cloned().collect();
        probe_expected.extend(node.criteria.iter().map(|c| c.probe.symbol()));
        probe_expected.extend(symbols_of(&node.probe_hash_variable));

        // Index-side columns reach the join output, so the parent's needs apply here too
        let index_outputs = output_set(&node.index_source);
        let mut index_expected: SymbolSet = required.intersection(&index_outputs).cloned().collect();
        index_expected.extend(node.criteria.iter().map(|c| c.index.symbol()));
        index_expected.extend(symbols_of(&node.index_hash_variable));

        node.probe_source = self.visit_boxed(node.probe_source, &probe_expected)?;
        node.index_source = self.visit_boxed(node.index_source, &index_expected)?;
        Ok(PlanNode::IndexJoin(node))
    }

    fn visit_apply(&mut self, mut node: ApplyNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let assignments = std::mem::take(&mut node.subquery_assignments);
        let mut subquery_expected = SymbolSet::new();
        let mut retained = Assignments::new();
        for (output, expression) in assignments {
            if is_required(required, &output) {
                expression.collect_symbols(&mut subquery_expected);
                retained.put(output, expression);
            }
        }

        if retained.is_empty() {
            return self.elide(&node.id, "Apply", "no subquery result is referenced", *node.input, required);
        }

        node.subquery = self.visit_boxed(node.subquery, &subquery_expected)?;

        let still_referenced = referenced_symbols_in_subtree(&node.subquery);
        node.correlation.retain(|v| still_referenced.contains(v.name()));

        // Assignment expressions may also read input columns (`x IN (subquery)`)
        let mut input_expected = required.clone();
        input_expected.extend(symbols_of(&node.correlation));
        input_expected.extend(subquery_expected);
        node.input = self.visit_boxed(node.input, &input_expected)?;
        node.subquery_assignments = retained;
        Ok(PlanNode::Apply(node))
    }

    fn visit_lateral_join(&mut self, mut node: LateralJoinNode, required: &SymbolSet) -> PlanResult<PlanNode> {
        let subquery = self.visit(*node.subquery, required)?;

        let subquery_used = subquery.output_variables().iter().any(|v| is_required(required, v));
        if !subquery_used && is_scalar(&subquery) {
            return self.elide(&node.id, "LateralJoin", "scalar subquery output is not referenced", *node.input, required);
        }

        let still_referenced = referenced_symbols_in_subtree(&subquery);
        node.correlation.retain(|v| still_referenced.contains(v.name()));

        let mut input_expected = required.clone();
        input_expected.extend(symbols_of(&node.correlation));
        let input = self.visit(*node.input, &input_expected)?;

        let input_used = input.output_variables().iter().any(|v| is_required(&input_expected, v));
        if !input_used && is_scalar(&input) {
            debug!(node_id = %node.id, kind = "LateralJoin", reason = "scalar input output is not referenced", "node_elided");
            self.elided += 1;
            return Ok(subquery);
        }

        node.input = Box::new(input);
        node.subquery = Box::new(subquery);
        Ok(PlanNode::LateralJoin(node))
    }

    // Terminal operators ignore the parent's needs

    fn visit_output(&mut self, mut node: OutputNode) -> PlanResult<PlanNode> {
        let expected: SymbolSet = symbols_of(&node.output_variables).collect();
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Output(node))
    }

    fn visit_table_writer(&mut self, mut node: TableWriterNode) -> PlanResult<PlanNode> {
        let mut expected: SymbolSet = symbols_of(&node.columns).collect();
        if let Some(scheme) = &node.partitioning_scheme {
            expected.extend(scheme.symbols());
        }
        if let Some(statistics) = &node.statistics_aggregation {
            expected.extend(statistics.referenced_symbols());
        }
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::TableWriter(node))
    }

    fn visit_table_finish(&mut self, mut node: TableFinishNode) -> PlanResult<PlanNode> {
        let expected = output_set(&node.source);
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::TableFinish(node))
    }

    fn visit_statistics_writer(&mut self, mut node: StatisticsWriterNode) -> PlanResult<PlanNode> {
        let expected = output_set(&node.source);
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::StatisticsWriter(node))
    }

    fn visit_delete(&mut self, mut node: DeleteNode) -> PlanResult<PlanNode> {
        let expected: SymbolSet = std::iter::once(node.row_id.symbol()).collect();
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::Delete(node))
    }

    fn visit_explain_analyze(&mut self, mut node: ExplainAnalyzeNode) -> PlanResult<PlanNode> {
        let expected = output_set(&node.source);
        node.source = self.visit_boxed(node.source, &expected)?;
        Ok(PlanNode::ExplainAnalyze(node))
    }
}
