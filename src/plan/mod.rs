//! # Logical Plan Model
//!
//! An immutable, rooted tree of relational operators. Every variant exposes:
//!
//! - its children ([`PlanNode::sources`])
//! - its declared outputs ([`PlanNode::output_variables`] /
//!   [`PlanNode::output_symbols`]), always derived from its own fields
//! - a structural [`PlanNode::replace_children`] that swaps only the child list
//!
//! ```text
//! Output[x]
//!   Project[x := (a + b)]
//!     TableScan[t] {a, b, c}
//! ```

pub mod builder;
pub mod cardinality;
pub mod exchange;
pub mod join;
pub mod relational;
pub mod types;
pub mod validation;
pub mod write;

pub use builder::PlanBuilder;
pub use cardinality::{cardinality, is_scalar, Cardinality};
pub use exchange::{ExchangeNode, ExchangeScope, ExchangeType, SetOperationNode};
pub use join::{
    ApplyNode, DistributionType, EquiJoinClause, IndexEquiJoinClause, IndexJoinNode, IndexJoinType,
    IndexSourceNode, JoinNode, JoinType, LateralJoinNode, LateralJoinType, SemiJoinNode,
    SpatialJoinNode, SpatialJoinType,
};
pub use relational::{
    AggregationNode, AssignUniqueIdNode, ColumnHandle, DistinctLimitNode, EnforceSingleRowNode,
    FilterNode, GroupIdNode, LimitNode, LimitStep, MarkDistinctNode, ProjectNode, RowNumberNode,
    SortNode, TableScanNode, TopNNode, TopNRowNumberNode, TopNStep, UnnestNode, ValuesNode,
    WindowNode,
};
pub use types::{
    Aggregation, AggregationStep, Assignments, BoundType, Frame, FrameType, GroupingSetDescriptor,
    Ordering, OrderingScheme, Partitioning, PartitioningArgument, PartitioningHandle,
    PartitioningScheme, SortOrder, Specification, StatisticAggregations, WindowFunction,
};
pub use validation::validate_plan;
pub use write::{
    DeleteNode, ExplainAnalyzeNode, OutputNode, StatisticsWriterNode, TableFinishNode,
    TableWriterNode,
};

use crate::error::{PlanError, PlanResult};
use crate::symbol::{symbols_of, Symbol, SymbolSet, Variable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique node id within one plan
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanNodeId(String);

impl PlanNodeId {
    pub fn new(id: impl Into<String>) -> Self {
        PlanNodeId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hands out sequential node ids
#[derive(Debug, Clone, Default)]
pub struct PlanNodeIdAllocator {
    next_id: u64,
}

impl PlanNodeIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        let id = PlanNodeId(self.next_id.to_string());
        self.next_id += 1;
        id
    }
}

/// Plan operator - one variant per operator kind.
///
/// Rewrites dispatch with exhaustive matches, so adding a variant forces every
/// pass to decide how to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanNode {
    TableScan(TableScanNode),
    Values(ValuesNode),
    Filter(FilterNode),
    Project(ProjectNode),
    Aggregation(AggregationNode),
    Window(WindowNode),
    Sort(SortNode),
    Limit(LimitNode),
    TopN(TopNNode),
    RowNumber(RowNumberNode),
    TopNRowNumber(TopNRowNumberNode),
    DistinctLimit(DistinctLimitNode),
    MarkDistinct(MarkDistinctNode),
    Unnest(UnnestNode),
    GroupId(GroupIdNode),
    AssignUniqueId(AssignUniqueIdNode),
    EnforceSingleRow(EnforceSingleRowNode),
    Exchange(ExchangeNode),
    Join(JoinNode),
    SemiJoin(SemiJoinNode),
    SpatialJoin(SpatialJoinNode),
    IndexJoin(IndexJoinNode),
    IndexSource(IndexSourceNode),
    Apply(ApplyNode),
    LateralJoin(LateralJoinNode),
    Union(SetOperationNode),
    Intersect(SetOperationNode),
    Except(SetOperationNode),
    Output(OutputNode),
    TableWriter(TableWriterNode),
    TableFinish(TableFinishNode),
    StatisticsWriter(StatisticsWriterNode),
    Delete(DeleteNode),
    ExplainAnalyze(ExplainAnalyzeNode),
}

impl PlanNode {
    pub fn id(&self) -> &PlanNodeId {
        match self {
            PlanNode::TableScan(n) => &n.id,
            PlanNode::Values(n) => &n.id,
            PlanNode::Filter(n) => &n.id,
            PlanNode::Project(n) => &n.id,
            PlanNode::Aggregation(n) => &n.id,
            PlanNode::Window(n) => &n.id,
            PlanNode::Sort(n) => &n.id,
            PlanNode::Limit(n) => &n.id,
            PlanNode::TopN(n) => &n.id,
            PlanNode::RowNumber(n) => &n.id,
            PlanNode::TopNRowNumber(n) => &n.id,
            PlanNode::DistinctLimit(n) => &n.id,
            PlanNode::MarkDistinct(n) => &n.id,
            PlanNode::Unnest(n) => &n.id,
            PlanNode::GroupId(n) => &n.id,
            PlanNode::AssignUniqueId(n) => &n.id,
            PlanNode::EnforceSingleRow(n) => &n.id,
            PlanNode::Exchange(n) => &n.id,
            PlanNode::Join(n) => &n.id,
            PlanNode::SemiJoin(n) => &n.id,
            PlanNode::SpatialJoin(n) => &n.id,
            PlanNode::IndexJoin(n) => &n.id,
            PlanNode::IndexSource(n) => &n.id,
            PlanNode::Apply(n) => &n.id,
            PlanNode::LateralJoin(n) => &n.id,
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => &n.id,
            PlanNode::Output(n) => &n.id,
            PlanNode::TableWriter(n) => &n.id,
            PlanNode::TableFinish(n) => &n.id,
            PlanNode::StatisticsWriter(n) => &n.id,
            PlanNode::Delete(n) => &n.id,
            PlanNode::ExplainAnalyze(n) => &n.id,
        }
    }

    /// Operator name used in logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            PlanNode::TableScan(_) => "TableScan",
            PlanNode::Values(_) => "Values",
            PlanNode::Filter(_) => "Filter",
            PlanNode::Project(_) => "Project",
            PlanNode::Aggregation(_) => "Aggregation",
            PlanNode::Window(_) => "Window",
            PlanNode::Sort(_) => "Sort",
            PlanNode::Limit(_) => "Limit",
            PlanNode::TopN(_) => "TopN",
            PlanNode::RowNumber(_) => "RowNumber",
            PlanNode::TopNRowNumber(_) => "TopNRowNumber",
            PlanNode::DistinctLimit(_) => "DistinctLimit",
            PlanNode::MarkDistinct(_) => "MarkDistinct",
            PlanNode::Unnest(_) => "Unnest",
            PlanNode::GroupId(_) => "GroupId",
            PlanNode::AssignUniqueId(_) => "AssignUniqueId",
            PlanNode::EnforceSingleRow(_) => "EnforceSingleRow",
            PlanNode::Exchange(_) => "Exchange",
            PlanNode::Join(_) => "Join",
            PlanNode::SemiJoin(_) => "SemiJoin",
            PlanNode::SpatialJoin(_) => "SpatialJoin",
            PlanNode::IndexJoin(_) => "IndexJoin",
            PlanNode::IndexSource(_) => "IndexSource",
            PlanNode::Apply(_) => "Apply",
            PlanNode::LateralJoin(_) => "LateralJoin",
            PlanNode::Union(_) => "Union",
            PlanNode::Intersect(_) => "Intersect",
            PlanNode::Except(_) => "Except",
            PlanNode::Output(_) => "Output",
            PlanNode::TableWriter(_) => "TableWriter",
            PlanNode::TableFinish(_) => "TableFinish",
            PlanNode::StatisticsWriter(_) => "StatisticsWriter",
            PlanNode::Delete(_) => "Delete",
            PlanNode::ExplainAnalyze(_) => "ExplainAnalyze",
        }
    }

    /// Child nodes, in evaluation order
    pub fn sources(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::TableScan(_) | PlanNode::Values(_) | PlanNode::IndexSource(_) => Vec::new(),
            PlanNode::Filter(n) => vec![n.source.as_ref()],
            PlanNode::Project(n) => vec![n.source.as_ref()],
            PlanNode::Aggregation(n) => vec![n.source.as_ref()],
            PlanNode::Window(n) => vec![n.source.as_ref()],
            PlanNode::Sort(n) => vec![n.source.as_ref()],
            PlanNode::Limit(n) => vec![n.source.as_ref()],
            PlanNode::TopN(n) => vec![n.source.as_ref()],
            PlanNode::RowNumber(n) => vec![n.source.as_ref()],
            PlanNode::TopNRowNumber(n) => vec![n.source.as_ref()],
            PlanNode::DistinctLimit(n) => vec![n.source.as_ref()],
            PlanNode::MarkDistinct(n) => vec![n.source.as_ref()],
            PlanNode::Unnest(n) => vec![n.source.as_ref()],
            PlanNode::GroupId(n) => vec![n.source.as_ref()],
            PlanNode::AssignUniqueId(n) => vec![n.source.as_ref()],
            PlanNode::EnforceSingleRow(n) => vec![n.source.as_ref()],
            PlanNode::Exchange(n) => n.sources.iter().collect(),
            PlanNode::Join(n) => vec![n.left.as_ref(), n.right.as_ref()],
            PlanNode::SemiJoin(n) => vec![n.source.as_ref(), n.filtering_source.as_ref()],
            PlanNode::SpatialJoin(n) => vec![n.left.as_ref(), n.right.as_ref()],
            PlanNode::IndexJoin(n) => vec![n.probe_source.as_ref(), n.index_source.as_ref()],
            PlanNode::Apply(n) => vec![n.input.as_ref(), n.subquery.as_ref()],
            PlanNode::LateralJoin(n) => vec![n.input.as_ref(), n.subquery.as_ref()],
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => n.sources.iter().collect(),
            PlanNode::Output(n) => vec![n.source.as_ref()],
            PlanNode::TableWriter(n) => vec![n.source.as_ref()],
            PlanNode::TableFinish(n) => vec![n.source.as_ref()],
            PlanNode::StatisticsWriter(n) => vec![n.source.as_ref()],
            PlanNode::Delete(n) => vec![n.source.as_ref()],
            PlanNode::ExplainAnalyze(n) => vec![n.source.as_ref()],
        }
    }

    /// Declared output variables, in order
    pub fn output_variables(&self) -> Vec<Variable> {
        match self {
            PlanNode::TableScan(n) => n.output_variables(),
            PlanNode::Values(n) => n.output_variables.clone(),
            PlanNode::Filter(n) => n.source.output_variables(),
            PlanNode::Project(n) => n.assignments.outputs(),
            PlanNode::Aggregation(n) => n.output_variables(),
            PlanNode::Window(n) => n.output_variables(),
            PlanNode::Sort(n) => n.source.output_variables(),
            PlanNode::Limit(n) => n.source.output_variables(),
            PlanNode::TopN(n) => n.source.output_variables(),
            PlanNode::RowNumber(n) => n.output_variables(),
            PlanNode::TopNRowNumber(n) => n.output_variables(),
            PlanNode::DistinctLimit(n) => n.output_variables(),
            PlanNode::MarkDistinct(n) => n.output_variables(),
            PlanNode::Unnest(n) => n.output_variables(),
            PlanNode::GroupId(n) => n.output_variables(),
            PlanNode::AssignUniqueId(n) => n.output_variables(),
            PlanNode::EnforceSingleRow(n) => n.source.output_variables(),
            PlanNode::Exchange(n) => n.output_variables(),
            PlanNode::Join(n) => n.output_variables.clone(),
            PlanNode::SemiJoin(n) => n.output_variables(),
            PlanNode::SpatialJoin(n) => n.output_variables.clone(),
            PlanNode::IndexJoin(n) => n.output_variables(),
            PlanNode::IndexSource(n) => n.output_variables(),
            PlanNode::Apply(n) => n.output_variables(),
            PlanNode::LateralJoin(n) => n.output_variables(),
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => n.output_variables(),
            PlanNode::Output(n) => n.output_variables.clone(),
            PlanNode::TableWriter(n) => n.output_variables(),
            PlanNode::TableFinish(n) => vec![n.row_count_variable.clone()],
            PlanNode::StatisticsWriter(n) => vec![n.row_count_variable.clone()],
            PlanNode::Delete(n) => n.output_variables.clone(),
            PlanNode::ExplainAnalyze(n) => vec![n.output_variable.clone()],
        }
    }

    /// Declared output symbols; always name-matched with `output_variables`
    pub fn output_symbols(&self) -> Vec<Symbol> {
        symbols_of(&self.output_variables())
    }

    /// Symbols this node's own expressions, keys, frames, mappings and hash
    /// columns read from its sources (or from an enclosing correlation scope).
    pub fn own_references(&self) -> SymbolSet {
        let mut refs = SymbolSet::new();
        match self {
            PlanNode::TableScan(_)
            | PlanNode::IndexSource(_)
            | PlanNode::Limit(_)
            | PlanNode::AssignUniqueId(_)
            | PlanNode::EnforceSingleRow(_)
            | PlanNode::TableFinish(_)
            | PlanNode::StatisticsWriter(_)
            | PlanNode::ExplainAnalyze(_) => {}
            PlanNode::Values(n) => {
                for row in &n.rows {
                    for value in row {
                        value.collect_symbols(&mut refs);
                    }
                }
            }
            PlanNode::Filter(n) => n.predicate.collect_symbols(&mut refs),
            PlanNode::Project(n) => refs.extend(n.assignments.referenced_symbols()),
            PlanNode::Aggregation(n) => {
                refs.extend(n.grouping_keys().iter().map(Variable::symbol));
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
                for (_, aggregation) in &n.aggregations {
                    refs.extend(aggregation.referenced_symbols());
                }
            }
            PlanNode::Window(n) => {
                refs.extend(n.specification.symbols());
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
                for (_, function) in &n.window_functions {
                    refs.extend(function.referenced_symbols());
                }
            }
            PlanNode::Sort(n) => refs.extend(n.ordering_scheme.symbols()),
            PlanNode::TopN(n) => refs.extend(n.ordering_scheme.symbols()),
            PlanNode::RowNumber(n) => {
                refs.extend(n.partition_by.iter().map(Variable::symbol));
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::TopNRowNumber(n) => {
                refs.extend(n.specification.symbols());
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::DistinctLimit(n) => {
                refs.extend(n.distinct_variables.iter().map(Variable::symbol));
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::MarkDistinct(n) => {
                refs.extend(n.distinct_variables.iter().map(Variable::symbol));
                refs.extend(n.hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::Unnest(n) => {
                refs.extend(n.replicate_variables.iter().map(Variable::symbol));
                refs.extend(n.unnest_variables.iter().map(|(input, _)| input.symbol()));
            }
            PlanNode::GroupId(n) => {
                refs.extend(n.grouping_columns.iter().map(|(_, input)| input.symbol()));
                refs.extend(n.aggregation_arguments.iter().map(Variable::symbol));
            }
            PlanNode::Exchange(n) => {
                for inputs in &n.inputs {
                    refs.extend(inputs.iter().map(Variable::symbol));
                }
            }
            PlanNode::Join(n) => {
                for clause in &n.criteria {
                    refs.insert(clause.left.symbol());
                    refs.insert(clause.right.symbol());
                }
                if let Some(filter) = &n.filter {
                    filter.collect_symbols(&mut refs);
                }
                refs.extend(n.left_hash_variable.iter().map(Variable::symbol));
                refs.extend(n.right_hash_variable.iter().map(Variable::symbol));
                refs.extend(n.output_variables.iter().map(Variable::symbol));
            }
            PlanNode::SemiJoin(n) => {
                refs.insert(n.source_join_variable.symbol());
                refs.insert(n.filtering_source_join_variable.symbol());
                refs.extend(n.source_hash_variable.iter().map(Variable::symbol));
                refs.extend(n.filtering_source_hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::SpatialJoin(n) => {
                n.filter.collect_symbols(&mut refs);
                refs.extend(n.left_partition_variable.iter().map(Variable::symbol));
                refs.extend(n.right_partition_variable.iter().map(Variable::symbol));
                refs.extend(n.output_variables.iter().map(Variable::symbol));
            }
            PlanNode::IndexJoin(n) => {
                for clause in &n.criteria {
                    refs.insert(clause.probe.symbol());
                    refs.insert(clause.index.symbol());
                }
                refs.extend(n.probe_hash_variable.iter().map(Variable::symbol));
                refs.extend(n.index_hash_variable.iter().map(Variable::symbol));
            }
            PlanNode::Apply(n) => {
                refs.extend(n.subquery_assignments.referenced_symbols());
                refs.extend(n.correlation.iter().map(Variable::symbol));
            }
            PlanNode::LateralJoin(n) => refs.extend(n.correlation.iter().map(Variable::symbol)),
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => {
                for (_, inputs) in &n.output_to_inputs {
                    refs.extend(inputs.iter().map(Variable::symbol));
                }
            }
            PlanNode::Output(n) => refs.extend(n.output_variables.iter().map(Variable::symbol)),
            PlanNode::TableWriter(n) => {
                refs.extend(n.columns.iter().map(Variable::symbol));
                if let Some(scheme) = &n.partitioning_scheme {
                    refs.extend(scheme.symbols());
                }
                if let Some(statistics) = &n.statistics_aggregation {
                    refs.extend(statistics.referenced_symbols());
                }
            }
            PlanNode::Delete(n) => {
                refs.insert(n.row_id.symbol());
            }
        }
        refs
    }

    /// Rebuild this node with a new child list; all other fields are kept.
    pub fn replace_children(self, children: Vec<PlanNode>) -> PlanResult<PlanNode> {
        let expected = self.sources().len();
        if children.len() != expected {
            return Err(PlanError::ChildCountMismatch {
                node_id: self.id().clone(),
                kind: self.kind(),
                expected,
                actual: children.len(),
            });
        }
        let mut children = children.into_iter();
        let id = self.id().clone();
        let kind = self.kind();
        self.map_sources(|_| {
            children.next().ok_or_else(|| PlanError::ChildCountMismatch {
                node_id: id.clone(),
                kind,
                expected,
                actual: expected.saturating_sub(1),
            })
        })
    }

    /// Rebuild this node by passing each owned child, in order, through `f`.
    pub fn map_sources<F>(self, mut f: F) -> PlanResult<PlanNode>
    where
        F: FnMut(PlanNode) -> PlanResult<PlanNode>,
    {
        let node = match self {
            leaf @ (PlanNode::TableScan(_) | PlanNode::Values(_) | PlanNode::IndexSource(_)) => leaf,
            PlanNode::Filter(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Filter(n)
            }
            PlanNode::Project(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Project(n)
            }
            PlanNode::Aggregation(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Aggregation(n)
            }
            PlanNode::Window(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Window(n)
            }
            PlanNode::Sort(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Sort(n)
            }
            PlanNode::Limit(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Limit(n)
            }
            PlanNode::TopN(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::TopN(n)
            }
            PlanNode::RowNumber(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::RowNumber(n)
            }
            PlanNode::TopNRowNumber(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::TopNRowNumber(n)
            }
            PlanNode::DistinctLimit(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::DistinctLimit(n)
            }
            PlanNode::MarkDistinct(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::MarkDistinct(n)
            }
            PlanNode::Unnest(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Unnest(n)
            }
            PlanNode::GroupId(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::GroupId(n)
            }
            PlanNode::AssignUniqueId(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::AssignUniqueId(n)
            }
            PlanNode::EnforceSingleRow(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::EnforceSingleRow(n)
            }
            PlanNode::Output(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Output(n)
            }
            PlanNode::TableWriter(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::TableWriter(n)
            }
            PlanNode::TableFinish(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::TableFinish(n)
            }
            PlanNode::StatisticsWriter(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::StatisticsWriter(n)
            }
            PlanNode::Delete(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::Delete(n)
            }
            PlanNode::ExplainAnalyze(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                PlanNode::ExplainAnalyze(n)
            }
            PlanNode::Join(mut n) => {
                n.left = map_boxed(n.left, &mut f)?;
                n.right = map_boxed(n.right, &mut f)?;
                PlanNode::Join(n)
            }
            PlanNode::SemiJoin(mut n) => {
                n.source = map_boxed(n.source, &mut f)?;
                n.filtering_source = map_boxed(n.filtering_source, &mut f)?;
                PlanNode::SemiJoin(n)
            }
            PlanNode::SpatialJoin(mut n) => {
                n.left = map_boxed(n.left, &mut f)?;
                n.right = map_boxed(n.right, &mut f)?;
                PlanNode::SpatialJoin(n)
            }
            PlanNode::IndexJoin(mut n) => {
                n.probe_source = map_boxed(n.probe_source, &mut f)?;
                n.index_source = map_boxed(n.index_source, &mut f)?;
                PlanNode::IndexJoin(n)
            }
            PlanNode::Apply(mut n) => {
                n.input = map_boxed(n.input, &mut f)?;
                n.subquery = map_boxed(n.subquery, &mut f)?;
                PlanNode::Apply(n)
            }
            PlanNode::LateralJoin(mut n) => {
                n.input = map_boxed(n.input, &mut f)?;
                n.subquery = map_boxed(n.subquery, &mut f)?;
                PlanNode::LateralJoin(n)
            }
            PlanNode::Exchange(mut n) => {
                n.sources = n.sources.into_iter().map(&mut f).collect::<PlanResult<Vec<_>>>()?;
                PlanNode::Exchange(n)
            }
            PlanNode::Union(mut n) => {
                n.sources = n.sources.into_iter().map(&mut f).collect::<PlanResult<Vec<_>>>()?;
                PlanNode::Union(n)
            }
            PlanNode::Intersect(mut n) => {
                n.sources = n.sources.into_iter().map(&mut f).collect::<PlanResult<Vec<_>>>()?;
                PlanNode::Intersect(n)
            }
            PlanNode::Except(mut n) => {
                n.sources = n.sources.into_iter().map(&mut f).collect::<PlanResult<Vec<_>>>()?;
                PlanNode::Except(n)
            }
        };
        Ok(node)
    }

    /// Pre-order traversal over the subtree
    pub fn iter(&self) -> PlanIter<'_> {
        PlanIter { stack: vec![self] }
    }

    /// Total nodes in the subtree
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }

    /// Longest root-to-leaf path, counted in nodes.
    ///
    /// Uses an explicit stack so arbitrarily deep plans can be measured
    /// before any recursive pass runs on them.
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            for source in node.sources() {
                stack.push((source, depth + 1));
            }
        }
        max_depth
    }

    /// Find a node by id anywhere in the subtree
    pub fn find(&self, id: &PlanNodeId) -> Option<&PlanNode> {
        self.iter().find(|n| n.id() == id)
    }

    /// One-line description of this node (without children)
    pub fn label(&self) -> String {
        let id = self.id();
        match self {
            PlanNode::TableScan(n) => format!("TableScan[{id}] {} {{{}}}", n.table, names(&n.output_variables())),
            PlanNode::Values(n) => format!("Values[{id}] ({}) rows={}", names(&n.output_variables), n.rows.len()),
            PlanNode::Filter(n) => format!("Filter[{id}] {}", n.predicate),
            PlanNode::Project(n) => format!("Project[{id}] {}", n.assignments),
            PlanNode::Aggregation(n) => {
                let aggs: Vec<String> = n.aggregations.iter().map(|(v, a)| format!("{v} := {a}")).collect();
                format!(
                    "Aggregation[{id}] {:?} keys=[{}] {{{}}}",
                    n.step,
                    names(n.grouping_keys()),
                    aggs.join(", ")
                )
            }
            PlanNode::Window(n) => {
                let functions: Vec<String> = n
                    .window_functions
                    .iter()
                    .map(|(v, f)| format!("{v} := {}", f.function))
                    .collect();
                format!(
                    "Window[{id}] partition=[{}] {{{}}}",
                    names(&n.specification.partition_by),
                    functions.join(", ")
                )
            }
            PlanNode::Sort(n) => format!("Sort[{id}] [{}]", ordering(&n.ordering_scheme)),
            PlanNode::Limit(n) => format!("Limit[{id}] {} {:?}", n.count, n.step),
            PlanNode::TopN(n) => format!("TopN[{id}] {} [{}]", n.count, ordering(&n.ordering_scheme)),
            PlanNode::RowNumber(n) => format!(
                "RowNumber[{id}] partition=[{}] -> {}",
                names(&n.partition_by),
                n.row_number_variable
            ),
            PlanNode::TopNRowNumber(n) => format!(
                "TopNRowNumber[{id}] {} partition=[{}] -> {}",
                n.max_row_count_per_partition,
                names(&n.specification.partition_by),
                n.row_number_variable
            ),
            PlanNode::DistinctLimit(n) => {
                format!("DistinctLimit[{id}] {} [{}]", n.limit, names(&n.distinct_variables))
            }
            PlanNode::MarkDistinct(n) => format!(
                "MarkDistinct[{id}] {} := distinct [{}]",
                n.marker_variable,
                names(&n.distinct_variables)
            ),
            PlanNode::Unnest(n) => {
                let inputs: Vec<Variable> = n.unnest_variables.iter().map(|(v, _)| v.clone()).collect();
                format!(
                    "Unnest[{id}] replicate=[{}] unnest=[{}]",
                    names(&n.replicate_variables),
                    names(&inputs)
                )
            }
            PlanNode::GroupId(n) => format!(
                "GroupId[{id}] sets={} -> {}",
                n.grouping_sets.len(),
                n.group_id_variable
            ),
            PlanNode::AssignUniqueId(n) => format!("AssignUniqueId[{id}] -> {}", n.id_variable),
            PlanNode::EnforceSingleRow(_) => format!("EnforceSingleRow[{id}]"),
            PlanNode::Exchange(n) => format!(
                "Exchange[{id}] {:?} {:?} ({})",
                n.exchange_type,
                n.scope,
                names(&n.partitioning_scheme.output_layout)
            ),
            PlanNode::Join(n) => {
                let criteria: Vec<String> = n
                    .criteria
                    .iter()
                    .map(|c| format!("{} = {}", c.left, c.right))
                    .collect();
                format!(
                    "Join[{id}] {:?} [{}] ({})",
                    n.join_type,
                    criteria.join(" AND "),
                    names(&n.output_variables)
                )
            }
            PlanNode::SemiJoin(n) => format!(
                "SemiJoin[{id}] {} := {} IN {}",
                n.semi_join_output, n.source_join_variable, n.filtering_source_join_variable
            ),
            PlanNode::SpatialJoin(n) => format!("SpatialJoin[{id}] {:?} {}", n.join_type, n.filter),
            PlanNode::IndexJoin(n) => format!("IndexJoin[{id}] {:?}", n.join_type),
            PlanNode::IndexSource(n) => format!(
                "IndexSource[{id}] {} {{{}}}",
                n.table_handle,
                names(&n.output_variables())
            ),
            PlanNode::Apply(n) => format!(
                "Apply[{id}] {} correlation=[{}]",
                n.subquery_assignments,
                names(&n.correlation)
            ),
            PlanNode::LateralJoin(n) => format!(
                "LateralJoin[{id}] {:?} correlation=[{}]",
                n.join_type,
                names(&n.correlation)
            ),
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => {
                format!("{}[{id}] ({})", self.kind(), names(&n.output_variables()))
            }
            PlanNode::Output(n) => format!("Output[{id}] [{}]", n.column_names.join(", ")),
            PlanNode::TableWriter(n) => format!("TableWriter[{id}] {} ({})", n.target, names(&n.columns)),
            PlanNode::TableFinish(n) => format!("TableFinish[{id}] {}", n.target),
            PlanNode::StatisticsWriter(n) => format!("StatisticsWriter[{id}] {}", n.target),
            PlanNode::Delete(n) => format!("Delete[{id}] {} row_id={}", n.target, n.row_id),
            PlanNode::ExplainAnalyze(_) => format!("ExplainAnalyze[{id}]"),
        }
    }

    /// Pretty print the plan tree for debugging
    pub fn pretty_print(&self, indent: usize) -> String {
        let mut result = format!("{}{}", "  ".repeat(indent), self.label());
        for source in self.sources() {
            result.push('\n');
            result.push_str(&source.pretty_print(indent + 1));
        }
        result
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pretty_print(0))
    }
}

/// Pre-order plan iterator
pub struct PlanIter<'a> {
    stack: Vec<&'a PlanNode>,
}

impl<'a> Iterator for PlanIter<'a> {
    type Item = &'a PlanNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the first source is visited first
        for source in node.sources().into_iter().rev() {
            self.stack.push(source);
        }
        Some(node)
    }
}

/// Every symbol referenced by any node in the subtree (plan-level free-symbol
/// extraction).
pub fn referenced_symbols_in_subtree(node: &PlanNode) -> SymbolSet {
    let mut symbols = SymbolSet::new();
    for n in node.iter() {
        symbols.extend(n.own_references());
    }
    symbols
}

fn names(variables: &[Variable]) -> String {
    variables.iter().map(Variable::name).collect::<Vec<_>>().join(", ")
}

fn ordering(scheme: &OrderingScheme) -> String {
    scheme
        .order_by
        .iter()
        .map(|o| format!("{} {:?}", o.variable, o.sort_order))
        .collect::<Vec<_>>()
        .join(", ")
}

fn map_boxed<F>(source: Box<PlanNode>, f: &mut F) -> PlanResult<Box<PlanNode>>
where
    F: FnMut(PlanNode) -> PlanResult<PlanNode>,
{
    f(*source).map(Box::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ArithmeticOp, Expression};
    use crate::symbol::DataType;

    fn var(name: &str) -> Variable {
        Variable::new(name, DataType::Bigint)
    }

    fn scan(id: &str, columns: &[&str]) -> PlanNode {
        PlanNode::TableScan(TableScanNode {
            id: PlanNodeId::new(id),
            table: "t".to_string(),
            assignments: columns
                .iter()
                .map(|c| (var(c), ColumnHandle((*c).to_string())))
                .collect(),
        })
    }

    #[test]
    fn test_scan_outputs_follow_assignments() {
        let node = scan("0", &["a", "b"]);
        assert_eq!(node.output_symbols(), vec![Symbol::new("a"), Symbol::new("b")]);
        assert!(node.sources().is_empty());
        assert_eq!(node.kind(), "TableScan");
    }

    #[test]
    fn test_filter_passes_through_outputs() {
        let node = PlanNode::Filter(FilterNode {
            id: PlanNodeId::new("1"),
            source: Box::new(scan("0", &["a", "b"])),
            predicate: Expression::variable(&var("a")),
        });
        assert_eq!(node.output_variables(), vec![var("a"), var("b")]);
        assert!(node.own_references().contains(&Symbol::new("a")));
    }

    #[test]
    fn test_project_outputs_are_assignment_keys() {
        let assignments: Assignments = vec![(
            var("x"),
            Expression::arithmetic(ArithmeticOp::Add, Expression::variable(&var("a")), Expression::variable(&var("b"))),
        )]
        .into_iter()
        .collect();
        let node = PlanNode::Project(ProjectNode {
            id: PlanNodeId::new("1"),
            source: Box::new(scan("0", &["a", "b", "c"])),
            assignments,
        });
        assert_eq!(node.output_symbols(), vec![Symbol::new("x")]);
        let refs = node.own_references();
        assert_eq!(refs.len(), 2);
        assert!(!refs.contains(&Symbol::new("c")));
    }

    #[test]
    fn test_replace_children_keeps_fields() {
        let node = PlanNode::Limit(LimitNode {
            id: PlanNodeId::new("1"),
            source: Box::new(scan("0", &["a", "b"])),
            count: 10,
            step: LimitStep::Final,
        });
        let replaced = node.replace_children(vec![scan("2", &["a"])]).unwrap();
        match replaced {
            PlanNode::Limit(n) => {
                assert_eq!(n.id, PlanNodeId::new("1"));
                assert_eq!(n.count, 10);
                assert_eq!(n.source.id(), &PlanNodeId::new("2"));
            }
            other => panic!("expected Limit, got {}", other.kind()),
        }
    }

    #[test]
    fn test_replace_children_rejects_wrong_arity() {
        let node = PlanNode::Limit(LimitNode {
            id: PlanNodeId::new("1"),
            source: Box::new(scan("0", &["a"])),
            count: 1,
            step: LimitStep::Partial,
        });
        let err = node.replace_children(vec![]).unwrap_err();
        assert!(matches!(err, PlanError::ChildCountMismatch { expected: 1, actual: 0, .. }));
    }

    #[test]
    fn test_iter_is_preorder_and_depth() {
        let join = PlanNode::Join(JoinNode {
            id: PlanNodeId::new("2"),
            join_type: JoinType::Inner,
            left: Box::new(scan("0", &["a"])),
            right: Box::new(scan("1", &["b"])),
            criteria: vec![EquiJoinClause::new(&var("a"), &var("b"))],
            output_variables: vec![var("a"), var("b")],
            filter: None,
            left_hash_variable: None,
            right_hash_variable: None,
            distribution_type: None,
        });
        let ids: Vec<&str> = join.iter().map(|n| n.id().as_str()).collect();
        assert_eq!(ids, vec!["2", "0", "1"]);
        assert_eq!(join.node_count(), 3);
        assert_eq!(join.depth(), 2);
        assert!(join.find(&PlanNodeId::new("1")).is_some());
    }

    #[test]
    fn test_id_allocator_is_sequential() {
        let mut ids = PlanNodeIdAllocator::new();
        assert_eq!(ids.next_id().as_str(), "0");
        assert_eq!(ids.next_id().as_str(), "1");
    }

    #[test]
    fn test_pretty_print_indents_children() {
        let node = PlanNode::Sort(SortNode {
            id: PlanNodeId::new("1"),
            source: Box::new(scan("0", &["a"])),
            ordering_scheme: OrderingScheme::ascending(&[var("a")]),
        });
        let output = node.pretty_print(0);
        assert!(output.starts_with("Sort[1]"));
        assert!(output.contains("\n  TableScan[0] t {a}"));
    }
}
