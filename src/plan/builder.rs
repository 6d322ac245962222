//! Builder for Plan Construction
//!
//! Allocates node ids and variables so tests, benches and tools can assemble
//! plans without spelling out every field.
//!
//! ## Example
//!
//! ```rust
//! use plan_pruner::plan::PlanBuilder;
//! use plan_pruner::expr::Expression;
//! use plan_pruner::symbol::DataType;
//!
//! let mut p = PlanBuilder::new();
//! let a = p.variable("a", DataType::Bigint);
//! let b = p.variable("b", DataType::Bigint);
//! let x = p.variable("x", DataType::Bigint);
//!
//! // SELECT a AS x FROM t
//! let scan = p.table_scan("t", &[a.clone(), b]);
//! let project = p.project(scan, [(x.clone(), Expression::variable(&a))]);
//! let plan = p.output(project, &[("x", x)]);
//! assert_eq!(plan.output_symbols().len(), 1);
//! ```

use super::exchange::{ExchangeNode, ExchangeScope, ExchangeType, SetOperationNode};
use super::join::{
    ApplyNode, EquiJoinClause, JoinNode, JoinType, LateralJoinNode, LateralJoinType, SemiJoinNode,
};
use super::relational::{
    AggregationNode, AssignUniqueIdNode, ColumnHandle, EnforceSingleRowNode, FilterNode, LimitNode,
    LimitStep, MarkDistinctNode, ProjectNode, RowNumberNode, SortNode, TableScanNode, TopNNode,
    TopNStep, ValuesNode, WindowNode,
};
use super::types::{
    Aggregation, AggregationStep, Assignments, GroupingSetDescriptor, OrderingScheme, Partitioning,
    PartitioningHandle, PartitioningScheme, Specification, WindowFunction,
};
use super::write::OutputNode;
use super::{PlanNode, PlanNodeId, PlanNodeIdAllocator};
use crate::expr::Expression;
use crate::symbol::{DataType, SymbolAllocator, Variable};

/// Builder for constructing plan trees
#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    ids: PlanNodeIdAllocator,
    symbols: SymbolAllocator,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a variable; the first use of a name keeps it unchanged
    pub fn variable(&mut self, name: &str, data_type: DataType) -> Variable {
        self.symbols.new_variable(name, data_type)
    }

    pub fn next_id(&mut self) -> PlanNodeId {
        self.ids.next_id()
    }

    /// Hand the allocators over to an optimizer context
    pub fn into_allocators(self) -> (SymbolAllocator, PlanNodeIdAllocator) {
        (self.symbols, self.ids)
    }

    pub fn table_scan(&mut self, table: &str, columns: &[Variable]) -> PlanNode {
        PlanNode::TableScan(TableScanNode {
            id: self.next_id(),
            table: table.to_string(),
            assignments: columns
                .iter()
                .map(|v| (v.clone(), ColumnHandle(v.name().to_string())))
                .collect(),
        })
    }

    pub fn values(&mut self, columns: &[Variable], rows: Vec<Vec<Expression>>) -> PlanNode {
        PlanNode::Values(ValuesNode {
            id: self.next_id(),
            output_variables: columns.to_vec(),
            rows,
        })
    }

    pub fn filter(&mut self, source: PlanNode, predicate: Expression) -> PlanNode {
        PlanNode::Filter(FilterNode {
            id: self.next_id(),
            source: Box::new(source),
            predicate,
        })
    }

    pub fn project(
        &mut self,
        source: PlanNode,
        assignments: impl IntoIterator<Item = (Variable, Expression)>,
    ) -> PlanNode {
        PlanNode::Project(ProjectNode {
            id: self.next_id(),
            source: Box::new(source),
            assignments: assignments.into_iter().collect::<Assignments>(),
        })
    }

    /// Single-step aggregation over one grouping set
    pub fn aggregation(
        &mut self,
        source: PlanNode,
        grouping_keys: &[Variable],
        aggregations: Vec<(Variable, Aggregation)>,
    ) -> PlanNode {
        PlanNode::Aggregation(AggregationNode {
            id: self.next_id(),
            source: Box::new(source),
            aggregations,
            grouping_sets: GroupingSetDescriptor::single(grouping_keys.to_vec()),
            pre_grouped_variables: Vec::new(),
            step: AggregationStep::Single,
            hash_variable: None,
            group_id_variable: None,
        })
    }

    pub fn window(
        &mut self,
        source: PlanNode,
        partition_by: &[Variable],
        window_functions: Vec<(Variable, WindowFunction)>,
    ) -> PlanNode {
        PlanNode::Window(WindowNode {
            id: self.next_id(),
            source: Box::new(source),
            specification: Specification {
                partition_by: partition_by.to_vec(),
                ordering_scheme: None,
            },
            window_functions,
            hash_variable: None,
            pre_partitioned_inputs: Vec::new(),
            pre_sorted_order_prefix: 0,
        })
    }

    pub fn sort(&mut self, source: PlanNode, order_by: &[Variable]) -> PlanNode {
        PlanNode::Sort(SortNode {
            id: self.next_id(),
            source: Box::new(source),
            ordering_scheme: OrderingScheme::ascending(order_by),
        })
    }

    pub fn limit(&mut self, source: PlanNode, count: u64) -> PlanNode {
        PlanNode::Limit(LimitNode {
            id: self.next_id(),
            source: Box::new(source),
            count,
            step: LimitStep::Final,
        })
    }

    pub fn top_n(&mut self, source: PlanNode, count: u64, order_by: &[Variable]) -> PlanNode {
        PlanNode::TopN(TopNNode {
            id: self.next_id(),
            source: Box::new(source),
            count,
            ordering_scheme: OrderingScheme::ascending(order_by),
            step: TopNStep::Single,
        })
    }

    pub fn row_number(&mut self, source: PlanNode, partition_by: &[Variable], row_number: Variable) -> PlanNode {
        PlanNode::RowNumber(RowNumberNode {
            id: self.next_id(),
            source: Box::new(source),
            partition_by: partition_by.to_vec(),
            row_number_variable: row_number,
            max_row_count_per_partition: None,
            hash_variable: None,
        })
    }

    pub fn mark_distinct(&mut self, source: PlanNode, marker: Variable, distinct: &[Variable]) -> PlanNode {
        PlanNode::MarkDistinct(MarkDistinctNode {
            id: self.next_id(),
            source: Box::new(source),
            marker_variable: marker,
            distinct_variables: distinct.to_vec(),
            hash_variable: None,
        })
    }

    pub fn assign_unique_id(&mut self, source: PlanNode, id_variable: Variable) -> PlanNode {
        PlanNode::AssignUniqueId(AssignUniqueIdNode {
            id: self.next_id(),
            source: Box::new(source),
            id_variable,
        })
    }

    pub fn enforce_single_row(&mut self, source: PlanNode) -> PlanNode {
        PlanNode::EnforceSingleRow(EnforceSingleRowNode {
            id: self.next_id(),
            source: Box::new(source),
        })
    }

    /// Join on `left = right` pairs; outputs every column of both sides
    pub fn join(
        &mut self,
        join_type: JoinType,
        left: PlanNode,
        right: PlanNode,
        criteria: &[(Variable, Variable)],
        filter: Option<Expression>,
    ) -> PlanNode {
        let mut output_variables = left.output_variables();
        output_variables.extend(right.output_variables());
        PlanNode::Join(JoinNode {
            id: self.next_id(),
            join_type,
            left: Box::new(left),
            right: Box::new(right),
            criteria: criteria.iter().map(|(l, r)| EquiJoinClause::new(l, r)).collect(),
            output_variables,
            filter,
            left_hash_variable: None,
            right_hash_variable: None,
            distribution_type: None,
        })
    }

    pub fn semi_join(
        &mut self,
        source: PlanNode,
        filtering_source: PlanNode,
        source_join_variable: Variable,
        filtering_source_join_variable: Variable,
        semi_join_output: Variable,
    ) -> PlanNode {
        PlanNode::SemiJoin(SemiJoinNode {
            id: self.next_id(),
            source: Box::new(source),
            filtering_source: Box::new(filtering_source),
            source_join_variable,
            filtering_source_join_variable,
            semi_join_output,
            source_hash_variable: None,
            filtering_source_hash_variable: None,
            distribution_type: None,
        })
    }

    pub fn apply(
        &mut self,
        input: PlanNode,
        subquery: PlanNode,
        subquery_assignments: Assignments,
        correlation: &[Variable],
    ) -> PlanNode {
        PlanNode::Apply(ApplyNode {
            id: self.next_id(),
            input: Box::new(input),
            subquery: Box::new(subquery),
            subquery_assignments,
            correlation: correlation.to_vec(),
            origin_subquery_error: String::new(),
        })
    }

    pub fn lateral_join(&mut self, input: PlanNode, subquery: PlanNode, correlation: &[Variable]) -> PlanNode {
        PlanNode::LateralJoin(LateralJoinNode {
            id: self.next_id(),
            input: Box::new(input),
            subquery: Box::new(subquery),
            correlation: correlation.to_vec(),
            join_type: LateralJoinType::Inner,
            origin_subquery_error: String::new(),
        })
    }

    /// UNION ALL; `mapping` gives each output and its column in every source
    pub fn union(&mut self, sources: Vec<PlanNode>, mapping: Vec<(Variable, Vec<Variable>)>) -> PlanNode {
        PlanNode::Union(SetOperationNode {
            id: self.next_id(),
            sources,
            output_to_inputs: mapping,
        })
    }

    /// Local gather exchange passing every column of each source through
    pub fn gather(&mut self, sources: Vec<PlanNode>, output_layout: &[Variable]) -> PlanNode {
        let inputs = sources.iter().map(|_| output_layout.to_vec()).collect();
        PlanNode::Exchange(ExchangeNode {
            id: self.next_id(),
            exchange_type: ExchangeType::Gather,
            scope: ExchangeScope::Local,
            partitioning_scheme: PartitioningScheme::new(
                Partitioning::new(PartitioningHandle::Single, &[]),
                output_layout.to_vec(),
            ),
            sources,
            inputs,
            ordering_scheme: None,
        })
    }

    /// Query root naming each result column
    pub fn output(&mut self, source: PlanNode, columns: &[(&str, Variable)]) -> PlanNode {
        PlanNode::Output(OutputNode {
            id: self.next_id(),
            source: Box::new(source),
            column_names: columns.iter().map(|(name, _)| (*name).to_string()).collect(),
            output_variables: columns.iter().map(|(_, v)| v.clone()).collect(),
        })
    }
}
