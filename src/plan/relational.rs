//! Leaf and single-source relational operators.
//!
//! Each node stores only its own fields; declared outputs are derived from
//! them (and, for pass-through operators, from the source).

use super::types::{
    AggregationStep, Aggregation, Assignments, GroupingSetDescriptor, OrderingScheme,
    Specification, WindowFunction,
};
use super::{PlanNode, PlanNodeId};
use crate::expr::Expression;
use crate::symbol::Variable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connector-side column identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnHandle(pub String);

impl fmt::Display for ColumnHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Read columns of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableScanNode {
    pub id: PlanNodeId,
    pub table: String,
    /// Output variable -> connector column, in output order
    pub assignments: Vec<(Variable, ColumnHandle)>,
}

impl TableScanNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        self.assignments.iter().map(|(v, _)| v.clone()).collect()
    }
}

/// Inline constant rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuesNode {
    pub id: PlanNodeId,
    pub output_variables: Vec<Variable>,
    /// One expression per output column, per row
    pub rows: Vec<Vec<Expression>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub predicate: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub assignments: Assignments,
}

/// GROUP BY with aggregate calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub aggregations: Vec<(Variable, Aggregation)>,
    pub grouping_sets: GroupingSetDescriptor,
    /// Grouping keys the source is already grouped on (execution hint)
    #[serde(default)]
    pub pre_grouped_variables: Vec<Variable>,
    pub step: AggregationStep,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
    #[serde(default)]
    pub group_id_variable: Option<Variable>,
}

impl AggregationNode {
    pub fn grouping_keys(&self) -> &[Variable] {
        &self.grouping_sets.grouping_keys
    }

    /// Grouping keys, then hash, then aggregate outputs
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.grouping_sets.grouping_keys.clone();
        outputs.extend(self.hash_variable.iter().cloned());
        outputs.extend(self.aggregations.iter().map(|(v, _)| v.clone()));
        outputs
    }

    /// Produces a row even when the input is empty
    pub fn has_default_output(&self) -> bool {
        self.grouping_sets.has_empty_grouping_set() && self.step.outputs_default_row()
    }
}

/// Window functions appended to every source row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub specification: Specification,
    pub window_functions: Vec<(Variable, WindowFunction)>,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
    #[serde(default)]
    pub pre_partitioned_inputs: Vec<Variable>,
    #[serde(default)]
    pub pre_sorted_order_prefix: usize,
}

impl WindowNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        outputs.extend(self.window_functions.iter().map(|(v, _)| v.clone()));
        outputs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub ordering_scheme: OrderingScheme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitStep {
    Partial,
    Final,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub count: u64,
    pub step: LimitStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopNStep {
    Single,
    Partial,
    Final,
}

/// ORDER BY ... LIMIT n
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub count: u64,
    pub ordering_scheme: OrderingScheme,
    pub step: TopNStep,
}

/// Appends `row_number()` over a partitioning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowNumberNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub partition_by: Vec<Variable>,
    pub row_number_variable: Variable,
    #[serde(default)]
    pub max_row_count_per_partition: Option<u64>,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
}

impl RowNumberNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        outputs.push(self.row_number_variable.clone());
        outputs
    }
}

/// Top rows per partition, numbered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopNRowNumberNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub specification: Specification,
    pub row_number_variable: Variable,
    pub max_row_count_per_partition: u64,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
}

impl TopNRowNumberNode {
    /// A partial step never emits the row number
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        if !self.partial {
            outputs.push(self.row_number_variable.clone());
        }
        outputs
    }
}

/// SELECT DISTINCT ... LIMIT n
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctLimitNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub limit: u64,
    #[serde(default)]
    pub partial: bool,
    pub distinct_variables: Vec<Variable>,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
}

impl DistinctLimitNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.distinct_variables.clone();
        outputs.extend(self.hash_variable.iter().cloned());
        outputs
    }
}

/// Appends a boolean marking the first occurrence of each distinct key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkDistinctNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub marker_variable: Variable,
    pub distinct_variables: Vec<Variable>,
    #[serde(default)]
    pub hash_variable: Option<Variable>,
}

impl MarkDistinctNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        outputs.push(self.marker_variable.clone());
        outputs
    }
}

/// Flattens array/map columns into rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnnestNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    /// Source columns copied onto every produced row
    pub replicate_variables: Vec<Variable>,
    /// Collection column -> the columns it expands into
    pub unnest_variables: Vec<(Variable, Vec<Variable>)>,
    #[serde(default)]
    pub ordinality_variable: Option<Variable>,
}

impl UnnestNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.replicate_variables.clone();
        for (_, produced) in &self.unnest_variables {
            outputs.extend(produced.iter().cloned());
        }
        outputs.extend(self.ordinality_variable.iter().cloned());
        outputs
    }
}

/// Replicates each row once per grouping set (GROUPING SETS / ROLLUP / CUBE)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupIdNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    /// Grouping-set outputs per set
    pub grouping_sets: Vec<Vec<Variable>>,
    /// Grouping-set output -> source column; its order is the output order
    pub grouping_columns: Vec<(Variable, Variable)>,
    /// Source columns passed through for the aggregation above
    pub aggregation_arguments: Vec<Variable>,
    pub group_id_variable: Variable,
}

impl GroupIdNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs: Vec<Variable> = self.grouping_columns.iter().map(|(o, _)| o.clone()).collect();
        outputs.extend(self.aggregation_arguments.iter().cloned());
        outputs.push(self.group_id_variable.clone());
        outputs
    }

    /// Source column feeding a grouping-set output
    pub fn grouping_input(&self, output: &Variable) -> Option<&Variable> {
        self.grouping_columns
            .iter()
            .find(|(o, _)| o.name() == output.name())
            .map(|(_, input)| input)
    }
}

/// Appends a unique row id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignUniqueIdNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub id_variable: Variable,
}

impl AssignUniqueIdNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        outputs.push(self.id_variable.clone());
        outputs
    }
}

/// Fails the query unless the source produces exactly one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnforceSingleRowNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
}
