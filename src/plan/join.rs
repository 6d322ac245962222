//! Binary operators: joins, semi-joins, index lookups, and correlated
//! subqueries.

use super::relational::ColumnHandle;
use super::types::Assignments;
use super::{PlanNode, PlanNodeId};
use crate::expr::Expression;
use crate::symbol::Variable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionType {
    Partitioned,
    Replicated,
}

/// `left = right` join condition
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EquiJoinClause {
    pub left: Variable,
    pub right: Variable,
}

impl EquiJoinClause {
    pub fn new(left: &Variable, right: &Variable) -> Self {
        EquiJoinClause {
            left: left.clone(),
            right: right.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinNode {
    pub id: PlanNodeId,
    pub join_type: JoinType,
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub criteria: Vec<EquiJoinClause>,
    /// Selected columns from both sides
    pub output_variables: Vec<Variable>,
    #[serde(default)]
    pub filter: Option<Expression>,
    #[serde(default)]
    pub left_hash_variable: Option<Variable>,
    #[serde(default)]
    pub right_hash_variable: Option<Variable>,
    #[serde(default)]
    pub distribution_type: Option<DistributionType>,
}

impl JoinNode {
    /// Inner join with no equi-clauses and no filter
    pub fn is_cross_join(&self) -> bool {
        self.criteria.is_empty() && self.filter.is_none() && self.join_type == JoinType::Inner
    }
}

/// Appends `source_join_variable IN (filtering_source_join_variable)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemiJoinNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub filtering_source: Box<PlanNode>,
    pub source_join_variable: Variable,
    pub filtering_source_join_variable: Variable,
    pub semi_join_output: Variable,
    #[serde(default)]
    pub source_hash_variable: Option<Variable>,
    #[serde(default)]
    pub filtering_source_hash_variable: Option<Variable>,
    #[serde(default)]
    pub distribution_type: Option<DistributionType>,
}

impl SemiJoinNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.source.output_variables();
        outputs.push(self.semi_join_output.clone());
        outputs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpatialJoinType {
    Inner,
    Left,
}

/// Join on a geometric predicate, optionally partitioned by a KDB tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialJoinNode {
    pub id: PlanNodeId,
    pub join_type: SpatialJoinType,
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub output_variables: Vec<Variable>,
    pub filter: Expression,
    #[serde(default)]
    pub left_partition_variable: Option<Variable>,
    #[serde(default)]
    pub right_partition_variable: Option<Variable>,
    #[serde(default)]
    pub kdb_tree: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexJoinType {
    Inner,
    SourceOuter,
}

/// `probe = index` lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEquiJoinClause {
    pub probe: Variable,
    pub index: Variable,
}

/// Probes a connector index with keys from the probe side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexJoinNode {
    pub id: PlanNodeId,
    pub join_type: IndexJoinType,
    pub probe_source: Box<PlanNode>,
    pub index_source: Box<PlanNode>,
    pub criteria: Vec<IndexEquiJoinClause>,
    #[serde(default)]
    pub probe_hash_variable: Option<Variable>,
    #[serde(default)]
    pub index_hash_variable: Option<Variable>,
}

impl IndexJoinNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.probe_source.output_variables();
        outputs.extend(self.index_source.output_variables());
        outputs
    }
}

/// Leaf reading a connector index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSourceNode {
    pub id: PlanNodeId,
    pub index_handle: String,
    pub table_handle: String,
    /// Columns the index is looked up by; a subset of the outputs
    pub lookup_variables: Vec<Variable>,
    pub assignments: Vec<(Variable, ColumnHandle)>,
}

impl IndexSourceNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        self.assignments.iter().map(|(v, _)| v.clone()).collect()
    }
}

/// Correlated subquery evaluated per input row; its results are bound by
/// `subquery_assignments` (e.g. `x IN (subquery)`, `EXISTS (subquery)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplyNode {
    pub id: PlanNodeId,
    pub input: Box<PlanNode>,
    pub subquery: Box<PlanNode>,
    pub subquery_assignments: Assignments,
    /// Input columns referenced from inside the subquery
    pub correlation: Vec<Variable>,
    #[serde(default)]
    pub origin_subquery_error: String,
}

impl ApplyNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.input.output_variables();
        outputs.extend(self.subquery_assignments.outputs());
        outputs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LateralJoinType {
    Inner,
    Left,
}

/// Joins each input row with the rows of a correlated subquery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LateralJoinNode {
    pub id: PlanNodeId,
    pub input: Box<PlanNode>,
    pub subquery: Box<PlanNode>,
    pub correlation: Vec<Variable>,
    pub join_type: LateralJoinType,
    #[serde(default)]
    pub origin_subquery_error: String,
}

impl LateralJoinNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = self.input.output_variables();
        outputs.extend(self.subquery.output_variables());
        outputs
    }
}
