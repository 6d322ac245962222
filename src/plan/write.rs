//! Terminal operators: output, writers, delete, explain analyze.
//!
//! These never narrow: the columns they consume are their contract.

use super::types::{PartitioningScheme, StatisticAggregations};
use super::{PlanNode, PlanNodeId};
use crate::symbol::Variable;
use serde::{Deserialize, Serialize};

/// Query root: names the result columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub column_names: Vec<String>,
    pub output_variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableWriterNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub target: String,
    pub row_count_variable: Variable,
    pub fragment_variable: Variable,
    pub table_commit_context_variable: Variable,
    /// Source columns written, parallel to `column_names`
    pub columns: Vec<Variable>,
    pub column_names: Vec<String>,
    #[serde(default)]
    pub partitioning_scheme: Option<PartitioningScheme>,
    #[serde(default)]
    pub statistics_aggregation: Option<StatisticAggregations>,
}

impl TableWriterNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        let mut outputs = vec![
            self.row_count_variable.clone(),
            self.fragment_variable.clone(),
            self.table_commit_context_variable.clone(),
        ];
        if let Some(statistics) = &self.statistics_aggregation {
            outputs.extend(statistics.output_variables());
        }
        outputs
    }
}

/// Commits the fragments produced by table writers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableFinishNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub target: String,
    pub row_count_variable: Variable,
    #[serde(default)]
    pub statistics_aggregation: Option<StatisticAggregations>,
}

/// Stores collected table statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsWriterNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub target: String,
    pub row_count_variable: Variable,
    #[serde(default)]
    pub row_count_enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub target: String,
    pub row_id: Variable,
    pub output_variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainAnalyzeNode {
    pub id: PlanNodeId,
    pub source: Box<PlanNode>,
    pub output_variable: Variable,
    #[serde(default)]
    pub verbose: bool,
}
