//! N-ary operators: exchanges and set operations.
//!
//! Both map each declared output position onto one column of every source,
//! so pruning has to keep those per-source lists aligned.

use super::types::{OrderingScheme, PartitioningScheme};
use super::{PlanNode, PlanNodeId};
use crate::symbol::Variable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Gather,
    Repartition,
    Replicate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeScope {
    Local,
    RemoteStreaming,
    RemoteMaterialized,
}

/// Moves rows between tasks or threads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeNode {
    pub id: PlanNodeId,
    pub exchange_type: ExchangeType,
    pub scope: ExchangeScope,
    /// Output layout lives in `partitioning_scheme.output_layout`
    pub partitioning_scheme: PartitioningScheme,
    pub sources: Vec<PlanNode>,
    /// For each source, the column feeding each output position
    pub inputs: Vec<Vec<Variable>>,
    #[serde(default)]
    pub ordering_scheme: Option<OrderingScheme>,
}

impl ExchangeNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        self.partitioning_scheme.output_layout.clone()
    }
}

/// UNION / INTERSECT / EXCEPT body.
///
/// `output_to_inputs` maps every output to one column per source, in source
/// order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetOperationNode {
    pub id: PlanNodeId,
    pub sources: Vec<PlanNode>,
    pub output_to_inputs: Vec<(Variable, Vec<Variable>)>,
}

impl SetOperationNode {
    pub fn output_variables(&self) -> Vec<Variable> {
        self.output_to_inputs.iter().map(|(o, _)| o.clone()).collect()
    }

    /// Columns of source `index`, in output order
    pub fn source_inputs(&self, index: usize) -> Vec<Variable> {
        self.output_to_inputs
            .iter()
            .filter_map(|(_, inputs)| inputs.get(index).cloned())
            .collect()
    }
}
