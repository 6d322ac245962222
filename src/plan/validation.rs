//! Plan sanity checker.
//!
//! Verifies that node ids are unique, that per-node arities line up, and that
//! every symbol a node reads is declared by one of its children or bound by an
//! enclosing correlated subquery. Walks with an explicit stack so it can run on
//! plans deeper than the pruning pass would accept.

use super::{PlanNode, PlanNodeId};
use crate::error::{PlanError, PlanResult};
use crate::symbol::{Symbol, SymbolSet, Variable};
use std::collections::HashSet;

/// Check structural and reference invariants of a whole plan
pub fn validate_plan(root: &PlanNode) -> PlanResult<()> {
    let mut seen: HashSet<&PlanNodeId> = HashSet::new();
    let mut stack: Vec<(&PlanNode, SymbolSet)> = vec![(root, SymbolSet::new())];

    while let Some((node, scope)) = stack.pop() {
        if !seen.insert(node.id()) {
            return Err(PlanError::DuplicateNodeId(node.id().clone()));
        }
        NodeCheck { node, scope: &scope }.run()?;

        match node {
            PlanNode::Apply(n) => {
                let mut inner = scope.clone();
                inner.extend(n.correlation.iter().map(Variable::symbol));
                stack.push((n.subquery.as_ref(), inner));
                stack.push((n.input.as_ref(), scope));
            }
            PlanNode::LateralJoin(n) => {
                let mut inner = scope.clone();
                inner.extend(n.correlation.iter().map(Variable::symbol));
                stack.push((n.subquery.as_ref(), inner));
                stack.push((n.input.as_ref(), scope));
            }
            _ => {
                for source in node.sources() {
                    stack.push((source, scope.clone()));
                }
            }
        }
    }
    Ok(())
}

fn outputs_of(node: &PlanNode) -> SymbolSet {
    node.output_variables().iter().map(Variable::symbol).collect()
}

fn symbols<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> impl Iterator<Item = Symbol> {
    variables.into_iter().map(Variable::symbol)
}

struct NodeCheck<'a> {
    node: &'a PlanNode,
    /// Symbols bound by enclosing correlated subqueries
    scope: &'a SymbolSet,
}

impl NodeCheck<'_> {
    fn run(&self) -> PlanResult<()> {
        match self.node {
            PlanNode::Values(n) => {
                let width = n.output_variables.len();
                if let Some(row) = n.rows.iter().position(|row| row.len() != width) {
                    return Err(self.malformed(format!(
                        "row {row} has {} values for {width} columns",
                        n.rows[row].len()
                    )));
                }
                self.require(self.node.own_references(), &SymbolSet::new())
            }
            PlanNode::Exchange(n) => {
                if n.inputs.len() != n.sources.len() {
                    return Err(self.malformed(format!(
                        "{} input lists for {} sources",
                        n.inputs.len(),
                        n.sources.len()
                    )));
                }
                let layout = &n.partitioning_scheme.output_layout;
                for (source, inputs) in n.sources.iter().zip(&n.inputs) {
                    if inputs.len() != layout.len() {
                        return Err(self.malformed(format!(
                            "source {} feeds {} columns into a layout of {}",
                            source.id(),
                            inputs.len(),
                            layout.len()
                        )));
                    }
                    self.require(symbols(inputs), &outputs_of(source))?;
                }
                let layout: SymbolSet = symbols(layout).collect();
                self.require(n.partitioning_scheme.symbols(), &layout)?;
                if let Some(ordering) = &n.ordering_scheme {
                    self.require(ordering.symbols(), &layout)?;
                }
                Ok(())
            }
            PlanNode::Union(n) | PlanNode::Intersect(n) | PlanNode::Except(n) => {
                for (output, inputs) in &n.output_to_inputs {
                    if inputs.len() != n.sources.len() {
                        return Err(self.malformed(format!(
                            "output {output} maps {} inputs for {} sources",
                            inputs.len(),
                            n.sources.len()
                        )));
                    }
                }
                for (index, source) in n.sources.iter().enumerate() {
                    self.require(symbols(&n.source_inputs(index)), &outputs_of(source))?;
                }
                Ok(())
            }
            PlanNode::GroupId(n) => {
                for set in &n.grouping_sets {
                    if let Some(unmapped) = set.iter().find(|v| n.grouping_input(v).is_none()) {
                        return Err(self.malformed(format!("grouping set output {unmapped} has no source column")));
                    }
                }
                self.require(self.node.own_references(), &outputs_of(&n.source))
            }
            PlanNode::Join(n) => {
                let left = outputs_of(&n.left);
                let right = outputs_of(&n.right);
                self.require(n.criteria.iter().map(|c| c.left.symbol()), &left)?;
                self.require(n.criteria.iter().map(|c| c.right.symbol()), &right)?;
                self.require(symbols(&n.left_hash_variable), &left)?;
                self.require(symbols(&n.right_hash_variable), &right)?;
                let both: SymbolSet = left.union(&right).cloned().collect();
                self.require(symbols(&n.output_variables), &both)?;
                if let Some(filter) = &n.filter {
                    self.require(filter.referenced_symbols(), &both)?;
                }
                Ok(())
            }
            PlanNode::SemiJoin(n) => {
                let source = outputs_of(&n.source);
                let filtering = outputs_of(&n.filtering_source);
                self.require(Some(n.source_join_variable.symbol()), &source)?;
                self.require(symbols(&n.source_hash_variable), &source)?;
                self.require(Some(n.filtering_source_join_variable.symbol()), &filtering)?;
                self.require(symbols(&n.filtering_source_hash_variable), &filtering)
            }
            PlanNode::SpatialJoin(n) => {
                let left = outputs_of(&n.left);
                let right = outputs_of(&n.right);
                self.require(symbols(&n.left_partition_variable), &left)?;
                self.require(symbols(&n.right_partition_variable), &right)?;
                let both: SymbolSet = left.union(&right).cloned().collect();
                self.require(symbols(&n.output_variables), &both)?;
                self.require(n.filter.referenced_symbols(), &both)
            }
            PlanNode::IndexJoin(n) => {
                let probe = outputs_of(&n.probe_source);
                let index = outputs_of(&n.index_source);
                self.require(n.criteria.iter().map(|c| c.probe.symbol()), &probe)?;
                self.require(n.criteria.iter().map(|c| c.index.symbol()), &index)?;
                self.require(symbols(&n.probe_hash_variable), &probe)?;
                self.require(symbols(&n.index_hash_variable), &index)
            }
            PlanNode::Apply(n) => {
                let input = outputs_of(&n.input);
                self.require(symbols(&n.correlation), &input)?;
                let both: SymbolSet = input.union(&outputs_of(&n.subquery)).cloned().collect();
                self.require(n.subquery_assignments.referenced_symbols(), &both)
            }
            PlanNode::LateralJoin(n) => self.require(symbols(&n.correlation), &outputs_of(&n.input)),
            _ => {
                let available: SymbolSet = self.node.sources().into_iter().flat_map(outputs_of).collect();
                self.require(self.node.own_references(), &available)
            }
        }
    }

    /// Every symbol must be in `available` or in the correlation scope
    fn require(&self, required: impl IntoIterator<Item = Symbol>, available: &SymbolSet) -> PlanResult<()> {
        let mut missing: Vec<Symbol> = required
            .into_iter()
            .filter(|s| !available.contains(s) && !self.scope.contains(s))
            .collect();
        missing.sort();
        match missing.into_iter().next() {
            Some(symbol) => Err(PlanError::DanglingReference {
                node_id: self.node.id().clone(),
                kind: self.node.kind(),
                symbol,
            }),
            None => Ok(()),
        }
    }

    fn malformed(&self, reason: String) -> PlanError {
        PlanError::MalformedNode {
            node_id: self.node.id().clone(),
            kind: self.node.kind(),
            reason,
        }
    }
}
