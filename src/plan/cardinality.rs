//! Row-count bounds derived from plan structure alone.
//!
//! Used to decide whether a subtree is scalar (exactly one row), which lets
//! the pruning pass drop a lateral side that contributes no columns.

use super::PlanNode;

/// Inclusive bounds on the number of rows a subtree produces.
/// `max = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    pub min: u64,
    pub max: Option<u64>,
}

impl Cardinality {
    pub const UNKNOWN: Cardinality = Cardinality { min: 0, max: None };

    pub fn exactly(rows: u64) -> Self {
        Cardinality {
            min: rows,
            max: Some(rows),
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.min == 1 && self.max == Some(1)
    }

    /// Drops the lower bound (e.g. after a filter)
    fn at_least_zero(self) -> Self {
        Cardinality { min: 0, ..self }
    }

    /// Caps both bounds at `limit`
    fn capped(self, limit: u64) -> Self {
        Cardinality {
            min: self.min.min(limit),
            max: Some(self.max.map_or(limit, |max| max.min(limit))),
        }
    }
}

/// Structural row-count bounds for `node`
pub fn cardinality(node: &PlanNode) -> Cardinality {
    match node {
        PlanNode::Values(n) => Cardinality::exactly(n.rows.len() as u64),
        PlanNode::EnforceSingleRow(_) => Cardinality::exactly(1),
        PlanNode::Aggregation(n) => {
            if n.has_default_output() && !n.grouping_sets.has_non_empty_grouping_set() {
                Cardinality::exactly(1)
            } else {
                Cardinality::UNKNOWN
            }
        }
        PlanNode::Project(n) => cardinality(&n.source),
        PlanNode::AssignUniqueId(n) => cardinality(&n.source),
        PlanNode::MarkDistinct(n) => cardinality(&n.source),
        PlanNode::Window(n) => cardinality(&n.source),
        PlanNode::Sort(n) => cardinality(&n.source),
        PlanNode::Output(n) => cardinality(&n.source),
        PlanNode::RowNumber(n) => match n.max_row_count_per_partition {
            None => cardinality(&n.source),
            Some(_) => cardinality(&n.source).at_least_zero(),
        },
        PlanNode::Exchange(n) if n.sources.len() == 1 => {
            n.sources.first().map_or(Cardinality::UNKNOWN, cardinality)
        }
        PlanNode::Filter(n) => cardinality(&n.source).at_least_zero(),
        PlanNode::Limit(n) => cardinality(&n.source).capped(n.count),
        PlanNode::TopN(n) => cardinality(&n.source).capped(n.count),
        PlanNode::DistinctLimit(n) => {
            let source = cardinality(&n.source);
            // Duplicates collapse, so only a non-empty input is guaranteed a row
            let min = u64::from(source.min > 0);
            Cardinality {
                min,
                max: source.max,
            }
            .capped(n.limit)
        }
        PlanNode::TableScan(_)
        | PlanNode::IndexSource(_)
        | PlanNode::TopNRowNumber(_)
        | PlanNode::Unnest(_)
        | PlanNode::GroupId(_)
        | PlanNode::Exchange(_)
        | PlanNode::Join(_)
        | PlanNode::SemiJoin(_)
        | PlanNode::SpatialJoin(_)
        | PlanNode::IndexJoin(_)
        | PlanNode::Apply(_)
        | PlanNode::LateralJoin(_)
        | PlanNode::Union(_)
        | PlanNode::Intersect(_)
        | PlanNode::Except(_)
        | PlanNode::TableWriter(_)
        | PlanNode::TableFinish(_)
        | PlanNode::StatisticsWriter(_)
        | PlanNode::Delete(_)
        | PlanNode::ExplainAnalyze(_) => Cardinality::UNKNOWN,
    }
}

/// Whether `node` is guaranteed to produce exactly one row
pub fn is_scalar(node: &PlanNode) -> bool {
    cardinality(node).is_scalar()
}
