//! Field types shared by plan nodes: assignments, orderings, aggregations,
//! window specifications, and partitioning schemes.

use crate::expr::{Expression, Literal};
use crate::symbol::{DataType, Symbol, SymbolSet, Variable};
use serde::{Deserialize, Serialize};
use std::fmt;

// Assignments
/// Ordered output-variable -> expression mapping (projection list).
///
/// Keys are unique. Order is kept across rewrites so plans compare
/// deterministically.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assignments(Vec<(Variable, Expression)>);

impl Assignments {
    pub fn new() -> Self {
        Assignments(Vec::new())
    }

    /// Identity projection: every variable maps to itself
    pub fn identity<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> Self {
        variables
            .into_iter()
            .map(|v| (v.clone(), Expression::variable(v)))
            .collect()
    }

    /// Append an assignment, replacing any previous one for the same output
    pub fn put(&mut self, output: Variable, expression: Expression) {
        if let Some(existing) = self.0.iter_mut().find(|(v, _)| v.name() == output.name()) {
            existing.1 = expression;
        } else {
            self.0.push((output, expression));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Variable, Expression)> {
        self.0.iter()
    }

    pub fn outputs(&self) -> Vec<Variable> {
        self.0.iter().map(|(v, _)| v.clone()).collect()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Expression> {
        self.0
            .iter()
            .find(|(v, _)| v.name() == symbol.name())
            .map(|(_, e)| e)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Symbols referenced by any right-hand side
    pub fn referenced_symbols(&self) -> SymbolSet {
        let mut symbols = SymbolSet::new();
        for (_, expression) in &self.0 {
            expression.collect_symbols(&mut symbols);
        }
        symbols
    }
}

impl FromIterator<(Variable, Expression)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (Variable, Expression)>>(iter: I) -> Self {
        let mut assignments = Assignments::new();
        for (variable, expression) in iter {
            assignments.put(variable, expression);
        }
        assignments
    }
}

impl IntoIterator for Assignments {
    type Item = (Variable, Expression);
    type IntoIter = std::vec::IntoIter<(Variable, Expression)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Assignments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(v, e)| format!("{v} := {e}")).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

// Ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ordering {
    pub variable: Variable,
    pub sort_order: SortOrder,
}

/// ORDER BY list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderingScheme {
    pub order_by: Vec<Ordering>,
}

impl OrderingScheme {
    pub fn new(order_by: Vec<Ordering>) -> Self {
        OrderingScheme { order_by }
    }

    /// Ascending, nulls last on every key
    pub fn ascending<'a>(variables: impl IntoIterator<Item = &'a Variable>) -> Self {
        OrderingScheme {
            order_by: variables
                .into_iter()
                .map(|v| Ordering {
                    variable: v.clone(),
                    sort_order: SortOrder::AscNullsLast,
                })
                .collect(),
        }
    }

    pub fn order_by_variables(&self) -> impl Iterator<Item = &Variable> {
        self.order_by.iter().map(|o| &o.variable)
    }

    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.order_by.iter().map(|o| o.variable.symbol())
    }
}

// Aggregation
/// A single aggregate call inside an aggregation node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: String,
    pub arguments: Vec<Expression>,
    pub return_type: DataType,
    #[serde(default)]
    pub filter: Option<Expression>,
    #[serde(default)]
    pub ordering_scheme: Option<OrderingScheme>,
    #[serde(default)]
    pub distinct: bool,
    /// Boolean column selecting the rows fed to this aggregate
    #[serde(default)]
    pub mask: Option<Variable>,
}

impl Aggregation {
    pub fn new(function: impl Into<String>, arguments: Vec<Expression>, return_type: DataType) -> Self {
        Aggregation {
            function: function.into(),
            arguments,
            return_type,
            filter: None,
            ordering_scheme: None,
            distinct: false,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: Variable) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Arguments, filter, ordering and mask symbols
    pub fn referenced_symbols(&self) -> SymbolSet {
        let mut symbols = SymbolSet::new();
        for argument in &self.arguments {
            argument.collect_symbols(&mut symbols);
        }
        if let Some(filter) = &self.filter {
            filter.collect_symbols(&mut symbols);
        }
        if let Some(ordering) = &self.ordering_scheme {
            symbols.extend(ordering.symbols());
        }
        if let Some(mask) = &self.mask {
            symbols.insert(mask.symbol());
        }
        symbols
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self.arguments.iter().map(ToString::to_string).collect();
        let distinct = if self.distinct { "DISTINCT " } else { "" };
        write!(f, "{}({distinct}{})", self.function, args.join(", "))?;
        if let Some(mask) = &self.mask {
            write!(f, " (mask = {mask})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStep {
    Single,
    Partial,
    Intermediate,
    Final,
}

impl AggregationStep {
    /// Whether a global grouping set produces a row even for empty input
    pub fn outputs_default_row(self) -> bool {
        matches!(self, AggregationStep::Single | AggregationStep::Final)
    }
}

/// Grouping keys plus the grouping-set shape over them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingSetDescriptor {
    pub grouping_keys: Vec<Variable>,
    pub grouping_set_count: usize,
    /// Indices of the grouping sets that are empty (global)
    pub global_grouping_sets: Vec<usize>,
}

impl GroupingSetDescriptor {
    /// One grouping set over `keys`; global when `keys` is empty
    pub fn single(keys: Vec<Variable>) -> Self {
        let global_grouping_sets = if keys.is_empty() { vec![0] } else { Vec::new() };
        GroupingSetDescriptor {
            grouping_keys: keys,
            grouping_set_count: 1,
            global_grouping_sets,
        }
    }

    pub fn has_empty_grouping_set(&self) -> bool {
        !self.global_grouping_sets.is_empty()
    }

    pub fn has_non_empty_grouping_set(&self) -> bool {
        self.grouping_set_count > self.global_grouping_sets.len()
    }
}

// Window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameType {
    Range,
    Rows,
    Groups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundType {
    UnboundedPreceding,
    Preceding,
    CurrentRow,
    Following,
    UnboundedFollowing,
}

/// Window frame; `Preceding`/`Following` bounds read their offset from a column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Frame {
    pub frame_type: FrameType,
    pub start_type: BoundType,
    #[serde(default)]
    pub start_value: Option<Variable>,
    pub end_type: BoundType,
    #[serde(default)]
    pub end_value: Option<Variable>,
}

impl Frame {
    pub fn symbols(&self) -> impl Iterator<Item = Symbol> + '_ {
        self.start_value
            .iter()
            .chain(self.end_value.iter())
            .map(Variable::symbol)
    }
}

impl Default for Frame {
    /// `RANGE BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW`
    fn default() -> Self {
        Frame {
            frame_type: FrameType::Range,
            start_type: BoundType::UnboundedPreceding,
            start_value: None,
            end_type: BoundType::CurrentRow,
            end_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFunction {
    pub function: String,
    pub arguments: Vec<Expression>,
    pub return_type: DataType,
    #[serde(default)]
    pub frame: Frame,
    #[serde(default)]
    pub ignore_nulls: bool,
}

impl WindowFunction {
    pub fn new(function: impl Into<String>, arguments: Vec<Expression>, return_type: DataType) -> Self {
        WindowFunction {
            function: function.into(),
            arguments,
            return_type,
            frame: Frame::default(),
            ignore_nulls: false,
        }
    }

    /// Argument and frame-bound symbols
    pub fn referenced_symbols(&self) -> SymbolSet {
        let mut symbols = SymbolSet::new();
        for argument in &self.arguments {
            argument.collect_symbols(&mut symbols);
        }
        symbols.extend(self.frame.symbols());
        symbols
    }
}

/// PARTITION BY / ORDER BY of a window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Specification {
    pub partition_by: Vec<Variable>,
    #[serde(default)]
    pub ordering_scheme: Option<OrderingScheme>,
}

impl Specification {
    pub fn symbols(&self) -> SymbolSet {
        let mut symbols: SymbolSet = self.partition_by.iter().map(Variable::symbol).collect();
        if let Some(ordering) = &self.ordering_scheme {
            symbols.extend(ordering.symbols());
        }
        symbols
    }
}

// Partitioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitioningHandle {
    Single,
    Coordinator,
    FixedHash,
    FixedArbitrary,
    FixedBroadcast,
    Source,
    ScaledWriter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitioningArgument {
    Variable(Variable),
    Constant(Literal),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partitioning {
    pub handle: PartitioningHandle,
    pub arguments: Vec<PartitioningArgument>,
}

impl Partitioning {
    pub fn new(handle: PartitioningHandle, columns: &[Variable]) -> Self {
        Partitioning {
            handle,
            arguments: columns
                .iter()
                .cloned()
                .map(PartitioningArgument::Variable)
                .collect(),
        }
    }

    /// Variable arguments only; constants do not reference columns
    pub fn columns(&self) -> impl Iterator<Item = &Variable> {
        self.arguments.iter().filter_map(|a| match a {
            PartitioningArgument::Variable(v) => Some(v),
            PartitioningArgument::Constant(_) => None,
        })
    }
}

/// How rows are laid out and routed by an exchange or writer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitioningScheme {
    pub partitioning: Partitioning,
    pub output_layout: Vec<Variable>,
    #[serde(default)]
    pub hash_column: Option<Variable>,
    #[serde(default)]
    pub replicate_nulls_and_any: bool,
    #[serde(default)]
    pub bucket_to_partition: Option<Vec<u32>>,
}

impl PartitioningScheme {
    pub fn new(partitioning: Partitioning, output_layout: Vec<Variable>) -> Self {
        PartitioningScheme {
            partitioning,
            output_layout,
            hash_column: None,
            replicate_nulls_and_any: false,
            bucket_to_partition: None,
        }
    }

    /// Partitioning columns plus the hash column
    pub fn symbols(&self) -> SymbolSet {
        let mut symbols: SymbolSet = self.partitioning.columns().map(Variable::symbol).collect();
        if let Some(hash) = &self.hash_column {
            symbols.insert(hash.symbol());
        }
        symbols
    }
}

// Statistics
/// Column statistics computed while writing a table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StatisticAggregations {
    pub aggregations: Vec<(Variable, Aggregation)>,
    pub grouping_variables: Vec<Variable>,
}

impl StatisticAggregations {
    pub fn output_variables(&self) -> Vec<Variable> {
        self.grouping_variables
            .iter()
            .cloned()
            .chain(self.aggregations.iter().map(|(v, _)| v.clone()))
            .collect()
    }

    /// Grouping columns and the inputs of every statistic
    pub fn referenced_symbols(&self) -> SymbolSet {
        let mut symbols: SymbolSet = self.grouping_variables.iter().map(Variable::symbol).collect();
        for (_, aggregation) in &self.aggregations {
            symbols.extend(aggregation.referenced_symbols());
        }
        symbols
    }
}
