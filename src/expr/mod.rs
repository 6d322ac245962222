//! Row expressions and free-symbol extraction.
//!
//! The optimizer treats expressions as opaque except for one question: which
//! symbols does an expression reference? [`referenced_symbols`] answers it as a
//! pure function over the tree.

use crate::symbol::{DataType, Symbol, SymbolSet, Variable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Constant values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Literal {
    Null,
    Boolean(bool),
    Bigint(i64),
    Double(f64),
    Varchar(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Bigint(i) => write!(f, "{i}"),
            Literal::Double(d) => write!(f, "{d}"),
            Literal::Varchar(s) => write!(f, "'{s}'"),
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithmeticOp {
    fn symbol(self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Sub => "-",
            ArithmeticOp::Mul => "*",
            ArithmeticOp::Div => "/",
            ArithmeticOp::Mod => "%",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOp {
    fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
        }
    }
}

/// Scalar expression evaluated per row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Reference to a column produced by a child (or an outer query)
    Variable(Variable),
    Constant(Literal),
    /// Function call, e.g. `lower(name)` or `st_contains(a, b)`
    Call {
        function: String,
        arguments: Vec<Expression>,
        return_type: DataType,
    },
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
}

impl Expression {
    pub fn variable(variable: &Variable) -> Self {
        Expression::Variable(variable.clone())
    }

    pub fn constant(value: Literal) -> Self {
        Expression::Constant(value)
    }

    pub fn bigint(value: i64) -> Self {
        Expression::Constant(Literal::Bigint(value))
    }

    pub fn call(function: impl Into<String>, arguments: Vec<Expression>, return_type: DataType) -> Self {
        Expression::Call {
            function: function.into(),
            arguments,
            return_type,
        }
    }

    pub fn arithmetic(op: ArithmeticOp, left: Expression, right: Expression) -> Self {
        Expression::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comparison(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// All symbols this expression references
    pub fn referenced_symbols(&self) -> SymbolSet {
        let mut symbols = SymbolSet::new();
        self.collect_symbols(&mut symbols);
        symbols
    }

    pub(crate) fn collect_symbols(&self, symbols: &mut SymbolSet) {
        match self {
            Expression::Variable(variable) => {
                symbols.insert(variable.symbol());
            }
            Expression::Constant(_) => {}
            Expression::Call { arguments, .. } => {
                for argument in arguments {
                    argument.collect_symbols(symbols);
                }
            }
            Expression::Arithmetic { left, right, .. } | Expression::Comparison { left, right, .. } => {
                left.collect_symbols(symbols);
                right.collect_symbols(symbols);
            }
            Expression::And(terms) | Expression::Or(terms) => {
                for term in terms {
                    term.collect_symbols(symbols);
                }
            }
            Expression::Not(inner) | Expression::IsNull(inner) => inner.collect_symbols(symbols),
        }
    }

    /// True if the expression references no symbols at all
    pub fn is_constant(&self) -> bool {
        self.referenced_symbols().is_empty()
    }
}

/// Free symbols of an expression
pub fn referenced_symbols(expression: &Expression) -> SymbolSet {
    expression.referenced_symbols()
}

/// Whether `expression` references `symbol`
pub fn references(expression: &Expression, symbol: &Symbol) -> bool {
    expression.referenced_symbols().contains(symbol)
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Variable(v) => write!(f, "{v}"),
            Expression::Constant(c) => write!(f, "{c}"),
            Expression::Call {
                function,
                arguments,
                ..
            } => {
                let args: Vec<String> = arguments.iter().map(ToString::to_string).collect();
                write!(f, "{function}({})", args.join(", "))
            }
            Expression::Arithmetic { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::Comparison { op, left, right } => {
                write!(f, "({left} {} {right})", op.symbol())
            }
            Expression::And(terms) => {
                let parts: Vec<String> = terms.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" AND "))
            }
            Expression::Or(terms) => {
                let parts: Vec<String> = terms.iter().map(ToString::to_string).collect();
                write!(f, "({})", parts.join(" OR "))
            }
            Expression::Not(inner) => write!(f, "NOT {inner}"),
            Expression::IsNull(inner) => write!(f, "{inner} IS NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str) -> Variable {
        Variable::new(name, DataType::Bigint)
    }

    #[test]
    fn test_constant_has_no_symbols() {
        let e = Expression::bigint(42);
        assert!(e.referenced_symbols().is_empty());
        assert!(e.is_constant());
    }

    #[test]
    fn test_arithmetic_collects_both_sides() {
        let e = Expression::arithmetic(
            ArithmeticOp::Add,
            Expression::variable(&var("a")),
            Expression::variable(&var("b")),
        );
        let symbols = referenced_symbols(&e);
        assert_eq!(symbols.len(), 2);
        assert!(symbols.contains(&Symbol::new("a")));
        assert!(symbols.contains(&Symbol::new("b")));
    }

    #[test]
    fn test_nested_boolean_expression() {
        let e = Expression::And(vec![
            Expression::comparison(ComparisonOp::Gt, Expression::variable(&var("x")), Expression::bigint(5)),
            Expression::Or(vec![
                Expression::IsNull(Box::new(Expression::variable(&var("y")))),
                Expression::Not(Box::new(Expression::variable(&var("z")))),
            ]),
        ]);
        let symbols = e.referenced_symbols();
        assert_eq!(symbols.len(), 3);
        assert!(references(&e, &Symbol::new("z")));
        assert!(!references(&e, &Symbol::new("w")));
    }

    #[test]
    fn test_call_deduplicates_symbols() {
        let e = Expression::call(
            "greatest",
            vec![Expression::variable(&var("a")), Expression::variable(&var("a"))],
            DataType::Bigint,
        );
        assert_eq!(e.referenced_symbols().len(), 1);
    }

    #[test]
    fn test_display() {
        let e = Expression::comparison(
            ComparisonOp::Le,
            Expression::arithmetic(ArithmeticOp::Mul, Expression::variable(&var("a")), Expression::bigint(2)),
            Expression::constant(Literal::Varchar("x".to_string())),
        );
        assert_eq!(e.to_string(), "((a * 2) <= 'x')");
    }
}
