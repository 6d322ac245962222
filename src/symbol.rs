//! Symbols, typed variables, and the symbol allocator.
//!
//! A [`Symbol`] names one column produced somewhere in a plan. Equality and
//! hashing are by name; names are unique within a single compiled plan.
//!
//! A [`Variable`] is the typed counterpart used inside expressions and plan
//! node fields. Plan nodes only ever store variables and derive their declared
//! symbols from them, so the two output lists cannot drift apart.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Set of symbols handed down the tree during pruning
pub type SymbolSet = HashSet<Symbol>;

/// Opaque, name-keyed column identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Lets a `SymbolSet` be probed with a variable name without allocating
impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

/// Semantic column types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Boolean,
    Bigint,
    Integer,
    Double,
    Varchar,
    Date,
    Timestamp,
    /// Opaque row id / fragment payloads produced by writers
    Varbinary,
    Array(Box<DataType>),
    Map(Box<DataType>, Box<DataType>),
    /// Type not yet resolved by analysis
    Unknown,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => f.write_str("boolean"),
            DataType::Bigint => f.write_str("bigint"),
            DataType::Integer => f.write_str("integer"),
            DataType::Double => f.write_str("double"),
            DataType::Varchar => f.write_str("varchar"),
            DataType::Date => f.write_str("date"),
            DataType::Timestamp => f.write_str("timestamp"),
            DataType::Varbinary => f.write_str("varbinary"),
            DataType::Array(element) => write!(f, "array({element})"),
            DataType::Map(key, value) => write!(f, "map({key}, {value})"),
            DataType::Unknown => f.write_str("unknown"),
        }
    }
}

/// Typed reference to a symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variable {
    name: String,
    data_type: DataType,
}

impl Variable {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Variable {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// The name-keyed symbol this variable refers to
    pub fn symbol(&self) -> Symbol {
        Symbol::new(self.name.clone())
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Symbols of a variable list, in order
pub fn symbols_of(variables: &[Variable]) -> Vec<Symbol> {
    variables.iter().map(Variable::symbol).collect()
}

/// Allocates unique variable names and records their types.
///
/// Opaque to the pruning pass: it is threaded through the optimizer context
/// and only used by plan construction.
#[derive(Debug, Clone, Default)]
pub struct SymbolAllocator {
    types: HashMap<Symbol, DataType>,
    next_id: usize,
}

impl SymbolAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh variable named after `hint`.
    ///
    /// The first request for a hint gets the bare name; later requests are
    /// suffixed (`x`, `x_1`, `x_2`, ...).
    pub fn new_variable(&mut self, hint: &str, data_type: DataType) -> Variable {
        let mut name = hint.to_string();
        while self.types.contains_key(&Symbol::new(name.as_str())) {
            self.next_id += 1;
            name = format!("{hint}_{}", self.next_id);
        }
        self.types.insert(Symbol::new(name.as_str()), data_type.clone());
        Variable::new(name, data_type)
    }

    /// Type bound to a symbol, if it was allocated here
    pub fn type_of(&self, symbol: &Symbol) -> Option<&DataType> {
        self.types.get(symbol)
    }

    pub fn types(&self) -> &HashMap<Symbol, DataType> {
        &self.types
    }
}
