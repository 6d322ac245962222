//! Plan Error Types
//!
//! Every variant describes a broken upstream invariant (an optimizer bug), not
//! a problem with the user's query. Callers surface them as internal errors.

use crate::plan::PlanNodeId;
use crate::symbol::Symbol;
use thiserror::Error;

/// Plan optimizer errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Two nodes in one tree share an id
    #[error("Duplicate plan node id: {0}")]
    DuplicateNodeId(PlanNodeId),

    /// `replace_children` received the wrong number of children
    #[error("{kind} node {node_id} expects {expected} children, got {actual}")]
    ChildCountMismatch {
        node_id: PlanNodeId,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A node references a symbol that no child declares
    #[error("{kind} node {node_id} references '{symbol}' which is not produced by its sources")]
    DanglingReference {
        node_id: PlanNodeId,
        kind: &'static str,
        symbol: Symbol,
    },

    /// A node's fields are internally inconsistent
    #[error("Malformed {kind} node {node_id}: {reason}")]
    MalformedNode {
        node_id: PlanNodeId,
        kind: &'static str,
        reason: String,
    },

    /// Plan is deeper than the configured limit
    #[error("Plan depth {depth} exceeds limit {limit}")]
    PlanTooDeep { depth: usize, limit: usize },

    /// An optimizer pass altered the root's declared outputs
    #[error("Pass '{pass}' changed the root output from {before:?} to {after:?}")]
    RootSchemaChanged {
        pass: &'static str,
        before: Vec<Symbol>,
        after: Vec<Symbol>,
    },
}

/// Result type for plan operations
pub type PlanResult<T> = Result<T, PlanError>;
