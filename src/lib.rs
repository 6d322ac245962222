//! # Plan Pruner
//!
//! Dead-column elimination for distributed SQL logical plans. Given a plan
//! tree, every operator is rewritten to compute only the columns some
//! ancestor actually consumes; operators whose sole purpose was a now-unused
//! column disappear entirely.
//!
//! ## Pipeline Architecture
//!
//! ```text
//! JSON plan / PlanBuilder
//!     ↓
//! [Plan Model]                  → PlanNode tree (34 operator kinds)
//!     ↓
//! [Validation]                  → structural + reference checks
//!     ↓
//! [PruneUnreferencedOutputs]    → narrowed PlanNode tree
//!     ↓
//! [Validation]                  → pruned plan is still well-formed
//!     ↓
//! OptimizedPlan { plan, stats }
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use plan_pruner::expr::Expression;
//! use plan_pruner::plan::PlanBuilder;
//! use plan_pruner::symbol::DataType;
//! use plan_pruner::{Optimizer, OptimizerContext};
//!
//! let mut p = PlanBuilder::new();
//! let a = p.variable("a", DataType::Bigint);
//! let b = p.variable("b", DataType::Bigint);
//! let x = p.variable("x", DataType::Bigint);
//!
//! let scan = p.table_scan("t", &[a.clone(), b]);
//! let project = p.project(scan, [(x.clone(), Expression::variable(&a))]);
//! let plan = p.output(project, &[("x", x)]);
//!
//! let mut context = OptimizerContext::from(p);
//! let optimized = Optimizer::default().optimize(plan, &mut context).unwrap();
//! let scan = optimized.plan.iter().last().unwrap();
//! assert_eq!(scan.output_symbols().len(), 1);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `symbol` | Symbols, typed variables, allocator |
//! | `expr` | Row expressions and their free symbols |
//! | `plan` | Plan node model, builder, validation, cardinality |
//! | `optimizer` | Pass driver and the pruning pass |
//! | `config` | Hierarchical configuration |
//! | `logging` | Tracing subscriber setup |

pub mod config;
pub mod error;
pub mod expr;
pub mod logging;
pub mod optimizer;
pub mod plan;
pub mod symbol;

// Re-export public types
pub use config::{Config, LoggingConfig, OptimizerConfig};
pub use error::{PlanError, PlanResult};
pub use expr::Expression;
pub use optimizer::{
    prune, prune_with_required, OptimizationStats, OptimizedPlan, Optimizer, OptimizerContext, PlanOptimizer,
    PruneUnreferencedOutputs,
};
pub use plan::{validate_plan, PlanBuilder, PlanNode, PlanNodeId};
pub use symbol::{DataType, Symbol, SymbolSet, Variable};
