//! # Plan Optimizer
//!
//! Runs a fixed sequence of plan-to-plan passes with safety checks around them:
//!
//! ```text
//! PlanNode -> [depth check] -> [validate] -> pass 1 .. pass N -> [validate] -> PlanNode
//! ```
//!
//! Every pass must leave the root's output symbols exactly as it found them;
//! a pass that does not is reported as [`PlanError::RootSchemaChanged`].
//!
//! Batches of independent plans can be optimized in parallel with
//! [`Optimizer::optimize_all`].

pub mod prune_unreferenced_outputs;

pub use prune_unreferenced_outputs::{prune, prune_with_required, PruneUnreferencedOutputs};

use crate::config::OptimizerConfig;
use crate::error::{PlanError, PlanResult};
use crate::plan::{validate_plan, PlanBuilder, PlanNode, PlanNodeId, PlanNodeIdAllocator};
use crate::symbol::SymbolAllocator;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// A plan-to-plan rewrite
pub trait PlanOptimizer: Send + Sync {
    /// Stable name used in logs and errors
    fn name(&self) -> &'static str;

    fn optimize(&self, plan: PlanNode, context: &mut OptimizerContext) -> PlanResult<PlanNode>;
}

/// Allocators a pass may draw fresh symbols and node ids from
#[derive(Debug, Clone, Default)]
pub struct OptimizerContext {
    pub symbols: SymbolAllocator,
    pub ids: PlanNodeIdAllocator,
}

impl OptimizerContext {
    pub fn new(symbols: SymbolAllocator, ids: PlanNodeIdAllocator) -> Self {
        OptimizerContext { symbols, ids }
    }
}

impl From<PlanBuilder> for OptimizerContext {
    fn from(builder: PlanBuilder) -> Self {
        let (symbols, ids) = builder.into_allocators();
        OptimizerContext { symbols, ids }
    }
}

/// Statistics about one optimizer run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptimizationStats {
    /// Total plan nodes before optimization
    pub nodes_before: usize,

    /// Total plan nodes after optimization
    pub nodes_after: usize,

    /// Nodes present before but gone afterwards
    pub nodes_elided: usize,

    /// Names of the passes that ran, in order
    pub passes: Vec<&'static str>,

    #[serde(with = "duration_micros")]
    pub elapsed: Duration,
}

mod duration_micros {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_micros() as u64)
    }
}

/// An optimized plan and how it got there
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizedPlan {
    pub plan: PlanNode,
    pub stats: OptimizationStats,
}

/// Pass pipeline driven by [`OptimizerConfig`]
pub struct Optimizer {
    passes: Vec<Box<dyn PlanOptimizer>>,
    config: OptimizerConfig,
}

impl Optimizer {
    /// Optimizer with the passes enabled in `config`
    pub fn new(config: OptimizerConfig) -> Self {
        let mut passes: Vec<Box<dyn PlanOptimizer>> = Vec::new();
        if config.prune_unreferenced_outputs {
            passes.push(Box::new(PruneUnreferencedOutputs::new()));
        }
        Optimizer { passes, config }
    }

    /// Optimizer running exactly `passes`, in order
    pub fn with_passes(config: OptimizerConfig, passes: Vec<Box<dyn PlanOptimizer>>) -> Self {
        Optimizer { passes, config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Run every pass over `plan`
    pub fn optimize(&self, plan: PlanNode, context: &mut OptimizerContext) -> PlanResult<OptimizedPlan> {
        let start = Instant::now();

        let depth = plan.depth();
        if self.config.max_plan_depth > 0 && depth > self.config.max_plan_depth {
            warn!(depth, limit = self.config.max_plan_depth, "plan_too_deep");
            return Err(PlanError::PlanTooDeep {
                depth,
                limit: self.config.max_plan_depth,
            });
        }

        if self.config.validate_input {
            validate_plan(&plan)?;
        }

        let ids_before: HashSet<PlanNodeId> = plan.iter().map(|n| n.id().clone()).collect();
        let mut stats = OptimizationStats {
            nodes_before: ids_before.len(),
            ..OptimizationStats::default()
        };

        let mut current = plan;
        for pass in &self.passes {
            let before = current.output_symbols();
            current = pass.optimize(current, context)?;
            let after = current.output_symbols();
            if before != after {
                return Err(PlanError::RootSchemaChanged {
                    pass: pass.name(),
                    before,
                    after,
                });
            }
            stats.passes.push(pass.name());
        }

        if self.config.validate_output {
            validate_plan(&current)?;
        }

        let ids_after: HashSet<&PlanNodeId> = current.iter().map(PlanNode::id).collect();
        stats.nodes_after = ids_after.len();
        stats.nodes_elided = ids_before.iter().filter(|id| !ids_after.contains(id)).count();
        stats.elapsed = start.elapsed();

        debug!(
            nodes_before = stats.nodes_before,
            nodes_after = stats.nodes_after,
            nodes_elided = stats.nodes_elided,
            elapsed_us = stats.elapsed.as_micros() as u64,
            "plan_optimized"
        );

        Ok(OptimizedPlan { plan: current, stats })
    }

    /// Optimize independent plans in parallel, each with a fresh context.
    ///
    /// Results are returned in input order. A failure in one plan does not
    /// affect the others.
    pub fn optimize_all(&self, plans: Vec<PlanNode>) -> Vec<PlanResult<OptimizedPlan>> {
        let run = || -> Vec<PlanResult<OptimizedPlan>> {
            plans
                .into_par_iter()
                .map(|plan| self.optimize(plan, &mut OptimizerContext::default()))
                .collect()
        };

        if self.config.num_threads == 0 {
            return run();
        }

        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.num_threads)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(e) => {
                warn!(error = %e, "thread_pool_unavailable");
                run()
            }
        }
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Optimizer::new(OptimizerConfig::default())
    }
}
