//! `prune-plan` - prune unreferenced outputs from a JSON logical plan
//!
//! ## Usage
//!
//! ```bash
//! # Read a plan from a file, print the pruned plan as JSON
//! prune-plan --input plan.json
//!
//! # Read from stdin, print an indented explain tree and statistics
//! cat plan.json | prune-plan --explain --stats
//!
//! # Use a specific configuration file
//! prune-plan --config pruner.toml --input plan.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use plan_pruner::logging::init_tracing;
use plan_pruner::{Config, Optimizer, OptimizerContext, PlanNode};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::info;

/// Prune unreferenced outputs from a logical plan
#[derive(Parser, Debug)]
#[command(name = "prune-plan")]
#[command(about = "Remove columns no ancestor consumes from a JSON logical plan")]
#[command(version)]
struct Args {
    /// Plan file (JSON); reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Configuration file; defaults to config.toml + config.local.toml
    #[arg(short, long)]
    config: Option<String>,

    /// Print an indented explain tree instead of JSON
    #[arg(short, long)]
    explain: bool,

    /// Print optimization statistics to stderr
    #[arg(short, long)]
    stats: bool,

    /// Skip validation of the input plan
    #[arg(long)]
    no_validate_input: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("failed to load config from {path}"))?,
        None => Config::load().unwrap_or_default(),
    };
    if args.no_validate_input {
        config.optimizer.validate_input = false;
    }

    init_tracing(&config.logging);

    let source = read_input(args.input.as_ref())?;
    let plan: PlanNode = serde_json::from_str(&source).context("failed to parse plan JSON")?;
    info!(
        root = %plan.id(),
        nodes = plan.node_count(),
        depth = plan.depth(),
        "plan_loaded"
    );

    let optimizer = Optimizer::new(config.optimizer.clone());
    let optimized = optimizer
        .optimize(plan, &mut OptimizerContext::default())
        .context("optimization failed")?;

    if args.explain {
        println!("{}", optimized.plan.pretty_print(0));
    } else {
        let json = serde_json::to_string_pretty(&optimized.plan).context("failed to serialize plan")?;
        println!("{json}");
    }

    if args.stats {
        let stats = serde_json::to_string_pretty(&optimized.stats).context("failed to serialize stats")?;
        eprintln!("{stats}");
    }

    Ok(())
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read plan from stdin")?;
            Ok(buffer)
        }
    }
}
