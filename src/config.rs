//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (PLANPRUNE_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [optimizer]
//! prune_unreferenced_outputs = true
//! validate_output = true
//! max_plan_depth = 1000
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! PLANPRUNE_OPTIMIZER__MAX_PLAN_DEPTH=5000
//! PLANPRUNE_LOGGING__FORMAT=json
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Optimizer pass selection and safety checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Run the unreferenced-output pruning pass
    #[serde(default = "default_true")]
    pub prune_unreferenced_outputs: bool,

    /// Validate the plan before any pass runs
    #[serde(default = "default_true")]
    pub validate_input: bool,

    /// Validate the plan after all passes ran
    #[serde(default = "default_true")]
    pub validate_output: bool,

    /// Reject plans deeper than this many nodes. 0 = unlimited.
    #[serde(default = "default_max_plan_depth")]
    pub max_plan_depth: usize,

    /// Worker threads for batch optimization
    /// 0 = use all available CPU cores
    #[serde(default)]
    pub num_threads: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

fn default_true() -> bool {
    true
}

fn default_max_plan_depth() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (PLANPRUNE_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("PLANPRUNE_").split("__"))
            .extract()
    }

    /// Load configuration from specific file path
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PLANPRUNE_").split("__"))
            .extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            optimizer: OptimizerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            prune_unreferenced_outputs: true,
            validate_input: true,
            validate_output: true,
            max_plan_depth: default_max_plan_depth(),
            num_threads: 0, // 0 = use all available CPU cores
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
