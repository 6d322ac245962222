//! Tracing subscriber setup for binaries.
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the embedding process. Events go to stderr so stdout stays free for the
//! plan output.

use crate::config::LoggingConfig;
use std::env;

/// Install a global fmt subscriber.
///
/// `PLANPRUNE_LOG` overrides `logging.level` (any `EnvFilter` directive) and
/// `PLANPRUNE_LOG_JSON` overrides `logging.format` (`0` = text).
pub fn init_tracing(logging_config: &LoggingConfig) {
    let json = env::var("PLANPRUNE_LOG_JSON")
        .ok()
        .map_or_else(|| logging_config.is_json(), |v| v != "0");

    let level = env::var("PLANPRUNE_LOG")
        .ok()
        .unwrap_or_else(|| logging_config.level.clone());

    let filter = || {
        tracing_subscriber::EnvFilter::try_new(&level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };

    let base = || {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_ansi(false)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(base().json().finish())
    } else {
        Box::new(base().compact().finish())
    };

    // A second call (tests, embedding) keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber);
}
