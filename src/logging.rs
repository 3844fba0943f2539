//! Structured logging for graph construction
//!
//! Every collective stage emits `tracing` events tagged with the worker
//! rank. Filters come from the `TRUENO_GRAPH_LOG` environment variable.
//!
//! # Environment Variables
//!
//! - `TRUENO_GRAPH_LOG=info` - build completion only
//! - `TRUENO_GRAPH_LOG=debug` - one event per shuffle, renumber and merge
//! - `TRUENO_GRAPH_LOG=trueno_graph_dist::comm=trace` - every all-to-all
//!
//! # Example
//!
//! ```ignore
//! use trueno_graph_dist::logging;
//!
//! logging::init();
//! // or
//! logging::init_with_default("debug");
//! ```

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter variable read by every initialiser
pub const LOG_ENV: &str = "TRUENO_GRAPH_LOG";

/// Install the global subscriber at `info` unless `TRUENO_GRAPH_LOG` says otherwise
///
/// Later calls are ignored; tracing allows one global subscriber.
pub fn init() {
    init_with_default("info");
}

/// Install the global subscriber with a custom default level
pub fn init_with_default(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let _ = subscriber.try_init();
}

/// Install a JSON subscriber for log aggregation
pub fn init_json() {
    init_json_with_default("info");
}

fn init_json_with_default(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .json();

    let _ = subscriber.try_init();
}

/// Install the subscriber described by a `[logging]` config section
pub fn init_from(config: &LoggingConfig) {
    if config.json {
        init_json_with_default(&config.level);
    } else {
        init_with_default(&config.level);
    }
}
