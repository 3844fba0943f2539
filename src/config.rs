//! File and environment configuration for graph builds
//!
//! Layers, highest priority first:
//!
//! 1. Environment variables (`TRUENO_GRAPH__<SECTION>__<KEY>`)
//! 2. TOML file
//! 3. Built-in defaults
//!
//! ```toml
//! [build]
//! renumber = true
//! merge_policy = "sum"
//! orientation = "destination_major"
//!
//! [collective]
//! timeout_ms = 30000
//!
//! [logging]
//! level = "debug"
//! ```

use crate::builder::{BuildOptions, GraphBuilder};
use crate::comm::LocalCluster;
use crate::types::{GraphProperties, MergePolicy, Orientation};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "TRUENO_GRAPH__";

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Construction defaults
    pub build: BuildSection,
    /// Worker group settings
    pub collective: CollectiveConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

/// `[build]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Renumber external ids
    pub renumber: bool,
    /// Mirror edges of undirected graphs
    pub symmetrize: bool,
    /// Run the collective validation pass
    pub do_expensive_check: bool,
    /// Remove self loops
    pub drop_self_loops: bool,
    /// Build a directed graph
    pub directed: bool,
    /// Keep parallel edges
    pub multigraph: bool,
    /// Parallel-edge policy for simple graphs
    pub merge_policy: Option<MergePolicy>,
    /// Row key of the compressed structure
    pub orientation: Orientation,
}

impl Default for BuildSection {
    fn default() -> Self {
        let options = BuildOptions::default();
        Self {
            renumber: options.renumber,
            symmetrize: options.symmetrize,
            do_expensive_check: options.do_expensive_check,
            drop_self_loops: options.drop_self_loops,
            directed: true,
            multigraph: false,
            merge_policy: options.merge_policy,
            orientation: options.orientation,
        }
    }
}

/// `[collective]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectiveConfig {
    /// Receive timeout per exchange in milliseconds (absent = wait forever)
    pub timeout_ms: Option<u64>,
}

impl CollectiveConfig {
    /// Timeout as a duration
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `TRUENO_GRAPH_LOG` is unset
    pub level: String,
    /// Emit JSON lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl BuildConfig {
    /// Load from an optional TOML file, then apply environment overrides
    ///
    /// A missing file falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file without environment overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }

    /// Apply `TRUENO_GRAPH__*` overrides read through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(&format!("{ENV_PREFIX}{key}"));

        override_flag(get("BUILD__RENUMBER"), &mut self.build.renumber);
        override_flag(get("BUILD__SYMMETRIZE"), &mut self.build.symmetrize);
        override_flag(get("BUILD__DO_EXPENSIVE_CHECK"), &mut self.build.do_expensive_check);
        override_flag(get("BUILD__DROP_SELF_LOOPS"), &mut self.build.drop_self_loops);
        override_flag(get("BUILD__DIRECTED"), &mut self.build.directed);
        override_flag(get("BUILD__MULTIGRAPH"), &mut self.build.multigraph);
        if let Some(policy) = get("BUILD__MERGE_POLICY").and_then(|v| parse_named("merge_policy", v)) {
            self.build.merge_policy = Some(policy);
        }
        if let Some(orientation) = get("BUILD__ORIENTATION").and_then(|v| parse_named("orientation", v)) {
            self.build.orientation = orientation;
        }

        if let Some(val) = get("COLLECTIVE__TIMEOUT_MS") {
            match val.parse() {
                Ok(ms) => self.collective.timeout_ms = Some(ms),
                Err(_) => warn!(value = %val, "ignoring invalid collective timeout"),
            }
        }

        if let Some(val) = get("LOGGING__LEVEL") {
            self.logging.level = val;
        }
        override_flag(get("LOGGING__JSON"), &mut self.logging.json);
    }

    /// Graph model flags from `[build]`
    #[must_use]
    pub fn properties(&self) -> GraphProperties {
        GraphProperties {
            is_directed: self.build.directed,
            is_multigraph: self.build.multigraph,
        }
    }

    /// Construction options from `[build]`
    #[must_use]
    pub fn options(&self) -> BuildOptions {
        BuildOptions {
            renumber: self.build.renumber,
            symmetrize: self.build.symmetrize,
            orientation: self.build.orientation,
            merge_policy: self.build.merge_policy,
            do_expensive_check: self.build.do_expensive_check,
            drop_self_loops: self.build.drop_self_loops,
            ..BuildOptions::default()
        }
    }

    /// Builder preloaded with this configuration
    #[must_use]
    pub fn builder(&self) -> GraphBuilder {
        GraphBuilder::new(self.properties()).with_options(self.options())
    }

    /// In-process worker group honouring `[collective]`
    #[must_use]
    pub fn cluster(&self, workers: usize) -> LocalCluster {
        let cluster = LocalCluster::new(workers);
        match self.collective.timeout() {
            Some(timeout) => cluster.with_timeout(timeout),
            None => cluster,
        }
    }

    /// Serialize back to TOML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}

fn override_flag(value: Option<String>, flag: &mut bool) {
    if let Some(val) = value {
        *flag = val.eq_ignore_ascii_case("true") || val == "1";
    }
}

/// Parse a snake_case enum name the same way the TOML file would
fn parse_named<T: DeserializeOwned>(field: &str, value: String) -> Option<T> {
    match T::deserialize(toml::Value::String(value.clone())) {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(field, value = %value, "ignoring invalid override");
            None
        }
    }
}
