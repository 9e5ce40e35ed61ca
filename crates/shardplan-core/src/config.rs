//! Per-query configuration shared by lowering and every emitted task.
//!
//! The planner reads only `max_rows_per_partition`. The rest is opaque here
//! and travels unchanged to the executor through `TaskArg::Config`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Name of the executor that will run the task graph (e.g. "synchronous").
    pub executor: String,

    /// Upper bound on rows per scan partition. Scans with a known row count
    /// are split into `ceil(num_rows / max_rows_per_partition)` partitions.
    pub max_rows_per_partition: u64,

    /// Executor-specific options, passed through untouched.
    pub options: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor: "synchronous".to_string(),
            max_rows_per_partition: 1_000_000,
            options: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SHARDPLAN_EXECUTOR`: executor name
    /// - `SHARDPLAN_MAX_ROWS_PER_PARTITION`: scan split size in rows
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("SHARDPLAN_EXECUTOR") {
            if !s.trim().is_empty() {
                cfg.executor = s.trim().to_string();
            }
        }

        if let Ok(s) = std::env::var("SHARDPLAN_MAX_ROWS_PER_PARTITION") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.max_rows_per_partition = v;
            }
        }

        cfg
    }

    pub fn with_max_rows_per_partition(mut self, rows: u64) -> Self {
        self.max_rows_per_partition = rows;
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_rows_per_partition == 0 {
            return Err(Error::Config(
                "max_rows_per_partition must be at least 1".into(),
            ));
        }
        if self.executor.is_empty() {
            return Err(Error::Config("executor name must not be empty".into()));
        }
        Ok(())
    }
}
