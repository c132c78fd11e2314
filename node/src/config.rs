//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use agora_committee::CommitteeConfig;
use agora_disputes::DisputeConfig;
use agora_tasks::TaskManagerConfig;

use crate::NodeError;

/// Configuration for an Agora node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Component settings live in
/// their own tables (`[tasks]`, `[disputes]`, `[committee]`, `[sweeps]`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Directory holding the component snapshots.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Expected local node id. When set, it must match the signer's id.
    #[serde(default)]
    pub node_id: Option<String>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub tasks: TaskManagerConfig,

    #[serde(default)]
    pub disputes: DisputeConfig,

    #[serde(default)]
    pub committee: CommitteeConfig,

    #[serde(default)]
    pub sweeps: SweepConfig,
}

/// Periods of the background sweeps, in seconds. Zero disables a sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub reputation_decay_secs: u64,
    pub dispute_expiry_secs: u64,
    pub task_expiry_secs: u64,
    pub snapshot_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            reputation_decay_secs: 86_400,
            dispute_expiry_secs: 60,
            task_expiry_secs: 60,
            snapshot_secs: 300,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./agora_data")
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            node_id: None,
            log_format: default_log_format(),
            log_level: default_log_level(),
            tasks: TaskManagerConfig::default(),
            disputes: DisputeConfig::default(),
            committee: CommitteeConfig::default(),
            sweeps: SweepConfig::default(),
        }
    }
}
