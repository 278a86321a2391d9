//! Configuration schema and loader for quorumkv clients.
//!
//! A [`ClusterConfig`] is a construction-time value object: it is read once,
//! validated, and then shared immutably by the node store, operation queue,
//! context filter and coordinator.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quorum, timeout and eviction policy for one distributed store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// r: minimum number of replicas that must respond for a successful read.
    #[serde(default = "default_required_reads")]
    pub required_reads: usize,

    /// w: minimum number of replicas that must ack for a successful write.
    #[serde(default = "default_required_writes")]
    pub required_writes: usize,

    /// n: number of replicas per key.
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Overall deadline for a read call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Overall deadline for a write or delete call, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Errors tolerated per node within one window before eviction.
    #[serde(default = "default_max_error_count")]
    pub max_error_count: u32,

    /// Length of the sliding error-count window, in seconds.
    #[serde(default = "default_error_count_period_secs")]
    pub error_count_period_secs: u64,

    /// Whether read repair targets replicas that returned no value.
    #[serde(default = "default_true")]
    pub fill_null_get_results: bool,

    /// Whether read repair targets replicas that returned an error.
    #[serde(default = "default_true")]
    pub fill_error_get_results: bool,

    /// Virtual tokens per node on the consistent-hash ring.
    #[serde(default = "default_tokens_per_node")]
    pub tokens_per_node: usize,

    /// Maximum in-flight operations before the queue rejects submissions.
    #[serde(default = "default_max_queue_depth")]
    pub max_queue_depth: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            required_reads: default_required_reads(),
            required_writes: default_required_writes(),
            replicas: default_replicas(),
            read_timeout_ms: default_timeout_ms(),
            write_timeout_ms: default_timeout_ms(),
            max_error_count: default_max_error_count(),
            error_count_period_secs: default_error_count_period_secs(),
            fill_null_get_results: true,
            fill_error_get_results: true,
            tokens_per_node: default_tokens_per_node(),
            max_queue_depth: default_max_queue_depth(),
        }
    }
}

// --- Defaults ---

fn default_required_reads() -> usize {
    2
}
fn default_required_writes() -> usize {
    2
}
fn default_replicas() -> usize {
    3
}
fn default_timeout_ms() -> u64 {
    1000
}
fn default_max_error_count() -> u32 {
    10
}
fn default_error_count_period_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}
fn default_tokens_per_node() -> usize {
    100
}
fn default_max_queue_depth() -> usize {
    1024
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ClusterConfig {
    /// Validate that configuration values are consistent.
    ///
    /// `required_reads + required_writes > replicas` is the operator's
    /// responsibility: violating it weakens consistency but is legal, so it
    /// only produces a warning.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.replicas == 0 {
            return Err(ConfigError::Invalid("replicas must be > 0".into()));
        }
        if self.required_reads == 0 || self.required_reads > self.replicas {
            return Err(ConfigError::Invalid(format!(
                "required_reads ({}) must be in 1..=replicas ({})",
                self.required_reads, self.replicas
            )));
        }
        if self.required_writes == 0 || self.required_writes > self.replicas {
            return Err(ConfigError::Invalid(format!(
                "required_writes ({}) must be in 1..=replicas ({})",
                self.required_writes, self.replicas
            )));
        }
        if self.tokens_per_node == 0 {
            return Err(ConfigError::Invalid("tokens_per_node must be > 0".into()));
        }
        if self.max_queue_depth == 0 {
            return Err(ConfigError::Invalid("max_queue_depth must be > 0".into()));
        }
        if self.required_reads + self.required_writes <= self.replicas {
            tracing::warn!(
                "r ({}) + w ({}) <= n ({}): reads are not guaranteed to observe the latest write",
                self.required_reads,
                self.required_writes,
                self.replicas
            );
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn error_count_period(&self) -> Duration {
        Duration::from_secs(self.error_count_period_secs)
    }
}

/// Load a `ClusterConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<ClusterConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    load_from_str(&contents)
}

/// Load a `ClusterConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<ClusterConfig, ConfigError> {
    let config: ClusterConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClusterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.required_reads, 2);
        assert_eq!(config.required_writes, 2);
        assert_eq!(config.replicas, 3);
        assert_eq!(config.tokens_per_node, 100);
        assert!(config.fill_null_get_results);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = load_from_str("replicas: 3\n").unwrap();
        assert_eq!(config.replicas, 3);
        assert_eq!(config.required_reads, 2);
        assert_eq!(config.read_timeout(), Duration::from_millis(1000));
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
required_reads: 1
required_writes: 3
replicas: 3
read_timeout_ms: 250
write_timeout_ms: 500
max_error_count: 5
error_count_period_secs: 30
fill_null_get_results: false
fill_error_get_results: false
tokens_per_node: 50
max_queue_depth: 64
"#;
        let config = load_from_str(yaml).unwrap();
        assert_eq!(config.required_reads, 1);
        assert_eq!(config.required_writes, 3);
        assert_eq!(config.write_timeout(), Duration::from_millis(500));
        assert_eq!(config.error_count_period(), Duration::from_secs(30));
        assert!(!config.fill_null_get_results);
        assert_eq!(config.max_queue_depth, 64);
    }

    #[test]
    fn test_rejects_r_greater_than_n() {
        let result = load_from_str("replicas: 3\nrequired_reads: 5\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("required_reads"), "got: {}", err);
    }

    #[test]
    fn test_rejects_w_greater_than_n() {
        let result = load_from_str("replicas: 3\nrequired_writes: 4\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("required_writes"), "got: {}", err);
    }

    #[test]
    fn test_rejects_zero_replicas() {
        let result = load_from_str("replicas: 0\nrequired_reads: 0\nrequired_writes: 0\n");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("replicas"), "got: {}", err);
    }

    #[test]
    fn test_rejects_zero_tokens_per_node() {
        let result = load_from_str("tokens_per_node: 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_weak_quorum_is_legal() {
        // r + w <= n is advisory only; the config still validates.
        let config = load_from_str("replicas: 3\nrequired_reads: 1\nrequired_writes: 1\n").unwrap();
        assert_eq!(config.required_reads, 1);
    }

    #[test]
    fn test_roundtrip_yaml() {
        let config = ClusterConfig::default();
        let serialized = serde_yaml::to_string(&config).unwrap();
        let back = load_from_str(&serialized).unwrap();
        assert_eq!(back.replicas, config.replicas);
        assert_eq!(back.max_queue_depth, config.max_queue_depth);
    }
}
