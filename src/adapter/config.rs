//! Adapter configuration
//!
//! Built in code or loaded from YAML:
//!
//! ```yaml
//! failure_policy: void_page
//! underflow_policy: append
//! ```

use crate::page::UnderflowPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// What happens to a page when one source's branch fails.
///
/// In both cases every branch of the failing group settles, later groups
/// are skipped, page-loaded still fires and the load reports the failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep whatever the other branches merged.
    #[default]
    PreserveSiblings,
    /// Clear the page before page-loaded fires.
    VoidPage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    pub failure_policy: FailurePolicy,
    pub underflow_policy: UnderflowPolicy,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_underflow_policy(mut self, policy: UnderflowPolicy) -> Self {
        self.underflow_policy = policy;
        self
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_preserve_siblings_and_reject_underflow() {
        let config = AdapterConfig::default();
        assert_eq!(config.failure_policy, FailurePolicy::PreserveSiblings);
        assert_eq!(config.underflow_policy, UnderflowPolicy::Reject);
    }

    #[test]
    fn parses_partial_yaml() {
        let config = AdapterConfig::from_yaml_str("underflow_policy: drop\n").unwrap();
        assert_eq!(config.underflow_policy, UnderflowPolicy::Drop);
        assert_eq!(config.failure_policy, FailurePolicy::PreserveSiblings);
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(matches!(
            AdapterConfig::from_yaml_str("failure_policy: shrug\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("elements.yaml");
        std::fs::write(&path, "failure_policy: void_page\nunderflow_policy: append\n").unwrap();

        let config = AdapterConfig::from_path(&path).unwrap();
        assert_eq!(
            config,
            AdapterConfig::new()
                .with_failure_policy(FailurePolicy::VoidPage)
                .with_underflow_policy(UnderflowPolicy::Append)
        );
        assert!(matches!(
            AdapterConfig::from_path(dir.path().join("missing.yaml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
