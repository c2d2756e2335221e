//! Construction configuration.
//!
//! Every field has a default so a partial JSON document is enough:
//!
//! ```
//! use mesh_weave::config::{MeshConfig, Verbosity};
//!
//! let cfg = MeshConfig::from_json_str(r#"{ "verbosity": "high" }"#).unwrap();
//! assert_eq!(cfg.verbosity, Verbosity::High);
//! assert!(cfg.collapse_degenerate_edges);
//! ```

use serde::{Deserialize, Serialize};

use crate::mesh::factory::Framework;
use crate::mesh_error::MeshError;
use crate::partition::PartitionMethod;

/// How chatty tolerant code paths are.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    #[default]
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Framework preference order.
    pub frameworks: Vec<Framework>,
    /// Cell assignment used when rank 0 distributes a global mesh.
    pub partition: PartitionMethod,
    pub verbosity: Verbosity,
    pub collapse_degenerate_edges: bool,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            frameworks: vec![Framework::Sieve, Framework::Simple],
            partition: PartitionMethod::Block,
            verbosity: Verbosity::Low,
            collapse_degenerate_edges: true,
        }
    }
}

impl MeshConfig {
    pub fn from_json_str(json: &str) -> Result<Self, MeshError> {
        let cfg: MeshConfig = serde_json::from_str(json).map_err(|e| MeshError::Config(e.to_string()))?;
        if cfg.frameworks.is_empty() {
            return Err(MeshError::Config("framework preference list is empty".into()));
        }
        Ok(cfg)
    }

    pub fn with_frameworks(mut self, frameworks: Vec<Framework>) -> Self {
        self.frameworks = frameworks;
        self
    }

    pub fn with_partition(mut self, partition: PartitionMethod) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = MeshConfig::from_json_str("{}").unwrap();
        assert_eq!(cfg, MeshConfig::default());
        assert_eq!(cfg.frameworks, vec![Framework::Sieve, Framework::Simple]);
    }

    #[test]
    fn explicit_partition_parses() {
        let cfg = MeshConfig::from_json_str(
            r#"{ "frameworks": ["simple"], "partition": { "explicit": { "parts": [0, 1, 1] } } }"#,
        )
        .unwrap();
        assert_eq!(cfg.frameworks, vec![Framework::Simple]);
        assert_eq!(cfg.partition, PartitionMethod::Explicit { parts: vec![0, 1, 1] });
    }

    #[test]
    fn bad_documents_are_config_errors() {
        assert!(matches!(
            MeshConfig::from_json_str(r#"{ "verbosity": "loud" }"#),
            Err(MeshError::Config(_))
        ));
        assert!(matches!(
            MeshConfig::from_json_str(r#"{ "frameworks": [] }"#),
            Err(MeshError::Config(_))
        ));
    }
}
