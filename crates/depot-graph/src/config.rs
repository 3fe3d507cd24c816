use depot_store::StoreConfig;
use serde::{Deserialize, Serialize};

use crate::branch::MergeStrategy;
use crate::error::{GraphError, GraphResult};

/// Settings for a [`VersionGraph`](crate::VersionGraph).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub store: StoreConfig,
    /// Strategy used by [`VersionGraph::advance`](crate::VersionGraph::advance).
    pub default_strategy: MergeStrategy,
    /// Message prefix for revert commits; the target's short hash follows.
    pub revert_message: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            default_strategy: MergeStrategy::Forward,
            revert_message: "Revert to".to_string(),
        }
    }
}

impl GraphConfig {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> GraphResult<Self> {
        toml::from_str(text).map_err(|e| GraphError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_store::StoreStrategy;

    #[test]
    fn default_config() {
        let c = GraphConfig::default();
        assert_eq!(c.default_strategy, MergeStrategy::Forward);
        assert_eq!(c.store.strategy, StoreStrategy::DeltaChain);
        assert_eq!(c.revert_message, "Revert to");
    }

    #[test]
    fn parse_toml() {
        let c = GraphConfig::from_toml_str(
            r#"
            default_strategy = "replace"

            [store]
            strategy = "plain"
            verify_reads = true
            "#,
        )
        .unwrap();
        assert_eq!(c.default_strategy, MergeStrategy::Replace);
        assert_eq!(c.store.strategy, StoreStrategy::Plain);
        assert!(c.store.verify_reads);
        assert_eq!(c.revert_message, "Revert to");
    }

    #[test]
    fn bad_toml_is_config_error() {
        let err = GraphConfig::from_toml_str("default_strategy = 7").unwrap_err();
        assert!(matches!(err, GraphError::Config(_)));
    }
}
