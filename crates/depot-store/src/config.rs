use std::sync::Arc;

use depot_kv::KeyValueStore;
use serde::{Deserialize, Serialize};

use crate::chain::DeltaChainStore;
use crate::plain::PlainStore;
use crate::traits::ContentStore;

/// Which content store strategy to use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreStrategy {
    /// Every body stored in full.
    Plain,
    /// Logarithmic delta chains keyed off the `parent` hint.
    #[default]
    DeltaChain,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub strategy: StoreStrategy,
    /// Re-hash bodies on read.
    pub verify_reads: bool,
}

/// Build the configured content store over `kv`.
pub fn open_store(config: &StoreConfig, kv: Arc<dyn KeyValueStore>) -> Arc<dyn ContentStore> {
    match config.strategy {
        StoreStrategy::Plain => Arc::new(PlainStore::new(kv).with_verification(config.verify_reads)),
        StoreStrategy::DeltaChain => {
            Arc::new(DeltaChainStore::new(kv).with_verification(config.verify_reads))
        }
    }
}
