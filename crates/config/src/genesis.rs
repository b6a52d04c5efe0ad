//! Genesis configuration and block generation
//!
//! The genesis section fixes the initial ordered bookkeeper set. Bookkeeper
//! index `i` in every later consensus message refers to position `i` of the
//! set in force at that height, which starts out as this list.

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tally_crypto::PublicKey;
use tally_types::Block;
use tracing::{debug, info};

/// Genesis configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenesisConfig {
    /// Genesis block timestamp (unix seconds)
    #[serde(default)]
    pub timestamp: u32,

    /// Hex-encoded compressed secp256k1 public keys, in bookkeeper index order
    #[serde(default)]
    pub bookkeepers: Vec<String>,
}

impl GenesisConfig {
    /// Load genesis configuration from a JSON file.
    ///
    /// Lets several nodes share one genesis file alongside their own TOML.
    pub fn load_json(path: &Path) -> ConfigResult<Self> {
        info!("Loading genesis from JSON file: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let genesis: GenesisConfig = serde_json::from_str(&content)?;
        genesis.validate()?;
        Ok(genesis)
    }

    /// Save genesis configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }

    /// Replace the bookkeeper list with the given keys.
    pub fn set_bookkeepers(&mut self, keys: &[PublicKey]) {
        self.bookkeepers = keys.iter().map(PublicKey::to_hex).collect();
    }

    /// Validate the genesis configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        debug!("Validating genesis configuration");
        let keys = self.bookkeeper_keys()?;

        let mut seen = HashSet::new();
        for (key, raw) in keys.iter().zip(&self.bookkeepers) {
            if !seen.insert(*key) {
                return Err(ConfigError::DuplicateBookkeeper(raw.clone()));
            }
        }

        Ok(())
    }

    /// Parse the bookkeeper list, preserving order.
    pub fn bookkeeper_keys(&self) -> ConfigResult<Vec<PublicKey>> {
        if self.bookkeepers.is_empty() {
            return Err(ConfigError::NoBookkeepers);
        }

        self.bookkeepers
            .iter()
            .map(|raw| {
                PublicKey::from_hex(raw).map_err(|e| ConfigError::InvalidPubkey {
                    key: raw.clone(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }

    /// Build the genesis block.
    pub fn genesis_block(&self) -> ConfigResult<Block> {
        let keys = self.bookkeeper_keys()?;
        let block = Block::genesis(self.timestamp, keys);
        info!(
            "Genesis block {} with {} bookkeepers",
            block.hash(),
            block.header.bookkeepers.len()
        );
        Ok(block)
    }
}
