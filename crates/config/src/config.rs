//! Main configuration module for Tally
//!
//! Every setting is read from a single `tally.toml` file.

use crate::error::{ConfigError, ConfigResult};
use crate::genesis::GenesisConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Main configuration struct.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Chain identity configuration
    pub chain: ChainConfig,

    /// Consensus parameters
    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Genesis configuration (bookkeepers)
    pub genesis: GenesisConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use tally_config::Config;
    /// use std::path::Path;
    ///
    /// let config = Config::load(Path::new("tally.toml"))?;
    /// ```
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("Loading configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&content)?;

        info!(
            "Configuration loaded: chain_id={}, chain_name={}, bookkeepers={}",
            config.chain.chain_id,
            config.chain.chain_name,
            config.genesis.bookkeepers.len()
        );

        Ok(config)
    }

    /// Load configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        Self::parse(content)
    }

    fn parse(content: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(content)?;
        debug!("Configuration parsed successfully, validating...");
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.chain.validate()?;
        self.consensus.validate()?;
        self.logging.validate()?;
        self.genesis.validate()?;

        debug!("Configuration validation passed");
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::FileWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

// =============================================================================
// Chain Configuration
// =============================================================================

/// Chain identity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Unique chain identifier
    pub chain_id: u64,

    /// Human-readable chain name
    pub chain_name: String,
}

impl ChainConfig {
    /// Check the chain identity.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.chain_id == 0 {
            return Err(ConfigError::InvalidChainId);
        }
        Ok(())
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            chain_name: "Tally Local".to_string(),
        }
    }
}

// =============================================================================
// Consensus Configuration
// =============================================================================

/// Block intervals at or below this are rejected.
pub const MIN_BLOCK_INTERVAL_MS: u64 = 2_000;

/// Block interval used when none is configured.
pub const DEFAULT_BLOCK_INTERVAL_MS: u64 = 6_000;

/// dBFT consensus parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Target time between blocks, also the base of the view-change backoff
    pub block_interval_ms: u64,

    /// How far in the future a PrepareRequest timestamp may be
    pub max_clock_skew_secs: u64,

    /// Cap on the exponential view timeout `block_interval << (view + 1)`
    pub max_view_timeout_ms: u64,

    /// Number of recent blocks whose transactions are remembered for
    /// duplicate detection
    pub increment_window: u32,

    /// Maximum pool transactions pulled into one proposal
    pub max_block_transactions: usize,

    /// Capacity of the consensus service inbox
    pub inbox_capacity: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_interval_ms: DEFAULT_BLOCK_INTERVAL_MS,
            max_clock_skew_secs: 600,
            max_view_timeout_ms: 3_600_000,
            increment_window: 10,
            max_block_transactions: 1_000,
            inbox_capacity: 1_024,
        }
    }
}

impl ConsensusConfig {
    /// Check ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.block_interval_ms <= MIN_BLOCK_INTERVAL_MS {
            return Err(ConfigError::InvalidBlockInterval {
                value: self.block_interval_ms,
                min: MIN_BLOCK_INTERVAL_MS,
            });
        }

        if self.max_clock_skew_secs == 0 {
            return Err(ConfigError::InvalidTimeout {
                name: "max_clock_skew_secs",
                value: 0,
            });
        }

        if self.max_view_timeout_ms < self.block_interval_ms {
            return Err(ConfigError::InvalidTimeout {
                name: "max_view_timeout_ms",
                value: self.max_view_timeout_ms,
            });
        }

        if self.increment_window == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "increment_window",
            });
        }

        if self.max_block_transactions == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "max_block_transactions",
            });
        }

        if self.inbox_capacity == 0 {
            return Err(ConfigError::ZeroLimit {
                name: "inbox_capacity",
            });
        }

        Ok(())
    }

    /// Block interval as a [`Duration`].
    pub fn block_interval(&self) -> Duration {
        Duration::from_millis(self.block_interval_ms)
    }

    /// Future-timestamp bound as a [`Duration`].
    pub fn max_clock_skew(&self) -> Duration {
        Duration::from_secs(self.max_clock_skew_secs)
    }

    /// View timeout cap as a [`Duration`].
    pub fn max_view_timeout(&self) -> Duration {
        Duration::from_millis(self.max_view_timeout_ms)
    }
}

// =============================================================================
// Logging Configuration
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Check that level and format are known names.
    pub fn validate(&self) -> ConfigResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.level.clone()));
        }

        let valid_formats = ["text", "json", "compact"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(self.format.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consensus_durations() {
        let config = ConsensusConfig::default();
        assert_eq!(config.block_interval(), Duration::from_secs(6));
        assert_eq!(config.max_clock_skew(), Duration::from_secs(600));
        assert_eq!(config.max_view_timeout(), Duration::from_secs(3600));
    }

    #[test]
    fn test_block_interval_minimum_is_exclusive() {
        let mut config = ConsensusConfig::default();
        config.block_interval_ms = MIN_BLOCK_INTERVAL_MS;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBlockInterval { value: 2000, .. })
        ));

        config.block_interval_ms = MIN_BLOCK_INTERVAL_MS + 1;
        assert!(config.validate().is_ok());
    }
}
