//! Tests for Config module

use tally_config::{
    ChainConfig, Config, ConfigError, ConsensusConfig, GenesisConfig, LoggingConfig,
    DEFAULT_BLOCK_INTERVAL_MS,
};
use tally_crypto::PrivateKey;

fn genesis_with(n: usize) -> GenesisConfig {
    let keys: Vec<_> = (0..n).map(|_| PrivateKey::random().public_key()).collect();
    let mut genesis = GenesisConfig {
        timestamp: 1_700_000_000,
        ..Default::default()
    };
    genesis.set_bookkeepers(&keys);
    genesis
}

fn sample_toml(bookkeepers: &[String]) -> String {
    let list = bookkeepers
        .iter()
        .map(|k| format!("\"{}\"", k))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        r#"
[chain]
chain_id = 7
chain_name = "tally-test"

[consensus]
block_interval_ms = 3000

[logging]
level = "debug"
format = "json"

[genesis]
timestamp = 1700000000
bookkeepers = [{}]
"#,
        list
    )
}

#[test]
fn test_default_sections() {
    let config = Config::default();
    assert_eq!(config.chain.chain_id, 1);
    assert_eq!(config.consensus.block_interval_ms, DEFAULT_BLOCK_INTERVAL_MS);
    assert_eq!(config.consensus.increment_window, 10);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_default_config_needs_bookkeepers() {
    assert!(matches!(
        Config::default().validate(),
        Err(ConfigError::NoBookkeepers)
    ));
}

#[test]
fn test_parse_from_str_fills_defaults() {
    let genesis = genesis_with(4);
    let config = Config::from_str(&sample_toml(&genesis.bookkeepers)).unwrap();

    assert_eq!(config.chain.chain_id, 7);
    assert_eq!(config.consensus.block_interval_ms, 3000);
    assert_eq!(config.consensus.max_clock_skew_secs, 600);
    assert_eq!(config.logging.format, "json");
    assert_eq!(config.genesis.bookkeeper_keys().unwrap().len(), 4);
}

#[test]
fn test_invalid_chain_id() {
    let config = ChainConfig {
        chain_id: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(ConfigError::InvalidChainId)));
}

#[test]
fn test_invalid_block_interval() {
    let config = ConsensusConfig {
        block_interval_ms: 1500,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidBlockInterval {
            value: 1500,
            min: 2000
        })
    ));
}

#[test]
fn test_view_timeout_cap_below_interval_rejected() {
    let config = ConsensusConfig {
        max_view_timeout_ms: 1000,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidTimeout {
            name: "max_view_timeout_ms",
            ..
        })
    ));
}

#[test]
fn test_zero_limits_rejected() {
    let config = ConsensusConfig {
        inbox_capacity: 0,
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroLimit {
            name: "inbox_capacity"
        })
    ));
}

#[test]
fn test_invalid_logging() {
    let config = LoggingConfig {
        level: "loud".into(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLogLevel(_))
    ));

    let config = LoggingConfig {
        format: "pretty".into(),
        ..Default::default()
    };
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidLogFormat(_))
    ));
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tally.toml");

    let config = Config {
        genesis: genesis_with(3),
        ..Default::default()
    };
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded.genesis.bookkeepers, config.genesis.bookkeepers);
    assert_eq!(
        loaded.consensus.block_interval_ms,
        config.consensus.block_interval_ms
    );
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::FileRead { .. }));
}

#[test]
fn test_malformed_toml() {
    assert!(matches!(
        Config::from_str("[chain\nchain_id = 1"),
        Err(ConfigError::TomlParse(_))
    ));
}
