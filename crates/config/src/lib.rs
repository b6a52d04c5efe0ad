//! # Tally Configuration
//!
//! Configuration parsing and genesis handling for a Tally bookkeeper node.
//!
//! All node settings live in one `tally.toml` file.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Path::new("tally.toml"))?;
//! println!("Block interval: {:?}", config.consensus.block_interval());
//!
//! let genesis = config.genesis.genesis_block()?;
//! ```
//!
//! ## Configuration Sections
//!
//! - `[chain]` - Chain identity (chain_id, chain_name)
//! - `[consensus]` - dBFT timing and limits (block interval, clock skew, view timeout cap)
//! - `[logging]` - Log level and output format
//! - `[genesis]` - Genesis timestamp and the initial ordered bookkeeper set

mod config;
mod error;
mod genesis;

pub use config::*;
pub use error::*;
pub use genesis::*;
