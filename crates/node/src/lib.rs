//! # Tally Node
//!
//! The `tally` binary and the in-memory collaborators it runs the dBFT
//! service with.
//!
//! ## Components
//!
//! - [`MemoryLedger`] - chained block storage with multi-signature checks
//! - [`MemoryTxPool`] - FIFO transaction pool
//! - [`StaticElection`] - fixed bookkeeper set
//! - [`LoopbackBus`] / [`LoopbackBroadcast`] - in-process payload delivery
//! - [`Devnet`] - `N` bookkeepers wired together in one process
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tally_config::Config;
//! use tally_node::{Devnet, RunOutcome};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(std::path::Path::new("tally.toml"))?;
//!     let devnet = Devnet::build(&config, 4)?;
//!     devnet.start().await?;
//!     if devnet.run_until(10, Duration::from_millis(500)).await? == RunOutcome::Reached {
//!         println!("heights: {:?}", devnet.heights());
//!     }
//!     devnet.shutdown().await
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod devnet;
pub mod election;
pub mod ledger;
pub mod network;
pub mod pool;

pub use devnet::{Devnet, DevnetNode, RunOutcome};
pub use election::StaticElection;
pub use ledger::MemoryLedger;
pub use network::{LoopbackBroadcast, LoopbackBus};
pub use pool::MemoryTxPool;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "tally.toml";
