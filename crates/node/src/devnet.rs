//! Local multi-bookkeeper network.
//!
//! Runs `N` consensus services in one process. Each has its own
//! [`MemoryLedger`]; they share a [`MemoryTxPool`] and talk over a
//! [`LoopbackBus`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tally_config::Config;
use tally_consensus::{
    inbox, Collaborators, DbftService, ServiceConfig, ServiceHandle, TokioRoundTimer,
};
use tally_core::traits::{Election, Ledger, Signer, Verifier};
use tally_core::{EcdsaVerifier, KeyPairSigner};
use tally_crypto::PublicKey;
use tally_types::Transaction;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::election::StaticElection;
use crate::ledger::MemoryLedger;
use crate::network::{LoopbackBroadcast, LoopbackBus};
use crate::pool::MemoryTxPool;

/// One in-process bookkeeper.
pub struct DevnetNode {
    /// Bookkeeper key
    pub public_key: PublicKey,
    /// Service inbox
    pub handle: ServiceHandle,
    /// This node's chain
    pub ledger: Arc<MemoryLedger>,
    task: JoinHandle<()>,
}

/// How [`Devnet::run_until`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every ledger reached the target height
    Reached,
    /// Ctrl-C was pressed first
    Interrupted,
}

/// A set of bookkeepers wired together in memory.
pub struct Devnet {
    nodes: Vec<DevnetNode>,
    pool: Arc<MemoryTxPool>,
    load: Option<JoinHandle<()>>,
}

impl Devnet {
    /// Build `n` bookkeepers with fresh keys. The genesis bookkeeper set of
    /// `config` is replaced by the generated keys.
    ///
    /// Must be called inside a tokio runtime; services are spawned stopped.
    pub fn build(config: &Config, n: usize) -> Result<Self> {
        if n == 0 {
            bail!("a devnet needs at least one bookkeeper");
        }
        let signers: Vec<KeyPairSigner> = (0..n).map(|_| KeyPairSigner::random()).collect();
        Self::with_signers(config, signers)
    }

    /// Build one bookkeeper per signer, in index order.
    pub fn with_signers(config: &Config, signers: Vec<KeyPairSigner>) -> Result<Self> {
        let keys: Vec<PublicKey> = signers.iter().map(|s| s.public_key()).collect();
        let mut genesis_config = config.genesis.clone();
        genesis_config.set_bookkeepers(&keys);
        genesis_config.validate().context("generated genesis is invalid")?;
        let genesis = genesis_config.genesis_block()?;

        let service_config = ServiceConfig::from(&config.consensus);
        let verifier: Arc<dyn Verifier> = Arc::new(EcdsaVerifier);
        let election: Arc<dyn Election> = Arc::new(StaticElection::new(keys));
        let pool = Arc::new(MemoryTxPool::new());
        let bus = LoopbackBus::new();

        let mut nodes = Vec::with_capacity(signers.len());
        for signer in signers {
            let public_key = signer.public_key();
            let (handle, rx) = inbox(service_config.inbox_capacity);

            let ledger = Arc::new(
                MemoryLedger::new(genesis.clone(), verifier.clone()).with_pool(pool.clone()),
            );
            ledger.set_listener(handle.clone());
            let slot = bus.register(handle.clone());

            let deps = Collaborators {
                ledger: ledger.clone(),
                pool: pool.clone(),
                election: election.clone(),
                signer: Arc::new(signer),
                verifier: verifier.clone(),
                broadcast: Arc::new(LoopbackBroadcast::new(bus.clone(), slot)),
            };
            let timer = TokioRoundTimer::new(handle.sender());
            let service = DbftService::new(service_config.clone(), deps, Box::new(timer));
            let task = tokio::spawn(service.run(rx));

            debug!(slot, key = %public_key, "Devnet bookkeeper created");
            nodes.push(DevnetNode {
                public_key,
                handle,
                ledger,
                task,
            });
        }

        info!(
            bookkeepers = nodes.len(),
            genesis = %genesis.hash(),
            block_interval_ms = service_config.block_interval.as_millis() as u64,
            "Devnet built"
        );
        Ok(Self {
            nodes,
            pool,
            load: None,
        })
    }

    /// The bookkeepers, in index order.
    pub fn nodes(&self) -> &[DevnetNode] {
        &self.nodes
    }

    /// Shared transaction pool.
    pub fn pool(&self) -> &Arc<MemoryTxPool> {
        &self.pool
    }

    /// Ledger height of every node.
    pub fn heights(&self) -> Vec<u32> {
        self.nodes.iter().map(|n| n.ledger.current_height()).collect()
    }

    /// Start every service.
    pub async fn start(&self) -> Result<()> {
        for node in &self.nodes {
            node.handle.start().await?;
        }
        Ok(())
    }

    /// Submit a dummy transaction to the pool every `every`.
    pub fn spawn_load(&mut self, every: Duration) {
        let pool = self.pool.clone();
        self.load = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            let mut nonce = 0u64;
            loop {
                ticker.tick().await;
                nonce += 1;
                if let Err(e) = pool.submit(Transaction::new(nonce, b"devnet".to_vec())) {
                    warn!(nonce, error = %e, "Load transaction refused");
                }
            }
        }));
    }

    /// Wait until every ledger holds `height`, or until Ctrl-C.
    pub async fn run_until(&self, height: u32, poll: Duration) -> Result<RunOutcome> {
        let mut ticker = tokio::time::interval(poll);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let heights = self.heights();
                    debug!(?heights, target = height, "Devnet progress");
                    if heights.iter().all(|h| *h >= height) {
                        info!(height, "Every bookkeeper reached target height");
                        return Ok(RunOutcome::Reached);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, stopping devnet");
                    return Ok(RunOutcome::Interrupted);
                }
            }
        }
    }

    /// Stop every service and wait for their loops to end.
    pub async fn shutdown(self) -> Result<()> {
        if let Some(load) = self.load {
            load.abort();
        }
        for node in &self.nodes {
            if let Err(e) = node.handle.stop().await {
                warn!(key = %node.public_key, error = %e, "Service already stopped");
            }
        }
        for node in self.nodes {
            node.task.await.context("consensus task panicked")?;
        }
        info!("Devnet stopped");
        Ok(())
    }
}
