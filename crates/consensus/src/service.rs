//! dBFT consensus service.
//!
//! The service is an actor: network payloads, timer ticks and lifecycle
//! commands all arrive as [`Command`]s on one inbox and are handled one at a
//! time by [`DbftService::run`]. Handlers are synchronous and run to
//! completion, so the [`RoundContext`] has exactly one writer.
//!
//! ## Round flow
//!
//! ```text
//! BlockPersisted / Start
//!        │
//!        ▼
//! initialize_consensus(0) ── reset round, arm timer
//!        │
//!        ├── primary: timer ──► PrepareRequest{txs, sig}
//!        │
//!        └── backup:  PrepareRequest ──► verify ──► PrepareResponse{sig}
//!
//! signature_count() >= M ──► Ledger::add_block ──► BlockSignatures gossip
//!
//! timeout without progress ──► ChangeView{expected} ──► M matching ──► initialize_consensus(v)
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tally_config::ConsensusConfig;
use tally_core::traits::{
    Broadcast, CryptoError, Election, ElectionError, Ledger, LedgerError, Signer, TxPool,
    TxPoolError, Verifier,
};
use tally_types::codec::DecodeError;
use tally_types::{Address, Block, Transaction, H256};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::context::RoundContext;
use crate::increment::{IncrementError, IncrementValidator};
use crate::message::{
    BlockSignatures, ChangeView, MessageBody, PrepareRequest, PrepareResponse, SignatureEntry,
};
use crate::payload::{ConsensusPayload, CONSENSUS_VERSION};
use crate::phase::ConsensusPhase;
use crate::timer::{view_timeout, RoundTimer, TimeoutInfo, TokioRoundTimer};

/// Errors raised inside the service or by its handle.
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    /// The service inbox is closed
    #[error("consensus service stopped")]
    Stopped,

    /// The service inbox is full
    #[error("consensus inbox full")]
    InboxFull,

    /// A payload could not be decoded
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The election collaborator failed
    #[error("election failed: {0}")]
    Election(#[from] ElectionError),

    /// The ledger collaborator failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The transaction pool rejected a proposal
    #[error("transaction pool rejected proposal: {0}")]
    TxPool(#[from] TxPoolError),

    /// A proposed transaction was already persisted
    #[error("increment check failed: {0}")]
    Increment(#[from] IncrementError),

    /// Local signing failed
    #[error("signing failed: {0}")]
    Crypto(#[from] CryptoError),

    /// The ledger does not know the header the round builds on
    #[error("previous header {0} not found")]
    MissingHeader(H256),

    /// A proposal is internally inconsistent
    #[error("invalid proposal: {0}")]
    InvalidProposal(String),
}

impl ConsensusError {
    /// Whether a rejected PrepareRequest should also trigger a view change.
    ///
    /// Proposal faults blame the primary. Local collaborator failures do not.
    pub fn blames_primary(&self) -> bool {
        matches!(
            self,
            Self::TxPool(_) | Self::Increment(_) | Self::InvalidProposal(_)
        )
    }
}

/// Result type for consensus operations.
pub type ConsensusResult<T> = Result<T, ConsensusError>;

/// Inbox item of the service actor.
#[derive(Debug)]
pub enum Command {
    /// Begin participating in consensus
    Start,
    /// Halt the timer and end the actor loop
    Stop,
    /// A block was committed to the ledger
    BlockPersisted(Block),
    /// A payload arrived from the network
    Payload(ConsensusPayload),
    /// The round timer fired
    Timeout(TimeoutInfo),
}

/// Timing and sizing parameters of the service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Target time between blocks
    pub block_interval: Duration,
    /// How far in the future a proposal timestamp may be
    pub max_clock_skew: Duration,
    /// Cap on the view backoff
    pub max_view_timeout: Duration,
    /// Blocks remembered by the increment validator
    pub increment_window: usize,
    /// Pool transactions pulled into one proposal
    pub max_block_transactions: usize,
    /// Inbox capacity
    pub inbox_capacity: usize,
}

impl From<&ConsensusConfig> for ServiceConfig {
    fn from(config: &ConsensusConfig) -> Self {
        Self {
            block_interval: config.block_interval(),
            max_clock_skew: config.max_clock_skew(),
            max_view_timeout: config.max_view_timeout(),
            increment_window: config.increment_window as usize,
            max_block_transactions: config.max_block_transactions,
            inbox_capacity: config.inbox_capacity,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::from(&ConsensusConfig::default())
    }
}

/// External components the service talks to.
#[derive(Clone)]
pub struct Collaborators {
    /// Durable block storage
    pub ledger: Arc<dyn Ledger>,
    /// Pending transactions
    pub pool: Arc<dyn TxPool>,
    /// Bookkeeper election
    pub election: Arc<dyn Election>,
    /// Local key
    pub signer: Arc<dyn Signer>,
    /// Signature checks
    pub verifier: Arc<dyn Verifier>,
    /// Outbound network
    pub broadcast: Arc<dyn Broadcast>,
}

/// Cloneable sender side of a service inbox.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    inbox: mpsc::Sender<Command>,
}

/// Create an inbox and the handle that feeds it.
pub fn inbox(capacity: usize) -> (ServiceHandle, mpsc::Receiver<Command>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ServiceHandle { inbox: tx }, rx)
}

impl ServiceHandle {
    /// Raw sender, for timers and custom sources.
    pub fn sender(&self) -> mpsc::Sender<Command> {
        self.inbox.clone()
    }

    /// Start the service.
    pub async fn start(&self) -> ConsensusResult<()> {
        self.send(Command::Start).await
    }

    /// Stop the service and end its loop.
    pub async fn stop(&self) -> ConsensusResult<()> {
        self.send(Command::Stop).await
    }

    /// Report a committed block.
    pub async fn block_persisted(&self, block: Block) -> ConsensusResult<()> {
        self.send(Command::BlockPersisted(block)).await
    }

    /// Hand a received payload to the service.
    pub async fn deliver(&self, payload: ConsensusPayload) -> ConsensusResult<()> {
        self.send(Command::Payload(payload)).await
    }

    /// Decode and hand over a payload received as bytes.
    pub async fn deliver_raw(&self, data: &[u8]) -> ConsensusResult<()> {
        let payload = ConsensusPayload::decode(data)?;
        self.deliver(payload).await
    }

    /// Non-blocking [`ServiceHandle::block_persisted`].
    pub fn try_block_persisted(&self, block: Block) -> ConsensusResult<()> {
        self.try_send(Command::BlockPersisted(block))
    }

    /// Non-blocking [`ServiceHandle::deliver_raw`].
    pub fn try_deliver_raw(&self, data: &[u8]) -> ConsensusResult<()> {
        let payload = ConsensusPayload::decode(data)?;
        self.try_send(Command::Payload(payload))
    }

    async fn send(&self, command: Command) -> ConsensusResult<()> {
        self.inbox
            .send(command)
            .await
            .map_err(|_| ConsensusError::Stopped)
    }

    fn try_send(&self, command: Command) -> ConsensusResult<()> {
        self.inbox.try_send(command).map_err(|e| match e {
            TrySendError::Full(_) => ConsensusError::InboxFull,
            TrySendError::Closed(_) => ConsensusError::Stopped,
        })
    }
}

/// The dBFT state machine.
pub struct DbftService {
    config: ServiceConfig,
    deps: Collaborators,
    context: RoundContext,
    timer: Box<dyn RoundTimer>,
    increment: IncrementValidator,
    started: bool,
    block_received: Instant,
}

impl DbftService {
    /// Build a stopped service.
    pub fn new(config: ServiceConfig, deps: Collaborators, timer: Box<dyn RoundTimer>) -> Self {
        let owner = deps.signer.public_key();
        let increment = IncrementValidator::new(config.increment_window);
        Self {
            config,
            deps,
            context: RoundContext::new(owner),
            timer,
            increment,
            started: false,
            block_received: Instant::now(),
        }
    }

    /// Spawn a service with a tokio timer on the current runtime.
    pub fn spawn(config: ServiceConfig, deps: Collaborators) -> (ServiceHandle, JoinHandle<()>) {
        let (handle, rx) = inbox(config.inbox_capacity);
        let timer = TokioRoundTimer::new(handle.sender());
        let service = Self::new(config, deps, Box::new(timer));
        (handle, tokio::spawn(service.run(rx)))
    }

    /// Current round state.
    pub fn context(&self) -> &RoundContext {
        &self.context
    }

    /// Increment validator state.
    pub fn increment(&self) -> &IncrementValidator {
        &self.increment
    }

    /// Whether `Start` has been received.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Consume the inbox until `Stop` or until every sender is gone.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<Command>) {
        debug!("Consensus service loop running");
        while let Some(command) = inbox.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        info!("Consensus service loop exited");
    }

    /// Handle one command. Returns false once the loop should end.
    pub fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                self.stop();
                return false;
            }
            command if !self.started => {
                trace!(?command, "Service not started, dropping command");
            }
            Command::BlockPersisted(block) => self.block_persisted(&block),
            Command::Payload(payload) => self.on_consensus_payload(&payload),
            Command::Timeout(info) => self.on_timeout(info),
        }
        true
    }

    /// Begin consensus at the ledger head.
    pub fn start(&mut self) {
        if self.started {
            debug!("Consensus service already started");
            return;
        }
        info!(owner = %self.context.owner(), "Starting dBFT consensus");
        self.started = true;
        self.block_received = Instant::now();
        self.initialize_consensus(0);
    }

    /// Halt the timer and drop the increment window.
    pub fn stop(&mut self) {
        info!(height = self.context.height, "Stopping dBFT consensus");
        self.timer.cancel();
        self.increment.clean();
        self.started = false;
    }

    /// A block was committed; start the next height.
    pub fn block_persisted(&mut self, block: &Block) {
        debug!(height = block.height(), hash = %block.hash(), "Block persisted");
        self.block_received = Instant::now();
        self.increment.add_block(block);
        self.initialize_consensus(0);
    }

    /// Enter `view` at the current height, or reset to a new height for view 0.
    pub fn initialize_consensus(&mut self, view: u8) {
        if view == 0 {
            let ledger_height = self.deps.ledger.current_height();
            let ledger_hash = self.deps.ledger.current_block_hash();
            if let Err(e) =
                self.context
                    .reset(ledger_height, ledger_hash, self.deps.election.as_ref())
            {
                error!(ledger_height, error = %e, "Failed to determine bookkeepers");
                return;
            }
        } else {
            if self.context.phase.contains(ConsensusPhase::BLOCK_GENERATED) {
                return;
            }
            self.context.change_view(view);
        }

        let height = self.context.height;
        let Some(index) = self.context.bookkeeper_index else {
            info!(height, view, "Not a bookkeeper this round");
            return;
        };

        if self.context.is_primary() {
            self.context.phase.insert(ConsensusPhase::PRIMARY);
            let delay = self
                .config
                .block_interval
                .saturating_sub(self.block_received.elapsed());
            info!(
                height,
                view,
                index,
                delay_ms = delay.as_millis() as u64,
                "Initialized as primary"
            );
            self.timer.arm(height, view, delay);
        } else {
            self.context.phase = ConsensusPhase::BACKUP;
            let timeout = self.view_timeout(view);
            info!(
                height,
                view,
                index,
                primary = self.context.primary_index,
                timeout_ms = timeout.as_millis() as u64,
                "Initialized as backup"
            );
            self.timer.arm(height, view, timeout);
        }
    }

    /// Round timer tick.
    pub fn on_timeout(&mut self, info: TimeoutInfo) {
        let height = self.context.height;
        let view = self.context.view_number;
        if info.height != height || info.view != view {
            trace!(
                timer_height = info.height,
                timer_view = info.view,
                height,
                view,
                "Ignoring stale timer"
            );
            return;
        }
        info!(height, view, phase = %self.context.phase, "Round timeout");

        let phase = self.context.phase;
        if phase.contains(ConsensusPhase::PRIMARY) && !phase.contains(ConsensusPhase::REQUEST_SENT)
        {
            if let Err(e) = self.send_prepare_request() {
                error!(height, view, error = %e, "Failed to build proposal");
                self.timer.arm(height, view, self.view_timeout(view));
            }
        } else if phase.contains(ConsensusPhase::PRIMARY | ConsensusPhase::REQUEST_SENT)
            || phase.contains(ConsensusPhase::BACKUP)
        {
            self.request_change_view();
        }
    }

    /// Primary: build (or reuse) the proposal and broadcast it.
    fn send_prepare_request(&mut self) -> ConsensusResult<()> {
        let height = self.context.height;
        let view = self.context.view_number;

        if !self.context.phase.contains(ConsensusPhase::SIGNATURE_SENT) {
            self.build_proposal()?;
        } else {
            debug!(height, view, "Re-proposing signed block");
        }

        self.context.phase.insert(ConsensusPhase::REQUEST_SENT);
        info!(
            height,
            view,
            txs = self.context.transactions().len(),
            "Sending PrepareRequest"
        );
        let payload = self.context.make_prepare_request();
        self.sign_and_relay(payload);
        self.timer.arm(height, view, self.view_timeout(view));
        // A single bookkeeper already holds a quorum.
        self.check_signatures();
        Ok(())
    }

    fn build_proposal(&mut self) -> ConsensusResult<()> {
        let prev_hash = self.context.prev_hash;
        let prev = self
            .deps
            .ledger
            .header_by_hash(&prev_hash)
            .ok_or(ConsensusError::MissingHeader(prev_hash))?;

        let timestamp = unix_now().max(prev.timestamp + 1);
        let nonce: u64 = rand::random();
        let valid_height = self.increment.valid_height(self.context.height - 1);

        let mut transactions = vec![Transaction::bookkeeping(nonce, self.context.owner())];
        let increment = &self.increment;
        transactions.extend(
            self.deps
                .pool
                .pending_transactions(valid_height)
                .into_iter()
                .filter(|tx| increment.verify(tx, valid_height).is_ok())
                .take(self.config.max_block_transactions),
        );

        let next_bookkeepers = self.deps.election.next_bookkeepers(&transactions)?;
        let next_bookkeeper = Address::from_bookkeepers(&next_bookkeepers);
        self.context
            .set_proposal(timestamp, nonce, next_bookkeeper, transactions);
        self.context.next_bookkeepers = next_bookkeepers;

        let hash = self
            .context
            .header_hash()
            .ok_or_else(|| ConsensusError::InvalidProposal("empty proposal".into()))?;
        let signature = self.deps.signer.sign(hash.as_bytes())?;
        if let Some(index) = self.context.bookkeeper_index {
            self.context.signatures[index] = Some(signature);
        }
        Ok(())
    }

    /// Ask to move past the current view.
    pub fn request_change_view(&mut self) {
        if self.context.phase.contains(ConsensusPhase::BLOCK_GENERATED) {
            return;
        }
        let Some(index) = self.context.bookkeeper_index else {
            return;
        };

        let height = self.context.height;
        let view = self.context.view_number;
        let expected = self.context.expected_view[index]
            .saturating_add(1)
            .max(view.saturating_add(1));
        self.context.expected_view[index] = expected;

        info!(
            height,
            view,
            expected,
            phase = %self.context.phase,
            signatures = self.context.signature_count(),
            "Requesting view change"
        );
        self.timer.arm(height, view, self.view_timeout(expected));

        let payload = self.context.make_change_view();
        self.sign_and_relay(payload);
        self.check_expected_view(expected);
    }

    /// Move to `view` once a quorum expects it.
    pub fn check_expected_view(&mut self, view: u8) {
        if self.context.phase.contains(ConsensusPhase::BLOCK_GENERATED)
            || view == self.context.view_number
        {
            return;
        }
        let count = self.context.expected_view_count(view);
        if count >= self.context.m() {
            info!(
                height = self.context.height,
                view, count, "View change quorum reached"
            );
            self.initialize_consensus(view);
        }
    }

    /// Filter and dispatch a payload from the network.
    pub fn on_consensus_payload(&mut self, payload: &ConsensusPayload) {
        let index = usize::from(payload.bookkeeper_index);
        if self.context.bookkeeper_index == Some(index) {
            return;
        }
        if payload.version != CONSENSUS_VERSION
            || payload.prev_hash != self.context.prev_hash
            || payload.height != self.context.height
        {
            trace!(
                height = payload.height,
                local_height = self.context.height,
                "Dropping payload for another round"
            );
            return;
        }
        if self.context.phase.contains(ConsensusPhase::BLOCK_GENERATED) {
            return;
        }
        if index >= self.context.n() {
            debug!(index, n = self.context.n(), "Dropping payload from unknown bookkeeper");
            return;
        }
        if payload.owner != self.context.bookkeepers[index] {
            debug!(index, "Dropping payload with mismatched owner");
            return;
        }

        let message = match payload.message() {
            Ok(message) => message,
            Err(e) => {
                debug!(index, error = %e, "Dropping undecodable payload");
                return;
            }
        };
        let is_change_view = matches!(message.body, MessageBody::ChangeView(_));
        if message.view_number != self.context.view_number && !is_change_view {
            trace!(
                index,
                view = message.view_number,
                local_view = self.context.view_number,
                "Dropping message for another view"
            );
            return;
        }
        if !payload.verify(self.deps.verifier.as_ref()) {
            debug!(index, "Dropping payload with invalid signature");
            return;
        }

        trace!(index, %message, "Consensus message received");
        match message.body {
            MessageBody::ChangeView(cv) => self.change_view_received(index, cv),
            MessageBody::PrepareRequest(req) => {
                self.prepare_request_received(payload.timestamp, index, req)
            }
            MessageBody::PrepareResponse(resp) => self.prepare_response_received(index, resp),
            MessageBody::BlockSignatures(sigs) => self.block_signatures_received(sigs),
        }
    }

    fn change_view_received(&mut self, index: usize, msg: ChangeView) {
        if msg.new_view_number <= self.context.expected_view[index] {
            trace!(index, new_view = msg.new_view_number, "Ignoring stale ChangeView");
            return;
        }
        info!(
            height = self.context.height,
            index,
            new_view = msg.new_view_number,
            "ChangeView received"
        );
        self.context.expected_view[index] = msg.new_view_number;
        self.check_expected_view(msg.new_view_number);
    }

    fn prepare_request_received(&mut self, timestamp: u32, index: usize, req: PrepareRequest) {
        let phase = self.context.phase;
        if !phase.contains(ConsensusPhase::BACKUP)
            || phase.contains(ConsensusPhase::REQUEST_RECEIVED)
        {
            return;
        }
        if index != self.context.primary_index {
            debug!(index, primary = self.context.primary_index, "PrepareRequest not from primary");
            return;
        }

        let prev_hash = self.context.prev_hash;
        let Some(prev) = self.deps.ledger.header_by_hash(&prev_hash) else {
            error!(prev = %prev_hash, "Previous header missing, cannot check proposal");
            return;
        };
        let latest = u64::from(unix_now()) + self.config.max_clock_skew.as_secs();
        if timestamp <= prev.timestamp || u64::from(timestamp) > latest {
            debug!(timestamp, prev = prev.timestamp, "PrepareRequest timestamp out of range");
            return;
        }

        info!(
            height = self.context.height,
            view = self.context.view_number,
            index,
            txs = req.transactions.len(),
            "PrepareRequest received"
        );

        let snapshot = self.context.clone();
        if let Err(e) = self.accept_prepare_request(timestamp, index, req) {
            self.context = snapshot;
            if e.blames_primary() {
                warn!(error = %e, "Rejected PrepareRequest");
                self.request_change_view();
            } else {
                error!(error = %e, "Failed to process PrepareRequest");
            }
        }
    }

    fn accept_prepare_request(
        &mut self,
        timestamp: u32,
        primary: usize,
        req: PrepareRequest,
    ) -> ConsensusResult<()> {
        self.context.phase.insert(ConsensusPhase::REQUEST_RECEIVED);
        self.context
            .set_proposal(timestamp, req.nonce, req.next_bookkeeper, req.transactions);

        let hash = self
            .context
            .header_hash()
            .ok_or_else(|| ConsensusError::InvalidProposal("no transactions".into()))?;
        let primary_key = self.context.bookkeepers[primary];
        if !self
            .deps
            .verifier
            .verify(&primary_key, hash.as_bytes(), &req.signature)
        {
            return Err(ConsensusError::InvalidProposal(
                "primary block signature does not verify".into(),
            ));
        }
        self.context.signatures = vec![None; self.context.n()];
        self.context.signatures[primary] = Some(req.signature);

        let valid_height = self.increment.valid_height(self.context.height - 1);
        self.deps
            .pool
            .verify_block(self.context.transactions(), valid_height)?;
        for tx in self.context.transactions() {
            self.increment.verify(tx, valid_height)?;
        }

        let next_bookkeepers = self
            .deps
            .election
            .next_bookkeepers(self.context.transactions())?;
        let computed = Address::from_bookkeepers(&next_bookkeepers);
        if computed != self.context.next_bookkeeper() {
            return Err(ConsensusError::InvalidProposal(format!(
                "next bookkeeper mismatch: claimed {}, computed {}",
                self.context.next_bookkeeper(),
                computed
            )));
        }
        self.context.next_bookkeepers = next_bookkeepers;

        let signature = self.deps.signer.sign(hash.as_bytes())?;
        if let Some(own) = self.context.bookkeeper_index {
            self.context.signatures[own] = Some(signature.clone());
        }
        self.context.phase.insert(ConsensusPhase::SIGNATURE_SENT);

        info!(height = self.context.height, block = %hash, "Sending PrepareResponse");
        let payload = self.context.make_prepare_response(signature);
        self.sign_and_relay(payload);
        Ok(())
    }

    fn prepare_response_received(&mut self, index: usize, resp: PrepareResponse) {
        if self.context.signatures[index].is_some() {
            return;
        }
        let Some(hash) = self.context.header_hash() else {
            trace!(index, "PrepareResponse before proposal, dropping");
            return;
        };
        let key = self.context.bookkeepers[index];
        if !self.deps.verifier.verify(&key, hash.as_bytes(), &resp.signature) {
            debug!(index, "PrepareResponse signature does not verify");
            return;
        }

        info!(height = self.context.height, index, "PrepareResponse received");
        self.context.signatures[index] = Some(resp.signature);
        self.check_signatures();
    }

    fn block_signatures_received(&mut self, msg: BlockSignatures) {
        let Some(hash) = self.context.header_hash() else {
            trace!("BlockSignatures before proposal, dropping");
            return;
        };
        let m = self.context.m();

        for entry in msg.entries {
            let i = usize::from(entry.index);
            if i >= self.context.n() || self.context.signatures[i].is_some() {
                continue;
            }
            let key = self.context.bookkeepers[i];
            if !self.deps.verifier.verify(&key, hash.as_bytes(), &entry.signature) {
                debug!(index = i, "Gossiped block signature does not verify");
                continue;
            }
            self.context.signatures[i] = Some(entry.signature);
            if self.context.signature_count() >= m {
                break;
            }
        }
        self.check_signatures();
    }

    /// Seal and persist the block once `M` signatures are collected.
    pub fn check_signatures(&mut self) {
        let m = self.context.m();
        if self.context.signature_count() < m
            || self.context.phase.contains(ConsensusPhase::BLOCK_GENERATED)
        {
            return;
        }
        let Some(mut header) = self.context.make_header().cloned() else {
            return;
        };
        let hash = header.hash();
        if self.deps.ledger.contains_block(&hash) {
            debug!(block = %hash, "Block already stored");
            return;
        }

        let entries: Vec<SignatureEntry> = self
            .context
            .signatures
            .iter()
            .enumerate()
            .filter_map(|(i, sig)| {
                sig.as_ref().map(|signature| SignatureEntry {
                    signature: signature.clone(),
                    index: i as u16,
                })
            })
            .take(m)
            .collect();
        header.bookkeepers = self.context.bookkeepers.clone();
        header.sig_data = entries.iter().map(|e| e.signature.clone()).collect();
        let block = Block::new(header, self.context.transactions().to_vec());

        info!(
            height = self.context.height,
            view = self.context.view_number,
            block = %hash,
            txs = block.transactions.len(),
            signatures = entries.len(),
            "Block generated"
        );
        if let Err(e) = self.deps.ledger.add_block(block) {
            error!(block = %hash, error = %e, "Failed to persist block");
            return;
        }

        self.context.phase.insert(ConsensusPhase::BLOCK_GENERATED);
        let payload = self.context.make_block_signatures(entries);
        self.sign_and_relay(payload);
    }

    fn sign_and_relay(&self, mut payload: ConsensusPayload) {
        if let Err(e) = payload.sign(self.deps.signer.as_ref()) {
            error!(error = %e, "Failed to sign consensus payload");
            return;
        }
        trace!(%payload, "Relaying consensus payload");
        if let Err(e) = self.deps.broadcast.broadcast(payload.encode()) {
            warn!(error = %e, "Failed to broadcast consensus payload");
        }
    }

    fn view_timeout(&self, view: u8) -> Duration {
        view_timeout(self.config.block_interval, view, self.config.max_view_timeout)
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
