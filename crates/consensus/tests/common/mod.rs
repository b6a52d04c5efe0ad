//! Shared mocks for consensus integration tests.
//!
//! Every mock records what the service asked of it so tests can assert on
//! broadcasts, appended blocks and armed timers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tally_consensus::{
    Collaborators, ConsensusMessage, ConsensusPayload, DbftService, MessageBody, RoundContext,
    RoundTimer, ServiceConfig,
};
use tally_core::traits::{
    Broadcast, Election, ElectionResult, Ledger, LedgerError, LedgerResult, Signer,
    TransportResult, TxPool, TxPoolResult,
};
use tally_core::{EcdsaVerifier, KeyPairSigner};
use tally_crypto::PublicKey;
use tally_types::{Block, BlockHeader, Transaction, H256};

/// Genesis timestamp used by every test chain.
pub const GENESIS_TIMESTAMP: u32 = 1_600_000_000;

// =============================================================================
// Ledger
// =============================================================================

/// In-memory ledger that records every appended block.
pub struct MockLedger {
    headers: Mutex<HashMap<H256, BlockHeader>>,
    head: Mutex<(u32, H256)>,
    added: Mutex<Vec<Block>>,
    fail_add: Mutex<bool>,
}

impl MockLedger {
    /// Ledger holding only `genesis`.
    pub fn new(genesis: &Block) -> Self {
        let hash = genesis.hash();
        let mut headers = HashMap::new();
        headers.insert(hash, genesis.header.clone());
        Self {
            headers: Mutex::new(headers),
            head: Mutex::new((genesis.height(), hash)),
            added: Mutex::new(Vec::new()),
            fail_add: Mutex::new(false),
        }
    }

    /// Blocks passed to `add_block`.
    pub fn added(&self) -> Vec<Block> {
        self.added.lock().clone()
    }

    /// Store a header that arrived some other way, without recording an append.
    pub fn store(&self, header: BlockHeader) {
        self.headers.lock().insert(header.hash(), header);
    }

    /// Make every subsequent `add_block` fail.
    pub fn fail_appends(&self) {
        *self.fail_add.lock() = true;
    }
}

impl Ledger for MockLedger {
    fn current_block_hash(&self) -> H256 {
        self.head.lock().1
    }

    fn current_height(&self) -> u32 {
        self.head.lock().0
    }

    fn header_by_hash(&self, hash: &H256) -> Option<BlockHeader> {
        self.headers.lock().get(hash).cloned()
    }

    fn contains_block(&self, hash: &H256) -> bool {
        self.headers.lock().contains_key(hash)
    }

    fn add_block(&self, block: Block) -> LedgerResult<()> {
        if *self.fail_add.lock() {
            return Err(LedgerError::Storage("disk full".into()));
        }
        let hash = block.hash();
        self.headers.lock().insert(hash, block.header.clone());
        *self.head.lock() = (block.height(), hash);
        self.added.lock().push(block);
        Ok(())
    }
}

// =============================================================================
// Pool and election
// =============================================================================

/// Pool returning a fixed transaction list.
#[derive(Default)]
pub struct MockPool {
    pending: Mutex<Vec<Transaction>>,
    reject: Mutex<bool>,
}

impl MockPool {
    /// Queue a transaction.
    pub fn push(&self, tx: Transaction) {
        self.pending.lock().push(tx);
    }

    /// Make `verify_block` fail.
    pub fn reject_blocks(&self) {
        *self.reject.lock() = true;
    }
}

impl TxPool for MockPool {
    fn pending_transactions(&self, _min_height: u32) -> Vec<Transaction> {
        self.pending.lock().clone()
    }

    fn verify_block(&self, transactions: &[Transaction], _height: u32) -> TxPoolResult<()> {
        if *self.reject.lock() {
            let hash = transactions.first().map(Transaction::hash).unwrap_or_default();
            return Err(tally_core::traits::TxPoolError::InvalidTransaction {
                hash,
                reason: "rejected by test".into(),
            });
        }
        Ok(())
    }
}

/// Election returning `current` for the head and `next` once transactions
/// are known.
pub struct MockElection {
    current: Vec<PublicKey>,
    next: Vec<PublicKey>,
}

impl MockElection {
    /// The set never changes.
    pub fn fixed(set: Vec<PublicKey>) -> Self {
        Self {
            current: set.clone(),
            next: set,
        }
    }

    /// Proposals elect `next`.
    pub fn rotating(current: Vec<PublicKey>, next: Vec<PublicKey>) -> Self {
        Self { current, next }
    }
}

impl Election for MockElection {
    fn next_bookkeepers(&self, transactions: &[Transaction]) -> ElectionResult<Vec<PublicKey>> {
        if transactions.is_empty() {
            Ok(self.current.clone())
        } else {
            Ok(self.next.clone())
        }
    }
}

// =============================================================================
// Broadcast and timer
// =============================================================================

/// Broadcast that keeps every payload it is handed.
#[derive(Default)]
pub struct MockBroadcast {
    sent: Mutex<Vec<ConsensusPayload>>,
}

impl MockBroadcast {
    /// Payloads sent so far.
    pub fn sent(&self) -> Vec<ConsensusPayload> {
        self.sent.lock().clone()
    }

    /// Drain the payloads sent so far.
    pub fn take(&self) -> Vec<ConsensusPayload> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Decoded messages sent so far.
    pub fn messages(&self) -> Vec<ConsensusMessage> {
        self.sent
            .lock()
            .iter()
            .map(|p| p.message().expect("service sent undecodable payload"))
            .collect()
    }

    /// Number of sent messages matching `pred`.
    pub fn count(&self, pred: impl Fn(&MessageBody) -> bool) -> usize {
        self.messages().iter().filter(|m| pred(&m.body)).count()
    }
}

impl Broadcast for MockBroadcast {
    fn broadcast(&self, payload: Bytes) -> TransportResult<()> {
        let decoded = ConsensusPayload::decode(&payload).expect("service sent undecodable bytes");
        self.sent.lock().push(decoded);
        Ok(())
    }
}

/// A single timer arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    pub height: u32,
    pub view: u8,
    pub after: Duration,
}

/// Timer that only records armings; tests fire ticks by hand.
#[derive(Clone, Default)]
pub struct MockTimer {
    armed: Arc<Mutex<Vec<Armed>>>,
    cancels: Arc<Mutex<usize>>,
}

impl MockTimer {
    /// Every arming so far.
    pub fn armed(&self) -> Vec<Armed> {
        self.armed.lock().clone()
    }

    /// Most recent arming.
    pub fn last(&self) -> Option<Armed> {
        self.armed.lock().last().copied()
    }

    /// Number of cancellations.
    pub fn cancels(&self) -> usize {
        *self.cancels.lock()
    }
}

impl RoundTimer for MockTimer {
    fn arm(&mut self, height: u32, view: u8, after: Duration) {
        self.armed.lock().push(Armed { height, view, after });
    }

    fn cancel(&mut self) {
        *self.cancels.lock() += 1;
    }
}

// =============================================================================
// Test network
// =============================================================================

/// One bookkeeper with its own ledger, broadcast and timer.
pub struct TestNode {
    pub service: DbftService,
    pub signer: Arc<KeyPairSigner>,
    pub ledger: Arc<MockLedger>,
    pub pool: Arc<MockPool>,
    pub broadcast: Arc<MockBroadcast>,
    pub timer: MockTimer,
}

impl TestNode {
    /// Round state of this node.
    pub fn context(&self) -> &RoundContext {
        self.service.context()
    }

    /// This node's bookkeeper index.
    pub fn index(&self) -> u16 {
        self.context().bookkeeper_index.expect("not a bookkeeper") as u16
    }

    /// Feed a payload as if it came from the network.
    pub fn receive(&mut self, payload: &ConsensusPayload) {
        self.service.on_consensus_payload(payload);
    }
}

/// Service parameters used by tests.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        block_interval: Duration::from_millis(3_000),
        max_clock_skew: Duration::from_secs(600),
        max_view_timeout: Duration::from_secs(600),
        increment_window: 10,
        max_block_transactions: 100,
        inbox_capacity: 64,
    }
}

/// `n` bookkeeper keys.
pub fn signers(n: usize) -> Vec<Arc<KeyPairSigner>> {
    (0..n).map(|_| Arc::new(KeyPairSigner::random())).collect()
}

/// Public keys of `signers`, in order.
pub fn public_keys(signers: &[Arc<KeyPairSigner>]) -> Vec<PublicKey> {
    signers.iter().map(|s| s.public_key()).collect()
}

/// Build a node for `signer` on a chain started from `genesis`.
pub fn node(
    signer: Arc<KeyPairSigner>,
    genesis: &Block,
    election: Arc<dyn Election>,
) -> TestNode {
    let ledger = Arc::new(MockLedger::new(genesis));
    let pool = Arc::new(MockPool::default());
    let broadcast = Arc::new(MockBroadcast::default());
    let timer = MockTimer::default();
    let deps = Collaborators {
        ledger: ledger.clone(),
        pool: pool.clone(),
        election,
        signer: signer.clone(),
        verifier: Arc::new(EcdsaVerifier),
        broadcast: broadcast.clone(),
    };
    let service = DbftService::new(test_config(), deps, Box::new(timer.clone()));
    TestNode {
        service,
        signer,
        ledger,
        pool,
        broadcast,
        timer,
    }
}

/// Started nodes for `n` bookkeepers sharing one genesis block.
pub fn network(n: usize) -> Vec<TestNode> {
    let keys = signers(n);
    let genesis = Block::genesis(GENESIS_TIMESTAMP, public_keys(&keys));
    let election: Arc<dyn Election> = Arc::new(MockElection::fixed(public_keys(&keys)));
    keys.into_iter()
        .map(|signer| {
            let mut node = node(signer, &genesis, election.clone());
            node.service.start();
            node
        })
        .collect()
}

/// Position in `nodes` of the current primary.
pub fn primary_of(nodes: &[TestNode]) -> usize {
    let primary = nodes[0].context().primary_index;
    nodes
        .iter()
        .position(|n| n.context().bookkeeper_index == Some(primary))
        .expect("primary is one of the nodes")
}

/// A payload from `signer` at `index` for the round `target` is in, signed.
pub fn signed_payload(
    signer: &KeyPairSigner,
    index: u16,
    target: &RoundContext,
    view: u8,
    body: MessageBody,
) -> ConsensusPayload {
    let mut payload = ConsensusPayload {
        version: tally_consensus::CONSENSUS_VERSION,
        prev_hash: target.prev_hash,
        height: target.height,
        bookkeeper_index: index,
        timestamp: target.timestamp(),
        data: ConsensusMessage::new(view, body).encode(),
        owner: signer.public_key(),
        signature: Vec::new(),
    };
    payload.sign(signer).expect("signing");
    payload
}

/// Whether `body` is a ChangeView.
pub fn is_change_view(body: &MessageBody) -> bool {
    matches!(body, MessageBody::ChangeView(_))
}

/// Whether `body` is a PrepareResponse.
pub fn is_prepare_response(body: &MessageBody) -> bool {
    matches!(body, MessageBody::PrepareResponse(_))
}

/// Replace the message in `payload` with `body` at `view` and re-sign it.
pub fn rewrite(
    payload: &ConsensusPayload,
    signer: &KeyPairSigner,
    view: u8,
    body: MessageBody,
) -> ConsensusPayload {
    let mut payload = payload.clone();
    payload.data = ConsensusMessage::new(view, body).encode();
    payload.sign(signer).expect("signing");
    payload
}

/// Deliver every payload in `payloads` to every node except its sender.
pub fn gossip(nodes: &mut [TestNode], payloads: &[ConsensusPayload]) {
    for payload in payloads {
        for node in nodes.iter_mut() {
            if node.context().bookkeeper_index != Some(usize::from(payload.bookkeeper_index)) {
                node.receive(payload);
            }
        }
    }
}
