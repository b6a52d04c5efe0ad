//! Per-height round state.
//!
//! A [`RoundContext`] is rebuilt by [`RoundContext::reset`] whenever a new
//! height starts, and mutated in place through the views of that height.
//! It is owned by the service actor and never shared, so it carries no locks.
//! Cloning it gives the snapshot used to roll back a rejected PrepareRequest.

use tally_core::traits::{Election, ElectionError, ElectionResult};
use tally_crypto::{bft_threshold, PublicKey};
use tally_types::block::HEADER_VERSION;
use tally_types::{transactions_root, Address, BlockHeader, Transaction, H256};
use tracing::{debug, info};

use crate::message::{
    BlockSignatures, ChangeView, ConsensusMessage, MessageBody, PrepareRequest, PrepareResponse,
    SignatureEntry,
};
use crate::payload::{ConsensusPayload, CONSENSUS_VERSION};
use crate::phase::ConsensusPhase;

/// Primary for `height` at `view` among `n` bookkeepers: `(height - view) mod n`.
pub fn primary_index_for(height: u32, view: u8, n: usize) -> usize {
    debug_assert!(n > 0, "empty bookkeeper set");
    (i64::from(height) - i64::from(view)).rem_euclid(n as i64) as usize
}

/// Working memory of the round at one height.
#[derive(Debug, Clone)]
pub struct RoundContext {
    /// Phase flags
    pub phase: ConsensusPhase,
    /// Hash of the ledger head this round builds on
    pub prev_hash: H256,
    /// Height being agreed (ledger height + 1)
    pub height: u32,
    /// Current view
    pub view_number: u8,
    /// Index of the primary for the current view
    pub primary_index: usize,
    /// This node's index, `None` when it is not a bookkeeper this round
    pub bookkeeper_index: Option<usize>,
    /// Ordered bookkeeper set for this height
    pub bookkeepers: Vec<PublicKey>,
    /// Bookkeeper set for the next height, known once transactions are
    pub next_bookkeepers: Vec<PublicKey>,
    /// Block signatures by bookkeeper index
    pub signatures: Vec<Option<Vec<u8>>>,
    /// Latest view each bookkeeper has asked for
    pub expected_view: Vec<u8>,

    owner: PublicKey,
    timestamp: u32,
    nonce: u64,
    next_bookkeeper: Address,
    transactions: Vec<Transaction>,
    header: Option<BlockHeader>,
}

impl RoundContext {
    /// Empty context for the node identified by `owner`.
    pub fn new(owner: PublicKey) -> Self {
        Self {
            phase: ConsensusPhase::INITIAL,
            prev_hash: H256::ZERO,
            height: 0,
            view_number: 0,
            primary_index: 0,
            bookkeeper_index: None,
            bookkeepers: Vec::new(),
            next_bookkeepers: Vec::new(),
            signatures: Vec::new(),
            expected_view: Vec::new(),
            owner,
            timestamp: 0,
            nonce: 0,
            next_bookkeeper: Address::ZERO,
            transactions: Vec::new(),
            header: None,
        }
    }

    /// Quorum size `M = N - floor((N - 1) / 3)`.
    pub fn m(&self) -> usize {
        debug_assert!(!self.bookkeepers.is_empty(), "empty bookkeeper set");
        bft_threshold(self.bookkeepers.len())
    }

    /// Number of bookkeepers.
    pub fn n(&self) -> usize {
        self.bookkeepers.len()
    }

    /// This node's public key.
    pub fn owner(&self) -> &PublicKey {
        &self.owner
    }

    /// Round timestamp (unix seconds).
    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Proposal nonce.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Proposed next-bookkeeper address.
    pub fn next_bookkeeper(&self) -> Address {
        self.next_bookkeeper
    }

    /// Proposed transactions.
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// True when this node proposes in the current view.
    pub fn is_primary(&self) -> bool {
        self.bookkeeper_index == Some(self.primary_index)
    }

    /// Start the round for the height after `ledger_height`.
    ///
    /// The bookkeeper set is the previous round's `next_bookkeepers` when that
    /// round's block is the ledger head; otherwise it comes from the election
    /// with no pending transactions. On election failure the context is left
    /// untouched.
    pub fn reset(
        &mut self,
        ledger_height: u32,
        ledger_hash: H256,
        election: &dyn Election,
    ) -> ElectionResult<()> {
        let chained = ledger_height == self.height
            && !self.next_bookkeepers.is_empty()
            && self.header_hash() == Some(ledger_hash);

        let bookkeepers = if chained {
            std::mem::take(&mut self.next_bookkeepers)
        } else {
            info!(height = ledger_height, "Calculating bookkeepers from election");
            let keys = election.next_bookkeepers(&[])?;
            if keys.is_empty() {
                return Err(ElectionError::EmptySet);
            }
            keys
        };
        debug_assert!(bookkeepers.len() <= usize::from(u16::MAX) + 1);

        let n = bookkeepers.len();
        self.bookkeepers = bookkeepers;
        self.phase = ConsensusPhase::INITIAL;
        self.prev_hash = ledger_hash;
        self.height = ledger_height + 1;
        self.view_number = 0;
        self.next_bookkeepers = Vec::new();
        self.primary_index = self.height as usize % n;
        self.timestamp = 0;
        self.nonce = 0;
        self.next_bookkeeper = Address::ZERO;
        self.transactions = Vec::new();
        self.header = None;
        self.signatures = vec![None; n];
        self.expected_view = vec![0; n];
        self.bookkeeper_index = self.bookkeepers.iter().position(|k| *k == self.owner);

        debug!(
            height = self.height,
            bookkeepers = n,
            primary = self.primary_index,
            index = ?self.bookkeeper_index,
            "Round context reset"
        );
        Ok(())
    }

    /// Move to `view`.
    ///
    /// Keeps only `SIGNATURE_SENT`. When nothing was signed, the proposal and
    /// collected signatures are dropped as well.
    pub fn change_view(&mut self, view: u8) {
        self.phase.narrow_to(ConsensusPhase::SIGNATURE_SENT);
        self.view_number = view;
        self.primary_index = primary_index_for(self.height, view, self.n());

        if self.phase.is_initial() {
            self.transactions = Vec::new();
            self.signatures = vec![None; self.n()];
            self.header = None;
        }
        debug_assert_eq!(self.signatures.len(), self.n());
    }

    /// Install a proposal, invalidating the cached header.
    pub fn set_proposal(
        &mut self,
        timestamp: u32,
        nonce: u64,
        next_bookkeeper: Address,
        transactions: Vec<Transaction>,
    ) {
        self.timestamp = timestamp;
        self.nonce = nonce;
        self.next_bookkeeper = next_bookkeeper;
        self.transactions = transactions;
        self.header = None;
    }

    /// Unsigned header of the proposed block, `None` until transactions are known.
    pub fn make_header(&mut self) -> Option<&BlockHeader> {
        if self.transactions.is_empty() {
            return None;
        }
        if self.header.is_none() {
            self.header = Some(BlockHeader {
                version: HEADER_VERSION,
                prev_block_hash: self.prev_hash,
                transactions_root: transactions_root(&self.transactions),
                timestamp: self.timestamp,
                height: self.height,
                consensus_data: self.nonce,
                next_bookkeeper: self.next_bookkeeper,
                bookkeepers: Vec::new(),
                sig_data: Vec::new(),
            });
        }
        self.header.as_ref()
    }

    /// Hash of [`RoundContext::make_header`].
    pub fn header_hash(&mut self) -> Option<H256> {
        self.make_header().map(BlockHeader::hash)
    }

    /// Count of collected signatures.
    pub fn signature_count(&self) -> usize {
        self.signatures.iter().filter(|s| s.is_some()).count()
    }

    /// Number of bookkeepers whose expected view is `view`.
    pub fn expected_view_count(&self, view: u8) -> usize {
        self.expected_view.iter().filter(|v| **v == view).count()
    }

    /// Wrap `body` for the current view in an unsigned payload from this node.
    pub fn make_payload(&self, body: MessageBody) -> ConsensusPayload {
        debug_assert!(self.bookkeeper_index.is_some(), "not a bookkeeper");
        let message = ConsensusMessage::new(self.view_number, body);
        ConsensusPayload {
            version: CONSENSUS_VERSION,
            prev_hash: self.prev_hash,
            height: self.height,
            bookkeeper_index: self.bookkeeper_index.unwrap_or_default() as u16,
            timestamp: self.timestamp,
            data: message.encode(),
            owner: self.owner,
            signature: Vec::new(),
        }
    }

    /// The current proposal with this node's own block signature.
    pub fn make_prepare_request(&self) -> ConsensusPayload {
        let signature = self
            .bookkeeper_index
            .and_then(|i| self.signatures[i].clone())
            .unwrap_or_default();
        self.make_payload(MessageBody::PrepareRequest(PrepareRequest {
            nonce: self.nonce,
            next_bookkeeper: self.next_bookkeeper,
            transactions: self.transactions.clone(),
            signature,
        }))
    }

    /// Backup's answer carrying its block signature.
    pub fn make_prepare_response(&self, signature: Vec<u8>) -> ConsensusPayload {
        self.make_payload(MessageBody::PrepareResponse(PrepareResponse { signature }))
    }

    /// Announce this node's expected view.
    pub fn make_change_view(&self) -> ConsensusPayload {
        let new_view_number = self
            .bookkeeper_index
            .map(|i| self.expected_view[i])
            .unwrap_or_default();
        self.make_payload(MessageBody::ChangeView(ChangeView { new_view_number }))
    }

    /// Gossip the signatures that sealed the block.
    pub fn make_block_signatures(&self, entries: Vec<SignatureEntry>) -> ConsensusPayload {
        self.make_payload(MessageBody::BlockSignatures(BlockSignatures { entries }))
    }
}
