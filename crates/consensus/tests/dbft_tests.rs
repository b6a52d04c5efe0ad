//! Round-level tests driving several services by hand.

mod common;

use common::*;
use tally_consensus::{
    view_timeout, ChangeView, Command, ConsensusPhase, MessageBody, PrepareRequest,
    PrepareResponse, TimeoutInfo,
};
use tally_core::{EcdsaVerifier, Signer, Verifier};
use tally_types::{Address, Transaction};

fn fire(node: &mut TestNode) {
    let ctx = node.context();
    let info = TimeoutInfo {
        height: ctx.height,
        view: ctx.view_number,
    };
    node.service.on_timeout(info);
}

/// Primary proposes; returns its PrepareRequest payload.
fn propose(nodes: &mut [TestNode]) -> tally_consensus::ConsensusPayload {
    let p = primary_of(nodes);
    fire(&mut nodes[p]);
    let mut sent = nodes[p].broadcast.take();
    assert_eq!(sent.len(), 1, "primary sends exactly one PrepareRequest");
    sent.remove(0)
}

#[test]
fn test_start_layout() {
    let nodes = network(4);
    for node in &nodes {
        let ctx = node.context();
        assert_eq!(ctx.height, 1);
        assert_eq!(ctx.view_number, 0);
        assert_eq!(ctx.primary_index, 1);
        assert_eq!(ctx.m(), 3);
    }

    let p = primary_of(&nodes);
    assert_eq!(nodes[p].index(), 1);
    assert!(nodes[p].context().phase.contains(ConsensusPhase::PRIMARY));

    let interval = test_config().block_interval;
    assert!(nodes[p].timer.last().unwrap().after <= interval);
    for (i, node) in nodes.iter().enumerate() {
        if i != p {
            assert_eq!(node.context().phase, ConsensusPhase::BACKUP);
            assert_eq!(node.timer.last().unwrap().after, interval * 2);
        }
    }
}

#[test]
fn test_four_nodes_commit_one_block() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);

    let message = request.message().unwrap();
    let MessageBody::PrepareRequest(req) = &message.body else {
        panic!("expected PrepareRequest, got {message}");
    };
    assert_eq!(req.transactions.len(), 1);
    assert!(req.transactions[0].is_bookkeeping());
    assert!(nodes[p]
        .context()
        .phase
        .contains(ConsensusPhase::PRIMARY | ConsensusPhase::REQUEST_SENT));

    gossip(&mut nodes, &[request]);

    let mut responses = Vec::new();
    for (i, node) in nodes.iter().enumerate() {
        if i == p {
            continue;
        }
        let phase = node.context().phase;
        assert!(phase.contains(ConsensusPhase::REQUEST_RECEIVED | ConsensusPhase::SIGNATURE_SENT));
        let sent = node.broadcast.take();
        assert_eq!(sent.len(), 1);
        assert!(is_prepare_response(&sent[0].message().unwrap().body));
        responses.extend(sent);
    }

    // Responses go to the primary only, in order.
    nodes[p].receive(&responses[0]);
    assert!(nodes[p].ledger.added().is_empty());
    nodes[p].receive(&responses[1]);

    let added = nodes[p].ledger.added();
    assert_eq!(added.len(), 1);
    let block = &added[0];
    assert_eq!(block.height(), 1);
    assert_eq!(block.header.sig_data.len(), 3);
    assert!(block.validate_transactions_root().is_ok());
    assert!(EcdsaVerifier.verify_multisig(
        &block.header.bookkeepers,
        3,
        block.hash().as_bytes(),
        &block.header.sig_data,
    ));
    assert!(nodes[p]
        .context()
        .phase
        .contains(ConsensusPhase::BLOCK_GENERATED));

    // Redelivery never seals twice.
    for response in &responses {
        nodes[p].receive(response);
    }
    nodes[p].service.check_signatures();
    assert_eq!(nodes[p].ledger.added().len(), 1);

    let sent = nodes[p].broadcast.take();
    assert_eq!(sent.len(), 1);
    let MessageBody::BlockSignatures(sigs) = sent[0].message().unwrap().body else {
        panic!("expected BlockSignatures");
    };
    assert_eq!(sigs.entries.len(), 3);
}

#[test]
fn test_block_signatures_let_lagging_backup_seal() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    gossip(&mut nodes, &[request]);

    let responses: Vec<_> = nodes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != p)
        .flat_map(|(_, n)| n.broadcast.take())
        .collect();
    nodes[p].receive(&responses[0]);
    nodes[p].receive(&responses[1]);
    let seal = nodes[p].broadcast.take();
    assert_eq!(seal.len(), 1);

    // A backup holding only its own and the primary's signatures.
    let lagging = (0..4).find(|i| *i != p).unwrap();
    assert_eq!(nodes[lagging].context().signature_count(), 2);
    nodes[lagging].receive(&seal[0]);

    let added = nodes[lagging].ledger.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].hash(), nodes[p].ledger.added()[0].hash());
}

#[test]
fn test_next_height_after_persist() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    gossip(&mut nodes, &[request]);
    let responses: Vec<_> = nodes.iter().flat_map(|n| n.broadcast.take()).collect();
    gossip(&mut nodes, &responses);

    for node in nodes.iter_mut() {
        let block = node.ledger.added().pop().expect("every node sealed");
        node.service.block_persisted(&block);
        assert_eq!(node.context().height, 2);
        assert_eq!(node.context().primary_index, 2);
        assert_eq!(node.service.increment().block_range(), (1, 2));
    }
    assert_ne!(primary_of(&nodes), p);
}

#[test]
fn test_backup_timeout_changes_view() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let backups: Vec<usize> = (0..4).filter(|i| *i != p).collect();
    let interval = test_config().block_interval;

    fire(&mut nodes[backups[0]]);
    let sent = nodes[backups[0]].broadcast.take();
    assert_eq!(sent.len(), 1);
    let message = sent[0].message().unwrap();
    assert_eq!(message.view_number, 0);
    assert_eq!(
        message.body,
        MessageBody::ChangeView(ChangeView { new_view_number: 1 })
    );
    let armed = nodes[backups[0]].timer.last().unwrap();
    assert_eq!((armed.height, armed.view), (1, 0));
    assert_eq!(armed.after, interval * 4);
    assert_eq!(armed.after, view_timeout(interval, 1, test_config().max_view_timeout));

    let mut change_views = sent;
    for &b in &backups[1..] {
        fire(&mut nodes[b]);
        change_views.extend(nodes[b].broadcast.take());
    }
    gossip(&mut nodes, &change_views);

    for node in &nodes {
        let ctx = node.context();
        assert_eq!(ctx.view_number, 1);
        assert_eq!(ctx.primary_index, 0);
    }
    let new_primary = primary_of(&nodes);
    assert_eq!(nodes[new_primary].index(), 0);
    assert!(nodes[new_primary]
        .context()
        .phase
        .contains(ConsensusPhase::PRIMARY));
}

#[test]
fn test_change_view_quorum_needs_m() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();
    fire(&mut nodes[backup]);
    let sent = nodes[backup].broadcast.take();
    gossip(&mut nodes, &sent);

    for node in &nodes {
        assert_eq!(node.context().view_number, 0);
        assert_eq!(node.context().expected_view_count(1), 1);
    }
}

#[test]
fn test_stale_timeout_is_ignored() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();

    nodes[backup]
        .service
        .on_timeout(TimeoutInfo { height: 1, view: 3 });
    nodes[backup]
        .service
        .on_timeout(TimeoutInfo { height: 7, view: 0 });
    assert!(nodes[backup].broadcast.sent().is_empty());
}

#[test]
fn test_next_bookkeeper_mismatch_rolls_back() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();

    let MessageBody::PrepareRequest(req) = request.message().unwrap().body else {
        panic!("expected PrepareRequest");
    };
    let mut round = nodes[backup].context().clone();
    round.set_proposal(
        request.timestamp,
        req.nonce,
        Address::ZERO,
        req.transactions.clone(),
    );
    let hash = round.header_hash().unwrap();
    let forged = PrepareRequest {
        next_bookkeeper: Address::ZERO,
        signature: nodes[p].signer.sign(hash.as_bytes()).unwrap(),
        ..req
    };
    let payload = rewrite(
        &request,
        &nodes[p].signer,
        0,
        MessageBody::PrepareRequest(forged),
    );

    let before = nodes[backup].context().clone();
    nodes[backup].receive(&payload);

    let ctx = nodes[backup].context();
    assert_eq!(ctx.phase, ConsensusPhase::BACKUP);
    assert!(ctx.transactions().is_empty());
    assert_eq!(ctx.signature_count(), before.signature_count());
    assert_eq!(ctx.expected_view[nodes[backup].index() as usize], 1);
    assert_eq!(nodes[backup].broadcast.count(is_change_view), 1);
    assert_eq!(nodes[backup].broadcast.count(is_prepare_response), 0);
}

#[test]
fn test_empty_proposal_is_rejected() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();

    let MessageBody::PrepareRequest(req) = request.message().unwrap().body else {
        panic!("expected PrepareRequest");
    };
    let empty = PrepareRequest {
        transactions: Vec::new(),
        ..req
    };
    let payload = rewrite(&request, &nodes[p].signer, 0, MessageBody::PrepareRequest(empty));
    nodes[backup].receive(&payload);

    assert!(!nodes[backup]
        .context()
        .phase
        .contains(ConsensusPhase::REQUEST_RECEIVED));
    assert_eq!(nodes[backup].broadcast.count(is_change_view), 1);
}

#[test]
fn test_pool_rejection_requests_view_change() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();
    nodes[backup].pool.reject_blocks();

    let request = propose(&mut nodes);
    nodes[backup].receive(&request);

    assert_eq!(nodes[backup].context().signature_count(), 0);
    assert_eq!(nodes[backup].broadcast.count(is_prepare_response), 0);
    assert_eq!(nodes[backup].broadcast.count(is_change_view), 1);
}

#[test]
fn test_duplicate_of_persisted_tx_is_rejected() {
    let mut nodes = network(4);

    // Commit height 1 with a user transaction everywhere.
    let user_tx = Transaction::new(42, b"transfer".to_vec());
    for node in &nodes {
        node.pool.push(user_tx.clone());
    }
    let request = propose(&mut nodes);
    gossip(&mut nodes, &[request]);
    let responses: Vec<_> = nodes.iter().flat_map(|n| n.broadcast.take()).collect();
    gossip(&mut nodes, &responses);
    for node in nodes.iter_mut() {
        let block = node.ledger.added().pop().unwrap();
        assert!(block.transactions.contains(&user_tx));
        node.service.block_persisted(&block);
        node.broadcast.take();
    }

    // Height 2: the pools still hold the committed transaction.
    let p2 = primary_of(&nodes);
    let backup2 = (0..4).find(|i| *i != p2).unwrap();
    let request = propose(&mut nodes);
    let MessageBody::PrepareRequest(req) = request.message().unwrap().body else {
        panic!("expected PrepareRequest");
    };
    // The proposer filters it out through its own window.
    assert!(!req.transactions.contains(&user_tx));

    let mut round = nodes[backup2].context().clone();
    let mut txs = req.transactions.clone();
    txs.push(user_tx);
    round.set_proposal(request.timestamp, req.nonce, req.next_bookkeeper, txs.clone());
    let hash = round.header_hash().unwrap();
    let forged = PrepareRequest {
        transactions: txs,
        signature: nodes[p2].signer.sign(hash.as_bytes()).unwrap(),
        ..req
    };
    let payload = rewrite(&request, &nodes[p2].signer, 0, MessageBody::PrepareRequest(forged));
    nodes[backup2].receive(&payload);

    assert_eq!(nodes[backup2].broadcast.count(is_prepare_response), 0);
    assert_eq!(nodes[backup2].broadcast.count(is_change_view), 1);
}

#[test]
fn test_payload_filters() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();
    let other = (0..4).find(|i| *i != p && *i != backup).unwrap();

    // Signed by the right key but claiming another index.
    let mut wrong_index = request.clone();
    wrong_index.bookkeeper_index = nodes[other].index();
    wrong_index.sign(nodes[p].signer.as_ref()).unwrap();
    nodes[backup].receive(&wrong_index);

    // Tampered after signing.
    let mut tampered = request.clone();
    tampered.timestamp += 1;
    nodes[backup].receive(&tampered);

    // Wrong height.
    let mut future = request.clone();
    future.height = 9;
    future.sign(nodes[p].signer.as_ref()).unwrap();
    nodes[backup].receive(&future);

    // Message for a view this node is not in.
    let later = rewrite(
        &request,
        &nodes[p].signer,
        2,
        request.message().unwrap().body,
    );
    nodes[backup].receive(&later);

    // Out-of-range index.
    let mut outsider = request.clone();
    outsider.bookkeeper_index = 17;
    nodes[backup].receive(&outsider);

    assert!(nodes[backup].broadcast.sent().is_empty());
    assert!(!nodes[backup]
        .context()
        .phase
        .contains(ConsensusPhase::REQUEST_RECEIVED));

    nodes[backup].receive(&request);
    assert_eq!(nodes[backup].broadcast.count(is_prepare_response), 1);
}

#[test]
fn test_prepare_request_timestamp_bounds() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();

    // Primary stamps strictly after the parent block.
    assert!(request.timestamp > GENESIS_TIMESTAMP);
    assert_eq!(nodes[p].context().timestamp(), request.timestamp);

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32;
    // Same as the parent, then an hour past the 600s skew bound.
    for timestamp in [GENESIS_TIMESTAMP, now + 3_600] {
        let mut skewed = request.clone();
        skewed.timestamp = timestamp;
        skewed.sign(nodes[p].signer.as_ref()).unwrap();
        nodes[backup].receive(&skewed);
        assert!(nodes[backup].broadcast.sent().is_empty());
        assert!(!nodes[backup]
            .context()
            .phase
            .contains(ConsensusPhase::REQUEST_RECEIVED));
    }

    nodes[backup].receive(&request);
    assert_eq!(nodes[backup].broadcast.count(is_prepare_response), 1);
}

#[test]
fn test_response_before_request_is_dropped() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let backup = (0..4).find(|i| *i != p).unwrap();
    let other = (0..4).find(|i| *i != p && *i != backup).unwrap();

    let round = nodes[backup].context().clone();
    let early = signed_payload(
        &nodes[other].signer,
        nodes[other].index(),
        &round,
        0,
        MessageBody::PrepareResponse(PrepareResponse {
            signature: vec![1; 65],
        }),
    );
    nodes[backup].receive(&early);
    assert_eq!(nodes[backup].context().signature_count(), 0);
}

#[test]
fn test_failed_append_keeps_round_open() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    nodes[p].ledger.fail_appends();
    let request = propose(&mut nodes);
    gossip(&mut nodes, &[request]);
    let responses: Vec<_> = nodes.iter().flat_map(|n| n.broadcast.take()).collect();
    gossip(&mut nodes, &responses);

    assert!(nodes[p].ledger.added().is_empty());
    assert!(!nodes[p]
        .context()
        .phase
        .contains(ConsensusPhase::BLOCK_GENERATED));
    assert!(nodes[p].broadcast.sent().is_empty());
}

#[test]
fn test_block_already_stored_is_not_appended() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);

    // The same block reached the primary's ledger through sync.
    let header = nodes[p]
        .context()
        .clone()
        .make_header()
        .cloned()
        .expect("primary holds a proposal");
    nodes[p].ledger.store(header);

    gossip(&mut nodes, &[request]);
    let responses: Vec<_> = nodes.iter().flat_map(|n| n.broadcast.take()).collect();
    assert_eq!(responses.len(), 3);
    for response in &responses {
        nodes[p].receive(response);
    }

    assert!(nodes[p].context().signature_count() >= nodes[p].context().m());
    assert!(nodes[p].ledger.added().is_empty());
    assert!(nodes[p].broadcast.sent().is_empty());
    assert!(!nodes[p]
        .context()
        .phase
        .contains(ConsensusPhase::BLOCK_GENERATED));
}

#[test]
fn test_primary_reproposes_signed_block_in_new_view() {
    let mut nodes = network(4);
    let p = primary_of(&nodes);
    let request = propose(&mut nodes);
    gossip(&mut nodes, &[request.clone()]);
    let MessageBody::PrepareRequest(original) = request.message().unwrap().body else {
        panic!("expected PrepareRequest");
    };
    for node in nodes.iter() {
        node.broadcast.take();
    }

    // Everyone times out before any response is seen.
    let mut change_views = Vec::new();
    for node in nodes.iter_mut() {
        fire(node);
        change_views.extend(node.broadcast.take());
    }
    gossip(&mut nodes, &change_views);

    let p1 = primary_of(&nodes);
    assert_ne!(p1, p);
    assert!(nodes[p1]
        .context()
        .phase
        .contains(ConsensusPhase::SIGNATURE_SENT));
    fire(&mut nodes[p1]);
    let sent = nodes[p1].broadcast.take();
    assert_eq!(sent.len(), 1);
    let message = sent[0].message().unwrap();
    assert_eq!(message.view_number, 1);
    let MessageBody::PrepareRequest(again) = message.body else {
        panic!("expected PrepareRequest");
    };
    assert_eq!(again.nonce, original.nonce);
    assert_eq!(again.transactions, original.transactions);
}

#[test]
fn test_outsider_never_arms_timer() {
    let keys = signers(4);
    let genesis = tally_types::Block::genesis(GENESIS_TIMESTAMP, public_keys(&keys));
    let election = std::sync::Arc::new(MockElection::fixed(public_keys(&keys)));
    let mut outsider = node(signers(1).remove(0), &genesis, election);
    outsider.service.start();

    assert_eq!(outsider.context().bookkeeper_index, None);
    assert_eq!(outsider.context().height, 1);
    assert!(outsider.timer.armed().is_empty());
}

#[test]
fn test_commands_before_start_are_dropped() {
    let keys = signers(4);
    let genesis = tally_types::Block::genesis(GENESIS_TIMESTAMP, public_keys(&keys));
    let election = std::sync::Arc::new(MockElection::fixed(public_keys(&keys)));
    let mut idle = node(keys[0].clone(), &genesis, election);

    assert!(idle.service.handle(Command::Timeout(TimeoutInfo { height: 1, view: 0 })));
    assert!(idle.service.handle(Command::BlockPersisted(genesis.clone())));
    assert!(!idle.service.is_started());
    assert!(idle.timer.armed().is_empty());

    assert!(idle.service.handle(Command::Start));
    assert!(idle.service.is_started());
    assert!(!idle.service.handle(Command::Stop));
    assert!(!idle.service.is_started());
    assert_eq!(idle.timer.cancels(), 1);
}

#[test]
fn test_single_bookkeeper_seals_alone() {
    let mut nodes = network(1);
    assert!(nodes[0].context().is_primary());
    fire(&mut nodes[0]);

    let added = nodes[0].ledger.added();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0].header.sig_data.len(), 1);
    let kinds: Vec<_> = nodes[0]
        .broadcast
        .messages()
        .into_iter()
        .map(|m| m.message_type())
        .collect();
    assert_eq!(
        kinds,
        vec![
            tally_consensus::MessageType::PrepareRequest,
            tally_consensus::MessageType::BlockSignatures
        ]
    );
}
