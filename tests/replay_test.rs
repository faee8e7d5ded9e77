//! Tests for replay and fork detection, and for condemning replayers.

use std::collections::{BTreeMap, BTreeSet};

use continuity_storage::{
    ledger::{accessors::internal::EventLedger, indexes::IndexName},
    queries::replay::{GetNewReplayers, OperationQuery},
    types::{
        data_types::*,
        event::{Event, EventType, OperationSummary},
    },
};

mod common;

use common::{
    fixtures::{genesis, ledger, merge, peer, put_chain, random_hash, regular, regular_with},
    mem_db::MemDB,
};

/// Store a merge event of `creator` at `generation` on `tree_hash`, produced under `local_replay_number`.
fn put_merge(
    ledger: &mut EventLedger<MemDB>,
    creator: PeerId,
    generation: u64,
    tree_hash: CryptoHash,
    local_replay_number: u64,
) -> CryptoHash {
    // A fresh regular parent keeps the hash of every merge event distinct.
    let extra = ledger.put_event(&regular(creator)).unwrap().hash;
    let mut event = merge(creator, generation, tree_hash, vec![tree_hash, extra]);
    event.local_replay_number = ReplayNumber::new(local_replay_number);
    ledger.put_event(&Event::Merge(event)).unwrap().hash
}

/// Hashes of the non-consensus merge events eligible for a peer at `basis_block_height`.
fn merges(ledger: &EventLedger<MemDB>, basis_block_height: Option<u64>) -> BTreeSet<CryptoHash> {
    ledger
        .snapshot()
        .get_non_consensus_events(
            basis_block_height.map(BlockHeight::new),
            Some(EventType::Merge),
        )
        .unwrap()
        .into_iter()
        .map(|entry| entry.event_hash)
        .collect()
}

fn settle(ledger: &mut EventLedger<MemDB>, hashes: &[CryptoHash], block_height: u64) {
    for (order, hash) in hashes.iter().enumerate() {
        ledger
            .set_consensus(hash, BlockHeight::new(block_height), BlockOrder::new(order as u64))
            .unwrap();
    }
}

#[test]
fn new_replayers_are_found_among_consensus_merge_events() {
    // 1. Alice restarts between her first and second merge events. Carol restarts too, but her merge
    //    event has not reached consensus.
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob, carol) = (peer(), peer(), peer());
    let a1 = put_merge(&mut ledger, alice, 1, genesis_hash, 0);
    let a2 = put_merge(&mut ledger, alice, 2, a1, 1);
    let b1 = put_merge(&mut ledger, bob, 1, genesis_hash, 0);
    put_merge(&mut ledger, carol, 1, genesis_hash, 1);
    settle(&mut ledger, &[a1, a2, b1], 1);

    // 2. Only Alice is reported, with every replay number she was seen with.
    let expected = BTreeMap::from([
        (alice, ReplayNumber::new(0)),
        (bob, ReplayNumber::new(0)),
        (carol, ReplayNumber::new(0)),
    ]);
    let snapshot = ledger.snapshot();
    assert_eq!(
        snapshot.get_new_replayers(expected.clone()).unwrap(),
        BTreeMap::from([(
            alice,
            BTreeSet::from([ReplayNumber::new(0), ReplayNumber::new(1)])
        )])
    );

    // 3. Expecting Alice's new replay number reports her old one as well.
    let mut updated = expected;
    updated.insert(alice, ReplayNumber::new(1));
    assert!(snapshot
        .get_new_replayers(updated)
        .unwrap()
        .contains_key(&alice));

    // 4. The greatest consensus replay number of each peer.
    assert_eq!(
        snapshot.get_latest_replays(vec![alice, bob, carol]).unwrap(),
        BTreeMap::from([(alice, ReplayNumber::new(1)), (bob, ReplayNumber::new(0))])
    );
}

#[test]
fn new_replayers_are_answered_from_the_replay_number_index() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let alice = peer();
    let a1 = put_merge(&mut ledger, alice, 1, genesis_hash, 2);
    settle(&mut ledger, &[a1], 1);

    let explained = ledger
        .snapshot()
        .explain(&GetNewReplayers {
            expected: BTreeMap::from([(alice, ReplayNumber::new(0))]),
        })
        .unwrap();
    assert_eq!(explained.n_returned, 1);
    assert!(explained.is_covered());
    assert_eq!(explained.stages.len(), 1);
    assert_eq!(
        explained.stage(IndexName::ReplayNumberMax).unwrap().keys_examined,
        1
    );
}

#[test]
fn forkers_built_twice_on_the_same_tree_event() {
    // 1. Alice forks at the genesis merge event, Bob forks at his first merge event.
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob, carol) = (peer(), peer(), peer());
    put_merge(&mut ledger, alice, 1, genesis_hash, 0);
    put_merge(&mut ledger, alice, 1, genesis_hash, 0);
    let b1 = put_merge(&mut ledger, bob, 1, genesis_hash, 0);
    put_merge(&mut ledger, bob, 2, b1, 0);
    put_merge(&mut ledger, bob, 2, b1, 0);
    let carol_chain = put_chain(&mut ledger, carol, genesis_hash, 2, Vec::new());

    let snapshot = ledger.snapshot();
    let tree_hashes = vec![genesis_hash, b1, carol_chain.at(1)];

    // 2. The genesis merge event is only checked for the given first-generation peers.
    assert_eq!(
        snapshot
            .get_forkers(tree_hashes.clone(), vec![bob, carol], genesis_hash)
            .unwrap(),
        BTreeMap::from([(bob, BTreeSet::from([b1]))])
    );
    assert_eq!(
        snapshot
            .get_forkers(tree_hashes, vec![alice, bob], genesis_hash)
            .unwrap(),
        BTreeMap::from([
            (alice, BTreeSet::from([genesis_hash])),
            (bob, BTreeSet::from([b1])),
        ])
    );
    assert!(snapshot
        .get_forkers(vec![random_hash()], Vec::new(), genesis_hash)
        .unwrap()
        .is_empty());
}

#[test]
fn marking_replayers_excludes_their_events() {
    // 1. Alice has two non-consensus merge events, Bob has one.
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob) = (peer(), peer());
    let alice_chain = put_chain(&mut ledger, alice, genesis_hash, 2, Vec::new());
    let bob_chain = put_chain(&mut ledger, bob, genesis_hash, 1, Vec::new());

    // 2. Condemn Alice at block height 15.
    let report = ledger
        .mark_new_replayers(&[alice], BlockHeight::new(15))
        .unwrap();
    assert_eq!(report.matched, 2);
    assert_eq!(report.modified, 2);
    assert_eq!(
        ledger.get_event(&alice_chain.head()).unwrap().unwrap().annotation.replay,
        ReplayStatus::DetectedAt(BlockHeight::new(15))
    );

    // 3. Alice's events are eligible for a basis below 15 and excluded from 15 on.
    let everyone = BTreeSet::from([
        genesis_hash,
        alice_chain.at(1),
        alice_chain.at(2),
        bob_chain.at(1),
    ]);
    assert_eq!(merges(&ledger, None), everyone);
    assert_eq!(merges(&ledger, Some(14)), everyone);
    assert_eq!(
        merges(&ledger, Some(15)),
        BTreeSet::from([genesis_hash, bob_chain.at(1)])
    );
    assert_eq!(
        merges(&ledger, Some(100)),
        BTreeSet::from([genesis_hash, bob_chain.at(1)])
    );

    // 4. Marking Alice again changes nothing, and keeps her detection height.
    let report = ledger
        .mark_new_replayers(&[alice], BlockHeight::new(20))
        .unwrap();
    assert_eq!(report.matched, 0);
    assert_eq!(report.modified, 0);

    // 5. Alice's new events are stored already condemned at her recorded height.
    let a3 = put_merge(&mut ledger, alice, 3, alice_chain.head(), 0);
    assert_eq!(
        ledger.get_event(&a3).unwrap().unwrap().annotation.replay,
        ReplayStatus::DetectedAt(BlockHeight::new(15))
    );
    assert!(!merges(&ledger, Some(15)).contains(&a3));
}

#[test]
fn replayers_condemned_at_the_greatest_height_keep_it_in_the_index() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let alice = peer();
    let alice_chain = put_chain(&mut ledger, alice, genesis_hash, 1, Vec::new());
    ledger
        .mark_new_replayers(&[alice], BlockHeight::new(u64::MAX))
        .unwrap();

    let last = ReplayStatus::DetectedAt(BlockHeight::new(u64::MAX));
    assert_eq!(
        ledger.get_event(&alice_chain.head()).unwrap().unwrap().annotation.replay,
        last
    );
    let indexed: Vec<ReplayStatus> = ledger
        .snapshot()
        .get_non_consensus_events(None, Some(EventType::Merge))
        .unwrap()
        .into_iter()
        .filter(|entry| entry.event_hash == alice_chain.head())
        .map(|entry| entry.replay)
        .collect();
    assert_eq!(indexed, vec![last]);
}

#[test]
fn operation_replayers_resubmitted_an_operation() {
    let mut ledger = ledger();
    let (alice, bob) = (peer(), peer());
    let operation_hash = random_hash();
    ledger
        .put_event(&regular_with(
            BlockHeight::new(0),
            vec![OperationSummary {
                creator: alice,
                operation_hash,
            }],
        ))
        .unwrap();

    let fresh = random_hash();
    let snapshot = ledger.snapshot();
    assert_eq!(
        snapshot
            .get_operation_replayers(vec![
                OperationQuery {
                    creator: alice,
                    operation_hashes: vec![operation_hash, fresh],
                },
                // The same operation hash under another creator is a different operation.
                OperationQuery {
                    creator: bob,
                    operation_hashes: vec![operation_hash],
                },
            ])
            .unwrap(),
        BTreeMap::from([(alice, BTreeSet::from([operation_hash]))])
    );
    assert!(snapshot
        .get_operation_replayers(Vec::new())
        .unwrap()
        .is_empty());
}
