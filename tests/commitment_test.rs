//! Tests for parent-hash commitment validation.

use continuity_storage::{
    ledger::accessors::internal::{EventLedger, Inconsistency, LedgerError},
    queries::commitment::{CommitmentSummary, ParentHashCommitment},
    types::{data_types::*, event::Event},
};

mod common;

use common::{
    fixtures::{genesis, ledger, merge, peer, put_chain, random_hash},
    mem_db::MemDB,
};

/// Store a merge event of `creator` at `generation` on `tree_hash` that commits to `committed_hash`.
fn put_committing(
    ledger: &mut EventLedger<MemDB>,
    creator: PeerId,
    generation: u64,
    tree_hash: CryptoHash,
    committed_hash: CryptoHash,
) -> CryptoHash {
    let mut event = merge(creator, generation, tree_hash, vec![tree_hash]);
    event.parent_hash_commitment = Some(committed_hash);
    ledger.put_event(&Event::Merge(event)).unwrap().hash
}

fn put_plain(
    ledger: &mut EventLedger<MemDB>,
    creator: PeerId,
    generation: u64,
    tree_hash: CryptoHash,
) -> CryptoHash {
    let event = Event::Merge(merge(creator, generation, tree_hash, vec![tree_hash]));
    ledger.put_event(&event).unwrap().hash
}

fn settle(ledger: &mut EventLedger<MemDB>, hash: &CryptoHash, block_height: u64) {
    ledger
        .set_consensus(hash, BlockHeight::new(block_height), BlockOrder::new(0))
        .unwrap();
}

/// Bob commits to Alice's first merge event at generation 1. Returns Alice's and Bob's first events.
fn committed_network(ledger: &mut EventLedger<MemDB>) -> (PeerId, PeerId, CryptoHash, CryptoHash) {
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob) = (peer(), peer());
    let a1 = put_chain(ledger, alice, genesis_hash, 1, Vec::new()).head();
    let b1 = put_committing(ledger, bob, 1, genesis_hash, a1);
    (alice, bob, a1, b1)
}

#[test]
fn latest_parent_hash_commitment_reached_consensus() {
    let mut ledger = ledger();
    let (_, bob, a1, b1) = committed_network(&mut ledger);

    // Non-consensus commitments are not reported.
    assert_eq!(
        ledger
            .snapshot()
            .get_latest_parent_hash_commitment(bob, Generation::new(0))
            .unwrap(),
        None
    );
    assert!(ledger
        .snapshot()
        .has_outstanding_parent_hash_commitments(None)
        .unwrap());

    settle(&mut ledger, &b1, 10);
    let expected = ParentHashCommitment {
        event_hash: b1,
        generation: Generation::new(1),
        block_height: BlockHeight::new(10),
        committed_hash: a1,
    };
    let snapshot = ledger.snapshot();
    assert_eq!(
        snapshot
            .get_latest_parent_hash_commitment(bob, Generation::new(1))
            .unwrap(),
        Some(expected)
    );
    assert!(!snapshot.has_outstanding_parent_hash_commitments(None).unwrap());

    // Merge events below the minimum generation are not looked at.
    assert_eq!(
        snapshot
            .get_latest_parent_hash_commitment(bob, Generation::new(2))
            .unwrap(),
        None
    );
    drop(snapshot);

    // A newer merge event without a commitment does not hide the older commitment.
    let b2 = put_plain(&mut ledger, bob, 2, b1);
    settle(&mut ledger, &b2, 11);
    assert_eq!(
        ledger
            .snapshot()
            .get_latest_parent_hash_commitment(bob, Generation::new(0))
            .unwrap(),
        Some(expected)
    );
}

#[test]
fn commitment_to_a_replayer_condemned_later_is_valid() {
    let mut ledger = ledger();
    let (alice, bob, a1, b1) = committed_network(&mut ledger);
    settle(&mut ledger, &b1, 10);

    ledger
        .mark_new_replayers(&[alice], BlockHeight::new(15))
        .unwrap();
    assert_eq!(
        ledger
            .snapshot()
            .get_latest_parent_hash_commitment(bob, Generation::new(0))
            .unwrap()
            .map(|commitment| commitment.committed_hash),
        Some(a1)
    );
}

#[test]
fn commitment_to_a_replayer_condemned_earlier_is_void() {
    let mut ledger = ledger();
    let (alice, bob, _, b1) = committed_network(&mut ledger);
    settle(&mut ledger, &b1, 10);

    ledger
        .mark_new_replayers(&[alice], BlockHeight::new(5))
        .unwrap();
    assert_eq!(
        ledger
            .snapshot()
            .get_latest_parent_hash_commitment(bob, Generation::new(0))
            .unwrap(),
        None
    );
}

#[test]
fn commitment_to_unknown_event_is_inconsistent() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let bob = peer();
    let missing = random_hash();
    let b1 = put_committing(&mut ledger, bob, 1, genesis_hash, missing);
    settle(&mut ledger, &b1, 3);

    match ledger
        .snapshot()
        .get_latest_parent_hash_commitment(bob, Generation::new(0))
    {
        Err(LedgerError::Inconsistent(Inconsistency::MissingCommittedEvent { event, committed })) => {
            assert_eq!(event, b1);
            assert_eq!(committed, missing);
        }
        other => panic!("expected MissingCommittedEvent, got {:?}", other),
    }
}

#[test]
fn parent_hash_commitments_are_summarized_by_validity() {
    // 1. Bob commits to Alice's event at height 10. Carol commits to it at height 12, after she was
    //    condemned at height 11. Dave commits to it at height 20.
    let mut ledger = ledger();
    let (_, _, a1, b1) = committed_network(&mut ledger);
    let genesis_hash = ledger
        .snapshot()
        .get_head(None, Some(Generation::new(0)))
        .unwrap()
        .unwrap()
        .event_hash;
    let (carol, dave) = (peer(), peer());
    let c1 = put_committing(&mut ledger, carol, 1, genesis_hash, a1);
    let d1 = put_committing(&mut ledger, dave, 1, genesis_hash, a1);
    settle(&mut ledger, &b1, 10);
    settle(&mut ledger, &c1, 12);
    settle(&mut ledger, &d1, 20);
    ledger
        .mark_new_replayers(&[carol], BlockHeight::new(11))
        .unwrap();

    let snapshot = ledger.snapshot();

    // 2. Up to height 15: one valid and one invalid commitment.
    assert_eq!(
        snapshot
            .get_parent_hash_commitments(vec![a1], BlockHeight::new(15))
            .unwrap(),
        vec![
            CommitmentSummary {
                committed_hash: a1,
                valid: true,
                block_height: BlockHeight::new(10),
            },
            CommitmentSummary {
                committed_hash: a1,
                valid: false,
                block_height: BlockHeight::new(12),
            },
        ]
    );

    // 3. Up to height 11: Carol's commitment had not reached consensus yet.
    assert_eq!(
        snapshot
            .get_parent_hash_commitments(vec![a1], BlockHeight::new(11))
            .unwrap(),
        vec![CommitmentSummary {
            committed_hash: a1,
            valid: true,
            block_height: BlockHeight::new(10),
        }]
    );

    // 4. Hashes nobody committed to yield nothing.
    assert!(snapshot
        .get_parent_hash_commitments(vec![b1, random_hash()], BlockHeight::new(100))
        .unwrap()
        .is_empty());
}
