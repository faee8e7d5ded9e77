//! Tests for head and generation lookups.

use continuity_storage::{
    ledger::{
        accessors::internal::{InvalidArgument, LedgerError},
        indexes::IndexName,
    },
    queries::head::GetHead,
    types::{
        data_types::*,
        event::{Event, EventType},
    },
};

mod common;

use common::fixtures::{genesis, ledger, merge, peer, put_chain, random_hash, regular};

#[test]
fn get_head_by_creator_and_generation() {
    let mut ledger = ledger();
    let genesis_creator = peer();
    let genesis_hash = ledger.put_event(&genesis(genesis_creator)).unwrap().hash;
    let alice = put_chain(&mut ledger, peer(), genesis_hash, 3, Vec::new());
    let bob = put_chain(&mut ledger, peer(), genesis_hash, 1, Vec::new());

    let snapshot = ledger.snapshot();

    let head = snapshot.get_head(Some(alice.creator), None).unwrap().unwrap();
    assert_eq!(head.event_hash, alice.head());
    assert_eq!(head.generation, Generation::new(3));
    assert_eq!(head.creator, alice.creator);

    let second = snapshot
        .get_head(Some(alice.creator), Some(Generation::new(2)))
        .unwrap()
        .unwrap();
    assert_eq!(second.event_hash, alice.at(2));

    // Generation 0 is a generation like any other when a creator is given.
    assert_eq!(
        snapshot
            .get_head(Some(bob.creator), Some(Generation::new(0)))
            .unwrap(),
        None
    );
    assert_eq!(
        snapshot
            .get_head(Some(genesis_creator), Some(Generation::new(0)))
            .unwrap()
            .map(|head| head.event_hash),
        Some(genesis_hash)
    );

    // The greatest generation of any creator.
    let global = snapshot.get_head(None, None).unwrap().unwrap();
    assert_eq!(global.event_hash, alice.head());

    assert_eq!(snapshot.get_head(Some(peer()), None).unwrap(), None);
    assert_eq!(
        snapshot
            .get_start_hash(alice.creator, Generation::new(1))
            .unwrap(),
        Some(alice.at(1))
    );
    assert_eq!(
        snapshot
            .get_start_hash(alice.creator, Generation::new(4))
            .unwrap(),
        None
    );
}

#[test]
fn get_head_at_generation_zero_uses_the_genesis_pointer() {
    let mut ledger = ledger();
    assert_eq!(
        ledger
            .snapshot()
            .get_head(None, Some(Generation::new(0)))
            .unwrap(),
        None
    );

    let genesis_creator = peer();
    let genesis_hash = ledger.put_event(&genesis(genesis_creator)).unwrap().hash;
    put_chain(&mut ledger, peer(), genesis_hash, 2, Vec::new());

    let explained = ledger
        .snapshot()
        .explain(&GetHead {
            creator: None,
            generation: Some(Generation::new(0)),
        })
        .unwrap();
    let head = explained.result.unwrap();
    assert_eq!(head.event_hash, genesis_hash);
    assert_eq!(head.creator, genesis_creator);
    assert_eq!(head.generation, Generation::new(0));
    assert!(explained.stage(IndexName::GenesisMergeEvent).is_some());
    assert!(explained.stage(IndexName::MergeEventHead).is_none());
    assert!(explained.is_covered());
}

#[test]
fn get_head_by_generation_alone_must_be_genesis() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    put_chain(&mut ledger, peer(), genesis_hash, 2, Vec::new());

    match ledger.snapshot().get_head(None, Some(Generation::new(1))) {
        Err(LedgerError::InvalidArgument(InvalidArgument::GenerationWithoutCreator {
            generation,
        })) => assert_eq!(generation, Generation::new(1)),
        other => panic!("expected GenerationWithoutCreator, got {:?}", other),
    }
}

#[test]
fn replayed_generations_resolve_to_the_smallest_hash() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let alice = put_chain(&mut ledger, peer(), genesis_hash, 1, Vec::new());

    // Two divergent generation-2 events on top of the same generation-1 event.
    let regulars: Vec<CryptoHash> = (0..2)
        .map(|_| ledger.put_event(&regular(alice.creator)).unwrap().hash)
        .collect();
    let mut replays: Vec<CryptoHash> = regulars
        .iter()
        .map(|regular_hash| {
            let event = Event::Merge(merge(
                alice.creator,
                2,
                alice.head(),
                vec![alice.head(), *regular_hash],
            ));
            ledger.put_event(&event).unwrap().hash
        })
        .collect();
    replays.sort();

    let snapshot = ledger.snapshot();
    assert_eq!(
        snapshot
            .get_head(Some(alice.creator), None)
            .unwrap()
            .unwrap()
            .event_hash,
        replays[0]
    );
    assert_eq!(
        snapshot
            .get_start_hash(alice.creator, Generation::new(2))
            .unwrap(),
        Some(replays[0])
    );

    // Consensus on the larger hash does not change the tie-break.
    drop(snapshot);
    ledger
        .set_consensus(&replays[1], BlockHeight::new(1), BlockOrder::new(0))
        .unwrap();
    assert_eq!(
        ledger
            .snapshot()
            .get_head(Some(alice.creator), None)
            .unwrap()
            .unwrap()
            .event_hash,
        replays[0]
    );
}

#[test]
fn peer_head_info_is_covered() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let alice = put_chain(&mut ledger, peer(), genesis_hash, 2, Vec::new());
    let regular_hash = ledger.put_event(&regular(alice.creator)).unwrap().hash;

    let snapshot = ledger.snapshot();
    let info = snapshot.get_peer_head_info(&alice.head()).unwrap().unwrap();
    assert_eq!(info.event_type, EventType::Merge);
    assert_eq!(info.creator, Some(alice.creator));
    assert_eq!(info.generation, Some(Generation::new(2)));
    assert_eq!(info.local_replay_number, Some(ReplayNumber::new(0)));

    let info = snapshot.get_peer_head_info(&regular_hash).unwrap().unwrap();
    assert_eq!(info.event_type, EventType::Regular);
    assert_eq!(info.creator, None);

    assert_eq!(snapshot.get_peer_head_info(&random_hash()).unwrap(), None);
}
