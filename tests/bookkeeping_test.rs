//! Tests for consensus bookkeeping: configuration selection, required block heights, outstanding work,
//! and gossip summaries.

use std::time::Duration;

use continuity_storage::{
    ledger::indexes::{IndexName, NonConsensusEntry},
    queries::bookkeeping::GetEffectiveConfiguration,
    types::{
        data_types::*,
        event::{Event, EventType},
    },
};

mod common;

use common::fixtures::{configuration, genesis, ledger, merge, peer, put_chain, regular};

fn event_hashes(entries: Vec<NonConsensusEntry>) -> Vec<CryptoHash> {
    entries.into_iter().map(|entry| entry.event_hash).collect()
}

#[test]
fn effective_configuration_is_the_latest_in_block_order() {
    // 1. Two configuration events of sequence 2 and one of sequence 3 reach consensus at height 4.
    let mut ledger = ledger();
    let first = ledger.put_event(&configuration(2)).unwrap().hash;
    let second = ledger.put_event(&configuration(2)).unwrap().hash;
    let other = ledger.put_event(&configuration(3)).unwrap().hash;
    for (hash, order) in [(first, 3), (second, 7), (other, 9)] {
        ledger
            .set_consensus(&hash, BlockHeight::new(4), BlockOrder::new(order))
            .unwrap();
    }
    assert_eq!(
        ledger
            .snapshot()
            .get_effective_configuration(BlockHeight::new(4))
            .unwrap(),
        None
    );

    // 2. Flag sequence 2: only the one later in block order is effective.
    assert!(ledger
        .set_effective_configuration(BlockHeight::new(4), ConfigSequence::new(2))
        .unwrap());
    assert!(
        ledger
            .get_event(&second)
            .unwrap()
            .unwrap()
            .annotation
            .effective_configuration
    );
    assert!(
        !ledger
            .get_event(&first)
            .unwrap()
            .unwrap()
            .annotation
            .effective_configuration
    );

    let explained = ledger
        .snapshot()
        .explain(&GetEffectiveConfiguration {
            block_height: BlockHeight::new(4),
        })
        .unwrap();
    assert_eq!(explained.result, Some(second));
    assert!(explained.is_covered());
    assert_eq!(
        explained
            .stage(IndexName::EffectiveConfiguration)
            .unwrap()
            .keys_examined,
        2
    );

    // 3. Flagging again still finds the event, and unknown sequences or heights find nothing.
    assert!(ledger
        .set_effective_configuration(BlockHeight::new(4), ConfigSequence::new(2))
        .unwrap());
    assert!(!ledger
        .set_effective_configuration(BlockHeight::new(4), ConfigSequence::new(5))
        .unwrap());
    assert!(!ledger
        .set_effective_configuration(BlockHeight::new(5), ConfigSequence::new(2))
        .unwrap());
    assert_eq!(
        ledger
            .snapshot()
            .get_effective_configuration(BlockHeight::new(5))
            .unwrap(),
        None
    );
}

#[test]
fn required_block_heights_are_written_once() {
    // 1. Stamp Alice's two non-consensus merge events with height 7.
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob) = (peer(), peer());
    let chain = put_chain(&mut ledger, alice, genesis_hash, 2, Vec::new());

    let report = ledger
        .set_required_block_height(&[alice, bob], BlockHeight::new(7))
        .unwrap();
    assert_eq!(report.matched, 2);
    assert_eq!(report.modified, 2);
    assert_eq!(
        ledger.snapshot().get_required_block_height(alice).unwrap(),
        Some(BlockHeight::new(7))
    );
    assert_eq!(ledger.snapshot().get_required_block_height(bob).unwrap(), None);

    // 2. Stamping again does not overwrite.
    let report = ledger
        .set_required_block_height(&[alice], BlockHeight::new(9))
        .unwrap();
    assert_eq!(report.modified, 0);
    assert_eq!(
        ledger
            .get_event(&chain.head())
            .unwrap()
            .unwrap()
            .annotation
            .required_block_height,
        Some(BlockHeight::new(7))
    );

    // 3. A newer merge event gets the newer height. The smallest stamped height wins until its events
    //    reach consensus.
    let a3 = ledger
        .put_event(&Event::Merge(merge(alice, 3, chain.head(), vec![chain.head()])))
        .unwrap()
        .hash;
    let report = ledger
        .set_required_block_height(&[alice], BlockHeight::new(9))
        .unwrap();
    assert_eq!(report.modified, 1);
    assert_eq!(
        ledger.snapshot().get_required_block_height(alice).unwrap(),
        Some(BlockHeight::new(7))
    );

    for (order, hash) in chain.hashes.iter().enumerate() {
        ledger
            .set_consensus(hash, BlockHeight::new(8), BlockOrder::new(order as u64))
            .unwrap();
    }
    assert_eq!(
        ledger.snapshot().get_required_block_height(alice).unwrap(),
        Some(BlockHeight::new(9))
    );

    // 4. Consensus merge events are never stamped.
    ledger
        .set_consensus(&a3, BlockHeight::new(9), BlockOrder::new(0))
        .unwrap();
    let report = ledger
        .set_required_block_height(&[alice], BlockHeight::new(10))
        .unwrap();
    assert_eq!(report.matched, 0);
    assert_eq!(ledger.snapshot().get_required_block_height(alice).unwrap(), None);
}

#[test]
fn outstanding_events_respect_replay_exclusion() {
    let mut ledger = ledger();
    assert!(!ledger.snapshot().has_outstanding_regular_events(None).unwrap());

    // 1. Configuration events count as outstanding regular work.
    let configuration_hash = ledger.put_event(&configuration(1)).unwrap().hash;
    assert!(ledger
        .snapshot()
        .has_outstanding_regular_events(Some(BlockHeight::new(3)))
        .unwrap());
    ledger
        .set_consensus(&configuration_hash, BlockHeight::new(1), BlockOrder::new(0))
        .unwrap();
    assert!(!ledger.snapshot().has_outstanding_regular_events(None).unwrap());

    // 2. Merge events are not regular work, and a condemned creator's events drop out of the
    //    non-consensus set from their detection height on.
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let alice = peer();
    let chain = put_chain(&mut ledger, alice, genesis_hash, 1, Vec::new());
    let regular_hash = ledger.put_event(&regular(alice)).unwrap().hash;
    assert!(ledger.snapshot().has_outstanding_regular_events(None).unwrap());
    ledger
        .mark_new_replayers(&[alice], BlockHeight::new(2))
        .unwrap();

    let snapshot = ledger.snapshot();
    let at_1 = event_hashes(
        snapshot
            .get_non_consensus_events(Some(BlockHeight::new(1)), None)
            .unwrap(),
    );
    assert_eq!(at_1.len(), 3);
    assert!(at_1.contains(&chain.head()));
    let at_2 = event_hashes(
        snapshot
            .get_non_consensus_events(Some(BlockHeight::new(2)), None)
            .unwrap(),
    );
    assert_eq!(at_2.len(), 2);
    assert!(!at_2.contains(&chain.head()));
    assert_eq!(
        event_hashes(
            snapshot
                .get_non_consensus_events(Some(BlockHeight::new(2)), Some(EventType::Regular))
                .unwrap()
        ),
        vec![regular_hash]
    );
}

#[test]
fn greatest_basis_block_height_excludes_every_condemned_creator() {
    // 1. Alice is condemned at the greatest possible height, Bob at height 3.
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob, carol) = (peer(), peer(), peer());
    let alice_chain = put_chain(&mut ledger, alice, genesis_hash, 1, Vec::new());
    let bob_chain = put_chain(&mut ledger, bob, genesis_hash, 1, Vec::new());
    let carol_chain = put_chain(&mut ledger, carol, genesis_hash, 1, Vec::new());
    ledger
        .mark_new_replayers(&[alice], BlockHeight::new(u64::MAX))
        .unwrap();
    ledger
        .mark_new_replayers(&[bob], BlockHeight::new(3))
        .unwrap();
    let regular_hash = ledger.put_event(&regular(carol)).unwrap().hash;

    // 2. At the greatest basis, only events of creators never condemned are eligible.
    let last = Some(BlockHeight::new(u64::MAX));
    let snapshot = ledger.snapshot();
    let merges = event_hashes(
        snapshot
            .get_non_consensus_events(last, Some(EventType::Merge))
            .unwrap(),
    );
    assert_eq!(merges.len(), 2);
    assert!(merges.contains(&genesis_hash));
    assert!(merges.contains(&carol_chain.head()));
    assert!(!merges.contains(&alice_chain.head()));
    assert!(!merges.contains(&bob_chain.head()));
    assert_eq!(
        event_hashes(
            snapshot
                .get_non_consensus_events(last, Some(EventType::Regular))
                .unwrap()
        ),
        vec![regular_hash]
    );
    assert!(snapshot.has_outstanding_regular_events(last).unwrap());
    assert!(!snapshot.has_outstanding_parent_hash_commitments(last).unwrap());

    // 3. One below, Alice's events are still eligible.
    let before_last = BlockHeight::new(u64::MAX - 1);
    let before_last = event_hashes(
        snapshot
            .get_non_consensus_events(Some(before_last), Some(EventType::Merge))
            .unwrap(),
    );
    assert!(before_last.contains(&alice_chain.head()));
    assert!(!before_last.contains(&bob_chain.head()));
}

#[test]
fn sorted_event_summaries_page_in_arrival_order() {
    // 1. Four events arrive. The first reaches consensus at height 1, the second at height 3.
    let mut ledger = ledger();
    let creator = peer();
    let genesis_hash = ledger.put_event(&genesis(creator)).unwrap().hash;
    let regular_hash = ledger.put_event(&regular(creator)).unwrap().hash;
    let configuration_hash = ledger.put_event(&configuration(1)).unwrap().hash;
    let chain = put_chain(&mut ledger, creator, genesis_hash, 1, vec![regular_hash]);
    ledger
        .set_consensus(&genesis_hash, BlockHeight::new(1), BlockOrder::new(0))
        .unwrap();
    ledger
        .set_consensus(&regular_hash, BlockHeight::new(3), BlockOrder::new(0))
        .unwrap();

    let snapshot = ledger.snapshot();
    let page = |min_local_event_number: u64, limit: usize| -> Vec<CryptoHash> {
        snapshot
            .get_sorted_event_summaries(
                BlockHeight::new(2),
                LocalEventNumber::new(min_local_event_number),
                limit,
            )
            .unwrap()
            .into_iter()
            .map(|summary| summary.event_hash)
            .collect()
    };

    // 2. Events in blocks below height 2 are skipped.
    assert_eq!(page(0, 2), vec![regular_hash, configuration_hash]);
    assert_eq!(page(3, 2), vec![chain.head()]);
    assert!(page(4, 2).is_empty());
    assert!(page(0, 0).is_empty());

    let summaries = snapshot
        .get_sorted_event_summaries(BlockHeight::new(0), LocalEventNumber::new(0), 10)
        .unwrap();
    assert_eq!(summaries.len(), 4);
    assert_eq!(summaries[0].block_height, Some(BlockHeight::new(1)));
    assert_eq!(summaries[3].generation, Some(Generation::new(1)));
    assert_eq!(summaries[3].creator, Some(creator));
    assert_eq!(summaries[3].parent_hash, vec![genesis_hash, regular_hash]);
}

#[test]
fn average_consensus_time_of_a_creator() {
    let mut ledger = ledger();
    let genesis_hash = ledger.put_event(&genesis(peer())).unwrap().hash;
    let (alice, bob) = (peer(), peer());
    let chain = put_chain(&mut ledger, alice, genesis_hash, 2, Vec::new());
    put_chain(&mut ledger, bob, genesis_hash, 1, Vec::new());

    assert_eq!(ledger.snapshot().get_avg_consensus_time(alice).unwrap(), None);

    for (order, hash) in chain.hashes.iter().enumerate() {
        ledger
            .set_consensus(hash, BlockHeight::new(1), BlockOrder::new(order as u64))
            .unwrap();
    }
    let snapshot = ledger.snapshot();
    let average = snapshot.get_avg_consensus_time(alice).unwrap().unwrap();
    assert!(average < Duration::from_secs(60));
    assert_eq!(snapshot.get_avg_consensus_time(bob).unwrap(), None);
}
