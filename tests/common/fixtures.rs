//! Builders for the peers, events, and ledgers used across the test suite.

use std::sync::mpsc::{self, Receiver};

use ed25519_dalek::SigningKey;
use log::LevelFilter;
use rand_core::OsRng;

use continuity_storage::{
    config::Configuration,
    events::LedgerEvent,
    ledger::accessors::internal::EventLedger,
    types::{
        data_types::*,
        event::{ConfigurationEvent, Event, MergeEvent, OperationSummary, RegularEvent},
    },
};

use super::{logging::setup_logger, mem_db::MemDB};

/// Create an empty ledger on top of a fresh `MemDB`.
pub(crate) fn ledger() -> EventLedger<MemDB> {
    ledger_with_config(Configuration::builder().log_events(true).build())
}

pub(crate) fn ledger_with_config(config: Configuration) -> EventLedger<MemDB> {
    setup_logger(LevelFilter::Debug);
    EventLedger::new(MemDB::new(), config, None)
}

/// Create an empty ledger that publishes its events on the returned receiver.
pub(crate) fn ledger_with_events() -> (EventLedger<MemDB>, Receiver<LedgerEvent>) {
    setup_logger(LevelFilter::Debug);
    let (sender, receiver) = mpsc::channel();
    let ledger = EventLedger::new(
        MemDB::new(),
        Configuration::builder().log_events(true).build(),
        Some(sender),
    );
    (ledger, receiver)
}

/// Generate the identity of a new peer.
pub(crate) fn peer() -> PeerId {
    let mut csprg = OsRng {};
    PeerId::from(SigningKey::generate(&mut csprg).verifying_key())
}

/// Generate `n` peers, sorted.
pub(crate) fn peers(n: usize) -> Vec<PeerId> {
    let mut peers: Vec<PeerId> = (0..n).map(|_| peer()).collect();
    peers.sort();
    peers
}

pub(crate) fn random_hash() -> CryptoHash {
    CryptoHash::new(rand::random())
}

/// A merge event of `creator` at `generation` on top of `tree_hash`, referencing `parent_hash`, with
/// every other field at its default.
pub(crate) fn merge(
    creator: PeerId,
    generation: u64,
    tree_hash: CryptoHash,
    parent_hash: Vec<CryptoHash>,
) -> MergeEvent {
    MergeEvent {
        creator,
        generation: Generation::new(generation),
        parent_hash,
        tree_hash,
        basis_block_height: BlockHeight::new(0),
        parent_hash_commitment: None,
        local_replay_number: ReplayNumber::new(0),
    }
}

/// The genesis merge event of the network, created by `creator`.
pub(crate) fn genesis(creator: PeerId) -> Event {
    Event::Merge(merge(creator, 0, CryptoHash::new([0; 32]), Vec::new()))
}

/// A regular event carrying one fresh operation of `operation_creator`.
pub(crate) fn regular(operation_creator: PeerId) -> Event {
    regular_with(
        BlockHeight::new(0),
        vec![OperationSummary {
            creator: operation_creator,
            operation_hash: random_hash(),
        }],
    )
}

pub(crate) fn regular_with(
    basis_block_height: BlockHeight,
    operations: Vec<OperationSummary>,
) -> Event {
    Event::Regular(RegularEvent {
        basis_block_height,
        operations,
    })
}

pub(crate) fn configuration(sequence: u64) -> Event {
    Event::Configuration(ConfigurationEvent {
        basis_block_height: BlockHeight::new(0),
        sequence: ConfigSequence::new(sequence),
        ledger_configuration: random_hash().bytes().to_vec(),
    })
}

/// A stored chain of merge events.
pub(crate) struct Chain {
    pub(crate) creator: PeerId,
    /// Hashes of the chain's merge events, indexed by generation minus one.
    pub(crate) hashes: Vec<CryptoHash>,
}

impl Chain {
    pub(crate) fn head(&self) -> CryptoHash {
        *self.hashes.last().unwrap()
    }

    pub(crate) fn at(&self, generation: u64) -> CryptoHash {
        self.hashes[(generation - 1) as usize]
    }
}

/// Store `length` merge events of `creator` on top of the stored genesis merge event `genesis_hash`.
/// Each merge event references the previous one of the chain, plus `extra_parents` at generation 1.
pub(crate) fn put_chain(
    ledger: &mut EventLedger<MemDB>,
    creator: PeerId,
    genesis_hash: CryptoHash,
    length: u64,
    extra_parents: Vec<CryptoHash>,
) -> Chain {
    let mut hashes = Vec::new();
    let mut tree_hash = genesis_hash;
    for generation in 1..=length {
        let mut parent_hash = vec![tree_hash];
        if generation == 1 {
            parent_hash.extend(extra_parents.iter().copied());
        }
        let event = Event::Merge(merge(creator, generation, tree_hash, parent_hash));
        tree_hash = ledger.put_event(&event).unwrap().hash;
        hashes.push(tree_hash);
    }
    Chain { creator, hashes }
}
