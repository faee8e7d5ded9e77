/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'event' type, the vertex of the ledger's DAG, and the records stored
//! alongside it.
//!
//! An event is stored as three separate records:
//! 1. The [`Event`] body itself, which is content-addressed and immutable.
//! 2. Its [`EventMeta`], written once when the local store accepts the event.
//! 3. Its [`Annotation`], the only mutable record, which carries the consensus bookkeeping fields and
//!    a version number used for compare-and-set writes.

use borsh::{BorshDeserialize, BorshSerialize};
use sha2::{Digest, Sha256 as CryptoHasher};

use super::data_types::*;

/// The three kinds of events. Only [merge](EventType::Merge) events carry DAG structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize)]
pub enum EventType {
    Merge,
    Regular,
    Configuration,
}

impl EventType {
    /// One-byte tag used for this event type inside index keys.
    pub(crate) const fn tag(&self) -> u8 {
        match self {
            EventType::Merge => b'm',
            EventType::Regular => b'r',
            EventType::Configuration => b'c',
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<EventType> {
        match tag {
            b'm' => Some(EventType::Merge),
            b'r' => Some(EventType::Regular),
            b'c' => Some(EventType::Configuration),
            _ => None,
        }
    }

    pub fn is_merge(&self) -> bool {
        matches!(self, EventType::Merge)
    }
}

/// A DAG vertex authored by `creator` that summarizes the creator's view of the network.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MergeEvent {
    pub creator: PeerId,
    pub generation: Generation,
    /// The events this event directly references, in the order the creator listed them.
    pub parent_hash: Vec<CryptoHash>,
    /// The creator's previous merge event, or the genesis merge event for a creator's first merge
    /// event.
    pub tree_hash: CryptoHash,
    pub basis_block_height: BlockHeight,
    pub parent_hash_commitment: Option<CryptoHash>,
    pub local_replay_number: ReplayNumber,
}

/// Summary of an operation carried by a regular event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct OperationSummary {
    /// The peer that created (and is accountable for) the operation.
    pub creator: PeerId,
    pub operation_hash: CryptoHash,
}

/// An event that carries operations submitted to the ledger.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct RegularEvent {
    pub basis_block_height: BlockHeight,
    pub operations: Vec<OperationSummary>,
}

/// An event that proposes a change to the ledger's configuration.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ConfigurationEvent {
    pub basis_block_height: BlockHeight,
    pub sequence: ConfigSequence,
    pub ledger_configuration: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub enum Event {
    Merge(MergeEvent),
    Regular(RegularEvent),
    Configuration(ConfigurationEvent),
}

impl Event {
    /// Compute the content hash of this event: the SHA256 hash of its Borsh serialization.
    pub fn hash(&self) -> CryptoHash {
        let mut hasher = CryptoHasher::new();
        // Serializing an in-memory event into a Vec cannot fail.
        hasher.update(&self.try_to_vec().unwrap_or_default());
        CryptoHash::new(hasher.finalize().into())
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Event::Merge(_) => EventType::Merge,
            Event::Regular(_) => EventType::Regular,
            Event::Configuration(_) => EventType::Configuration,
        }
    }

    pub fn basis_block_height(&self) -> BlockHeight {
        match self {
            Event::Merge(merge) => merge.basis_block_height,
            Event::Regular(regular) => regular.basis_block_height,
            Event::Configuration(configuration) => configuration.basis_block_height,
        }
    }

    pub fn as_merge(&self) -> Option<&MergeEvent> {
        match self {
            Event::Merge(merge) => Some(merge),
            _ => None,
        }
    }

    pub fn creator(&self) -> Option<PeerId> {
        self.as_merge().map(|merge| merge.creator)
    }

    pub fn parent_hash(&self) -> &[CryptoHash] {
        match self {
            Event::Merge(merge) => &merge.parent_hash,
            _ => &[],
        }
    }
}

/// Immutable metadata written when the local store accepts an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct EventMeta {
    pub local_event_number: LocalEventNumber,
    /// Seconds since the Unix Epoch at which the event was stored.
    pub received_at: u64,
}

/// The mutable, versioned consensus bookkeeping of an event.
///
/// Every field other than `version` is written at most once: `consensus` and `required_block_height`
/// go from `None` to `Some`, `replay` goes from `Clean` to `DetectedAt`, and `effective_configuration`
/// goes from `false` to `true`. None of them ever revert.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Annotation {
    pub version: u64,
    pub consensus: Option<ConsensusAnnotation>,
    pub replay: ReplayStatus,
    pub required_block_height: Option<BlockHeight>,
    pub effective_configuration: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ConsensusAnnotation {
    pub position: ConsensusPosition,
    /// Seconds since the Unix Epoch at which consensus on the event was recorded locally.
    pub consensus_at: u64,
}

impl Annotation {
    pub fn is_consensus(&self) -> bool {
        self.consensus.is_some()
    }

    pub fn block_height(&self) -> Option<BlockHeight> {
        self.consensus.map(|consensus| consensus.position.block_height)
    }

    pub fn block_order(&self) -> Option<BlockOrder> {
        self.consensus.map(|consensus| consensus.position.block_order)
    }
}

/// An event together with everything the store knows about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventRecord {
    pub hash: CryptoHash,
    pub event: Event,
    pub meta: EventMeta,
    pub annotation: Annotation,
}

impl EventRecord {
    pub fn event_type(&self) -> EventType {
        self.event.event_type()
    }
}
