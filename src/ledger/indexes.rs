/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The catalogue of secondary indexes maintained over the stored events.
//!
//! Each index is declared by one entry type implementing [`IndexEntry`]. An entry type owns its key
//! layout: the fields in its key, in order, followed by the event hash wherever the other fields do
//! not already make the key unique. Fields that a query returns but never filters on live in the
//! entry's value, so that queries can be answered from the index alone ("covered").
//!
//! Queries can only reach an index through the prefix builders its entry type exposes, so a query
//! that filters on a field combination with no declared index cannot be written.
//!
//! |Index|Key|Value|Contains|
//! |---|---|---|---|
//! |[`MergeEventHead`](MergeEventHeadEntry)|type, creator, generation, consensus, eventHash|blockHeight, parentHashCommitment|Merge events.|
//! |[`NonConsensus`](NonConsensusEntry)|replayStatus, type, generation, creator, eventHash|parentHashCommitment|Non-consensus events.|
//! |[`PeerHeadValidation`](PeerHeadEntry)|eventHash|type, creator, generation, localReplayNumber|All events.|
//! |[`AncestryEdges`](AncestryEntry)|eventHash|type, creator, generation, parentHash|All events.|
//! |[`ConsensusMergeByHeight`](ConsensusMergeEntry)|blockHeight, type, creator, eventHash||Consensus merge events.|
//! |[`EffectiveConfiguration`](EffectiveConfigurationEntry)|blockHeight, blockOrder, type, sequence|eventHash, effectiveConfiguration|Consensus configuration events.|
//! |[`ConsensusHistory`](ConsensusHistoryEntry)|blockHeight, blockOrder, eventHash||Consensus events.|
//! |[`GossipConsensus`](GossipConsensusEntry)|blockHeight, localEventNumber, basisBlockHeight, type, eventHash||Consensus events.|
//! |[`GossipNonConsensus`](GossipEntry)|localEventNumber, blockHeight|type, creator, localReplayNumber, generation, basisBlockHeight, parentHash, eventHash|All events.|
//! |[`ForkScan`](ForkScanEntry)|type, treeHash, creator, eventHash||Merge events.|
//! |[`ReplayNumberMax`](ReplayNumberEntry)|creator, type, localReplayNumber, eventHash|consensus|Merge events.|
//! |[`RequiredBlockHeight`](RequiredBlockHeightEntry)|creator, requiredBlockHeight, eventHash|consensus|Merge events.|
//! |[`CommitmentValidity`](CommitmentEntry)|parentHashCommitment, type, blockHeight, replayStatus, eventHash|creator, generation|Consensus merge events with a commitment.|
//! |[`OperationReplay`](OperationEntry)|operationCreator, operationHash, eventHash||Regular events, once per operation.|
//!
//! Blocks are stored in a mapping keyed by height (see [`variables`](super::variables)), which
//! doubles as the `BlockByHeight` index.

use std::fmt::{self, Display};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::{
    data_types::*,
    event::{Event, EventRecord, EventType},
};

use super::{
    pluggables::{KVGetError, KVSetError, Key, KeyRange},
    variables::{concat, KeyBuilder, KeyReader, INDEXES},
};

/// Every access path a query can take: the secondary indexes, plus the primary mappings of the
/// store. Used to attribute work in query plans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexName {
    /// The event body, metadata, and annotation records, keyed by event hash.
    Events,
    Replayers,
    GenesisMergeEvent,
    BlockByHeight,
    MergeEventHead,
    NonConsensus,
    PeerHeadValidation,
    AncestryEdges,
    ConsensusMergeByHeight,
    EffectiveConfiguration,
    ConsensusHistory,
    GossipConsensus,
    GossipNonConsensus,
    ForkScan,
    ReplayNumberMax,
    RequiredBlockHeight,
    CommitmentValidity,
    OperationReplay,
}

impl IndexName {
    /// The byte that follows [`INDEXES`] in every key of this index.
    pub const fn id(&self) -> u8 {
        *self as u8
    }

    pub const fn name(&self) -> &'static str {
        match self {
            IndexName::Events => "Events",
            IndexName::Replayers => "Replayers",
            IndexName::GenesisMergeEvent => "GenesisMergeEvent",
            IndexName::BlockByHeight => "BlockByHeight",
            IndexName::MergeEventHead => "MergeEventHead",
            IndexName::NonConsensus => "NonConsensus",
            IndexName::PeerHeadValidation => "PeerHeadValidation",
            IndexName::AncestryEdges => "AncestryEdges",
            IndexName::ConsensusMergeByHeight => "ConsensusMergeByHeight",
            IndexName::EffectiveConfiguration => "EffectiveConfiguration",
            IndexName::ConsensusHistory => "ConsensusHistory",
            IndexName::GossipConsensus => "GossipConsensus",
            IndexName::GossipNonConsensus => "GossipNonConsensus",
            IndexName::ForkScan => "ForkScan",
            IndexName::ReplayNumberMax => "ReplayNumberMax",
            IndexName::RequiredBlockHeight => "RequiredBlockHeight",
            IndexName::CommitmentValidity => "CommitmentValidity",
            IndexName::OperationReplay => "OperationReplay",
        }
    }

    /// The prefix shared by every key of this index.
    pub fn prefix(&self) -> Vec<u8> {
        concat(&INDEXES, &[self.id()])
    }
}

impl Display for IndexName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed entry of one secondary index.
pub trait IndexEntry: Sized + 'static {
    const INDEX: IndexName;

    fn key(&self) -> Vec<u8>;
    fn value(&self) -> Result<Vec<u8>, KVSetError>;
    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError>;

    /// The event this entry was derived from.
    fn event_hash(&self) -> CryptoHash;

    /// The range of every entry of this index.
    fn all() -> KeyRange {
        KeyRange::prefix(&Self::INDEX.prefix())
    }
}

fn builder(index: IndexName) -> KeyBuilder {
    KeyBuilder::new(&index.prefix())
}

fn reader(index: IndexName, key: &[u8]) -> Result<KeyReader<'_>, KVGetError> {
    KeyReader::new(key, index.prefix().len()).ok_or(malformed(index))
}

fn malformed(index: IndexName) -> KVGetError {
    KVGetError::MalformedIndexEntry { index }
}

fn serialize<T: BorshSerialize>(
    index: IndexName,
    event: CryptoHash,
    value: &T,
) -> Result<Vec<u8>, KVSetError> {
    value
        .try_to_vec()
        .map_err(|err| KVSetError::SerializeValueError {
            key: Key::IndexEntry {
                index,
                event: Some(event),
            },
            source: err,
        })
}

fn deserialize<T: BorshDeserialize>(
    index: IndexName,
    event: CryptoHash,
    mut value: &[u8],
) -> Result<T, KVGetError> {
    T::deserialize(&mut value).map_err(|err| KVGetError::DeserializeValueError {
        key: Key::IndexEntry {
            index,
            event: Some(event),
        },
        source: err,
    })
}

fn event_type(tag: u8, index: IndexName) -> Result<EventType, KVGetError> {
    EventType::from_tag(tag).ok_or(malformed(index))
}

/* ↓↓↓ MergeEventHead ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeEventHeadEntry {
    pub creator: PeerId,
    pub generation: Generation,
    pub consensus: bool,
    pub event_hash: CryptoHash,
    pub block_height: Option<BlockHeight>,
    pub parent_hash_commitment: Option<CryptoHash>,
}

impl MergeEventHeadEntry {
    fn merge_prefix() -> KeyBuilder {
        builder(Self::INDEX).u8(EventType::Merge.tag())
    }

    pub fn creator_prefix(creator: &PeerId) -> KeyRange {
        KeyRange::prefix(&Self::merge_prefix().peer(creator).build())
    }

    pub fn creator_generation_prefix(creator: &PeerId, generation: Generation) -> KeyRange {
        KeyRange::prefix(
            &Self::merge_prefix()
                .peer(creator)
                .u64(generation.int())
                .build(),
        )
    }
}

impl IndexEntry for MergeEventHeadEntry {
    const INDEX: IndexName = IndexName::MergeEventHead;

    fn key(&self) -> Vec<u8> {
        Self::merge_prefix()
            .peer(&self.creator)
            .u64(self.generation.int())
            .bool(self.consensus)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(self.block_height, self.parent_hash_commitment),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            if r.u8()? != EventType::Merge.tag() {
                return None;
            }
            Some((r.peer()?, Generation::new(r.u64()?), r.bool()?, r.hash()?))
        })();
        let (creator, generation, consensus, event_hash) = fields.ok_or(malformed(Self::INDEX))?;
        let (block_height, parent_hash_commitment) =
            deserialize(Self::INDEX, event_hash, value)?;

        Ok(MergeEventHeadEntry {
            creator,
            generation,
            consensus,
            event_hash,
            block_height,
            parent_hash_commitment,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ NonConsensus ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NonConsensusEntry {
    pub replay: ReplayStatus,
    pub event_type: EventType,
    pub generation: Option<Generation>,
    pub creator: Option<PeerId>,
    pub event_hash: CryptoHash,
    pub parent_hash_commitment: Option<CryptoHash>,
}

impl NonConsensusEntry {
    /// The ranges that together hold every non-consensus event that a peer whose basis block height is
    /// `basis_block_height` may still merge, optionally restricted to one event type.
    ///
    /// Entries of condemned creators sort by detection height, so the events excluded for a given basis
    /// form one contiguous run that these ranges skip. The ranges for events detected after the basis
    /// cannot be restricted by type, since type follows replay status in the key; callers filter those
    /// entries by type themselves.
    pub fn eligible(
        basis_block_height: Option<BlockHeight>,
        event_type: Option<EventType>,
    ) -> Vec<KeyRange> {
        let clean = builder(Self::INDEX).replay_status(ReplayStatus::Clean);
        let clean = match event_type {
            Some(event_type) => clean.u8(event_type.tag()),
            None => clean,
        };
        let clean = KeyRange::prefix(&clean.build());

        match basis_block_height {
            None => match event_type {
                // Nothing is excluded without a basis.
                None => vec![Self::all()],
                Some(_) => {
                    let detected = builder(Self::INDEX)
                        .replay_status(ReplayStatus::DetectedAt(BlockHeight::new(0)))
                        .build();
                    vec![clean, KeyRange::prefix_from(&Self::INDEX.prefix(), detected)]
                }
            },
            Some(basis) => match basis.next() {
                // Every detection height is at or below the last one.
                None => vec![clean],
                Some(first_eligible) => {
                    let first_eligible = builder(Self::INDEX)
                        .replay_status(ReplayStatus::DetectedAt(first_eligible))
                        .build();
                    vec![
                        clean,
                        KeyRange::prefix_from(&Self::INDEX.prefix(), first_eligible),
                    ]
                }
            },
        }
    }
}

impl IndexEntry for NonConsensusEntry {
    const INDEX: IndexName = IndexName::NonConsensus;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .replay_status(self.replay)
            .u8(self.event_type.tag())
            .opt_u64(self.generation.map(|generation| generation.int()))
            .opt_peer(self.creator.as_ref())
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(Self::INDEX, self.event_hash, &self.parent_hash_commitment)
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            Some((
                r.replay_status()?,
                r.u8()?,
                r.opt_u64()?.map(Generation::new),
                r.opt_peer()?,
                r.hash()?,
            ))
        })();
        let (replay, tag, generation, creator, event_hash) =
            fields.ok_or(malformed(Self::INDEX))?;

        Ok(NonConsensusEntry {
            replay,
            event_type: event_type(tag, Self::INDEX)?,
            generation,
            creator,
            event_hash,
            parent_hash_commitment: deserialize(Self::INDEX, event_hash, value)?,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ PeerHeadValidation ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerHeadEntry {
    pub event_hash: CryptoHash,
    pub event_type: EventType,
    pub creator: Option<PeerId>,
    pub generation: Option<Generation>,
    pub local_replay_number: Option<ReplayNumber>,
}

impl PeerHeadEntry {
    pub fn key_of(event_hash: &CryptoHash) -> Vec<u8> {
        builder(Self::INDEX).hash(event_hash).build()
    }
}

impl IndexEntry for PeerHeadEntry {
    const INDEX: IndexName = IndexName::PeerHeadValidation;

    fn key(&self) -> Vec<u8> {
        Self::key_of(&self.event_hash)
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(
                self.event_type,
                self.creator,
                self.generation,
                self.local_replay_number,
            ),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let event_hash = reader(Self::INDEX, key)?
            .hash()
            .ok_or(malformed(Self::INDEX))?;
        let (event_type, creator, generation, local_replay_number) =
            deserialize(Self::INDEX, event_hash, value)?;

        Ok(PeerHeadEntry {
            event_hash,
            event_type,
            creator,
            generation,
            local_replay_number,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ AncestryEdges ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestryEntry {
    pub event_hash: CryptoHash,
    pub event_type: EventType,
    pub creator: Option<PeerId>,
    pub generation: Option<Generation>,
    pub parent_hash: Vec<CryptoHash>,
}

impl AncestryEntry {
    pub fn key_of(event_hash: &CryptoHash) -> Vec<u8> {
        builder(Self::INDEX).hash(event_hash).build()
    }
}

impl IndexEntry for AncestryEntry {
    const INDEX: IndexName = IndexName::AncestryEdges;

    fn key(&self) -> Vec<u8> {
        Self::key_of(&self.event_hash)
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(
                self.event_type,
                self.creator,
                self.generation,
                self.parent_hash.clone(),
            ),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let event_hash = reader(Self::INDEX, key)?
            .hash()
            .ok_or(malformed(Self::INDEX))?;
        let (event_type, creator, generation, parent_hash) =
            deserialize(Self::INDEX, event_hash, value)?;

        Ok(AncestryEntry {
            event_hash,
            event_type,
            creator,
            generation,
            parent_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ ConsensusMergeByHeight ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusMergeEntry {
    pub block_height: BlockHeight,
    pub creator: PeerId,
    pub event_hash: CryptoHash,
}

impl ConsensusMergeEntry {
    pub fn height_prefix(block_height: BlockHeight) -> KeyRange {
        KeyRange::prefix(
            &builder(Self::INDEX)
                .u64(block_height.int())
                .u8(EventType::Merge.tag())
                .build(),
        )
    }
}

impl IndexEntry for ConsensusMergeEntry {
    const INDEX: IndexName = IndexName::ConsensusMergeByHeight;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .u64(self.block_height.int())
            .u8(EventType::Merge.tag())
            .peer(&self.creator)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        Ok(Vec::new())
    }

    fn decode(key: &[u8], _value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            let block_height = BlockHeight::new(r.u64()?);
            if r.u8()? != EventType::Merge.tag() {
                return None;
            }
            Some((block_height, r.peer()?, r.hash()?))
        })();
        let (block_height, creator, event_hash) = fields.ok_or(malformed(Self::INDEX))?;

        Ok(ConsensusMergeEntry {
            block_height,
            creator,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ EffectiveConfiguration ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EffectiveConfigurationEntry {
    pub block_height: BlockHeight,
    pub block_order: BlockOrder,
    pub sequence: ConfigSequence,
    pub event_hash: CryptoHash,
    pub effective: bool,
}

impl EffectiveConfigurationEntry {
    pub fn height_prefix(block_height: BlockHeight) -> KeyRange {
        KeyRange::prefix(&builder(Self::INDEX).u64(block_height.int()).build())
    }
}

impl IndexEntry for EffectiveConfigurationEntry {
    const INDEX: IndexName = IndexName::EffectiveConfiguration;

    // (blockHeight, blockOrder) is unique among consensus events, so the event hash lives in the value.
    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .u64(self.block_height.int())
            .u64(self.block_order.int())
            .u8(EventType::Configuration.tag())
            .u64(self.sequence.int())
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(self.event_hash, self.effective),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            let block_height = BlockHeight::new(r.u64()?);
            let block_order = BlockOrder::new(r.u64()?);
            if r.u8()? != EventType::Configuration.tag() {
                return None;
            }
            Some((block_height, block_order, ConfigSequence::new(r.u64()?)))
        })();
        let (block_height, block_order, sequence) = fields.ok_or(malformed(Self::INDEX))?;
        let (event_hash, effective) = <(CryptoHash, bool)>::deserialize(&mut &*value)
            .map_err(|err| KVGetError::DeserializeValueError {
                key: Key::IndexEntry {
                    index: Self::INDEX,
                    event: None,
                },
                source: err,
            })?;

        Ok(EffectiveConfigurationEntry {
            block_height,
            block_order,
            sequence,
            event_hash,
            effective,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ ConsensusHistory ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusHistoryEntry {
    pub block_height: BlockHeight,
    pub block_order: BlockOrder,
    pub event_hash: CryptoHash,
}

impl ConsensusHistoryEntry {
    pub fn height_prefix(block_height: BlockHeight) -> KeyRange {
        KeyRange::prefix(&builder(Self::INDEX).u64(block_height.int()).build())
    }
}

impl IndexEntry for ConsensusHistoryEntry {
    const INDEX: IndexName = IndexName::ConsensusHistory;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .u64(self.block_height.int())
            .u64(self.block_order.int())
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        Ok(Vec::new())
    }

    fn decode(key: &[u8], _value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            Some((
                BlockHeight::new(r.u64()?),
                BlockOrder::new(r.u64()?),
                r.hash()?,
            ))
        })();
        let (block_height, block_order, event_hash) = fields.ok_or(malformed(Self::INDEX))?;

        Ok(ConsensusHistoryEntry {
            block_height,
            block_order,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ GossipConsensus ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipConsensusEntry {
    pub block_height: BlockHeight,
    pub local_event_number: LocalEventNumber,
    pub basis_block_height: BlockHeight,
    pub event_type: EventType,
    pub event_hash: CryptoHash,
}

impl GossipConsensusEntry {
    pub fn height_prefix(block_height: BlockHeight) -> KeyRange {
        KeyRange::prefix(&builder(Self::INDEX).u64(block_height.int()).build())
    }
}

impl IndexEntry for GossipConsensusEntry {
    const INDEX: IndexName = IndexName::GossipConsensus;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .u64(self.block_height.int())
            .u64(self.local_event_number.int())
            .u64(self.basis_block_height.int())
            .u8(self.event_type.tag())
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        Ok(Vec::new())
    }

    fn decode(key: &[u8], _value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            Some((
                BlockHeight::new(r.u64()?),
                LocalEventNumber::new(r.u64()?),
                BlockHeight::new(r.u64()?),
                r.u8()?,
                r.hash()?,
            ))
        })();
        let (block_height, local_event_number, basis_block_height, tag, event_hash) =
            fields.ok_or(malformed(Self::INDEX))?;

        Ok(GossipConsensusEntry {
            block_height,
            local_event_number,
            basis_block_height,
            event_type: event_type(tag, Self::INDEX)?,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ GossipNonConsensus ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipEntry {
    pub local_event_number: LocalEventNumber,
    pub block_height: Option<BlockHeight>,
    pub event_type: EventType,
    pub creator: Option<PeerId>,
    pub local_replay_number: Option<ReplayNumber>,
    pub generation: Option<Generation>,
    pub basis_block_height: BlockHeight,
    pub parent_hash: Vec<CryptoHash>,
    pub event_hash: CryptoHash,
}

impl GossipEntry {
    /// Every entry whose local event number is at least `min_local_event_number`.
    pub fn from_local_event_number(min_local_event_number: LocalEventNumber) -> KeyRange {
        KeyRange::prefix_from(
            &Self::INDEX.prefix(),
            builder(Self::INDEX)
                .u64(min_local_event_number.int())
                .build(),
        )
    }
}

impl IndexEntry for GossipEntry {
    const INDEX: IndexName = IndexName::GossipNonConsensus;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .u64(self.local_event_number.int())
            .opt_height(self.block_height)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(
                self.event_type,
                self.creator,
                self.local_replay_number,
                self.generation,
                self.basis_block_height,
                self.parent_hash.clone(),
                self.event_hash,
            ),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| Some((LocalEventNumber::new(r.u64()?), r.opt_height()?)))();
        let (local_event_number, block_height) = fields.ok_or(malformed(Self::INDEX))?;
        let (
            event_type,
            creator,
            local_replay_number,
            generation,
            basis_block_height,
            parent_hash,
            event_hash,
        ) = <(
            EventType,
            Option<PeerId>,
            Option<ReplayNumber>,
            Option<Generation>,
            BlockHeight,
            Vec<CryptoHash>,
            CryptoHash,
        )>::deserialize(&mut &*value)
        .map_err(|err| KVGetError::DeserializeValueError {
            key: Key::IndexEntry {
                index: Self::INDEX,
                event: None,
            },
            source: err,
        })?;

        Ok(GossipEntry {
            local_event_number,
            block_height,
            event_type,
            creator,
            local_replay_number,
            generation,
            basis_block_height,
            parent_hash,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ ForkScan ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForkScanEntry {
    pub tree_hash: CryptoHash,
    pub creator: PeerId,
    pub event_hash: CryptoHash,
}

impl ForkScanEntry {
    fn tree_builder(tree_hash: &CryptoHash) -> KeyBuilder {
        builder(Self::INDEX)
            .u8(EventType::Merge.tag())
            .hash(tree_hash)
    }

    pub fn tree_prefix(tree_hash: &CryptoHash) -> KeyRange {
        KeyRange::prefix(&Self::tree_builder(tree_hash).build())
    }

    pub fn tree_creator_prefix(tree_hash: &CryptoHash, creator: &PeerId) -> KeyRange {
        KeyRange::prefix(&Self::tree_builder(tree_hash).peer(creator).build())
    }
}

impl IndexEntry for ForkScanEntry {
    const INDEX: IndexName = IndexName::ForkScan;

    fn key(&self) -> Vec<u8> {
        Self::tree_builder(&self.tree_hash)
            .peer(&self.creator)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        Ok(Vec::new())
    }

    fn decode(key: &[u8], _value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            if r.u8()? != EventType::Merge.tag() {
                return None;
            }
            Some((r.hash()?, r.peer()?, r.hash()?))
        })();
        let (tree_hash, creator, event_hash) = fields.ok_or(malformed(Self::INDEX))?;

        Ok(ForkScanEntry {
            tree_hash,
            creator,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ ReplayNumberMax ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplayNumberEntry {
    pub creator: PeerId,
    pub local_replay_number: ReplayNumber,
    pub event_hash: CryptoHash,
    pub consensus: bool,
}

impl ReplayNumberEntry {
    pub fn creator_prefix(creator: &PeerId) -> KeyRange {
        KeyRange::prefix(
            &builder(Self::INDEX)
                .peer(creator)
                .u8(EventType::Merge.tag())
                .build(),
        )
    }
}

impl IndexEntry for ReplayNumberEntry {
    const INDEX: IndexName = IndexName::ReplayNumberMax;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .peer(&self.creator)
            .u8(EventType::Merge.tag())
            .u64(self.local_replay_number.int())
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(Self::INDEX, self.event_hash, &self.consensus)
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            let creator = r.peer()?;
            if r.u8()? != EventType::Merge.tag() {
                return None;
            }
            Some((creator, ReplayNumber::new(r.u64()?), r.hash()?))
        })();
        let (creator, local_replay_number, event_hash) = fields.ok_or(malformed(Self::INDEX))?;

        Ok(ReplayNumberEntry {
            creator,
            local_replay_number,
            event_hash,
            consensus: deserialize(Self::INDEX, event_hash, value)?,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ RequiredBlockHeight ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequiredBlockHeightEntry {
    pub creator: PeerId,
    pub required_block_height: Option<BlockHeight>,
    pub event_hash: CryptoHash,
    pub consensus: bool,
}

impl RequiredBlockHeightEntry {
    pub fn creator_prefix(creator: &PeerId) -> KeyRange {
        KeyRange::prefix(&builder(Self::INDEX).peer(creator).build())
    }

    /// Entries of `creator`'s merge events that have no required block height yet.
    pub fn unset_prefix(creator: &PeerId) -> KeyRange {
        KeyRange::prefix(&builder(Self::INDEX).peer(creator).opt_height(None).build())
    }
}

impl IndexEntry for RequiredBlockHeightEntry {
    const INDEX: IndexName = IndexName::RequiredBlockHeight;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .peer(&self.creator)
            .opt_height(self.required_block_height)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(Self::INDEX, self.event_hash, &self.consensus)
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| Some((r.peer()?, r.opt_height()?, r.hash()?)))();
        let (creator, required_block_height, event_hash) = fields.ok_or(malformed(Self::INDEX))?;

        Ok(RequiredBlockHeightEntry {
            creator,
            required_block_height,
            event_hash,
            consensus: deserialize(Self::INDEX, event_hash, value)?,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ CommitmentValidity ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentEntry {
    pub committed_hash: CryptoHash,
    pub block_height: BlockHeight,
    pub replay: ReplayStatus,
    pub event_hash: CryptoHash,
    pub creator: PeerId,
    pub generation: Generation,
}

impl CommitmentEntry {
    pub fn committed_prefix(committed_hash: &CryptoHash) -> KeyRange {
        KeyRange::prefix(
            &builder(Self::INDEX)
                .hash(committed_hash)
                .u8(EventType::Merge.tag())
                .build(),
        )
    }
}

impl IndexEntry for CommitmentEntry {
    const INDEX: IndexName = IndexName::CommitmentValidity;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .hash(&self.committed_hash)
            .u8(EventType::Merge.tag())
            .u64(self.block_height.int())
            .replay_status(self.replay)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        serialize(
            Self::INDEX,
            self.event_hash,
            &(self.creator, self.generation),
        )
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| {
            let committed_hash = r.hash()?;
            if r.u8()? != EventType::Merge.tag() {
                return None;
            }
            Some((
                committed_hash,
                BlockHeight::new(r.u64()?),
                r.replay_status()?,
                r.hash()?,
            ))
        })();
        let (committed_hash, block_height, replay, event_hash) =
            fields.ok_or(malformed(Self::INDEX))?;
        let (creator, generation) = deserialize(Self::INDEX, event_hash, value)?;

        Ok(CommitmentEntry {
            committed_hash,
            block_height,
            replay,
            event_hash,
            creator,
            generation,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ OperationReplay ↓↓↓ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationEntry {
    pub operation_creator: PeerId,
    pub operation_hash: CryptoHash,
    pub event_hash: CryptoHash,
}

impl OperationEntry {
    pub fn operation_prefix(operation_creator: &PeerId, operation_hash: &CryptoHash) -> KeyRange {
        KeyRange::prefix(
            &builder(Self::INDEX)
                .peer(operation_creator)
                .hash(operation_hash)
                .build(),
        )
    }
}

impl IndexEntry for OperationEntry {
    const INDEX: IndexName = IndexName::OperationReplay;

    fn key(&self) -> Vec<u8> {
        builder(Self::INDEX)
            .peer(&self.operation_creator)
            .hash(&self.operation_hash)
            .hash(&self.event_hash)
            .build()
    }

    fn value(&self) -> Result<Vec<u8>, KVSetError> {
        Ok(Vec::new())
    }

    fn decode(key: &[u8], _value: &[u8]) -> Result<Self, KVGetError> {
        let mut r = reader(Self::INDEX, key)?;
        let fields = (|| Some((r.peer()?, r.hash()?, r.hash()?)))();
        let (operation_creator, operation_hash, event_hash) =
            fields.ok_or(malformed(Self::INDEX))?;

        Ok(OperationEntry {
            operation_creator,
            operation_hash,
            event_hash,
        })
    }

    fn event_hash(&self) -> CryptoHash {
        self.event_hash
    }
}

/* ↓↓↓ Deriving entries from records ↓↓↓ */

/// A key-value pair to be written into an index.
pub type IndexKV = (Vec<u8>, Vec<u8>);

fn kv<E: IndexEntry>(entry: E) -> Result<IndexKV, KVSetError> {
    Ok((entry.key(), entry.value()?))
}

/// Compute every index entry that `record` should have, given its current annotation.
pub fn index_entries(record: &EventRecord) -> Result<Vec<IndexKV>, KVSetError> {
    let hash = record.hash;
    let annotation = &record.annotation;
    let event_type = record.event_type();
    let merge = record.event.as_merge();
    let creator = merge.map(|merge| merge.creator);
    let generation = merge.map(|merge| merge.generation);

    let mut entries = vec![
        kv(PeerHeadEntry {
            event_hash: hash,
            event_type,
            creator,
            generation,
            local_replay_number: merge.map(|merge| merge.local_replay_number),
        })?,
        kv(AncestryEntry {
            event_hash: hash,
            event_type,
            creator,
            generation,
            parent_hash: record.event.parent_hash().to_vec(),
        })?,
        kv(GossipEntry {
            local_event_number: record.meta.local_event_number,
            block_height: annotation.block_height(),
            event_type,
            creator,
            local_replay_number: merge.map(|merge| merge.local_replay_number),
            generation,
            basis_block_height: record.event.basis_block_height(),
            parent_hash: record.event.parent_hash().to_vec(),
            event_hash: hash,
        })?,
    ];

    match annotation.consensus {
        None => entries.push(kv(NonConsensusEntry {
            replay: annotation.replay,
            event_type,
            generation,
            creator,
            event_hash: hash,
            parent_hash_commitment: merge.and_then(|merge| merge.parent_hash_commitment),
        })?),
        Some(consensus) => {
            let position = consensus.position;
            entries.push(kv(ConsensusHistoryEntry {
                block_height: position.block_height,
                block_order: position.block_order,
                event_hash: hash,
            })?);
            entries.push(kv(GossipConsensusEntry {
                block_height: position.block_height,
                local_event_number: record.meta.local_event_number,
                basis_block_height: record.event.basis_block_height(),
                event_type,
                event_hash: hash,
            })?);
        }
    }

    match &record.event {
        Event::Merge(merge) => {
            entries.push(kv(MergeEventHeadEntry {
                creator: merge.creator,
                generation: merge.generation,
                consensus: annotation.is_consensus(),
                event_hash: hash,
                block_height: annotation.block_height(),
                parent_hash_commitment: merge.parent_hash_commitment,
            })?);
            entries.push(kv(ForkScanEntry {
                tree_hash: merge.tree_hash,
                creator: merge.creator,
                event_hash: hash,
            })?);
            entries.push(kv(ReplayNumberEntry {
                creator: merge.creator,
                local_replay_number: merge.local_replay_number,
                event_hash: hash,
                consensus: annotation.is_consensus(),
            })?);
            entries.push(kv(RequiredBlockHeightEntry {
                creator: merge.creator,
                required_block_height: annotation.required_block_height,
                event_hash: hash,
                consensus: annotation.is_consensus(),
            })?);
            if let Some(block_height) = annotation.block_height() {
                entries.push(kv(ConsensusMergeEntry {
                    block_height,
                    creator: merge.creator,
                    event_hash: hash,
                })?);
                if let Some(committed_hash) = merge.parent_hash_commitment {
                    entries.push(kv(CommitmentEntry {
                        committed_hash,
                        block_height,
                        replay: annotation.replay,
                        event_hash: hash,
                        creator: merge.creator,
                        generation: merge.generation,
                    })?);
                }
            }
        }
        Event::Regular(regular) => {
            for operation in &regular.operations {
                entries.push(kv(OperationEntry {
                    operation_creator: operation.creator,
                    operation_hash: operation.operation_hash,
                    event_hash: hash,
                })?);
            }
        }
        Event::Configuration(configuration) => {
            if let Some(consensus) = annotation.consensus {
                entries.push(kv(EffectiveConfigurationEntry {
                    block_height: consensus.position.block_height,
                    block_order: consensus.position.block_order,
                    sequence: configuration.sequence,
                    event_hash: hash,
                    effective: annotation.effective_configuration,
                })?);
            }
        }
    }

    Ok(entries)
}
