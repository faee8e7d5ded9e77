/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable ledger persistence.
//!
//! The ledger store does not implement a storage engine. Instead, library users provide one by
//! implementing [`KVStore`], [`KVGet`], and [`WriteBatch`] for whatever persistence mechanism they
//! want. The abstract functionality required of it is that of an ordered key-value store with:
//! 1. Point lookups ([`KVGet::get`]).
//! 2. Ordered range scans in both directions ([`KVGet::range`]).
//! 3. Atomic, batched writes ([`KVStore::write`]) that may be guarded by preconditions
//!    ([`WriteBatch::require`]). The store must check every precondition of a batch and apply the
//!    batch in one atomic step, or reject it with a [`WriteConflict`]. This is the compare-and-set
//!    primitive the ledger builds its concurrent annotation writes on.
//! 4. Read snapshots ([`KVStore::snapshot`]).

use std::fmt::{self, Display};

use borsh::BorshDeserialize;

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash, LocalEventNumber, PeerId},
    event::{Annotation, Event, EventMeta, EventRecord},
};

use super::{
    indexes::IndexName,
    variables::{self, concat},
};

pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;
    type Snapshot<'a>: 'a + KVGet;

    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), WriteConflict>;
    fn clear(&mut self);
    fn snapshot<'b>(&'b self) -> Self::Snapshot<'_>;
}

pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);

    /// Make the batch conditional on `key` currently holding `expected` (`None`: `key` is absent).
    fn require(&mut self, key: &[u8], expected: Option<&[u8]>);
}

/// Returned by [`KVStore::write`] when one of a batch's preconditions does not hold. None of the
/// batch's writes are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteConflict {
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

/// A half-open range of keys: `start` is inclusive, `end` exclusive. `end == None` means the range
/// extends to the end of the keyspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Vec<u8>,
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    pub fn new(start: Vec<u8>, end: Option<Vec<u8>>) -> KeyRange {
        KeyRange { start, end }
    }

    /// The range of every key that starts with `prefix`.
    pub fn prefix(prefix: &[u8]) -> KeyRange {
        KeyRange {
            start: prefix.to_vec(),
            end: prefix_successor(prefix),
        }
    }

    /// The range of every key that starts with `prefix` and is greater than or equal to `start`.
    pub fn prefix_from(prefix: &[u8], start: Vec<u8>) -> KeyRange {
        KeyRange {
            start,
            end: prefix_successor(prefix),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        key >= self.start.as_slice()
            && match &self.end {
                Some(end) => key < end.as_slice(),
                None => true,
            }
    }
}

/// The smallest key that is greater than every key starting with `prefix`, or `None` if no such key
/// exists (`prefix` is empty or all `0xFF`).
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(last) = successor.pop() {
        if last < u8::MAX {
            successor.push(last + 1);
            return Some(successor);
        }
    }
    None
}

pub type KVIter<'a> = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + 'a>;

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Iterate in key order (or reverse key order) over every key-value pair in `range`.
    fn range<'a>(&'a self, range: KeyRange, direction: Direction) -> KVIter<'a>;

    /* ↓↓↓ Events ↓↓↓ */

    fn event(&self, event: &CryptoHash) -> Result<Option<Event>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::EVENTS, &event.bytes()),
            Key::Event { event: *event },
        )
    }

    fn event_meta(&self, event: &CryptoHash) -> Result<Option<EventMeta>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::EVENT_META, &event.bytes()),
            Key::EventMeta { event: *event },
        )
    }

    fn annotation_bytes(&self, event: &CryptoHash) -> Option<Vec<u8>> {
        self.get(&concat(&variables::EVENT_ANNOTATIONS, &event.bytes()))
    }

    fn annotation(&self, event: &CryptoHash) -> Result<Option<Annotation>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::EVENT_ANNOTATIONS, &event.bytes()),
            Key::Annotation { event: *event },
        )
    }

    /// Get the event body, metadata, and annotation of `event`. Returns `Ok(None)` if the event is not
    /// stored, and an error if the event is stored only partially.
    fn event_record(&self, event: &CryptoHash) -> Result<Option<EventRecord>, KVGetError> {
        let body = match self.event(event)? {
            None => return Ok(None),
            Some(body) => body,
        };
        let meta = self
            .event_meta(event)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::EventMeta { event: *event },
            })?;
        let annotation = self
            .annotation(event)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::Annotation { event: *event },
            })?;

        Ok(Some(EventRecord {
            hash: *event,
            event: body,
            meta,
            annotation,
        }))
    }

    /* ↓↓↓ Local Event Number Counter ↓↓↓ */

    fn next_local_event_number(&self) -> Result<LocalEventNumber, KVGetError> {
        Ok(self
            .get_deserialized(
                &variables::NEXT_LOCAL_EVENT_NUMBER,
                Key::NextLocalEventNumber,
            )?
            .unwrap_or_default())
    }

    /* ↓↓↓ Replayers ↓↓↓ */

    /// Get the block height at which `creator` was first confirmed as a replayer, if it ever was.
    fn replayer(&self, creator: &PeerId) -> Result<Option<BlockHeight>, KVGetError> {
        self.get_deserialized(
            &concat(&variables::REPLAYERS, &creator.bytes()),
            Key::Replayer { creator: *creator },
        )
    }

    /* ↓↓↓ Genesis Merge Event ↓↓↓ */

    fn genesis_merge_event(&self) -> Result<Option<CryptoHash>, KVGetError> {
        self.get_deserialized(&variables::GENESIS_MERGE_EVENT, Key::GenesisMergeEvent)
    }

    /* ↓↓↓ Blocks ↓↓↓ */

    fn block(&self, block_height: BlockHeight) -> Result<Option<Block>, KVGetError> {
        self.get_deserialized(
            &variables::block_key(block_height),
            Key::Block { block_height },
        )
    }

    fn latest_block_height(&self) -> Result<Option<BlockHeight>, KVGetError> {
        self.get_deserialized(&variables::LATEST_BLOCK_HEIGHT, Key::LatestBlockHeight)
    }

    /* ↓↓↓ Helpers ↓↓↓ */

    fn get_deserialized<T: BorshDeserialize>(
        &self,
        key: &[u8],
        key_name: Key,
    ) -> Result<Option<T>, KVGetError> {
        match self.get(key) {
            None => Ok(None),
            Some(bytes) => T::deserialize(&mut bytes.as_slice())
                .map(Some)
                .map_err(|err| KVGetError::DeserializeValueError {
                    key: key_name,
                    source: err,
                }),
        }
    }
}

/// Error when trying to read a value corresponding to a given key from the [key value store][KVStore].
/// The error may arise in the following circumstances:
/// 1. The value corresponding to a given key cannot be deserialized into its expected type,
/// 2. A value that an invariant says must exist cannot be found,
/// 3. An index entry's key does not have the layout its index declares.
#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
    MalformedIndexEntry { index: IndexName },
}

/// Error when trying to serialize a value to be written into the key value store.
#[derive(Debug)]
pub enum KVSetError {
    SerializeValueError { key: Key, source: std::io::Error },
}

#[derive(Debug, Clone)]
pub enum Key {
    Event { event: CryptoHash },
    EventMeta { event: CryptoHash },
    Annotation { event: CryptoHash },
    NextLocalEventNumber,
    Replayer { creator: PeerId },
    GenesisMergeEvent,
    Block { block_height: BlockHeight },
    LatestBlockHeight,
    IndexEntry {
        index: IndexName,
        event: Option<CryptoHash>,
    },
}

impl Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Event { event } => write!(f, "Event body for event {}", event),
            Key::EventMeta { event } => write!(f, "Event metadata for event {}", event),
            Key::Annotation { event } => write!(f, "Annotation for event {}", event),
            Key::NextLocalEventNumber => write!(f, "Next Local Event Number"),
            Key::Replayer { creator } => write!(f, "Replay detection height for creator {}", creator),
            Key::GenesisMergeEvent => write!(f, "Genesis Merge Event"),
            Key::Block { block_height } => write!(f, "Block at height {}", block_height),
            Key::LatestBlockHeight => write!(f, "Latest Block Height"),
            Key::IndexEntry {
                index,
                event: Some(event),
            } => write!(f, "{} index entry for event {}", index.name(), event),
            Key::IndexEntry { index, event: None } => write!(f, "{} index entry", index.name()),
        }
    }
}
