/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Read-and-write handle used by the consensus and gossip collaborators to mutate the ledger.
//!
//! # Writes
//!
//! Every method that mutates the ledger builds a [`LedgerWriteBatch`] whose writes are guarded by
//! preconditions on the keys it read, and hands it to the key-value store to be checked and applied
//! atomically. If another handle changed one of those keys in the meantime, the batch is rejected and
//! the method re-reads and tries again, up to
//! [`max_write_retries`](crate::config::Configuration::max_write_retries) times.
//!
//! Writes to annotations are "match-then-set": each annotation update is computed from the current
//! annotation, applies only if the annotation still matches what the update was computed from (by its
//! `version`), and leaves fields that are already set untouched. Concurrent writers therefore
//! converge instead of overwriting each other.
//!
//! # Batch marks
//!
//! [`mark_new_replayers`](EventLedger::mark_new_replayers) and
//! [`set_required_block_height`](EventLedger::set_required_block_height) update many events, one
//! atomic write per event. They are not atomic as a whole: a crash midway leaves some events updated
//! and others not. Both report a [`MarkReport`] so that callers can tell whether every matched event
//! was modified, and both are idempotent, so an incomplete batch is completed by calling them again.

use std::{sync::mpsc::Sender, time::SystemTime};

use borsh::BorshSerialize;

use crate::{
    config::Configuration,
    events::{
        InsertBlockEvent, InsertEventEvent, LedgerEvent, MarkReplayerEvent,
        SetConsensusEvent, SetEffectiveConfigurationEvent, SetRequiredBlockHeightEvent,
    },
    logging::secs_since_unix_epoch,
    queries::{Explained, Query, QueryContext},
    types::{
        block::Block,
        data_types::*,
        event::{Annotation, ConsensusAnnotation, Event, EventMeta, EventRecord},
    },
};

use super::super::{
    indexes::{
        index_entries, EffectiveConfigurationEntry, IndexEntry, IndexKV, IndexName,
        MergeEventHeadEntry, RequiredBlockHeightEntry,
    },
    invariants,
    pluggables::{Direction, KVGet, KVGetError, KVSetError, KVStore, Key, KeyRange, WriteBatch},
    variables::{self, concat},
};

use super::public::{LedgerCamera, LedgerSnapshot};

/// Read and write handle into the ledger.
///
/// Handles are cheap to clone. Concurrent callers should each hold their own clone: all of them see
/// and write the same key-value store.
#[derive(Clone)]
pub struct EventLedger<K: KVStore> {
    kv_store: K,
    config: Configuration,
    event_publisher: Option<Sender<LedgerEvent>>,
}

/// Lifecycle methods.
impl<K: KVStore> EventLedger<K> {
    /// Create a new `EventLedger` on top of `kv_store`.
    ///
    /// If `event_publisher` is provided, every completed write is published on it as a
    /// [`LedgerEvent`].
    pub fn new(
        kv_store: K,
        config: Configuration,
        event_publisher: Option<Sender<LedgerEvent>>,
    ) -> Self {
        EventLedger {
            kv_store,
            config,
            event_publisher,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Create a [`LedgerCamera`], a read-only handle that can be passed to code that should not write.
    pub fn camera(&self) -> LedgerCamera<K> {
        LedgerCamera::new(self.kv_store.clone(), self.config.traversal_budget.clone())
    }

    /// Create a `LedgerSnapshot`.
    pub fn snapshot(&self) -> LedgerSnapshot<K::Snapshot<'_>> {
        LedgerSnapshot::new(
            self.kv_store.snapshot(),
            self.config.traversal_budget.clone(),
        )
    }

    /// Run `query` against the current state of the ledger.
    pub fn run<Q: Query>(&self, query: &Q) -> Result<Q::Output, LedgerError> {
        QueryContext::new(&self.kv_store, &self.config.traversal_budget).run(query)
    }

    /// Run `query` against the current state of the ledger and report the work it did.
    pub fn explain<Q: Query>(&self, query: &Q) -> Result<Explained<Q::Output>, LedgerError> {
        QueryContext::new(&self.kv_store, &self.config.traversal_budget).explain(query)
    }

    fn write(&mut self, write_batch: LedgerWriteBatch<K::WriteBatch>) -> bool {
        match self.kv_store.write(write_batch.0) {
            Ok(()) => true,
            Err(conflict) => {
                log::debug!(
                    "Write conflict on key {:?}, retrying.",
                    conflict.key.get(..2)
                );
                false
            }
        }
    }

    fn publish(&self, event: LedgerEvent) {
        LedgerEvent::publish(&self.event_publisher, self.config.log_events, event)
    }

    fn attempts(&self) -> u32 {
        self.config.max_write_retries.saturating_add(1)
    }
}

/// Event Store.
impl<K: KVStore> EventLedger<K> {
    /// Store `event`, allocating it the next local event number and writing every index entry it
    /// belongs in.
    ///
    /// # Errors
    ///
    /// - [`DuplicateKey`](LedgerError::DuplicateKey) if an event with the same hash is already stored.
    /// - [`Inconsistent`](LedgerError::Inconsistent) or
    ///   [`InvalidArgument`](LedgerError::InvalidArgument) if `event` breaks the
    ///   [generation chain](invariants::check_generation_chain).
    pub fn put_event(&mut self, event: &Event) -> Result<EventRecord, LedgerError> {
        let hash = event.hash();

        for _ in 0..self.attempts() {
            if self.kv_store.event(&hash)?.is_some() {
                return Err(LedgerError::DuplicateKey {
                    key: Key::Event { event: hash },
                });
            }
            invariants::check_event(&hash, event, &self.kv_store)?;

            let local_event_number = self.kv_store.next_local_event_number()?;
            let counter_bytes = self.kv_store.get(&variables::NEXT_LOCAL_EVENT_NUMBER);

            // New events of a condemned creator are stored with the creator's replay status.
            let mut replay = ReplayStatus::Clean;
            let mut replayer_bytes = None;
            if let Some(merge) = event.as_merge() {
                replayer_bytes = self
                    .kv_store
                    .get(&concat(&variables::REPLAYERS, &merge.creator.bytes()));
                if let Some(block_height) = self.kv_store.replayer(&merge.creator)? {
                    replay = ReplayStatus::DetectedAt(block_height);
                }
            }

            let now = SystemTime::now();
            let record = EventRecord {
                hash,
                event: event.clone(),
                meta: EventMeta {
                    local_event_number,
                    received_at: secs_since_unix_epoch(now),
                },
                annotation: Annotation {
                    replay,
                    ..Annotation::default()
                },
            };

            let mut wb = LedgerWriteBatch::<K::WriteBatch>::new();
            wb.require_event_absent(&hash);
            wb.0.require(
                &variables::NEXT_LOCAL_EVENT_NUMBER,
                counter_bytes.as_deref(),
            );
            wb.set_event(&hash, event)?;
            wb.set_event_meta(&hash, &record.meta)?;
            wb.set_annotation(&hash, &record.annotation)?;
            wb.set_next_local_event_number(LocalEventNumber::new(local_event_number.int() + 1))?;
            wb.set_index_entries(&index_entries(&record)?);

            if let Some(merge) = event.as_merge() {
                wb.0.require(
                    &concat(&variables::REPLAYERS, &merge.creator.bytes()),
                    replayer_bytes.as_deref(),
                );
                if merge.generation == Generation::new(0)
                    && self.kv_store.genesis_merge_event()?.is_none()
                {
                    wb.0.require(&variables::GENESIS_MERGE_EVENT, None);
                    wb.set_genesis_merge_event(&hash)?;
                }
            }

            if self.write(wb) {
                self.publish(LedgerEvent::InsertEvent(InsertEventEvent {
                    timestamp: now,
                    event: hash,
                    event_type: event.event_type(),
                    local_event_number,
                }));
                return Ok(record);
            }
        }

        Err(LedgerError::WriteContention {
            key: Key::Event { event: hash },
            attempts: self.attempts(),
        })
    }

    /// Get the stored record of the event with hash `event`, if any.
    pub fn get_event(&self, event: &CryptoHash) -> Result<Option<EventRecord>, LedgerError> {
        Ok(self.kv_store.event_record(event)?)
    }

    pub fn has_event(&self, event: &CryptoHash) -> Result<bool, LedgerError> {
        Ok(self.kv_store.event(event)?.is_some())
    }

    /// Record that `event` has been ordered into the block at `block_height`, at `block_order`.
    ///
    /// Returns whether the event was modified. Events that are already consensus events are left as
    /// they are.
    pub fn set_consensus(
        &mut self,
        event: &CryptoHash,
        block_height: BlockHeight,
        block_order: BlockOrder,
    ) -> Result<bool, LedgerError> {
        let now = SystemTime::now();
        let outcome = self.update_annotation(event, |record| {
            if record.annotation.is_consensus() {
                return None;
            }
            Some(Annotation {
                consensus: Some(ConsensusAnnotation {
                    position: ConsensusPosition {
                        block_height,
                        block_order,
                    },
                    consensus_at: secs_since_unix_epoch(now),
                }),
                ..record.annotation
            })
        })?;

        if outcome.modified.is_some() {
            self.publish(LedgerEvent::SetConsensus(SetConsensusEvent {
                timestamp: now,
                event: *event,
                block_height,
                block_order,
            }));
        }
        Ok(outcome.modified.is_some())
    }

    /// Apply a match-then-set update to the annotation of `event`.
    ///
    /// `update` is called with the event's current record and returns the new annotation, or `None` if
    /// the record does not match the update's filter. The new annotation's `version` is set here.
    fn update_annotation(
        &mut self,
        event: &CryptoHash,
        mut update: impl FnMut(&EventRecord) -> Option<Annotation>,
    ) -> Result<AnnotationOutcome, LedgerError> {
        let mut matched = None;

        for _ in 0..self.attempts() {
            let old_bytes = self.kv_store.annotation_bytes(event);
            let record = self
                .kv_store
                .event_record(event)?
                .ok_or(LedgerError::EventNotFound { event: *event })?;

            let new_annotation = match update(&record) {
                None => {
                    return Ok(AnnotationOutcome {
                        matched: matched.unwrap_or(false),
                        modified: None,
                    })
                }
                Some(annotation) => Annotation {
                    version: record.annotation.version + 1,
                    ..annotation
                },
            };
            matched.get_or_insert(true);
            debug_assert!(invariants::annotation_only_advances(
                &record.annotation,
                &new_annotation
            ));

            let new_record = EventRecord {
                annotation: new_annotation,
                ..record.clone()
            };

            let mut wb = LedgerWriteBatch::<K::WriteBatch>::new();
            wb.0.require(
                &concat(&variables::EVENT_ANNOTATIONS, &event.bytes()),
                old_bytes.as_deref(),
            );
            wb.set_annotation(event, &new_annotation)?;
            wb.replace_index_entries(&index_entries(&record)?, &index_entries(&new_record)?);

            if self.write(wb) {
                return Ok(AnnotationOutcome {
                    matched: true,
                    modified: Some(new_record),
                });
            }
        }

        Err(LedgerError::WriteContention {
            key: Key::Annotation { event: *event },
            attempts: self.attempts(),
        })
    }
}

/// Block Store.
impl<K: KVStore> EventLedger<K> {
    /// Append `block` to the ledger.
    ///
    /// Blocks are append-only: storing a second block at the same height fails with
    /// [`DuplicateKey`](LedgerError::DuplicateKey).
    pub fn put_block(&mut self, block: &Block) -> Result<(), LedgerError> {
        for _ in 0..self.attempts() {
            if self.kv_store.block(block.block_height)?.is_some() {
                return Err(LedgerError::DuplicateKey {
                    key: Key::Block {
                        block_height: block.block_height,
                    },
                });
            }
            let latest_bytes = self.kv_store.get(&variables::LATEST_BLOCK_HEIGHT);
            let latest = self.kv_store.latest_block_height()?;

            let mut wb = LedgerWriteBatch::<K::WriteBatch>::new();
            wb.0.require(&variables::block_key(block.block_height), None);
            wb.0.require(&variables::LATEST_BLOCK_HEIGHT, latest_bytes.as_deref());
            wb.set_block(block)?;
            if latest.map_or(true, |latest| block.block_height > latest) {
                wb.set_latest_block_height(block.block_height)?;
            }

            if self.write(wb) {
                self.publish(LedgerEvent::InsertBlock(InsertBlockEvent {
                    timestamp: SystemTime::now(),
                    block: block.clone(),
                }));
                return Ok(());
            }
        }

        Err(LedgerError::WriteContention {
            key: Key::Block {
                block_height: block.block_height,
            },
            attempts: self.attempts(),
        })
    }

    pub fn get_block(&self, block_height: BlockHeight) -> Result<Option<Block>, LedgerError> {
        Ok(self.kv_store.block(block_height)?)
    }

    pub fn get_latest_block_height(&self) -> Result<Option<BlockHeight>, LedgerError> {
        Ok(self.kv_store.latest_block_height()?)
    }
}

/// Replay detection and consensus bookkeeping.
impl<K: KVStore> EventLedger<K> {
    /// Condemn each of `creators` as a replayer confirmed at `block_height`, and stamp every stored
    /// merge event of theirs that is still clean.
    ///
    /// A creator's detection height is recorded the first time it is marked and never changes
    /// afterwards. Marking an already-condemned creator again stamps its remaining clean events with
    /// the recorded height, not `block_height`.
    pub fn mark_new_replayers(
        &mut self,
        creators: &[PeerId],
        block_height: BlockHeight,
    ) -> Result<MarkReport, LedgerError> {
        let mut total = MarkReport::default();

        for creator in creators {
            let detected_at = self.record_replayer(creator, block_height)?;
            let events = self.scan_hashes::<MergeEventHeadEntry>(
                MergeEventHeadEntry::creator_prefix(creator),
                |_| true,
            )?;

            let mut report = MarkReport::default();
            for event in &events {
                let outcome = self.update_annotation(event, |record| match record.annotation.replay
                {
                    ReplayStatus::Clean => Some(Annotation {
                        replay: ReplayStatus::DetectedAt(detected_at),
                        ..record.annotation
                    }),
                    ReplayStatus::DetectedAt(_) => None,
                })?;
                report.add(&outcome);
            }

            self.publish(LedgerEvent::MarkReplayer(MarkReplayerEvent {
                timestamp: SystemTime::now(),
                creator: *creator,
                block_height: detected_at,
                report,
            }));
            total.matched += report.matched;
            total.modified += report.modified;
        }

        Ok(total)
    }

    /// Record `creator` as condemned at `block_height` unless it already is. Returns the recorded
    /// detection height.
    fn record_replayer(
        &mut self,
        creator: &PeerId,
        block_height: BlockHeight,
    ) -> Result<BlockHeight, LedgerError> {
        for _ in 0..self.attempts() {
            if let Some(detected_at) = self.kv_store.replayer(creator)? {
                return Ok(detected_at);
            }
            let mut wb = LedgerWriteBatch::<K::WriteBatch>::new();
            wb.0.require(&concat(&variables::REPLAYERS, &creator.bytes()), None);
            wb.set_replayer(creator, block_height)?;
            if self.write(wb) {
                return Ok(block_height);
            }
        }

        Err(LedgerError::WriteContention {
            key: Key::Replayer { creator: *creator },
            attempts: self.attempts(),
        })
    }

    /// For every creator in `witnesses`, stamp `block_height` as the required block height of each of
    /// its non-consensus merge events that has none yet. Required block heights are never overwritten.
    pub fn set_required_block_height(
        &mut self,
        witnesses: &[PeerId],
        block_height: BlockHeight,
    ) -> Result<MarkReport, LedgerError> {
        let mut total = MarkReport::default();

        for witness in witnesses {
            let events = self.scan_hashes::<RequiredBlockHeightEntry>(
                RequiredBlockHeightEntry::unset_prefix(witness),
                |entry| !entry.consensus,
            )?;

            let mut report = MarkReport::default();
            for event in &events {
                let outcome = self.update_annotation(event, |record| {
                    if record.annotation.is_consensus()
                        || record.annotation.required_block_height.is_some()
                    {
                        return None;
                    }
                    Some(Annotation {
                        required_block_height: Some(block_height),
                        ..record.annotation
                    })
                })?;
                report.add(&outcome);
            }

            self.publish(LedgerEvent::SetRequiredBlockHeight(
                SetRequiredBlockHeightEvent {
                    timestamp: SystemTime::now(),
                    witness: *witness,
                    block_height,
                    report,
                },
            ));
            total.matched += report.matched;
            total.modified += report.modified;
        }

        Ok(total)
    }

    /// Flag as effective the configuration event with the greatest block order among the consensus
    /// configuration events at `block_height` whose sequence is `sequence`.
    ///
    /// Returns whether such an event exists.
    pub fn set_effective_configuration(
        &mut self,
        block_height: BlockHeight,
        sequence: ConfigSequence,
    ) -> Result<bool, LedgerError> {
        // Reverse key order visits the greatest block order first.
        let mut selected = None;
        for (key, value) in self.kv_store.range(
            EffectiveConfigurationEntry::height_prefix(block_height),
            Direction::Reverse,
        ) {
            let entry = EffectiveConfigurationEntry::decode(&key, &value)?;
            if entry.sequence == sequence {
                selected = Some(entry);
                break;
            }
        }

        let entry = match selected {
            None => return Ok(false),
            Some(entry) => entry,
        };
        let outcome = self.update_annotation(&entry.event_hash, |record| {
            if record.annotation.effective_configuration {
                return None;
            }
            Some(Annotation {
                effective_configuration: true,
                ..record.annotation
            })
        })?;

        if outcome.modified.is_some() {
            self.publish(LedgerEvent::SetEffectiveConfiguration(
                SetEffectiveConfigurationEvent {
                    timestamp: SystemTime::now(),
                    event: entry.event_hash,
                    block_height,
                    sequence,
                },
            ));
        }
        Ok(true)
    }

    /// Collect the event hashes of the entries of index `E` in `range` that satisfy `filter`.
    fn scan_hashes<E: IndexEntry>(
        &self,
        range: KeyRange,
        filter: impl Fn(&E) -> bool,
    ) -> Result<Vec<CryptoHash>, LedgerError> {
        let mut hashes = Vec::new();
        for (key, value) in self.kv_store.range(range, Direction::Forward) {
            let entry = E::decode(&key, &value)?;
            if filter(&entry) {
                hashes.push(entry.event_hash());
            }
        }
        Ok(hashes)
    }
}

/// The result of an annotation update on one event.
struct AnnotationOutcome {
    /// Whether the event matched the update's filter when first read.
    matched: bool,
    /// The event's new record, if the update was written.
    modified: Option<EventRecord>,
}

/// Counts reported by operations that update many events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MarkReport {
    /// Number of events that matched the operation's filter.
    pub matched: u64,
    /// Number of events the operation actually modified.
    pub modified: u64,
}

impl MarkReport {
    fn add(&mut self, outcome: &AnnotationOutcome) {
        if outcome.matched {
            self.matched += 1;
        }
        if outcome.modified.is_some() {
            self.modified += 1;
        }
    }
}

/// Error when reading from or writing to the ledger.
#[derive(Debug)]
pub enum LedgerError {
    /// Error when trying to get a value from the ledger's underlying [key value store][KVStore].
    KVGetError(KVGetError),

    /// Error when trying to set a value into the ledger's underlying key value store.
    KVSetError(KVSetError),

    /// A write would have created a second value at a key that can only be written once.
    DuplicateKey { key: Key },

    /// A write targeted an event that is not stored. Reads report missing events with `None` instead.
    EventNotFound { event: CryptoHash },

    /// The arguments of an operation, or an event being stored, are malformed.
    InvalidArgument(InvalidArgument),

    /// The store references an event that it does not hold. Signals either an incomplete sync or a
    /// protocol violation.
    Inconsistent(Inconsistency),

    /// An ancestry traversal exceeded the budget it was given.
    BudgetExceeded { steps_taken: u64 },

    /// A write kept conflicting with concurrent writes until it ran out of retries.
    WriteContention { key: Key, attempts: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidArgument {
    /// Heads can be looked up by generation alone only at generation 0.
    GenerationWithoutCreator { generation: Generation },

    /// The tree event of a merge event is not a merge event.
    TreeEventNotMerge {
        event: CryptoHash,
        tree_hash: CryptoHash,
    },

    /// The tree event of a merge event does not sit one generation below it in the same chain.
    BrokenGenerationChain {
        event: CryptoHash,
        tree_hash: CryptoHash,
    },

    /// A merge event lists the same parent twice.
    DuplicateParent {
        event: CryptoHash,
        parent: CryptoHash,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    MissingParent {
        event: CryptoHash,
        parent: CryptoHash,
    },
    MissingTreeEvent {
        event: CryptoHash,
        tree_hash: CryptoHash,
    },
    MissingCommittedEvent {
        event: CryptoHash,
        committed: CryptoHash,
    },
    /// A block's consensus proof references an event that is not a stored merge event.
    MissingProofEvent {
        block_height: BlockHeight,
        event: CryptoHash,
    },
    /// An index entry points to an event whose records are not stored.
    DanglingIndexEntry { index: IndexName, event: CryptoHash },
}

impl From<KVGetError> for LedgerError {
    fn from(value: KVGetError) -> Self {
        LedgerError::KVGetError(value)
    }
}

impl From<KVSetError> for LedgerError {
    fn from(value: KVSetError) -> Self {
        LedgerError::KVSetError(value)
    }
}

impl From<InvalidArgument> for LedgerError {
    fn from(value: InvalidArgument) -> Self {
        LedgerError::InvalidArgument(value)
    }
}

impl From<Inconsistency> for LedgerError {
    fn from(value: Inconsistency) -> Self {
        LedgerError::Inconsistent(value)
    }
}

pub struct LedgerWriteBatch<W: WriteBatch>(pub(crate) W);

impl<W: WriteBatch> LedgerWriteBatch<W> {
    pub(crate) fn new() -> LedgerWriteBatch<W> {
        LedgerWriteBatch(W::new())
    }

    /* ↓↓↓ Events ↓↓↓  */

    pub fn require_event_absent(&mut self, event: &CryptoHash) {
        self.0
            .require(&concat(&variables::EVENTS, &event.bytes()), None)
    }

    pub fn set_event(&mut self, hash: &CryptoHash, event: &Event) -> Result<(), LedgerError> {
        self.0.set(
            &concat(&variables::EVENTS, &hash.bytes()),
            &event
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Event { event: *hash },
                    source: err,
                })?,
        );

        Ok(())
    }

    pub fn set_event_meta(&mut self, event: &CryptoHash, meta: &EventMeta) -> Result<(), LedgerError> {
        self.0.set(
            &concat(&variables::EVENT_META, &event.bytes()),
            &meta
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::EventMeta { event: *event },
                    source: err,
                })?,
        );

        Ok(())
    }

    pub fn set_annotation(
        &mut self,
        event: &CryptoHash,
        annotation: &Annotation,
    ) -> Result<(), LedgerError> {
        self.0.set(
            &concat(&variables::EVENT_ANNOTATIONS, &event.bytes()),
            &annotation
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Annotation { event: *event },
                    source: err,
                })?,
        );

        Ok(())
    }

    pub fn set_next_local_event_number(
        &mut self,
        local_event_number: LocalEventNumber,
    ) -> Result<(), LedgerError> {
        self.0.set(
            &variables::NEXT_LOCAL_EVENT_NUMBER,
            &local_event_number
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::NextLocalEventNumber,
                    source: err,
                })?,
        );

        Ok(())
    }

    pub fn set_genesis_merge_event(&mut self, event: &CryptoHash) -> Result<(), LedgerError> {
        self.0.set(
            &variables::GENESIS_MERGE_EVENT,
            &event
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::GenesisMergeEvent,
                    source: err,
                })?,
        );

        Ok(())
    }

    /* ↓↓↓ Indexes ↓↓↓ */

    pub fn set_index_entries(&mut self, entries: &[IndexKV]) {
        for (key, value) in entries {
            self.0.set(key, value)
        }
    }

    /// Replace the index entries `old` of an event with `new`, deleting the old entries whose keys do
    /// not appear in `new`.
    pub fn replace_index_entries(&mut self, old: &[IndexKV], new: &[IndexKV]) {
        for (key, _) in old {
            if !new.iter().any(|(new_key, _)| new_key == key) {
                self.0.delete(key)
            }
        }
        self.set_index_entries(new)
    }

    /* ↓↓↓ Replayers ↓↓↓ */

    pub fn set_replayer(
        &mut self,
        creator: &PeerId,
        block_height: BlockHeight,
    ) -> Result<(), LedgerError> {
        self.0.set(
            &concat(&variables::REPLAYERS, &creator.bytes()),
            &block_height
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Replayer { creator: *creator },
                    source: err,
                })?,
        );

        Ok(())
    }

    /* ↓↓↓ Blocks ↓↓↓ */

    pub fn set_block(&mut self, block: &Block) -> Result<(), LedgerError> {
        self.0.set(
            &variables::block_key(block.block_height),
            &block
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::Block {
                        block_height: block.block_height,
                    },
                    source: err,
                })?,
        );

        Ok(())
    }

    pub fn set_latest_block_height(&mut self, block_height: BlockHeight) -> Result<(), LedgerError> {
        self.0.set(
            &variables::LATEST_BLOCK_HEIGHT,
            &block_height
                .try_to_vec()
                .map_err(|err| KVSetError::SerializeValueError {
                    key: Key::LatestBlockHeight,
                    source: err,
                })?,
        );

        Ok(())
    }
}
