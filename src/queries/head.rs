/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Head and generation lookups, and point lookups of single events.
//!
//! The head of a creator is its merge event with the greatest generation. A creator that replayed
//! may have several merge events at the same generation; lookups then return the one with the
//! lexicographically smallest hash, so that every peer with the same store resolves the same head.

use crate::{
    ledger::{
        accessors::internal::{Inconsistency, InvalidArgument, LedgerError},
        indexes::{IndexEntry, IndexName, MergeEventHeadEntry, PeerHeadEntry},
        pluggables::{Direction, KVGet},
    },
    types::{
        data_types::{CryptoHash, Generation, PeerId},
        event::EventRecord,
    },
};

use super::{Query, QueryContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Head {
    pub event_hash: CryptoHash,
    pub creator: PeerId,
    pub generation: Generation,
}

impl From<&MergeEventHeadEntry> for Head {
    fn from(entry: &MergeEventHeadEntry) -> Self {
        Head {
            event_hash: entry.event_hash,
            creator: entry.creator,
            generation: entry.generation,
        }
    }
}

/// Look up a head merge event.
///
/// |`creator`|`generation`|Returns|
/// |---|---|---|
/// |`Some`|`Some`|The creator's merge event at that generation.|
/// |`Some`|`None`|The creator's merge event with the greatest generation.|
/// |`None`|`Some(0)`|The genesis merge event.|
/// |`None`|`None`|The merge event with the greatest generation of any creator.|
///
/// Looking up any generation other than 0 without a creator fails with
/// [`InvalidArgument`](LedgerError::InvalidArgument).
#[derive(Clone, Copy, Debug, Default)]
pub struct GetHead {
    pub creator: Option<PeerId>,
    pub generation: Option<Generation>,
}

impl Query for GetHead {
    type Output = Option<Head>;
    const NAME: &'static str = "get_head";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        match (self.creator, self.generation) {
            (Some(creator), Some(generation)) => {
                Ok(head_at(ctx, &creator, generation)?.as_ref().map(Head::from))
            }

            (Some(creator), None) => {
                // Reverse key order visits the greatest generation first.
                let mut head: Option<MergeEventHeadEntry> = None;
                for entry in ctx.scan::<MergeEventHeadEntry>(
                    MergeEventHeadEntry::creator_prefix(&creator),
                    Direction::Reverse,
                ) {
                    let entry = entry?;
                    if let Some(current) = &head {
                        if current.generation != entry.generation {
                            break;
                        }
                    }
                    head = Some(smaller_hash(head.take(), entry));
                }
                Ok(head.as_ref().map(Head::from))
            }

            (None, Some(generation)) => {
                if generation != Generation::new(0) {
                    return Err(InvalidArgument::GenerationWithoutCreator { generation }.into());
                }
                genesis_head(ctx)
            }

            (None, None) => {
                log::debug!("get_head without a creator scans every merge event.");
                let mut head: Option<MergeEventHeadEntry> = None;
                for entry in ctx.scan::<MergeEventHeadEntry>(
                    MergeEventHeadEntry::all(),
                    Direction::Forward,
                ) {
                    let entry = entry?;
                    head = match head {
                        Some(head) if head.generation > entry.generation => Some(head),
                        Some(head) if head.generation == entry.generation => {
                            Some(smaller_hash(Some(head), entry))
                        }
                        _ => Some(entry),
                    };
                }
                Ok(head.as_ref().map(Head::from))
            }
        }
    }
}

fn smaller_hash(
    current: Option<MergeEventHeadEntry>,
    entry: MergeEventHeadEntry,
) -> MergeEventHeadEntry {
    match current {
        Some(current) if current.event_hash <= entry.event_hash => current,
        _ => entry,
    }
}

fn head_at<S: KVGet>(
    ctx: &QueryContext<'_, S>,
    creator: &PeerId,
    generation: Generation,
) -> Result<Option<MergeEventHeadEntry>, LedgerError> {
    let mut head = None;
    for entry in ctx.scan::<MergeEventHeadEntry>(
        MergeEventHeadEntry::creator_generation_prefix(creator, generation),
        Direction::Forward,
    ) {
        head = Some(smaller_hash(head, entry?));
    }
    Ok(head)
}

fn genesis_head<S: KVGet>(ctx: &QueryContext<'_, S>) -> Result<Option<Head>, LedgerError> {
    let event_hash = match ctx.genesis_merge_event()? {
        None => return Ok(None),
        Some(event_hash) => event_hash,
    };
    let entry = ctx
        .seek::<PeerHeadEntry>(&PeerHeadEntry::key_of(&event_hash))?
        .ok_or(Inconsistency::DanglingIndexEntry {
            index: IndexName::GenesisMergeEvent,
            event: event_hash,
        })?;

    match (entry.creator, entry.generation) {
        (Some(creator), Some(generation)) => Ok(Some(Head {
            event_hash,
            creator,
            generation,
        })),
        _ => Err(Inconsistency::DanglingIndexEntry {
            index: IndexName::GenesisMergeEvent,
            event: event_hash,
        }
        .into()),
    }
}

/// Get the hash of `creator`'s merge event at exactly `target_generation`.
#[derive(Clone, Copy, Debug)]
pub struct GetStartHash {
    pub creator: PeerId,
    pub target_generation: Generation,
}

impl Query for GetStartHash {
    type Output = Option<CryptoHash>;
    const NAME: &'static str = "get_start_hash";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        Ok(head_at(ctx, &self.creator, self.target_generation)?.map(|entry| entry.event_hash))
    }
}

/// Get the type, creator, generation, and local replay number of an event, used to validate the head
/// a peer advertises.
#[derive(Clone, Copy, Debug)]
pub struct GetPeerHeadInfo {
    pub event_hash: CryptoHash,
}

impl Query for GetPeerHeadInfo {
    type Output = Option<PeerHeadEntry>;
    const NAME: &'static str = "get_peer_head_info";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.seek::<PeerHeadEntry>(&PeerHeadEntry::key_of(&self.event_hash))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct HasEvent {
    pub event_hash: CryptoHash,
}

impl Query for HasEvent {
    type Output = bool;
    const NAME: &'static str = "has_event";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        Ok(ctx
            .seek::<PeerHeadEntry>(&PeerHeadEntry::key_of(&self.event_hash))?
            .is_some())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GetEvent {
    pub event_hash: CryptoHash,
}

impl Query for GetEvent {
    type Output = Option<EventRecord>;
    const NAME: &'static str = "get_event";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.fetch(&self.event_hash)
    }
}
