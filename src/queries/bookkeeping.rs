/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads that serve the consensus collaborator's bookkeeping: outstanding work, merge selection,
//! configuration selection, required block heights, and gossip summaries.
//!
//! # Eligibility
//!
//! A non-consensus event is *eligible* for a peer whose basis block height is `basis` unless it was
//! created by a replayer condemned at or before `basis`. Queries over non-consensus events only ever
//! return eligible ones. With no basis (`None`), every non-consensus event is eligible.

use std::time::Duration;

use crate::{
    ledger::{
        accessors::internal::LedgerError,
        indexes::{
            EffectiveConfigurationEntry, GossipEntry, IndexName, MergeEventHeadEntry,
            NonConsensusEntry, RequiredBlockHeightEntry,
        },
        pluggables::{Direction, KVGet},
    },
    types::{
        data_types::{BlockHeight, CryptoHash, LocalEventNumber, PeerId},
        event::EventType,
    },
};

use super::{Query, QueryContext};

/// Find the first eligible non-consensus event of type `event_type` (or of any type) that satisfies
/// `filter`, reading the non-consensus index only as far as needed.
fn find_eligible<S: KVGet>(
    ctx: &QueryContext<'_, S>,
    basis_block_height: Option<BlockHeight>,
    event_type: Option<EventType>,
    mut filter: impl FnMut(&NonConsensusEntry) -> bool,
) -> Result<Option<NonConsensusEntry>, LedgerError> {
    for range in NonConsensusEntry::eligible(basis_block_height, event_type) {
        for entry in ctx.scan::<NonConsensusEntry>(range, Direction::Forward) {
            let entry = entry?;
            if is_eligible(&entry, basis_block_height, event_type) && filter(&entry) {
                return Ok(Some(entry));
            }
        }
    }
    Ok(None)
}

fn is_eligible(
    entry: &NonConsensusEntry,
    basis_block_height: Option<BlockHeight>,
    event_type: Option<EventType>,
) -> bool {
    event_type.map_or(true, |event_type| entry.event_type == event_type)
        && !entry.replay.excludes(basis_block_height)
}

/// Whether any eligible non-consensus regular or configuration event exists.
#[derive(Clone, Copy, Debug, Default)]
pub struct HasOutstandingRegularEvents {
    pub basis_block_height: Option<BlockHeight>,
}

impl Query for HasOutstandingRegularEvents {
    type Output = bool;
    const NAME: &'static str = "has_outstanding_regular_events";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        for event_type in [EventType::Regular, EventType::Configuration] {
            if find_eligible(ctx, self.basis_block_height, Some(event_type), |_| true)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Whether any eligible non-consensus merge event carries a parent-hash commitment.
#[derive(Clone, Copy, Debug, Default)]
pub struct HasOutstandingParentHashCommitments {
    pub basis_block_height: Option<BlockHeight>,
}

impl Query for HasOutstandingParentHashCommitments {
    type Output = bool;
    const NAME: &'static str = "has_outstanding_parent_hash_commitments";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        Ok(find_eligible(
            ctx,
            self.basis_block_height,
            Some(EventType::Merge),
            |entry| entry.parent_hash_commitment.is_some(),
        )?
        .is_some())
    }
}

/// Get a summary of every eligible non-consensus event, optionally of one type only.
#[derive(Clone, Copy, Debug, Default)]
pub struct GetNonConsensusEvents {
    pub basis_block_height: Option<BlockHeight>,
    pub event_type: Option<EventType>,
}

impl Query for GetNonConsensusEvents {
    type Output = Vec<NonConsensusEntry>;
    const NAME: &'static str = "get_non_consensus_events";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut events = Vec::new();
        for range in NonConsensusEntry::eligible(self.basis_block_height, self.event_type) {
            for entry in ctx.scan::<NonConsensusEntry>(range, Direction::Forward) {
                let entry = entry?;
                if is_eligible(&entry, self.basis_block_height, self.event_type) {
                    events.push(entry);
                }
            }
        }
        Ok(events)
    }
}

/// Get the configuration event flagged as effective at `block_height`, if any.
#[derive(Clone, Copy, Debug)]
pub struct GetEffectiveConfiguration {
    pub block_height: BlockHeight,
}

impl Query for GetEffectiveConfiguration {
    type Output = Option<CryptoHash>;
    const NAME: &'static str = "get_effective_configuration";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        for entry in ctx.scan::<EffectiveConfigurationEntry>(
            EffectiveConfigurationEntry::height_prefix(self.block_height),
            Direction::Reverse,
        ) {
            let entry = entry?;
            if entry.effective {
                return Ok(Some(entry.event_hash));
            }
        }
        Ok(None)
    }
}

/// Get the smallest required block height stamped on `creator`'s non-consensus merge events.
#[derive(Clone, Copy, Debug)]
pub struct GetRequiredBlockHeight {
    pub creator: PeerId,
}

impl Query for GetRequiredBlockHeight {
    type Output = Option<BlockHeight>;
    const NAME: &'static str = "get_required_block_height";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        // Unset heights sort first, then set heights in ascending order.
        for entry in ctx.scan::<RequiredBlockHeightEntry>(
            RequiredBlockHeightEntry::creator_prefix(&self.creator),
            Direction::Forward,
        ) {
            let entry = entry?;
            if let (false, Some(required_block_height)) =
                (entry.consensus, entry.required_block_height)
            {
                return Ok(Some(required_block_height));
            }
        }
        Ok(None)
    }
}

/// Get up to `limit` summaries of the events that are either not yet in a block or in a block at or
/// above `min_block_height`, starting from `min_local_event_number`, in local arrival order.
///
/// Used to page through the events to gossip to a peer: the caller passes the local event number
/// after the last one it received as the next `min_local_event_number`.
#[derive(Clone, Copy, Debug)]
pub struct GetSortedEventSummaries {
    pub min_block_height: BlockHeight,
    pub min_local_event_number: LocalEventNumber,
    pub limit: usize,
}

impl Query for GetSortedEventSummaries {
    type Output = Vec<GossipEntry>;
    const NAME: &'static str = "get_sorted_event_summaries";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut summaries = Vec::new();
        if self.limit == 0 {
            return Ok(summaries);
        }
        for entry in ctx.scan::<GossipEntry>(
            GossipEntry::from_local_event_number(self.min_local_event_number),
            Direction::Forward,
        ) {
            let entry = entry?;
            if entry
                .block_height
                .map_or(true, |block_height| block_height >= self.min_block_height)
            {
                summaries.push(entry);
                if summaries.len() == self.limit {
                    break;
                }
            }
        }
        Ok(summaries)
    }
}

/// Get the average time `creator`'s consensus merge events took to reach consensus after the local
/// store received them.
#[derive(Clone, Copy, Debug)]
pub struct GetAvgConsensusTime {
    pub creator: PeerId,
}

impl Query for GetAvgConsensusTime {
    type Output = Option<Duration>;
    const NAME: &'static str = "get_avg_consensus_time";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut total_secs: u64 = 0;
        let mut count: u64 = 0;
        for entry in ctx.scan::<MergeEventHeadEntry>(
            MergeEventHeadEntry::creator_prefix(&self.creator),
            Direction::Forward,
        ) {
            let entry = entry?;
            if !entry.consensus {
                continue;
            }
            let record = ctx.fetch_indexed(IndexName::MergeEventHead, &entry.event_hash)?;
            if let Some(consensus) = record.annotation.consensus {
                total_secs = total_secs
                    .saturating_add(consensus.consensus_at.saturating_sub(record.meta.received_at));
                count += 1;
            }
        }

        if count == 0 {
            return Ok(None);
        }
        Ok(Some(Duration::from_secs_f64(
            total_secs as f64 / count as f64,
        )))
    }
}
