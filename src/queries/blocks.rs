/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reads of blocks, and of the consensus events ordered into each block.

use std::collections::BTreeSet;

use crate::{
    ledger::{
        accessors::internal::{Inconsistency, LedgerError},
        indexes::{
            ConsensusHistoryEntry, ConsensusMergeEntry, GossipConsensusEntry, PeerHeadEntry,
        },
        pluggables::{Direction, KVGet},
    },
    types::{
        block::Block,
        data_types::{BlockHeight, CryptoHash, PeerId},
    },
};

use super::{Query, QueryContext};

#[derive(Clone, Copy, Debug)]
pub struct GetBlock {
    pub block_height: BlockHeight,
}

impl Query for GetBlock {
    type Output = Option<Block>;
    const NAME: &'static str = "get_block";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.block(self.block_height)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct GetLatestBlockHeight;

impl Query for GetLatestBlockHeight {
    type Output = Option<BlockHeight>;
    const NAME: &'static str = "get_latest_block_height";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.latest_block_height()
    }
}

/// Get the witnesses of the block at `block_height`, or nothing if the block is not stored.
#[derive(Clone, Copy, Debug)]
pub struct GetConsensusWitnesses {
    pub block_height: BlockHeight,
}

impl Query for GetConsensusWitnesses {
    type Output = Vec<PeerId>;
    const NAME: &'static str = "get_consensus_witnesses";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        Ok(ctx
            .block(self.block_height)?
            .map(|block| block.witness)
            .unwrap_or_default())
    }
}

/// Get the distinct creators of the merge events that make up the consensus proof of the block at
/// `block_height`, or nothing if the block is not stored.
///
/// A proof hash that is not a stored merge event is reported as
/// [`Inconsistent`](LedgerError::Inconsistent).
#[derive(Clone, Copy, Debug)]
pub struct GetConsensusProofPeers {
    pub block_height: BlockHeight,
}

impl Query for GetConsensusProofPeers {
    type Output = BTreeSet<PeerId>;
    const NAME: &'static str = "get_consensus_proof_peers";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let block = match ctx.block(self.block_height)? {
            None => return Ok(BTreeSet::new()),
            Some(block) => block,
        };

        let mut peers = BTreeSet::new();
        for event in &block.consensus_proof_hash {
            let creator = ctx
                .seek::<PeerHeadEntry>(&PeerHeadEntry::key_of(event))?
                .and_then(|entry| entry.creator)
                .ok_or(Inconsistency::MissingProofEvent {
                    block_height: self.block_height,
                    event: *event,
                })?;
            peers.insert(creator);
        }
        Ok(peers)
    }
}

/// Get the hashes of the consensus merge events at `block_height`, ordered by creator.
#[derive(Clone, Copy, Debug)]
pub struct GetMergeEventHashes {
    pub block_height: BlockHeight,
}

impl Query for GetMergeEventHashes {
    type Output = Vec<CryptoHash>;
    const NAME: &'static str = "get_merge_event_hashes";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.scan::<ConsensusMergeEntry>(
            ConsensusMergeEntry::height_prefix(self.block_height),
            Direction::Forward,
        )
        .map(|entry| entry.map(|entry| entry.event_hash))
        .collect()
    }
}

/// Get the creators of the consensus merge events at `block_height`.
#[derive(Clone, Copy, Debug)]
pub struct GetMergeEventPeers {
    pub block_height: BlockHeight,
}

impl Query for GetMergeEventPeers {
    type Output = BTreeSet<PeerId>;
    const NAME: &'static str = "get_merge_event_peers";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.scan::<ConsensusMergeEntry>(
            ConsensusMergeEntry::height_prefix(self.block_height),
            Direction::Forward,
        )
        .map(|entry| entry.map(|entry| entry.creator))
        .collect()
    }
}

/// Get summaries of the consensus events at `block_height`, in local arrival order.
#[derive(Clone, Copy, Debug)]
pub struct GetBlockEventSummaries {
    pub block_height: BlockHeight,
}

impl Query for GetBlockEventSummaries {
    type Output = Vec<GossipConsensusEntry>;
    const NAME: &'static str = "get_block_event_summaries";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.scan::<GossipConsensusEntry>(
            GossipConsensusEntry::height_prefix(self.block_height),
            Direction::Forward,
        )
        .collect()
    }
}

/// Get the hashes of the consensus events at `block_height`, in block order.
#[derive(Clone, Copy, Debug)]
pub struct GetConsensusHistory {
    pub block_height: BlockHeight,
}

impl Query for GetConsensusHistory {
    type Output = Vec<CryptoHash>;
    const NAME: &'static str = "get_consensus_history";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        ctx.scan::<ConsensusHistoryEntry>(
            ConsensusHistoryEntry::height_prefix(self.block_height),
            Direction::Forward,
        )
        .map(|entry| entry.map(|entry| entry.event_hash))
        .collect()
    }
}
