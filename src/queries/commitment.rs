/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Validation of parent-hash commitments.
//!
//! A merge event may commit to the hash of another merge event (its `parent_hash_commitment`),
//! obliging the committed event to be merged by the committer's future history. A commitment made
//! by a creator that was already condemned as a replayer when the commitment reached consensus is not
//! honoured.

use std::collections::BTreeMap;

use crate::{
    ledger::{
        accessors::internal::{Inconsistency, LedgerError},
        indexes::{CommitmentEntry, IndexName, MergeEventHeadEntry, PeerHeadEntry},
        pluggables::{Direction, KVGet},
    },
    types::data_types::{BlockHeight, CryptoHash, Generation, PeerId},
};

use super::{Query, QueryContext};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParentHashCommitment {
    /// The committing merge event.
    pub event_hash: CryptoHash,
    pub generation: Generation,
    /// Height of the block the committing event reached consensus in.
    pub block_height: BlockHeight,
    pub committed_hash: CryptoHash,
}

/// Get the commitment of `creator`'s most recent consensus merge event that has one, looking only at
/// merge events at or above `min_generation`.
///
/// Returns `None` if there is no such commitment, or if the creator of the committed event had been
/// condemned as a replayer at or before the height at which the commitment reached consensus.
#[derive(Clone, Copy, Debug)]
pub struct GetLatestParentHashCommitment {
    pub creator: PeerId,
    pub min_generation: Generation,
}

impl Query for GetLatestParentHashCommitment {
    type Output = Option<ParentHashCommitment>;
    const NAME: &'static str = "get_latest_parent_hash_commitment";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut latest = None;
        for entry in ctx.scan::<MergeEventHeadEntry>(
            MergeEventHeadEntry::creator_prefix(&self.creator),
            Direction::Reverse,
        ) {
            let entry = entry?;
            if entry.generation < self.min_generation {
                break;
            }
            if let (true, Some(committed_hash)) = (entry.consensus, entry.parent_hash_commitment) {
                latest = Some((entry, committed_hash));
                break;
            }
        }
        let (entry, committed_hash) = match latest {
            None => return Ok(None),
            Some(latest) => latest,
        };

        let block_height = entry
            .block_height
            .ok_or(Inconsistency::DanglingIndexEntry {
                index: IndexName::MergeEventHead,
                event: entry.event_hash,
            })?;
        let committed = ctx
            .seek::<PeerHeadEntry>(&PeerHeadEntry::key_of(&committed_hash))?
            .ok_or(Inconsistency::MissingCommittedEvent {
                event: entry.event_hash,
                committed: committed_hash,
            })?;

        if let Some(committed_creator) = committed.creator {
            if let Some(detected_at) = ctx.replayer(&committed_creator)? {
                if detected_at <= block_height {
                    log::debug!(
                        "Commitment of {} to {} is void: {} was condemned at {}.",
                        entry.event_hash,
                        committed_hash,
                        committed_creator,
                        detected_at
                    );
                    return Ok(None);
                }
            }
        }

        Ok(Some(ParentHashCommitment {
            event_hash: entry.event_hash,
            generation: entry.generation,
            block_height,
            committed_hash,
        }))
    }
}

/// The earliest block height at which a commitment to `committed_hash` reached consensus, among the
/// commitments that are `valid` or among those that are not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommitmentSummary {
    pub committed_hash: CryptoHash,
    pub valid: bool,
    pub block_height: BlockHeight,
}

/// For each of `non_witness_hashes`, summarize the consensus commitments to it made at or before
/// `block_height`.
///
/// A commitment is valid when its committing event had not been condemned as a replay at the height at
/// which the commitment reached consensus. Each committed hash yields at most one summary for valid
/// commitments and one for invalid ones, in that order.
#[derive(Clone, Debug)]
pub struct GetParentHashCommitments {
    pub non_witness_hashes: Vec<CryptoHash>,
    pub block_height: BlockHeight,
}

impl Query for GetParentHashCommitments {
    type Output = Vec<CommitmentSummary>;
    const NAME: &'static str = "get_parent_hash_commitments";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut summaries = Vec::new();
        for committed_hash in &self.non_witness_hashes {
            // Entries sort by block height, so the first of each validity is its minimum.
            let mut earliest: BTreeMap<bool, BlockHeight> = BTreeMap::new();
            for entry in ctx.scan::<CommitmentEntry>(
                CommitmentEntry::committed_prefix(committed_hash),
                Direction::Forward,
            ) {
                let entry = entry?;
                if entry.block_height > self.block_height {
                    break;
                }
                let valid = !entry.replay.detected_at_or_before(entry.block_height);
                earliest.entry(valid).or_insert(entry.block_height);
                if earliest.len() == 2 {
                    break;
                }
            }

            summaries.extend(earliest.into_iter().rev().map(|(valid, block_height)| {
                CommitmentSummary {
                    committed_hash: *committed_hash,
                    valid,
                    block_height,
                }
            }));
        }
        Ok(summaries)
    }
}
