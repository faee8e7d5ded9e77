/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! General purpose, read-only interface for querying the ledger.
//!
//! Every read operation is a named [`Query`] with a typed parameter struct. Queries can be run through
//! [`LedgerSnapshot::run`] or explained through [`LedgerSnapshot::explain`], and the most common ones
//! also have a shorthand method on [`LedgerSnapshot`].

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ledger::indexes::{GossipConsensusEntry, GossipEntry, NonConsensusEntry, PeerHeadEntry},
    queries::{
        ancestry::{AggregateHistory, AncestorEdge, TraversalBudget},
        blocks::*,
        bookkeeping::*,
        commitment::*,
        head::*,
        replay::*,
        Explained, Query, QueryContext,
    },
    types::{
        block::Block,
        data_types::*,
        event::{EventRecord, EventType},
    },
};

use super::super::pluggables::{KVGet, KVStore};

use super::internal::LedgerError;

/// A factory for [`LedgerSnapshot`]s.
#[derive(Clone)]
pub struct LedgerCamera<K: KVStore> {
    kv_store: K,
    default_budget: TraversalBudget,
}

impl<K: KVStore> LedgerCamera<K> {
    pub fn new(kv_store: K, default_budget: TraversalBudget) -> Self {
        LedgerCamera {
            kv_store,
            default_budget,
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot<K::Snapshot<'_>> {
        LedgerSnapshot::new(self.kv_store.snapshot(), self.default_budget.clone())
    }
}

/// A read-only view into the ledger that is guaranteed to stay unchanged.
pub struct LedgerSnapshot<S: KVGet> {
    kv_snapshot: S,
    default_budget: TraversalBudget,
}

impl<S: KVGet> LedgerSnapshot<S> {
    pub(crate) fn new(kv_snapshot: S, default_budget: TraversalBudget) -> Self {
        LedgerSnapshot {
            kv_snapshot,
            default_budget,
        }
    }

    fn context(&self) -> QueryContext<'_, S> {
        QueryContext::new(&self.kv_snapshot, &self.default_budget)
    }

    pub fn run<Q: Query>(&self, query: &Q) -> Result<Q::Output, LedgerError> {
        self.context().run(query)
    }

    pub fn explain<Q: Query>(&self, query: &Q) -> Result<Explained<Q::Output>, LedgerError> {
        self.context().explain(query)
    }

    /* ↓↓↓ Event Store ↓↓↓ */

    pub fn get_event(&self, event_hash: &CryptoHash) -> Result<Option<EventRecord>, LedgerError> {
        self.run(&GetEvent {
            event_hash: *event_hash,
        })
    }

    pub fn has_event(&self, event_hash: &CryptoHash) -> Result<bool, LedgerError> {
        self.run(&HasEvent {
            event_hash: *event_hash,
        })
    }

    /* ↓↓↓ Block Store ↓↓↓ */

    pub fn get_block(&self, block_height: BlockHeight) -> Result<Option<Block>, LedgerError> {
        self.run(&GetBlock { block_height })
    }

    pub fn get_latest_block_height(&self) -> Result<Option<BlockHeight>, LedgerError> {
        self.run(&GetLatestBlockHeight)
    }

    pub fn get_consensus_witnesses(
        &self,
        block_height: BlockHeight,
    ) -> Result<Vec<PeerId>, LedgerError> {
        self.run(&GetConsensusWitnesses { block_height })
    }

    pub fn get_consensus_proof_peers(
        &self,
        block_height: BlockHeight,
    ) -> Result<BTreeSet<PeerId>, LedgerError> {
        self.run(&GetConsensusProofPeers { block_height })
    }

    pub fn get_merge_event_hashes(
        &self,
        block_height: BlockHeight,
    ) -> Result<Vec<CryptoHash>, LedgerError> {
        self.run(&GetMergeEventHashes { block_height })
    }

    pub fn get_merge_event_peers(
        &self,
        block_height: BlockHeight,
    ) -> Result<BTreeSet<PeerId>, LedgerError> {
        self.run(&GetMergeEventPeers { block_height })
    }

    pub fn get_block_event_summaries(
        &self,
        block_height: BlockHeight,
    ) -> Result<Vec<GossipConsensusEntry>, LedgerError> {
        self.run(&GetBlockEventSummaries { block_height })
    }

    pub fn get_consensus_history(
        &self,
        block_height: BlockHeight,
    ) -> Result<Vec<CryptoHash>, LedgerError> {
        self.run(&GetConsensusHistory { block_height })
    }

    /* ↓↓↓ Ancestry ↓↓↓ */

    pub fn aggregate_history(
        &self,
        query: &AggregateHistory,
    ) -> Result<Vec<AncestorEdge>, LedgerError> {
        self.run(query)
    }

    /* ↓↓↓ Heads ↓↓↓ */

    pub fn get_head(
        &self,
        creator: Option<PeerId>,
        generation: Option<Generation>,
    ) -> Result<Option<Head>, LedgerError> {
        self.run(&GetHead {
            creator,
            generation,
        })
    }

    pub fn get_start_hash(
        &self,
        creator: PeerId,
        target_generation: Generation,
    ) -> Result<Option<CryptoHash>, LedgerError> {
        self.run(&GetStartHash {
            creator,
            target_generation,
        })
    }

    pub fn get_peer_head_info(
        &self,
        event_hash: &CryptoHash,
    ) -> Result<Option<PeerHeadEntry>, LedgerError> {
        self.run(&GetPeerHeadInfo {
            event_hash: *event_hash,
        })
    }

    /* ↓↓↓ Replays and forks ↓↓↓ */

    pub fn get_new_replayers(
        &self,
        expected: BTreeMap<PeerId, ReplayNumber>,
    ) -> Result<BTreeMap<PeerId, BTreeSet<ReplayNumber>>, LedgerError> {
        self.run(&GetNewReplayers { expected })
    }

    pub fn get_forkers(
        &self,
        tree_hashes: Vec<CryptoHash>,
        first_generation_peers: Vec<PeerId>,
        genesis_hash: CryptoHash,
    ) -> Result<BTreeMap<PeerId, BTreeSet<CryptoHash>>, LedgerError> {
        self.run(&GetForkers {
            tree_hashes,
            first_generation_peers,
            genesis_hash,
        })
    }

    pub fn get_latest_replays(
        &self,
        peers: Vec<PeerId>,
    ) -> Result<BTreeMap<PeerId, ReplayNumber>, LedgerError> {
        self.run(&GetLatestReplays { peers })
    }

    pub fn get_operation_replayers(
        &self,
        summaries: Vec<OperationQuery>,
    ) -> Result<BTreeMap<PeerId, BTreeSet<CryptoHash>>, LedgerError> {
        self.run(&GetOperationReplayers { summaries })
    }

    /* ↓↓↓ Commitments ↓↓↓ */

    pub fn get_latest_parent_hash_commitment(
        &self,
        creator: PeerId,
        min_generation: Generation,
    ) -> Result<Option<ParentHashCommitment>, LedgerError> {
        self.run(&GetLatestParentHashCommitment {
            creator,
            min_generation,
        })
    }

    pub fn get_parent_hash_commitments(
        &self,
        non_witness_hashes: Vec<CryptoHash>,
        block_height: BlockHeight,
    ) -> Result<Vec<CommitmentSummary>, LedgerError> {
        self.run(&GetParentHashCommitments {
            non_witness_hashes,
            block_height,
        })
    }

    /* ↓↓↓ Consensus bookkeeping ↓↓↓ */

    pub fn has_outstanding_regular_events(
        &self,
        basis_block_height: Option<BlockHeight>,
    ) -> Result<bool, LedgerError> {
        self.run(&HasOutstandingRegularEvents { basis_block_height })
    }

    pub fn has_outstanding_parent_hash_commitments(
        &self,
        basis_block_height: Option<BlockHeight>,
    ) -> Result<bool, LedgerError> {
        self.run(&HasOutstandingParentHashCommitments { basis_block_height })
    }

    pub fn get_non_consensus_events(
        &self,
        basis_block_height: Option<BlockHeight>,
        event_type: Option<EventType>,
    ) -> Result<Vec<NonConsensusEntry>, LedgerError> {
        self.run(&GetNonConsensusEvents {
            basis_block_height,
            event_type,
        })
    }

    pub fn get_effective_configuration(
        &self,
        block_height: BlockHeight,
    ) -> Result<Option<CryptoHash>, LedgerError> {
        self.run(&GetEffectiveConfiguration { block_height })
    }

    pub fn get_required_block_height(
        &self,
        creator: PeerId,
    ) -> Result<Option<BlockHeight>, LedgerError> {
        self.run(&GetRequiredBlockHeight { creator })
    }

    pub fn get_sorted_event_summaries(
        &self,
        min_block_height: BlockHeight,
        min_local_event_number: LocalEventNumber,
        limit: usize,
    ) -> Result<Vec<GossipEntry>, LedgerError> {
        self.run(&GetSortedEventSummaries {
            min_block_height,
            min_local_event_number,
            limit,
        })
    }

    pub fn get_avg_consensus_time(
        &self,
        creator: PeerId,
    ) -> Result<Option<std::time::Duration>, LedgerError> {
        self.run(&GetAvgConsensusTime { creator })
    }
}
