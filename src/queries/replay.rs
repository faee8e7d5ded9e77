/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Detection of creators that replay or fork their own chains.
//!
//! A creator *replays* when it restarts from an older state and produces merge events under a new
//! local replay number. It *forks* when it produces two distinct merge events at the same position in
//! its chain. Both are detected here from the stored events alone; condemning the creators found is
//! left to [`EventLedger::mark_new_replayers`](crate::ledger::accessors::internal::EventLedger).

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    ledger::{
        accessors::internal::LedgerError,
        indexes::{ForkScanEntry, OperationEntry, ReplayNumberEntry},
        pluggables::{Direction, KVGet},
    },
    types::data_types::{CryptoHash, PeerId, ReplayNumber},
};

use super::{Query, QueryContext};

/// Find the creators among `expected`'s keys whose consensus merge events carry a replay number
/// other than the expected one.
///
/// Each creator found is mapped to every replay number observed among its consensus merge events.
#[derive(Clone, Debug, Default)]
pub struct GetNewReplayers {
    pub expected: BTreeMap<PeerId, ReplayNumber>,
}

impl Query for GetNewReplayers {
    type Output = BTreeMap<PeerId, BTreeSet<ReplayNumber>>;
    const NAME: &'static str = "get_new_replayers";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut replayers = BTreeMap::new();
        for (creator, expected) in &self.expected {
            let mut observed = BTreeSet::new();
            for entry in ctx.scan::<ReplayNumberEntry>(
                ReplayNumberEntry::creator_prefix(creator),
                Direction::Forward,
            ) {
                let entry = entry?;
                if entry.consensus {
                    observed.insert(entry.local_replay_number);
                }
            }
            if observed.iter().any(|number| number != expected) {
                log::debug!("Creator {} replayed: {:?}.", creator, observed);
                replayers.insert(*creator, observed);
            }
        }
        Ok(replayers)
    }
}

/// Find the creators that produced two or more distinct merge events on top of the same tree event.
///
/// Each tree hash is checked for every creator that built on it, except the genesis merge event
/// (`genesis_hash`), which is shared by every creator's first merge event and is therefore checked
/// only for `first_generation_peers`. Each creator found is mapped to the tree hashes it forked at.
#[derive(Clone, Debug)]
pub struct GetForkers {
    pub tree_hashes: Vec<CryptoHash>,
    pub first_generation_peers: Vec<PeerId>,
    pub genesis_hash: CryptoHash,
}

impl Query for GetForkers {
    type Output = BTreeMap<PeerId, BTreeSet<CryptoHash>>;
    const NAME: &'static str = "get_forkers";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut forkers: BTreeMap<PeerId, BTreeSet<CryptoHash>> = BTreeMap::new();

        for tree_hash in &self.tree_hashes {
            let mut children: BTreeMap<PeerId, BTreeSet<CryptoHash>> = BTreeMap::new();
            if *tree_hash == self.genesis_hash {
                for peer in &self.first_generation_peers {
                    for entry in ctx.scan::<ForkScanEntry>(
                        ForkScanEntry::tree_creator_prefix(tree_hash, peer),
                        Direction::Forward,
                    ) {
                        let entry = entry?;
                        children.entry(entry.creator).or_default().insert(entry.event_hash);
                    }
                }
            } else {
                for entry in
                    ctx.scan::<ForkScanEntry>(ForkScanEntry::tree_prefix(tree_hash), Direction::Forward)
                {
                    let entry = entry?;
                    children.entry(entry.creator).or_default().insert(entry.event_hash);
                }
            }

            for (creator, events) in children {
                if events.len() > 1 {
                    forkers.entry(creator).or_default().insert(*tree_hash);
                }
            }
        }

        Ok(forkers)
    }
}

/// Get the greatest replay number among each peer's consensus merge events. Peers without consensus
/// merge events are left out.
#[derive(Clone, Debug, Default)]
pub struct GetLatestReplays {
    pub peers: Vec<PeerId>,
}

impl Query for GetLatestReplays {
    type Output = BTreeMap<PeerId, ReplayNumber>;
    const NAME: &'static str = "get_latest_replays";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut latest = BTreeMap::new();
        for peer in &self.peers {
            for entry in ctx.scan::<ReplayNumberEntry>(
                ReplayNumberEntry::creator_prefix(peer),
                Direction::Reverse,
            ) {
                let entry = entry?;
                if entry.consensus {
                    latest.insert(*peer, entry.local_replay_number);
                    break;
                }
            }
        }
        Ok(latest)
    }
}

/// The operations of one creator, carried by events that are about to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationQuery {
    pub creator: PeerId,
    pub operation_hashes: Vec<CryptoHash>,
}

/// Find which of the given operations are already carried by a stored regular event.
///
/// Must only be called with operations of events that are not stored yet: any operation found then
/// means that its creator submitted it twice. Each creator found is mapped to its operations that were
/// found.
#[derive(Clone, Debug, Default)]
pub struct GetOperationReplayers {
    pub summaries: Vec<OperationQuery>,
}

impl Query for GetOperationReplayers {
    type Output = BTreeMap<PeerId, BTreeSet<CryptoHash>>;
    const NAME: &'static str = "get_operation_replayers";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let mut replayers: BTreeMap<PeerId, BTreeSet<CryptoHash>> = BTreeMap::new();
        for summary in &self.summaries {
            for operation_hash in &summary.operation_hashes {
                let stored = ctx
                    .scan::<OperationEntry>(
                        OperationEntry::operation_prefix(&summary.creator, operation_hash),
                        Direction::Forward,
                    )
                    .next()
                    .transpose()?
                    .is_some();
                if stored {
                    replayers
                        .entry(summary.creator)
                        .or_default()
                        .insert(*operation_hash);
                }
            }
        }
        Ok(replayers)
    }
}
