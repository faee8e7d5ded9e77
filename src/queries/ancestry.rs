/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traversals over the parent edges of the DAG.
//!
//! [`AggregateHistory`] walks from a set of start events towards the genesis merge event,
//! breadth-first, reading only the
//! [`AncestryEdges`](crate::ledger::indexes::IndexName::AncestryEdges) index. The walk is iterative
//! and bounded by a [`TraversalBudget`].

use std::{
    collections::{HashSet, VecDeque},
    time::{Duration, Instant},
};

use crate::{
    ledger::{
        accessors::internal::{Inconsistency, LedgerError},
        indexes::AncestryEntry,
        pluggables::KVGet,
    },
    types::{
        data_types::{CryptoHash, Generation, PeerId},
        event::EventType,
    },
};

use super::{Query, QueryContext};

/// Limits on how much work a single traversal may do.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TraversalBudget {
    /// Maximum number of events the traversal may visit, not counting its start events.
    pub max_steps: Option<u64>,
    /// Maximum wall-clock time the traversal may run for.
    pub timeout: Option<Duration>,
}

impl TraversalBudget {
    pub fn unlimited() -> TraversalBudget {
        TraversalBudget::default()
    }

    pub fn steps(max_steps: u64) -> TraversalBudget {
        TraversalBudget {
            max_steps: Some(max_steps),
            timeout: None,
        }
    }
}

/// Skip every merge event of `creator` whose generation is at or below `generation`. Used to avoid
/// re-walking history the caller already has.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CreatorRestriction {
    pub creator: PeerId,
    pub generation: Generation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTypeFilter {
    /// Emit only merge events.
    MergeOnly,
    /// Walk through merge events, but emit only regular and configuration events.
    NonMergeOnly,
}

impl EventTypeFilter {
    fn emits(&self, event_type: EventType) -> bool {
        match self {
            EventTypeFilter::MergeOnly => event_type.is_merge(),
            EventTypeFilter::NonMergeOnly => !event_type.is_merge(),
        }
    }
}

/// One event reached by a traversal, with its outgoing parent edges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AncestorEdge {
    pub event_hash: CryptoHash,
    pub event_type: EventType,
    pub parent_hash: Vec<CryptoHash>,
}

/// Collect every ancestor of `start_hashes` reachable through parent edges, excluding the start events
/// themselves.
///
/// # Pruning
///
/// An ancestor that is skipped by `creator_restriction` or `creator_filter` is neither emitted nor
/// walked through. `event_type_filter` only controls which visited events are emitted.
///
/// # Errors
///
/// - [`Inconsistent`](LedgerError::Inconsistent) if a visited event references a parent that is not
///   stored.
/// - [`BudgetExceeded`](LedgerError::BudgetExceeded) if the walk needs more steps or time than
///   `budget` (or, without one, the ledger's default budget) allows.
#[derive(Clone, Debug, Default)]
pub struct AggregateHistory {
    pub start_hashes: Vec<CryptoHash>,
    pub creator_restriction: Vec<CreatorRestriction>,
    pub creator_filter: Vec<PeerId>,
    pub event_type_filter: Option<EventTypeFilter>,
    pub budget: Option<TraversalBudget>,
}

impl AggregateHistory {
    fn prunes(&self, entry: &AncestryEntry) -> bool {
        let (creator, generation) = match (entry.creator, entry.generation) {
            (Some(creator), Some(generation)) => (creator, generation),
            _ => return false,
        };
        self.creator_filter.contains(&creator)
            || self.creator_restriction.iter().any(|restriction| {
                restriction.creator == creator && generation <= restriction.generation
            })
    }

    fn emits(&self, entry: &AncestryEntry) -> bool {
        self.event_type_filter
            .map_or(true, |filter| filter.emits(entry.event_type))
    }
}

impl Query for AggregateHistory {
    type Output = Vec<AncestorEdge>;
    const NAME: &'static str = "aggregate_history";

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError> {
        let budget = self.budget.as_ref().unwrap_or(ctx.default_budget());
        let deadline = budget.timeout.map(|timeout| Instant::now() + timeout);

        let mut visited: HashSet<CryptoHash> = self.start_hashes.iter().copied().collect();
        let mut frontier = VecDeque::new();
        for start_hash in &self.start_hashes {
            match ctx.seek::<AncestryEntry>(&AncestryEntry::key_of(start_hash))? {
                Some(entry) if entry.event_type.is_merge() => frontier.push_back(entry),
                _ => (),
            }
        }
        if frontier.is_empty() {
            log::debug!("No known merge event among the start hashes of aggregate_history.");
            return Ok(Vec::new());
        }

        let mut steps_taken = 0;
        let mut edges = Vec::new();
        while let Some(node) = frontier.pop_front() {
            for parent in &node.parent_hash {
                if !visited.insert(*parent) {
                    continue;
                }

                steps_taken += 1;
                let out_of_steps = budget.max_steps.map_or(false, |max| steps_taken > max);
                let out_of_time = deadline.map_or(false, |deadline| Instant::now() >= deadline);
                if out_of_steps || out_of_time {
                    return Err(LedgerError::BudgetExceeded { steps_taken });
                }

                let entry = ctx
                    .seek::<AncestryEntry>(&AncestryEntry::key_of(parent))?
                    .ok_or(Inconsistency::MissingParent {
                        event: node.event_hash,
                        parent: *parent,
                    })?;
                if self.prunes(&entry) {
                    continue;
                }
                if self.emits(&entry) {
                    edges.push(AncestorEdge {
                        event_hash: entry.event_hash,
                        event_type: entry.event_type,
                        parent_hash: entry.parent_hash.clone(),
                    });
                }
                frontier.push_back(entry);
            }
        }

        log::trace!(
            "aggregate_history visited {} events and emitted {}.",
            steps_taken,
            edges.len()
        );
        Ok(edges)
    }
}
