/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Rules and predicates that help with maintaining the invariant properties of the stored DAG.
//!
//! # Local and global invariants
//!
//! Some invariants are enforced by the types alone. For example, an event that has reached consensus
//! always has a block height and a block order, because both live in the same
//! [`ConsensusAnnotation`](crate::types::event::ConsensusAnnotation).
//!
//! Others relate an event to events that are already stored, and are checked by the functions in this
//! module when an event is inserted:
//! - [`check_generation_chain`]: a merge event extends its creator's chain by exactly one generation.
//! - [`check_parents_distinct`]: a merge event lists each parent once.
//!
//! Only invariants the local store has enough knowledge to check are checked. In particular, parents
//! are not required to be stored before their children; ancestry traversals report missing parents as
//! [`Inconsistent`](LedgerError::Inconsistent) instead.

use std::collections::HashSet;

use crate::types::{
    data_types::{CryptoHash, Generation, ReplayStatus},
    event::{Annotation, Event, MergeEvent},
};

use super::{
    accessors::internal::{Inconsistency, InvalidArgument, LedgerError},
    pluggables::KVGet,
};

/// Check every insert-time invariant of `event`, whose hash is `hash`.
pub fn check_event<S: KVGet>(hash: &CryptoHash, event: &Event, kv: &S) -> Result<(), LedgerError> {
    if let Event::Merge(merge) = event {
        check_parents_distinct(hash, merge)?;
        check_generation_chain(hash, merge, kv)?;
    }
    Ok(())
}

/// Check that the tree event of `merge` is the merge event it extends:
/// - At generation 0 (genesis) there is nothing to check.
/// - At generation 1, the tree event must be a stored generation-0 merge event. The genesis merge
///   event is shared by every first-generation creator, so its creator is not compared.
/// - At generation `g > 1`, the tree event must be a stored merge event of the same creator at
///   generation `g - 1`.
///
/// A tree event that is not stored is an [`Inconsistency`]; one that is stored but does not fit is an
/// [`InvalidArgument`].
pub fn check_generation_chain<S: KVGet>(
    hash: &CryptoHash,
    merge: &MergeEvent,
    kv: &S,
) -> Result<(), LedgerError> {
    let expected_generation = match merge.generation.prev() {
        None => return Ok(()),
        Some(generation) => generation,
    };

    let tree_event = kv
        .event(&merge.tree_hash)?
        .ok_or(Inconsistency::MissingTreeEvent {
            event: *hash,
            tree_hash: merge.tree_hash,
        })?;
    let tree_event = tree_event
        .as_merge()
        .ok_or(InvalidArgument::TreeEventNotMerge {
            event: *hash,
            tree_hash: merge.tree_hash,
        })?;

    let same_chain = if expected_generation == Generation::new(0) {
        true
    } else {
        tree_event.creator == merge.creator
    };
    if !same_chain || tree_event.generation != expected_generation {
        return Err(InvalidArgument::BrokenGenerationChain {
            event: *hash,
            tree_hash: merge.tree_hash,
        }
        .into());
    }

    Ok(())
}

pub fn check_parents_distinct(hash: &CryptoHash, merge: &MergeEvent) -> Result<(), LedgerError> {
    let mut seen = HashSet::with_capacity(merge.parent_hash.len());
    for parent in &merge.parent_hash {
        if !seen.insert(parent) {
            return Err(InvalidArgument::DuplicateParent {
                event: *hash,
                parent: *parent,
            }
            .into());
        }
    }
    Ok(())
}

/// Whether `new` only sets fields of `old` that were unset, and leaves every field that was set as it
/// was.
pub fn annotation_only_advances(old: &Annotation, new: &Annotation) -> bool {
    let consensus = old.consensus.is_none() || old.consensus == new.consensus;
    let replay = match old.replay {
        ReplayStatus::Clean => true,
        ReplayStatus::DetectedAt(_) => old.replay == new.replay,
    };
    let required_block_height =
        old.required_block_height.is_none() || old.required_block_height == new.required_block_height;
    let effective_configuration = !old.effective_configuration || new.effective_configuration;

    new.version > old.version
        && consensus
        && replay
        && required_block_height
        && effective_configuration
}
