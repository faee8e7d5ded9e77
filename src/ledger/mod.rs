/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The persistent state of a peer: every event it has seen, and every block.
//!
//! # The Ledger
//!
//! The ledger stores a directed acyclic graph of [events](crate::types::event::Event). Merge events
//! are the graph's vertices with structure: each one references its parents by hash and extends its
//! creator's own chain of merge events by one generation. Regular and configuration events are leaves
//! that merge events reference.
//!
//! Each event is stored as an immutable body and an immutable metadata record, written once when the
//! event is inserted, and a mutable [annotation](crate::types::event::Annotation) that the consensus
//! collaborator fills in as the event is ordered into [blocks](crate::types::block::Block).
//!
//! The documentation for the [`variables`] submodule lists everything stored by the `ledger` module,
//! and the documentation for the [`indexes`] submodule lists every secondary index maintained over
//! the events.
//!
//! # Pluggable persistence
//!
//! - The ledger is kept in persistent storage, most probably in the host's filesystem.
//! - Library users get to choose how exactly this is done.
//! - The ledger merely requires that whatever the user provides as a persistence mechanism implements
//!   the abstract functionality of an ordered key-value store with range scans and atomic, batched,
//!   conditional writes.
//! - This abstract functionality is made concrete by the traits defined in the [`pluggables`] module.
//!
//! # Accessing the Ledger
//!
//! Implementations of the pluggable persistence traits get wrapped inside ledger [`accessors`], which
//! put the ledger's variables and index entries in the right places in the key-value store and provide
//! methods for reading and writing them.

pub mod accessors;

pub mod indexes;

pub mod invariants;

pub mod pluggables;

pub mod variables;
