/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Storage and query layer for Continuity-style, gossip-based, Byzantine fault tolerant DAG ledgers.
//!
//! Each peer of such a ledger stores every event it has seen: merge events, which form a directed
//! acyclic graph by referencing their parents, plus the regular and configuration events that merge
//! events carry into the graph. A consensus algorithm running on top of the graph orders events into
//! blocks. This crate persists events and blocks, maintains the secondary indexes over them, and
//! answers the queries that the consensus and gossip algorithms need.
//!
//! The consensus state machine, gossip transport, signature verification, and the physical storage
//! engine live outside of this crate. Library users provide the storage engine by implementing the
//! traits in [`ledger::pluggables`].
//!
//! # Getting started
//!
//! 1. Implement [`KVStore`](ledger::pluggables::KVStore) for an ordered key-value store.
//! 2. Build a [`Configuration`](config::Configuration).
//! 3. Create an [`EventLedger`](ledger::accessors::internal::EventLedger) to insert events and blocks
//!    and to record consensus.
//! 4. Read through [`LedgerSnapshot`](ledger::accessors::public::LedgerSnapshot)s, or run any
//!    [`Query`](queries::Query) directly.

pub mod config;

pub mod events;

pub mod ledger;

pub mod logging;

pub mod queries;

pub mod types;
