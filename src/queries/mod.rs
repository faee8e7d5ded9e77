/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Named, typed read operations over the ledger.
//!
//! Every read operation the ledger supports is a [`Query`]: a parameter struct with a name and an
//! `execute` method. Queries read the key-value store only through a [`QueryContext`], which hands out
//! index scans and point lookups and records how much work each access path did. This record makes
//! every query explainable: [`QueryContext::explain`] returns the query's result together with one
//! [`PlanStage`] per index it touched.
//!
//! Queries are grouped by the component they serve:
//! - [`ancestry`]: traversals over parent edges.
//! - [`head`]: head and generation lookups.
//! - [`replay`]: replay and fork detection.
//! - [`commitment`]: parent-hash commitment validation.
//! - [`bookkeeping`]: consensus bookkeeping and gossip summaries.
//! - [`blocks`]: reads of blocks and of the events ordered into them.

use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
};

use crate::{
    ledger::{
        accessors::internal::{Inconsistency, LedgerError},
        indexes::{IndexEntry, IndexName},
        pluggables::{Direction, KVGet, KeyRange},
    },
    types::{
        block::Block,
        data_types::{BlockHeight, CryptoHash, PeerId},
        event::EventRecord,
    },
};

use self::ancestry::TraversalBudget;

pub mod ancestry;

pub mod blocks;

pub mod bookkeeping;

pub mod commitment;

pub mod head;

pub mod replay;

/// A read operation over the ledger.
pub trait Query {
    type Output: Returned;

    /// Name of the query, as it appears in logs and in [`Explained`] plans.
    const NAME: &'static str;

    fn execute<S: KVGet>(&self, ctx: &QueryContext<'_, S>) -> Result<Self::Output, LedgerError>;
}

/// Query outputs that can report how many results they hold.
pub trait Returned {
    fn n_returned(&self) -> usize;
}

impl<T> Returned for Vec<T> {
    fn n_returned(&self) -> usize {
        self.len()
    }
}

impl<T> Returned for Option<T> {
    fn n_returned(&self) -> usize {
        usize::from(self.is_some())
    }
}

impl Returned for bool {
    fn n_returned(&self) -> usize {
        usize::from(*self)
    }
}

impl<K, V> Returned for BTreeMap<K, V> {
    fn n_returned(&self) -> usize {
        self.len()
    }
}

impl<T> Returned for BTreeSet<T> {
    fn n_returned(&self) -> usize {
        self.len()
    }
}

/// The work a query did through one access path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanStage {
    pub index: IndexName,
    /// Number of keys read from the index.
    pub keys_examined: u64,
    /// Number of full event records or blocks read through the index.
    pub docs_examined: u64,
}

/// The result of a query together with a description of how it was computed.
#[derive(Clone, Debug)]
pub struct Explained<T> {
    pub query: &'static str,
    /// One stage per access path, in the order the query first touched them.
    pub stages: Vec<PlanStage>,
    pub n_returned: usize,
    pub result: T,
}

impl<T> Explained<T> {
    pub fn stage(&self, index: IndexName) -> Option<&PlanStage> {
        self.stages.iter().find(|stage| stage.index == index)
    }

    /// Whether the query was answered from index keys and values alone.
    pub fn is_covered(&self) -> bool {
        self.stages.iter().all(|stage| stage.docs_examined == 0)
    }

    pub fn total_keys_examined(&self) -> u64 {
        self.stages.iter().map(|stage| stage.keys_examined).sum()
    }

    pub fn total_docs_examined(&self) -> u64 {
        self.stages.iter().map(|stage| stage.docs_examined).sum()
    }
}

/// The only way a query reads the key-value store.
pub struct QueryContext<'s, S: KVGet> {
    kv: &'s S,
    default_budget: &'s TraversalBudget,
    stages: RefCell<Vec<PlanStage>>,
}

impl<'s, S: KVGet> QueryContext<'s, S> {
    pub(crate) fn new(kv: &'s S, default_budget: &'s TraversalBudget) -> Self {
        QueryContext {
            kv,
            default_budget,
            stages: RefCell::new(Vec::new()),
        }
    }

    pub fn run<Q: Query>(&self, query: &Q) -> Result<Q::Output, LedgerError> {
        log::debug!("Running query {}.", Q::NAME);
        query.execute(self)
    }

    pub fn explain<Q: Query>(&self, query: &Q) -> Result<Explained<Q::Output>, LedgerError> {
        self.stages.borrow_mut().clear();
        let result = query.execute(self)?;
        let stages = self.stages.take();
        log::trace!("Explained query {}: {:?}.", Q::NAME, stages);

        Ok(Explained {
            query: Q::NAME,
            stages,
            n_returned: result.n_returned(),
            result,
        })
    }

    /// The budget of traversals that do not bring their own.
    pub fn default_budget(&self) -> &TraversalBudget {
        self.default_budget
    }

    /* ↓↓↓ Index access ↓↓↓ */

    /// Lazily iterate over the entries of index `E` in `range`.
    pub fn scan<E: IndexEntry>(
        &self,
        range: KeyRange,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = Result<E, LedgerError>> + '_> {
        self.touch(E::INDEX);
        Box::new(self.kv.range(range, direction).map(move |(key, value)| {
            self.count(E::INDEX, 1, 0);
            E::decode(&key, &value).map_err(LedgerError::from)
        }))
    }

    /// Get the entry of index `E` at exactly `key`.
    pub fn seek<E: IndexEntry>(&self, key: &[u8]) -> Result<Option<E>, LedgerError> {
        self.touch(E::INDEX);
        match self.kv.get(key) {
            None => Ok(None),
            Some(value) => {
                self.count(E::INDEX, 1, 0);
                Ok(Some(E::decode(key, &value)?))
            }
        }
    }

    /* ↓↓↓ Primary mappings ↓↓↓ */

    /// Read the full record of `event`.
    pub fn fetch(&self, event: &CryptoHash) -> Result<Option<EventRecord>, LedgerError> {
        let record = self.kv.event_record(event)?;
        self.count(IndexName::Events, 1, u64::from(record.is_some()));
        Ok(record)
    }

    /// Read the full record of `event`, which an entry of `index` says is stored.
    pub fn fetch_indexed(
        &self,
        index: IndexName,
        event: &CryptoHash,
    ) -> Result<EventRecord, LedgerError> {
        Ok(self
            .fetch(event)?
            .ok_or(Inconsistency::DanglingIndexEntry {
                index,
                event: *event,
            })?)
    }

    pub fn replayer(&self, creator: &PeerId) -> Result<Option<BlockHeight>, LedgerError> {
        let block_height = self.kv.replayer(creator)?;
        self.count(IndexName::Replayers, u64::from(block_height.is_some()), 0);
        Ok(block_height)
    }

    pub fn genesis_merge_event(&self) -> Result<Option<CryptoHash>, LedgerError> {
        let genesis = self.kv.genesis_merge_event()?;
        self.count(IndexName::GenesisMergeEvent, u64::from(genesis.is_some()), 0);
        Ok(genesis)
    }

    pub fn block(&self, block_height: BlockHeight) -> Result<Option<Block>, LedgerError> {
        let block = self.kv.block(block_height)?;
        let found = u64::from(block.is_some());
        self.count(IndexName::BlockByHeight, found, found);
        Ok(block)
    }

    pub fn latest_block_height(&self) -> Result<Option<BlockHeight>, LedgerError> {
        let block_height = self.kv.latest_block_height()?;
        self.count(IndexName::BlockByHeight, u64::from(block_height.is_some()), 0);
        Ok(block_height)
    }

    /* ↓↓↓ Plan bookkeeping ↓↓↓ */

    fn touch(&self, index: IndexName) {
        self.count(index, 0, 0)
    }

    fn count(&self, index: IndexName, keys: u64, docs: u64) {
        let mut stages = self.stages.borrow_mut();
        match stages.iter_mut().find(|stage| stage.index == index) {
            Some(stage) => {
                stage.keys_examined += keys;
                stage.docs_examined += docs;
            }
            None => stages.push(PlanStage {
                index,
                keys_examined: keys,
                docs_examined: docs,
            }),
        }
    }
}
