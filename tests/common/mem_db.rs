//! A simple, volatile, in-memory implementation of [`KVStore`].

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    ops::Bound,
    sync::{Arc, Mutex},
};

use continuity_storage::ledger::pluggables::{
    Direction, KVGet, KVIter, KVStore, KeyRange, WriteBatch, WriteConflict,
};

type Map = BTreeMap<Vec<u8>, Vec<u8>>;

/// An in-memory implementation of [`KVStore`].
#[derive(Clone)]
pub(crate) struct MemDB(Arc<Mutex<Map>>);

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB(Arc::new(Mutex::new(BTreeMap::new())))
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;
    type Snapshot<'a> = MemDBSnapshot;

    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), WriteConflict> {
        let mut map = self.0.lock().unwrap();
        for (key, expected) in &wb.preconditions {
            if map.get(key).map(Vec::as_slice) != expected.as_deref() {
                return Err(WriteConflict { key: key.clone() });
            }
        }
        for key in wb.deletions {
            map.remove(&key);
        }
        for (key, value) in wb.insertions {
            map.insert(key, value);
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.0.lock().unwrap().clear();
    }

    fn snapshot<'b>(&'b self) -> MemDBSnapshot {
        MemDBSnapshot(self.0.lock().unwrap().clone())
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.lock().unwrap().get(key).cloned()
    }

    fn range<'a>(&'a self, range: KeyRange, direction: Direction) -> KVIter<'a> {
        let pairs = collect_range(&self.0.lock().unwrap(), range, direction);
        Box::new(pairs.into_iter())
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
    preconditions: HashMap<Vec<u8>, Option<Vec<u8>>>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: HashMap::new(),
            deletions: HashSet::new(),
            preconditions: HashMap::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }

    fn require(&mut self, key: &[u8], expected: Option<&[u8]>) {
        self.preconditions
            .insert(key.to_vec(), expected.map(<[u8]>::to_vec));
    }
}

/// A copy of the contents of a `MemDB`, used as `KVStore::Snapshot` for `MemDB`.
pub(crate) struct MemDBSnapshot(Map);

impl KVGet for MemDBSnapshot {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key).cloned()
    }

    fn range<'a>(&'a self, range: KeyRange, direction: Direction) -> KVIter<'a> {
        Box::new(collect_range(&self.0, range, direction).into_iter())
    }
}

fn collect_range(map: &Map, range: KeyRange, direction: Direction) -> Vec<(Vec<u8>, Vec<u8>)> {
    if let Some(end) = &range.end {
        if *end <= range.start {
            return Vec::new();
        }
    }
    let end = match range.end {
        Some(end) => Bound::Excluded(end),
        None => Bound::Unbounded,
    };
    let pairs = map
        .range((Bound::Included(range.start), end))
        .map(|(key, value)| (key.clone(), value.clone()));
    match direction {
        Direction::Forward => pairs.collect(),
        Direction::Reverse => pairs.rev().collect(),
    }
}
