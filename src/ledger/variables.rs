/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Byte-prefixes that specify where each ledger variable is stored in the user-provided key-value
//! store, and the order-preserving codec used to form index keys.
//!
//! # List of State Variables
//!
//! |Variable|Type|Description|
//! |---|---|---|
//! |Events|[`CryptoHash`] -> [`Event`](crate::types::event::Event)|Immutable event bodies, keyed by their content hash.|
//! |Event Meta|[`CryptoHash`] -> [`EventMeta`](crate::types::event::EventMeta)|Local event number and arrival time of every stored event.|
//! |Event Annotations|[`CryptoHash`] -> [`Annotation`](crate::types::event::Annotation)|The mutable, versioned consensus bookkeeping of every stored event.|
//! |Next Local Event Number|[`LocalEventNumber`](crate::types::data_types::LocalEventNumber)|The local event number the next inserted event receives.|
//! |Replayers|[`PeerId`] -> [`BlockHeight`]|The block height at which each condemned creator was first confirmed as a replayer.|
//! |Genesis Merge Event|[`CryptoHash`]|Hash of the first generation-0 merge event stored.|
//! |Blocks|[`BlockHeight`] -> [`Block`](crate::types::block::Block)|Append-only consensus checkpoints.|
//! |Latest Block Height|[`BlockHeight`]|Height of the highest block stored.|
//!
//! # Persistence of state variables
//!
//! Single values (e.g., the latest block height) are stored in one-byte, constant keys sharing the
//! variable's name. Mappings of the form "`A` -> `B`" are stored in multiple keys, each key being the
//! concatenation of the variable's one-byte prefix and the bytes of an instance of `A`. All values
//! are Borsh-serialized.
//!
//! Block heights inside keys are encoded big-endian, so that the keys of the Blocks mapping (and of
//! every index that contains a height) iterate in height order.
//!
//! # Indexes
//!
//! Every secondary index lives under [`INDEXES`] followed by the index's one-byte
//! [id](super::indexes::IndexName::id). Index keys are built with [`KeyBuilder`], whose encodings
//! preserve the order of the encoded values:
//!
//! |Value|Encoding|
//! |---|---|
//! |`u64`-backed numbers|8 bytes, big-endian.|
//! |`Option<BlockHeight>` and `Option<Generation>`|A byte `0` for `None`, or a byte `1` followed by `n` as 8 bytes big-endian for `Some(n)`. `None` sorts before every real value.|
//! |[`ReplayStatus`]|Encoded as `Option<BlockHeight>`: `None` for `Clean`, `Some(h)` for `DetectedAt(h)`.|
//! |[`CryptoHash`] and [`PeerId`]|The 32 raw bytes.|
//! |`Option<PeerId>`|`0` for `None`, `1` followed by the 32 raw bytes for `Some`.|
//! |`bool`|`0` or `1`.|

use crate::types::data_types::{BlockHeight, CryptoHash, PeerId, ReplayStatus};

// State variables
pub const EVENTS: [u8; 1] = [0];
pub const EVENT_META: [u8; 1] = [1];
pub const EVENT_ANNOTATIONS: [u8; 1] = [2];
pub const NEXT_LOCAL_EVENT_NUMBER: [u8; 1] = [3];
pub const REPLAYERS: [u8; 1] = [4];
pub const GENESIS_MERGE_EVENT: [u8; 1] = [5];
pub const BLOCKS: [u8; 1] = [6];
pub const LATEST_BLOCK_HEIGHT: [u8; 1] = [7];

// Secondary indexes
pub const INDEXES: [u8; 1] = [8];

/// Concatenate two byteslices into one vector.
pub fn concat(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut res = Vec::with_capacity(a.len() + b.len());
    res.extend_from_slice(a);
    res.extend_from_slice(b);
    res
}

pub fn block_key(block_height: BlockHeight) -> Vec<u8> {
    concat(&BLOCKS, &block_height.int().to_be_bytes())
}

/// Builds a key out of order-preserving encodings of its fields.
#[derive(Clone, Debug)]
pub struct KeyBuilder(Vec<u8>);

impl KeyBuilder {
    pub fn new(prefix: &[u8]) -> KeyBuilder {
        KeyBuilder(prefix.to_vec())
    }

    pub fn u8(mut self, byte: u8) -> KeyBuilder {
        self.0.push(byte);
        self
    }

    pub fn u64(mut self, int: u64) -> KeyBuilder {
        self.0.extend_from_slice(&int.to_be_bytes());
        self
    }

    pub fn bool(self, flag: bool) -> KeyBuilder {
        self.u8(flag as u8)
    }

    pub fn hash(mut self, hash: &CryptoHash) -> KeyBuilder {
        self.0.extend_from_slice(&hash.bytes());
        self
    }

    pub fn peer(mut self, peer: &PeerId) -> KeyBuilder {
        self.0.extend_from_slice(&peer.bytes());
        self
    }

    pub fn opt_peer(self, peer: Option<&PeerId>) -> KeyBuilder {
        match peer {
            None => self.u8(0),
            Some(peer) => self.u8(1).peer(peer),
        }
    }

    /// Encode an optional `u64`-backed number so that `None` sorts first.
    pub fn opt_u64(self, int: Option<u64>) -> KeyBuilder {
        match int {
            None => self.u8(0),
            Some(int) => self.u8(1).u64(int),
        }
    }

    pub fn opt_height(self, block_height: Option<BlockHeight>) -> KeyBuilder {
        self.opt_u64(block_height.map(|height| height.int()))
    }

    pub fn replay_status(self, replay: ReplayStatus) -> KeyBuilder {
        match replay {
            ReplayStatus::Clean => self.opt_u64(None),
            ReplayStatus::DetectedAt(height) => self.opt_u64(Some(height.int())),
        }
    }

    pub fn build(self) -> Vec<u8> {
        self.0
    }
}

/// Reads the fields of a key written by [`KeyBuilder`], in the same order. Every method returns
/// `None` if the key ends early or holds a value that no `KeyBuilder` method writes.
#[derive(Clone, Debug)]
pub struct KeyReader<'a> {
    bytes: &'a [u8],
}

impl<'a> KeyReader<'a> {
    /// Start reading `key` after its first `prefix_len` bytes.
    pub fn new(key: &'a [u8], prefix_len: usize) -> Option<KeyReader<'a>> {
        key.get(prefix_len..).map(|bytes| KeyReader { bytes })
    }

    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let head = self.bytes.get(..N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(head);
        self.bytes = &self.bytes[N..];
        Some(array)
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.take::<1>().map(|[byte]| byte)
    }

    pub fn u64(&mut self) -> Option<u64> {
        self.take::<8>().map(u64::from_be_bytes)
    }

    pub fn bool(&mut self) -> Option<bool> {
        match self.u8()? {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }
    }

    pub fn hash(&mut self) -> Option<CryptoHash> {
        self.take::<32>().map(CryptoHash::new)
    }

    pub fn peer(&mut self) -> Option<PeerId> {
        self.take::<32>().map(PeerId::new)
    }

    pub fn opt_peer(&mut self) -> Option<Option<PeerId>> {
        match self.u8()? {
            0 => Some(None),
            1 => self.peer().map(Some),
            _ => None,
        }
    }

    pub fn opt_u64(&mut self) -> Option<Option<u64>> {
        match self.u8()? {
            0 => Some(None),
            1 => self.u64().map(Some),
            _ => None,
        }
    }

    pub fn opt_height(&mut self) -> Option<Option<BlockHeight>> {
        self.opt_u64()
            .map(|int| int.map(BlockHeight::new))
    }

    pub fn replay_status(&mut self) -> Option<ReplayStatus> {
        self.opt_height().map(|height| match height {
            None => ReplayStatus::Clean,
            Some(height) => ReplayStatus::DetectedAt(height),
        })
    }

    /// Whether every byte of the key has been read.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
