/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes, and do not have any major "active" behavior.

use std::{
    fmt::{self, Debug, Display, Formatter},
    hash::Hash,
};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::VerifyingKey;

/// Height of a block in the ledger.
///
/// Block heights are assigned by the consensus algorithm in increasing order. An event that has not
/// been ordered into a block has no block height at all (`Option<BlockHeight>` is `None`), rather than
/// a sentinel value.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// The height right after this one, or `None` at `u64::MAX`.
    pub fn next(&self) -> Option<BlockHeight> {
        self.0.checked_add(1).map(BlockHeight)
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

macro_rules! counter_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize,
            BorshSerialize,
        )]
        pub struct $name(u64);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` with an `int` inner value.")]
            pub const fn new(int: u64) -> Self {
                Self(int)
            }

            #[doc = concat!("Get the inner `u64` value of this `", stringify!($name), "`.")]
            pub const fn int(&self) -> u64 {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

counter_type!(
    /// Position of a merge event in its creator's own chain of merge events.
    ///
    /// The genesis merge event has generation 0, and every subsequent merge event of a creator has a
    /// generation exactly one greater than the event it extends.
    Generation
);

counter_type!(
    /// Deterministic tie-break order of a consensus event within its block.
    BlockOrder
);

counter_type!(
    /// Strictly increasing sequence number assigned by the local store to every event it accepts, in
    /// arrival order. Used as the gossip pagination cursor.
    LocalEventNumber
);

counter_type!(
    /// Creator-local counter embedded in merge events, incremented each time the creator is caught
    /// producing divergent chains.
    ReplayNumber
);

counter_type!(
    /// Sequence number of a ledger configuration proposal.
    ConfigSequence
);

impl Generation {
    /// The generation that precedes this one, or `None` for the genesis generation.
    pub fn prev(&self) -> Option<Generation> {
        self.0.checked_sub(1).map(Generation)
    }
}

/// 32-byte cryptographic hash.
///
/// Within this crate, `CryptoHash`-es identify events (the SHA256 hash of the event's Borsh
/// serialization) and appear inside events as parent references, tree hashes, commitments, and
/// operation hashes.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl Display for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for CryptoHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl From<[u8; 32]> for CryptoHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Identifier of a peer in the network: the bytes of the peer's Ed25519 verifying key.
///
/// Peers are compared and ordered bytewise, which is also the order in which they appear in index
/// keys.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub struct PeerId([u8; 32]);

impl PeerId {
    /// Create a new `PeerId` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the inner `[u8; 32]` value of this `PeerId`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

impl From<&VerifyingKey> for PeerId {
    fn from(verifying_key: &VerifyingKey) -> Self {
        PeerId(verifying_key.to_bytes())
    }
}

impl From<VerifyingKey> for PeerId {
    fn from(verifying_key: VerifyingKey) -> Self {
        PeerId::from(&verifying_key)
    }
}

impl TryFrom<PeerId> for VerifyingKey {
    type Error = ed25519_dalek::SignatureError;

    fn try_from(peer_id: PeerId) -> Result<Self, Self::Error> {
        VerifyingKey::from_bytes(&peer_id.0)
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD_NO_PAD.encode(self.0))
    }
}

impl Debug for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// Whether the creator of an event had been confirmed as a replayer when the event's annotation was
/// last written.
///
/// # Ordering
///
/// `Clean` orders before every `DetectedAt`, mirroring how an unset detection height sorts before
/// every real height in the index keys that contain it.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize,
)]
pub enum ReplayStatus {
    Clean,
    DetectedAt(BlockHeight),
}

impl Default for ReplayStatus {
    fn default() -> Self {
        ReplayStatus::Clean
    }
}

impl ReplayStatus {
    /// Whether an event with this status must be kept out of the future history of a peer whose basis
    /// block height is `basis_block_height`.
    ///
    /// `basis_block_height == None` means the caller has no basis yet, in which case nothing is
    /// excluded.
    pub fn excludes(&self, basis_block_height: Option<BlockHeight>) -> bool {
        match (self, basis_block_height) {
            (ReplayStatus::DetectedAt(detected), Some(basis)) => *detected <= basis,
            _ => false,
        }
    }

    /// Whether the replay had already been confirmed at `block_height`.
    pub fn detected_at_or_before(&self, block_height: BlockHeight) -> bool {
        match self {
            ReplayStatus::Clean => false,
            ReplayStatus::DetectedAt(detected) => *detected <= block_height,
        }
    }
}

/// A 2-tuple of a block height and an order within that block, which together position a consensus
/// event in the ledger's total order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, BorshDeserialize, BorshSerialize)]
pub struct ConsensusPosition {
    pub block_height: BlockHeight,
    pub block_order: BlockOrder,
}
