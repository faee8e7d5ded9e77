/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions for the 'block' type, the per-height consensus checkpoint.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::*;

/// A consensus checkpoint. Blocks are created once per height and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub block_height: BlockHeight,
    /// Creators whose consensus merge events contributed to this block, sorted and de-duplicated.
    pub witness: Vec<PeerId>,
    /// Hashes of the merge events that together prove consensus on this block.
    pub consensus_proof_hash: Vec<CryptoHash>,
}

impl Block {
    pub fn new(
        block_height: BlockHeight,
        witness: impl IntoIterator<Item = PeerId>,
        consensus_proof_hash: Vec<CryptoHash>,
    ) -> Block {
        let mut witness: Vec<PeerId> = witness.into_iter().collect();
        witness.sort();
        witness.dedup();
        Block {
            block_height,
            witness,
            consensus_proof_hash,
        }
    }

    pub fn is_witness(&self, peer: &PeerId) -> bool {
        self.witness.binary_search(peer).is_ok()
    }
}
