//! Merkle root hashes over fixed-size file blocks.
//!
//! Content is split into 4096-byte blocks, each block is hashed with
//! SHA-256, and the leaf list is folded in groups of up to 128 hashes
//! (block size / hash size) until one hash remains. Child hashes are
//! concatenated as-is, without a domain separation prefix.

use std::{fs, path::Path};

use sha2::{Digest, Sha256};

use super::constants::{TREE_HASH_BLOCK_SIZE, TREE_HASH_BRANCH_FACTOR};
use crate::error::{PackError, Result};

pub type RootHash = [u8; 32];

pub fn compute_root_hash(data: &[u8]) -> RootHash {
    let mut leaves: Vec<RootHash> = if data.is_empty() {
        vec![Sha256::digest(b"").into()]
    } else {
        data.chunks(TREE_HASH_BLOCK_SIZE)
            .map(|block| Sha256::digest(block).into())
            .collect()
    };

    while leaves.len() > 1 {
        leaves = leaves
            .chunks(TREE_HASH_BRANCH_FACTOR)
            .map(|group| {
                let mut hasher = Sha256::new();
                for child in group {
                    hasher.update(child);
                }
                hasher.finalize().into()
            })
            .collect();
    }

    leaves[0]
}

pub fn compute_file_root_hash(path: &Path) -> Result<RootHash> {
    let data = fs::read(path).map_err(|e| PackError::io(path, e))?;
    Ok(compute_root_hash(&data))
}
