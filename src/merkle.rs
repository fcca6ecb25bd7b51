//! Merkle commitment over a block's transaction ids
//!
//! Leaves are the hex id strings themselves. Each parent is the hex SHA-256
//! of the two child hex strings concatenated as text, and an odd level pairs
//! its last element with itself.

use crate::crypto::sha256_hex;
use sha2::{Digest, Sha256};

/// Merkle root of `ids`, in order. An empty list commits to SHA-256 of nothing.
pub fn merkle_root<S: AsRef<str>>(ids: &[S]) -> String {
    if ids.is_empty() {
        return sha256_hex(&[]);
    }

    let mut level: Vec<String> = ids.iter().map(|id| id.as_ref().to_string()).collect();
    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level[level.len() - 1].clone();
            level.push(last);
        }
        level = level
            .chunks(2)
            .map(|pair| hash_pair(&pair[0], &pair[1]))
            .collect();
    }

    level.pop().unwrap_or_default()
}

fn hash_pair(left: &str, right: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    hex::encode(hasher.finalize())
}
