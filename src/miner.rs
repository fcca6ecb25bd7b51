//! Proof-of-work search and verification
//!
//! Difficulty `d` means the header hash, read as a 256-bit big-endian
//! integer, must be below `2^(256 - d)`; equivalently it starts with at
//! least `d` zero bits.

use crate::error::ChainError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub const MAX_DIFFICULTY: u32 = 256;
pub const DEFAULT_DIFFICULTY: u32 = 4;

/// Largest nonce a block may carry; nonces travel as signed 64-bit integers.
pub const MAX_NONCE: u64 = i64::MAX as u64;

// Cancellation and deadline are polled once per this many nonces.
const CHECK_INTERVAL: u64 = 1024;

/// Something with a nonce whose header hash can be searched.
pub trait Mineable {
    /// Hex header hash at the current nonce.
    fn header_hash(&self) -> Result<String, ChainError>;
    fn set_nonce(&mut self, nonce: u64);
}

/// Shared flag that stops an in-progress search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Bounds on a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MiningLimits {
    /// Highest nonce tried, inclusive. Capped at [`MAX_NONCE`].
    pub max_nonce: u64,
    pub timeout: Option<Duration>,
}

impl Default for MiningLimits {
    fn default() -> Self {
        MiningLimits {
            max_nonce: MAX_NONCE,
            timeout: None,
        }
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinedProof {
    pub hash: String,
    pub nonce: u64,
    pub attempts: u64,
}

/// Largest hash value that still satisfies `difficulty`, big-endian.
pub fn hash_to_target(difficulty: u32) -> [u8; 32] {
    let mut target = [0xFF; 32];
    let leading_zeros = (difficulty.min(MAX_DIFFICULTY) / 8) as usize;
    let partial_bits = difficulty % 8;

    for byte in target.iter_mut().take(leading_zeros) {
        *byte = 0;
    }
    if leading_zeros < 32 && partial_bits > 0 {
        target[leading_zeros] = 0xFF >> partial_bits;
    }
    target
}

/// Returns true if the hex `hash` meets `difficulty`. Malformed hashes,
/// hashes that are not 32 bytes, and difficulties above 256 never pass.
pub fn validate_pow(hash: &str, difficulty: u32) -> bool {
    if difficulty > MAX_DIFFICULTY {
        return false;
    }
    let bytes = match hex::decode(hash) {
        Ok(bytes) if bytes.len() == 32 => bytes,
        _ => return false,
    };
    bytes.as_slice() <= hash_to_target(difficulty).as_slice()
}

/// Searches nonces `0..=min(limits.max_nonce, MAX_NONCE)` for a header hash
/// meeting `difficulty`. On success the item is left at the winning nonce.
pub fn mine<M: Mineable>(
    item: &mut M,
    difficulty: u32,
    limits: &MiningLimits,
    cancel: &CancelToken,
) -> Result<MinedProof, ChainError> {
    if difficulty > MAX_DIFFICULTY {
        return Err(ChainError::Consensus(format!(
            "difficulty {} exceeds maximum {}",
            difficulty, MAX_DIFFICULTY
        )));
    }

    let deadline = limits.timeout.map(|t| Instant::now() + t);
    let mut attempts: u64 = 0;

    for nonce in 0..=limits.max_nonce.min(MAX_NONCE) {
        if nonce % CHECK_INTERVAL == 0 {
            if cancel.is_cancelled() {
                return Err(ChainError::MiningCancelled { attempts });
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(attempts, "mining deadline reached");
                return Err(ChainError::MiningCancelled { attempts });
            }
        }

        item.set_nonce(nonce);
        let hash = item.header_hash()?;
        attempts = attempts.saturating_add(1);

        if validate_pow(&hash, difficulty) {
            return Ok(MinedProof {
                hash,
                nonce,
                attempts,
            });
        }
    }

    Err(ChainError::MiningExhausted { attempts })
}

/// Advisory retargeting: one step harder when blocks arrive in under half the
/// target time, one step easier (never below 1) when they take over double.
pub fn suggest_difficulty(current: u32, target_block_time: Duration, actual: Duration) -> u32 {
    if actual < target_block_time / 2 {
        (current + 1).min(MAX_DIFFICULTY)
    } else if actual > target_block_time * 2 {
        current.saturating_sub(1).max(1)
    } else {
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::sha256_hex;

    struct Counter {
        nonce: u64,
    }

    impl Mineable for Counter {
        fn header_hash(&self) -> Result<String, ChainError> {
            Ok(sha256_hex(format!("counter:{}", self.nonce).as_bytes()))
        }

        fn set_nonce(&mut self, nonce: u64) {
            self.nonce = nonce;
        }
    }

    #[test]
    fn test_hash_to_target() {
        assert_eq!(hash_to_target(0), [0xFF; 32]);
        let t = hash_to_target(12);
        assert_eq!(t[0], 0);
        assert_eq!(t[1], 0x0F);
        assert_eq!(t[2], 0xFF);
        assert_eq!(hash_to_target(256), [0u8; 32]);
    }

    #[test]
    fn test_validate_pow_boundaries() {
        let zero = "00".repeat(32);
        let ones = "ff".repeat(32);
        assert!(validate_pow(&zero, 256));
        assert!(!validate_pow(&zero, 257));
        assert!(validate_pow(&ones, 0));
        assert!(!validate_pow(&ones, 1));

        // exactly 4 leading zero bits
        let h = format!("0f{}", "ff".repeat(31));
        assert!(validate_pow(&h, 4));
        assert!(!validate_pow(&h, 5));

        assert!(!validate_pow("zz", 0));
        assert!(!validate_pow("00", 0));
    }

    #[test]
    fn test_mine_finds_consistent_proof() {
        let mut item = Counter { nonce: 0 };
        let proof = mine(&mut item, 8, &MiningLimits::default(), &CancelToken::new()).unwrap();

        assert_eq!(item.nonce, proof.nonce);
        assert_eq!(item.header_hash().unwrap(), proof.hash);
        assert!(validate_pow(&proof.hash, 8));
        assert!(proof.hash.starts_with("00"));
        assert_eq!(proof.attempts, proof.nonce + 1);
    }

    #[test]
    fn test_mine_exhausts_nonce_space() {
        let mut item = Counter { nonce: 0 };
        let limits = MiningLimits {
            max_nonce: 9,
            timeout: None,
        };
        let err = mine(&mut item, 200, &limits, &CancelToken::new()).unwrap_err();
        assert_eq!(err, ChainError::MiningExhausted { attempts: 10 });
        assert!(err.is_retryable());
    }

    #[test]
    fn test_mine_honours_cancellation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut item = Counter { nonce: 0 };
        let err = mine(&mut item, 1, &MiningLimits::default(), &cancel).unwrap_err();
        assert_eq!(err, ChainError::MiningCancelled { attempts: 0 });
    }

    #[test]
    fn test_mine_honours_timeout() {
        let limits = MiningLimits {
            max_nonce: u64::MAX,
            timeout: Some(Duration::ZERO),
        };
        let mut item = Counter { nonce: 0 };
        let err = mine(&mut item, 256, &limits, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ChainError::MiningCancelled { .. }));
    }

    #[test]
    fn test_mine_rejects_impossible_difficulty() {
        let mut item = Counter { nonce: 0 };
        let err = mine(&mut item, 300, &MiningLimits::default(), &CancelToken::new()).unwrap_err();
        assert!(matches!(err, ChainError::Consensus(_)));
    }

    #[test]
    fn test_suggest_difficulty() {
        let target = Duration::from_secs(10);
        assert_eq!(suggest_difficulty(4, target, Duration::from_secs(4)), 5);
        assert_eq!(suggest_difficulty(4, target, Duration::from_secs(10)), 4);
        assert_eq!(suggest_difficulty(4, target, Duration::from_secs(21)), 3);
        assert_eq!(suggest_difficulty(1, target, Duration::from_secs(60)), 1);
    }
}
