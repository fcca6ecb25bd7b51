use crate::error::ChainError;
use crate::miner::{validate_pow, MAX_NONCE};
use serde::{Deserialize, Serialize};

use super::chain::{Block, Ledger, GENESIS_PREV_HASH};
use super::state::UtxoSet;

/// Which UTXO view a block's transactions are checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockValidationMode {
    /// Start from an empty set, so only outputs created earlier in the same
    /// block are spendable. Rejects any block that spends a confirmed output.
    #[serde(rename = "intra-block")]
    IntraBlockOnly,
    /// Start from a copy of the ledger's UTXO set.
    #[default]
    ChainState,
}

/// Validates `block` as a successor within `ledger`. Checks run in order and
/// the first failure is returned:
///
/// 1. at least one transaction and a nonce no larger than [`MAX_NONCE`]
/// 2. stored hash matches the recomputed header hash
/// 3. stored Merkle root matches the transaction ids
/// 4. hash meets `difficulty`
/// 5. linkage to the previous block
/// 6. each transaction, in order, against a scratch UTXO set that absorbs
///    the transactions before it
pub fn validate_block(
    block: &Block,
    ledger: &Ledger,
    difficulty: u32,
    mode: BlockValidationMode,
) -> Result<(), ChainError> {
    if block.transactions.is_empty() {
        return Err(ChainError::Structural(
            "block must contain at least one transaction".to_string(),
        ));
    }
    if block.nonce > MAX_NONCE {
        return Err(ChainError::Structural(format!(
            "block nonce {} exceeds {}",
            block.nonce, MAX_NONCE
        )));
    }

    let computed_hash = block.calculate_hash()?;
    if computed_hash != block.hash {
        return Err(ChainError::Tamper(format!(
            "block hash mismatch: expected {}, got {}",
            computed_hash, block.hash
        )));
    }

    let computed_root = block.calculate_merkle_root();
    if computed_root != block.merkle_root {
        return Err(ChainError::Tamper(format!(
            "merkle root mismatch: expected {}, got {}",
            computed_root, block.merkle_root
        )));
    }

    if !validate_pow(&block.hash, difficulty) {
        return Err(ChainError::Consensus(format!(
            "block hash {} does not meet difficulty {}",
            block.hash, difficulty
        )));
    }

    validate_linkage(block, ledger)?;

    let mut scratch = match mode {
        BlockValidationMode::IntraBlockOnly => UtxoSet::new(),
        BlockValidationMode::ChainState => ledger.utxo().clone(),
    };
    for (index, tx) in block.transactions.iter().enumerate() {
        tx.validate(&scratch)
            .map_err(|e| ChainError::BlockTransaction {
                index,
                source: Box::new(e),
            })?;
        scratch.apply_transaction(tx);
    }

    Ok(())
}

fn validate_linkage(block: &Block, ledger: &Ledger) -> Result<(), ChainError> {
    if block.index == 0 {
        if block.prev_hash != GENESIS_PREV_HASH {
            return Err(ChainError::Consensus(format!(
                "genesis block must have prevHash \"{}\"",
                GENESIS_PREV_HASH
            )));
        }
        return Ok(());
    }

    let prev = ledger.block(block.index - 1).ok_or_else(|| {
        ChainError::Consensus(format!(
            "previous block {} not found",
            block.index - 1
        ))
    })?;
    if prev.hash != block.prev_hash {
        return Err(ChainError::Consensus(format!(
            "previous hash mismatch: expected {}, got {}",
            prev.hash, block.prev_hash
        )));
    }
    if block.index != prev.index + 1 {
        return Err(ChainError::Consensus(format!(
            "invalid block index: expected {}, got {}",
            prev.index + 1,
            block.index
        )));
    }
    Ok(())
}
