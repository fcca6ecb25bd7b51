use crate::config::GenesisConfig;
use crate::crypto::sha256_hex;
use crate::error::ChainError;
use crate::merkle::merkle_root;
use crate::miner::{self, CancelToken, Mineable, MinedProof, MiningLimits};
use crate::transaction::{Amount, Transaction};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::state::UtxoSet;

/// `prevHash` carried by the genesis block.
pub const GENESIS_PREV_HASH: &str = "0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    pub timestamp: i64,
    pub prev_hash: String,
    pub merkle_root: String,
    pub transactions: Vec<Transaction>,
    pub hash: String,
    pub nonce: u64,
}

/// Header fields covered by the block hash, in hashing order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashedHeader<'a> {
    index: u64,
    timestamp: i64,
    prev_hash: &'a str,
    merkle_root: &'a str,
    nonce: u64,
}

impl Block {
    /// Assembles an unmined block: nonce 0, Merkle root and hash filled in.
    pub fn new(
        index: u64,
        timestamp: i64,
        prev_hash: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ChainError> {
        let mut block = Block {
            index,
            timestamp,
            prev_hash: prev_hash.into(),
            merkle_root: String::new(),
            transactions,
            hash: String::new(),
            nonce: 0,
        };
        block.merkle_root = block.calculate_merkle_root();
        block.hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Like [`Block::new`], stamped with the current wall-clock time.
    pub fn candidate(
        index: u64,
        prev_hash: impl Into<String>,
        transactions: Vec<Transaction>,
    ) -> Result<Self, ChainError> {
        Self::new(index, chrono::Utc::now().timestamp(), prev_hash, transactions)
    }

    /// Hex SHA-256 of the compact JSON header `{index, timestamp, prevHash,
    /// merkleRoot, nonce}`. Transactions enter only through the Merkle root.
    pub fn calculate_hash(&self) -> Result<String, ChainError> {
        let header = HashedHeader {
            index: self.index,
            timestamp: self.timestamp,
            prev_hash: &self.prev_hash,
            merkle_root: &self.merkle_root,
            nonce: self.nonce,
        };
        Ok(sha256_hex(&serde_json::to_vec(&header)?))
    }

    pub fn calculate_merkle_root(&self) -> String {
        let ids: Vec<&str> = self.transactions.iter().map(|tx| tx.id.as_str()).collect();
        merkle_root(&ids)
    }

    pub fn transaction_ids(&self) -> Vec<String> {
        self.transactions.iter().map(|tx| tx.id.clone()).collect()
    }

    /// Searches for a nonce meeting `difficulty` and records the winning hash.
    pub fn mine(
        &mut self,
        difficulty: u32,
        limits: &MiningLimits,
        cancel: &CancelToken,
    ) -> Result<MinedProof, ChainError> {
        let proof = miner::mine(self, difficulty, limits, cancel)?;
        self.hash = proof.hash.clone();
        Ok(proof)
    }
}

impl Mineable for Block {
    fn header_hash(&self) -> Result<String, ChainError> {
        self.calculate_hash()
    }

    fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

/// Builds and mines the genesis block for `config`.
pub fn create_genesis_block(
    config: &GenesisConfig,
    difficulty: u32,
    limits: &MiningLimits,
) -> Result<Block, ChainError> {
    let amount = Amount::new(config.amount);
    if !(amount.is_finite() && amount > Amount::ZERO) {
        return Err(ChainError::Config(format!(
            "genesis amount {} must be a positive finite number",
            config.amount
        )));
    }
    let coinbase = Transaction::genesis(config.address.clone(), amount, config.timestamp)?;

    let mut genesis = Block::new(0, config.timestamp, GENESIS_PREV_HASH, vec![coinbase])?;
    let proof = genesis.mine(difficulty, limits, &CancelToken::new())?;
    info!(hash = %proof.hash, nonce = proof.nonce, "mined genesis block");
    Ok(genesis)
}

/// The ordered chain of accepted blocks and the UTXO set they produce.
///
/// Never empty: block 0 is the genesis block.
#[derive(Debug, Clone)]
pub struct Ledger {
    blocks: Vec<Block>,
    utxo: UtxoSet,
}

impl Ledger {
    /// Starts a chain from `genesis`. Its transactions are applied without
    /// validation since genesis outputs come from nothing.
    pub fn new(genesis: Block) -> Result<Self, ChainError> {
        if genesis.index != 0 {
            return Err(ChainError::Consensus(format!(
                "genesis block must have index 0, got {}",
                genesis.index
            )));
        }
        if genesis.prev_hash != GENESIS_PREV_HASH {
            return Err(ChainError::Consensus(format!(
                "genesis block must have prevHash \"{}\", got \"{}\"",
                GENESIS_PREV_HASH, genesis.prev_hash
            )));
        }

        let mut utxo = UtxoSet::new();
        for tx in &genesis.transactions {
            utxo.apply_transaction(tx);
        }

        Ok(Ledger {
            blocks: vec![genesis],
            utxo,
        })
    }

    pub fn tip(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Number of blocks, which is also the index the next block must carry.
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Appends `block` and applies its transactions to the UTXO set.
    /// Performs no validation; callers validate first.
    pub fn add_block(&mut self, block: Block) {
        for tx in &block.transactions {
            self.utxo.apply_transaction(tx);
        }
        self.blocks.push(block);
    }

    pub fn block(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn utxo(&self) -> &UtxoSet {
        &self.utxo
    }

    pub fn balance_of(&self, address: &str) -> Result<Amount, ChainError> {
        self.utxo.balance_of(address)
    }

    /// Locates a confirmed transaction and the block that holds it.
    pub fn find_transaction(&self, id: &str) -> Option<(&Block, &Transaction)> {
        self.blocks.iter().find_map(|block| {
            block
                .transactions
                .iter()
                .find(|tx| tx.id == id)
                .map(|tx| (block, tx))
        })
    }
}
