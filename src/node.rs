//! Node facade: ties the ledger, mempool, miner and admission policy together
//!
//! The ledger sits behind a single `RwLock`; only block application takes
//! the write side. Mining runs without holding any lock and re-validates the
//! finished block under the write lock before appending it.

use crate::blockchain::{
    create_genesis_block, validate_block, Block, BlockValidationMode, Ledger, UtxoSet,
};
use crate::config::Config;
use crate::error::ChainError;
use crate::mempool::Mempool;
use crate::miner::{CancelToken, MiningLimits};
use crate::scoring::{AdmissionPolicy, NeutralScorer, TransactionScorer, TxFeatures};
use crate::transaction::{Amount, Transaction, TxId};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

/// Tunables that stay fixed for the life of a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeSettings {
    pub difficulty: u32,
    pub validation_mode: BlockValidationMode,
    pub mining_limits: MiningLimits,
    pub admission: AdmissionPolicy,
}

impl NodeSettings {
    pub fn from_config(config: &Config) -> Self {
        NodeSettings {
            difficulty: config.ledger.difficulty,
            validation_mode: config.ledger.block_validation,
            mining_limits: config.mining.limits(),
            admission: config.admission.policy(),
        }
    }
}

pub struct Node {
    ledger: RwLock<Ledger>,
    mempool: Mempool,
    scorer: Box<dyn TransactionScorer>,
    settings: NodeSettings,
}

impl Node {
    pub fn new(ledger: Ledger, settings: NodeSettings) -> Self {
        Node {
            ledger: RwLock::new(ledger),
            mempool: Mempool::new(),
            scorer: Box::new(NeutralScorer),
            settings,
        }
    }

    /// Mines the configured genesis block and starts a node on top of it.
    pub fn from_config(config: &Config) -> Result<Self, ChainError> {
        config.validate()?;
        let settings = NodeSettings::from_config(config);
        let genesis = create_genesis_block(
            &config.genesis,
            settings.difficulty,
            &settings.mining_limits,
        )?;
        info!(
            address = %config.genesis.address,
            amount = config.genesis.amount,
            difficulty = settings.difficulty,
            "initialised ledger from genesis"
        );
        Ok(Self::new(Ledger::new(genesis)?, settings))
    }

    pub fn with_scorer(mut self, scorer: Box<dyn TransactionScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Validates `tx` against the confirmed UTXO set, runs the admission
    /// policy and places it in the mempool. Returns the transaction id.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<TxId, ChainError> {
        let features = {
            let ledger = self.ledger.read();
            tx.validate(ledger.utxo())?;
            TxFeatures::extract(&tx, ledger.utxo())?
        };

        let score = self
            .settings
            .admission
            .evaluate(self.scorer.as_ref(), &features)
            .inspect_err(|e| warn!(tx = %tx.id, error = %e, "transaction rejected by policy"))?;

        let id = tx.id.clone();
        self.mempool.admit(tx)?;
        info!(
            tx = %id,
            inputs = features.num_inputs,
            outputs = features.num_outputs,
            fee = features.fee,
            anomaly = score.anomaly_score,
            "transaction admitted to mempool"
        );
        Ok(id)
    }

    /// Builds a block from the pending transactions that are still valid
    /// against the chain, mines it and appends it.
    ///
    /// Pending transactions that no longer validate (for instance because a
    /// conflicting one was confirmed first) are evicted from the mempool.
    pub fn mine_pending(&self, cancel: &CancelToken) -> Result<Block, ChainError> {
        let pending = self.mempool.list();
        if pending.is_empty() {
            return Err(ChainError::Structural("no transactions in mempool".to_string()));
        }

        let (index, prev_hash, mut scratch) = {
            let ledger = self.ledger.read();
            (ledger.height(), ledger.tip().hash.clone(), ledger.utxo().clone())
        };

        let (selected, stale) = select_transactions(pending, &mut scratch);
        if !stale.is_empty() {
            warn!(count = stale.len(), "evicting pending transactions that no longer validate");
            self.mempool.remove_many(&stale);
        }
        if selected.is_empty() {
            return Err(ChainError::Structural(
                "no valid transactions to mine".to_string(),
            ));
        }

        let mut block = Block::candidate(index, prev_hash, selected)?;
        let proof = block.mine(self.settings.difficulty, &self.settings.mining_limits, cancel)?;
        debug!(nonce = proof.nonce, attempts = proof.attempts, "found proof of work");

        self.submit_block(block.clone())?;
        info!(
            index = block.index,
            hash = %block.hash,
            transactions = block.transactions.len(),
            "mined block"
        );
        Ok(block)
    }

    /// Validates `block` as the next block on the current tip and appends it,
    /// removing its transactions from the mempool.
    pub fn submit_block(&self, block: Block) -> Result<(), ChainError> {
        let mut ledger = self.ledger.write();
        if block.index != ledger.height() {
            return Err(ChainError::Consensus(format!(
                "block {} does not extend the tip at height {}",
                block.index,
                ledger.height()
            )));
        }
        validate_block(
            &block,
            &ledger,
            self.settings.difficulty,
            self.settings.validation_mode,
        )?;

        let confirmed = block.transaction_ids();
        ledger.add_block(block);
        drop(ledger);

        self.mempool.remove_many(&confirmed);
        Ok(())
    }

    pub fn balance_of(&self, address: &str) -> Result<Amount, ChainError> {
        self.ledger.read().balance_of(address)
    }

    pub fn tip(&self) -> Block {
        self.ledger.read().tip().clone()
    }

    pub fn height(&self) -> u64 {
        self.ledger.read().height()
    }

    pub fn blocks(&self) -> Vec<Block> {
        self.ledger.read().blocks().to_vec()
    }

    pub fn block(&self, index: u64) -> Option<Block> {
        self.ledger.read().block(index).cloned()
    }

    /// Looks up a confirmed transaction, returning it with its block index.
    pub fn find_transaction(&self, id: &str) -> Option<(u64, Transaction)> {
        self.ledger
            .read()
            .find_transaction(id)
            .map(|(block, tx)| (block.index, tx.clone()))
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.mempool.list()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }
}

/// Splits `pending` into transactions that apply cleanly in order on top of
/// `scratch` and the ids of those that do not.
fn select_transactions(
    pending: Vec<Transaction>,
    scratch: &mut UtxoSet,
) -> (Vec<Transaction>, Vec<TxId>) {
    let mut selected = Vec::with_capacity(pending.len());
    let mut stale = Vec::new();

    for tx in pending {
        match tx.validate(scratch) {
            Ok(()) => {
                scratch.apply_transaction(&tx);
                selected.push(tx);
            }
            Err(e) => {
                debug!(tx = %tx.id, error = %e, "dropping pending transaction");
                stale.push(tx.id);
            }
        }
    }

    (selected, stale)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::transaction::{InputRef, Output};

    fn node() -> Node {
        let mut config = Config::default();
        config.genesis.address = "A".to_string();
        config.ledger.difficulty = 2;
        Node::from_config(&config).unwrap()
    }

    fn spend_genesis(node: &Node, to: &str, value: i64) -> Transaction {
        let genesis_id = node.block(0).unwrap().transactions[0].id.clone();
        let keypair = KeyPair::generate();
        let mut tx = Transaction::new(
            vec![InputRef::new(genesis_id, 0)],
            vec![
                Output::new(to, Amount::new(value as f64)),
                Output::new("A", Amount::new((1000 - value) as f64)),
            ],
            1,
        )
        .unwrap();
        let signature = keypair.sign(&tx.signable_message().unwrap()).unwrap();
        tx.sign(signature.to_vec(), keypair.public_key_bytes().to_vec());
        tx
    }

    #[test]
    fn test_mining_with_empty_mempool_fails() {
        let node = node();
        let err = node.mine_pending(&CancelToken::new()).unwrap_err();
        assert!(matches!(err, ChainError::Structural(_)));
        assert_eq!(node.height(), 1);
    }

    #[test]
    fn test_conflicting_pending_transaction_is_evicted() {
        let node = node();
        let first = spend_genesis(&node, "B", 100);
        let second = spend_genesis(&node, "C", 200);
        node.submit_transaction(first.clone()).unwrap();
        node.submit_transaction(second.clone()).unwrap();

        let block = node.mine_pending(&CancelToken::new()).unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert!(node.pending_transactions().is_empty());

        let confirmed = &block.transactions[0].id;
        let loser = if confirmed == &first.id { &second } else { &first };
        assert!(node.find_transaction(&loser.id).is_none());
    }

    #[test]
    fn test_stale_block_is_rejected() {
        let node = node();
        let tip = node.tip();
        let mut block = Block::new(
            tip.index + 2,
            0,
            tip.hash.clone(),
            vec![spend_genesis(&node, "B", 1)],
        )
        .unwrap();
        block.mine(2, &MiningLimits::default(), &CancelToken::new()).unwrap();
        let err = node.submit_block(block).unwrap_err();
        assert!(err.to_string().contains("does not extend the tip"));
    }
}
