//! Pending transaction pool
//!
//! Holds validated, unconfirmed transactions keyed by id. The pool never
//! validates by itself; callers admit only transactions that already passed
//! validation against the current chain state.

use crate::error::ChainError;
use crate::transaction::{Transaction, TxId};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct Mempool {
    transactions: RwLock<HashMap<TxId, Transaction>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `tx`. A second transaction with the same id is rejected.
    pub fn admit(&self, tx: Transaction) -> Result<(), ChainError> {
        let mut pool = self.transactions.write();
        if pool.contains_key(&tx.id) {
            return Err(ChainError::Admission(format!(
                "transaction {} already in mempool",
                tx.id
            )));
        }
        pool.insert(tx.id.clone(), tx);
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<Transaction> {
        self.transactions.write().remove(id)
    }

    /// Removes every listed id under a single lock acquisition.
    pub fn remove_many<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut pool = self.transactions.write();
        for id in ids {
            pool.remove(id.as_ref());
        }
    }

    /// Snapshot of all pending transactions, ordered by id.
    pub fn list(&self) -> Vec<Transaction> {
        let mut pending: Vec<Transaction> = self.transactions.read().values().cloned().collect();
        pending.sort_by(|a, b| a.id.cmp(&b.id));
        pending
    }

    pub fn get(&self, id: &str) -> Option<Transaction> {
        self.transactions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.transactions.read().contains_key(id)
    }

    pub fn size(&self) -> usize {
        self.transactions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.read().is_empty()
    }

    pub fn clear(&self) {
        self.transactions.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Amount, Output};
    use std::sync::Arc;
    use std::thread;

    fn tx(address: &str) -> Transaction {
        Transaction::new(vec![], vec![Output::new(address, Amount::new(1.0))], 0).unwrap()
    }

    #[test]
    fn test_admit_rejects_duplicates() {
        let pool = Mempool::new();
        let t = tx("A");
        pool.admit(t.clone()).unwrap();
        let err = pool.admit(t.clone()).unwrap_err();
        assert!(matches!(err, ChainError::Admission(_)));
        assert_eq!(pool.size(), 1);
        assert!(pool.contains(&t.id));
    }

    #[test]
    fn test_list_is_sorted_and_remove_many() {
        let pool = Mempool::new();
        let txs: Vec<Transaction> = ["A", "B", "C", "D"].iter().map(|a| tx(a)).collect();
        for t in &txs {
            pool.admit(t.clone()).unwrap();
        }

        let listed = pool.list();
        assert!(listed.windows(2).all(|w| w[0].id < w[1].id));

        pool.remove_many([txs[0].id.as_str(), txs[1].id.as_str(), "unknown"]);
        assert_eq!(pool.size(), 2);
        assert!(pool.get(&txs[2].id).is_some());
        assert!(pool.remove(&txs[3].id).is_some());
        assert!(pool.remove(&txs[3].id).is_none());

        pool.clear();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_concurrent_admission_admits_exactly_once() {
        let pool = Arc::new(Mempool::new());
        let t = tx("A");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let pool = Arc::clone(&pool);
                let t = t.clone();
                thread::spawn(move || pool.admit(t).is_ok())
            })
            .collect();

        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
        assert_eq!(pool.size(), 1);
    }
}
