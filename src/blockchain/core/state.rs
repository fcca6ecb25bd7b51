use crate::error::ChainError;
use crate::transaction::{Amount, Output, OutputRef, Transaction};
use std::collections::BTreeMap;

/// Unspent transaction outputs keyed by `(tx_id, index)`.
///
/// Ordered so that iteration, and therefore coin selection, is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtxoSet {
    entries: BTreeMap<OutputRef, Output>,
}

impl UtxoSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, output_ref: &OutputRef) -> Option<&Output> {
        self.entries.get(output_ref)
    }

    pub fn contains(&self, output_ref: &OutputRef) -> bool {
        self.entries.contains_key(output_ref)
    }

    /// Inserts or replaces the entry at `(tx_id, index)`.
    pub fn add(&mut self, tx_id: &str, index: u32, output: Output) {
        self.entries.insert(OutputRef::new(tx_id, index), output);
    }

    /// Removes the entry if present. Spending an absent entry is a no-op.
    pub fn spend(&mut self, output_ref: &OutputRef) -> Option<Output> {
        self.entries.remove(output_ref)
    }

    /// Removes every referenced input, then adds every output under the
    /// transaction's id. Does not validate.
    pub fn apply_transaction(&mut self, tx: &Transaction) {
        for input in &tx.inputs {
            self.spend(&input.output_ref());
        }
        for (index, output) in tx.outputs.iter().enumerate() {
            self.add(&tx.id, index as u32, output.clone());
        }
    }

    /// Sum of all unspent amounts owned by `address`. Fails rather than
    /// clamping when the sum leaves the finite range.
    pub fn balance_of(&self, address: &str) -> Result<Amount, ChainError> {
        self.entries
            .values()
            .filter(|o| o.address == address)
            .try_fold(Amount::ZERO, |acc, o| {
                acc.checked_add(o.amount).ok_or_else(|| balance_overflow(address))
            })
    }

    /// Picks outputs owned by `address`, in key order, until their sum reaches
    /// `target`. Returns the accumulated sum and the chosen references; the sum
    /// falls short of `target` when the balance is insufficient.
    pub fn find_spendable_outputs(
        &self,
        address: &str,
        target: Amount,
    ) -> Result<(Amount, Vec<OutputRef>), ChainError> {
        let mut accumulated = Amount::ZERO;
        let mut chosen = Vec::new();

        for (output_ref, output) in &self.entries {
            if accumulated >= target {
                break;
            }
            if output.address == address {
                accumulated = accumulated
                    .checked_add(output.amount)
                    .ok_or_else(|| balance_overflow(address))?;
                chosen.push(output_ref.clone());
            }
        }

        Ok((accumulated, chosen))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn balance_overflow(address: &str) -> ChainError {
    ChainError::Ledger(format!("balance of {} overflows", address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::InputRef;

    fn amount(v: i64) -> Amount {
        Amount::new(v as f64)
    }

    #[test]
    fn test_add_get_spend() {
        let mut utxo = UtxoSet::new();
        utxo.add("t1", 0, Output::new("A", amount(5)));
        let key = OutputRef::new("t1", 0);

        assert_eq!(utxo.get(&key).map(|o| o.amount), Some(amount(5)));
        assert!(utxo.spend(&key).is_some());
        assert!(utxo.spend(&key).is_none());
        assert!(utxo.is_empty());
    }

    #[test]
    fn test_apply_transaction_spends_then_adds() {
        let genesis = Transaction::genesis("A", amount(1000), 0).unwrap();
        let mut utxo = UtxoSet::new();
        utxo.apply_transaction(&genesis);
        assert_eq!(utxo.balance_of("A").unwrap(), amount(1000));

        let transfer = Transaction::new(
            vec![InputRef::new(genesis.id.clone(), 0)],
            vec![Output::new("B", amount(100)), Output::new("A", amount(900))],
            1,
        )
        .unwrap();
        utxo.apply_transaction(&transfer);

        assert!(!utxo.contains(&OutputRef::new(genesis.id, 0)));
        assert_eq!(utxo.balance_of("A").unwrap(), amount(900));
        assert_eq!(utxo.balance_of("B").unwrap(), amount(100));
        assert_eq!(
            utxo.get(&OutputRef::new(transfer.id.clone(), 1)).map(|o| o.address.as_str()),
            Some("A")
        );
        assert_eq!(utxo.balance_of("nobody").unwrap(), Amount::ZERO);
    }

    #[test]
    fn test_find_spendable_outputs_stops_at_target() {
        let mut utxo = UtxoSet::new();
        utxo.add("a", 0, Output::new("A", amount(30)));
        utxo.add("b", 0, Output::new("B", amount(500)));
        utxo.add("c", 0, Output::new("A", amount(40)));
        utxo.add("d", 0, Output::new("A", amount(50)));

        let (sum, refs) = utxo.find_spendable_outputs("A", amount(60)).unwrap();
        assert_eq!(sum, amount(70));
        assert_eq!(refs, vec![OutputRef::new("a", 0), OutputRef::new("c", 0)]);

        let (sum, refs) = utxo.find_spendable_outputs("A", amount(1000)).unwrap();
        assert_eq!(sum, amount(120));
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let mut utxo = UtxoSet::new();
        utxo.add("a", 0, Output::new("A", Amount::new(f64::MAX)));
        utxo.add("b", 0, Output::new("A", Amount::new(f64::MAX)));

        let err = utxo.balance_of("A").unwrap_err();
        assert_eq!(err, ChainError::Ledger("balance of A overflows".to_string()));
        assert!(utxo
            .find_spendable_outputs("A", Amount::new(f64::INFINITY))
            .is_err());
        assert_eq!(
            utxo.find_spendable_outputs("A", Amount::new(1.0)).unwrap().1,
            vec![OutputRef::new("a", 0)]
        );
    }
}
