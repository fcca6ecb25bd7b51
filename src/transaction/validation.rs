//! Validation logic for transactions separated from type definitions
use crate::blockchain::UtxoSet;
use crate::crypto::{self, sha256_hex};
use crate::error::ChainError;
use crate::transaction::codec;
use crate::transaction::types::{Amount, Transaction};
use std::collections::HashSet;

/// Maximum canonical encoding size of a single transaction, in bytes.
pub const MAX_TRANSACTION_SIZE: usize = 100_000;

impl Transaction {
    /// Checks that the required fields are present and well-formed, without
    /// touching ledger state.
    pub fn validate_structure(&self) -> Result<(), ChainError> {
        if !crypto::is_hash_hex(&self.id) {
            return Err(ChainError::Structural(format!(
                "transaction id must be 64 lowercase hex characters, got {:?}",
                self.id
            )));
        }
        if self.signature.is_empty() {
            return Err(ChainError::Structural("missing signature".to_string()));
        }
        if self.public_key.is_empty() {
            return Err(ChainError::Structural("missing public key".to_string()));
        }
        if let Some(i) = self.outputs.iter().position(|o| o.address.is_empty()) {
            return Err(ChainError::Structural(format!(
                "output {} has an empty address",
                i
            )));
        }
        if let Some(i) = self.outputs.iter().position(|o| !o.amount.is_finite()) {
            return Err(ChainError::Structural(format!(
                "output {} amount is not a finite number",
                i
            )));
        }
        Ok(())
    }

    /// Validates this transaction against `utxo`. Checks run in a fixed
    /// order and the first failure is returned.
    pub fn validate(&self, utxo: &UtxoSet) -> Result<(), ChainError> {
        self.validate_structure()?;

        let canonical = codec::encode(&self.inputs, &self.outputs)?;
        if canonical.len() > MAX_TRANSACTION_SIZE {
            return Err(ChainError::Structural(format!(
                "transaction encoding is {} bytes, limit is {}",
                canonical.len(),
                MAX_TRANSACTION_SIZE
            )));
        }

        let computed_id = sha256_hex(&canonical);
        if computed_id != self.id {
            return Err(ChainError::Tamper(format!(
                "transaction ID mismatch: expected {}, got {}",
                computed_id, self.id
            )));
        }

        let mut seen = HashSet::with_capacity(self.inputs.len());
        for input in &self.inputs {
            if !seen.insert(input.output_ref()) {
                return Err(ChainError::Ledger(format!(
                    "duplicate input detected: {}",
                    input
                )));
            }
        }

        let mut input_sum = Amount::ZERO;
        for input in &self.inputs {
            let output_ref = input.output_ref();
            let spent = utxo.get(&output_ref).ok_or_else(|| {
                ChainError::Ledger(format!("referenced UTXO not found: {}", output_ref))
            })?;
            input_sum = input_sum
                .checked_add(spent.amount)
                .ok_or_else(|| ChainError::Ledger("input sum overflows".to_string()))?;
        }

        if let Some(i) = self.outputs.iter().position(|o| o.amount <= Amount::ZERO) {
            return Err(ChainError::Ledger(format!(
                "output {} amount must be positive, got {}",
                i, self.outputs[i].amount
            )));
        }

        let output_sum = self.output_sum()?;
        if output_sum > input_sum {
            return Err(ChainError::Ledger(format!(
                "output value {} exceeds input value {}",
                output_sum, input_sum
            )));
        }

        crypto::verify_signature(&self.public_key, &canonical, &self.signature)
    }
}
