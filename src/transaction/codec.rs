//! Canonical transaction encoding
//!
//! Compact JSON of `{"inputs":[..],"outputs":[..]}` with inputs ordered by
//! `(tx_id, index)` and outputs by `(address, amount)`. No trailing newline,
//! no HTML escaping, amounts written the way Go's `encoding/json` writes a
//! float64. Both the transaction id and the signed message are
//! derived from these bytes, so any reordering of the caller's vectors
//! yields the same id.

use crate::crypto::sha256_hex;
use crate::error::ChainError;
use crate::transaction::types::{InputRef, Output, TxId};
use serde::Serialize;

#[derive(Serialize)]
struct CanonicalTransaction<'a> {
    inputs: Vec<&'a InputRef>,
    outputs: Vec<&'a Output>,
}

/// Canonical bytes for a set of inputs and outputs. The slices are not reordered.
pub fn encode(inputs: &[InputRef], outputs: &[Output]) -> Result<Vec<u8>, ChainError> {
    let mut sorted_inputs: Vec<&InputRef> = inputs.iter().collect();
    sorted_inputs.sort_by(|a, b| a.tx_id.cmp(&b.tx_id).then(a.index.cmp(&b.index)));

    let mut sorted_outputs: Vec<&Output> = outputs.iter().collect();
    sorted_outputs.sort_by(|a, b| {
        a.address
            .cmp(&b.address)
            .then(a.amount.value().total_cmp(&b.amount.value()))
    });

    let canonical = CanonicalTransaction {
        inputs: sorted_inputs,
        outputs: sorted_outputs,
    };
    Ok(serde_json::to_vec(&canonical)?)
}

/// Hex SHA-256 of the canonical encoding.
pub fn transaction_id(inputs: &[InputRef], outputs: &[Output]) -> Result<TxId, ChainError> {
    Ok(sha256_hex(&encode(inputs, outputs)?))
}
