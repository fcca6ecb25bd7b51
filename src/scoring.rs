//! Advisory transaction scoring
//!
//! A scorer looks at summary features of a transaction and reports how
//! anomalous it seems and how adequate its fee is. Scores never affect
//! validity or consensus; the only effect is an optional admission gate,
//! and that gate fails open when the scorer itself fails.

use crate::blockchain::UtxoSet;
use crate::error::ChainError;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_ANOMALY_THRESHOLD: f64 = 0.7;

/// Summary features handed to a scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxFeatures {
    pub num_inputs: usize,
    pub num_outputs: usize,
    pub total_input: f64,
    pub total_output: f64,
    pub fee: f64,
    /// Fee per byte of canonical encoding.
    pub fee_rate: f64,
    /// Total output over total input; 0 when nothing is spent.
    pub change_ratio: f64,
    /// Distinct owners among the spent outputs.
    pub input_diversity: usize,
}

impl TxFeatures {
    /// Extracts features for `tx`, resolving input values through `utxo`.
    /// Inputs that are not in `utxo` contribute nothing.
    pub fn extract(tx: &Transaction, utxo: &UtxoSet) -> Result<Self, ChainError> {
        let mut total_input = 0.0;
        let mut owners = HashSet::new();
        for input in &tx.inputs {
            if let Some(spent) = utxo.get(&input.output_ref()) {
                total_input += spent.amount.value();
                owners.insert(spent.address.as_str());
            }
        }

        let total_output: f64 = tx.outputs.iter().map(|o| o.amount.value()).sum();
        let fee = (total_input - total_output).max(0.0);
        let size = tx.signable_message()?.len().max(1) as f64;

        Ok(TxFeatures {
            num_inputs: tx.inputs.len(),
            num_outputs: tx.outputs.len(),
            total_input,
            total_output,
            fee,
            fee_rate: fee / size,
            change_ratio: if total_input > 0.0 {
                total_output / total_input
            } else {
                0.0
            },
            input_diversity: owners.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// 0.0 is normal, 1.0 highly anomalous.
    pub anomaly_score: f64,
    /// 0.0 is a low fee, 1.0 a generous one.
    pub fee_adequacy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Score {
    /// The score used whenever scoring is off or unavailable.
    pub fn neutral() -> Self {
        Score {
            anomaly_score: 0.0,
            fee_adequacy: 0.5,
            message: None,
        }
    }
}

/// Pluggable scoring backend.
pub trait TransactionScorer: Send + Sync {
    fn score(&self, features: &TxFeatures) -> Result<Score, ChainError>;
}

/// Scorer that always reports [`Score::neutral`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralScorer;

impl TransactionScorer for NeutralScorer {
    fn score(&self, _features: &TxFeatures) -> Result<Score, ChainError> {
        Ok(Score::neutral())
    }
}

/// Optional gate applied at mempool admission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdmissionPolicy {
    pub enabled: bool,
    pub anomaly_threshold: f64,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        AdmissionPolicy {
            enabled: false,
            anomaly_threshold: DEFAULT_ANOMALY_THRESHOLD,
        }
    }
}

impl AdmissionPolicy {
    /// Scores `features` and rejects only when a successful score is above
    /// the threshold. Scorer errors are logged and yield the neutral score.
    pub fn evaluate(
        &self,
        scorer: &dyn TransactionScorer,
        features: &TxFeatures,
    ) -> Result<Score, ChainError> {
        if !self.enabled {
            return Ok(Score::neutral());
        }

        let score = match scorer.score(features) {
            Ok(score) => score,
            Err(e) => {
                warn!(error = %e, "transaction scorer failed, admitting with neutral score");
                return Ok(Score::neutral());
            }
        };
        debug!(
            anomaly = score.anomaly_score,
            fee_adequacy = score.fee_adequacy,
            "transaction scored"
        );

        if score.anomaly_score > self.anomaly_threshold {
            return Err(ChainError::Admission(format!(
                "anomaly score {:.2} exceeds threshold {:.2}",
                score.anomaly_score, self.anomaly_threshold
            )));
        }
        Ok(score)
    }
}
