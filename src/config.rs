//! Configuration management for the ledger node
//!
//! Every key is optional; an absent file or section yields the defaults.
//!
//! ```toml
//! log_level = "info"
//!
//! [ledger]
//! difficulty = 4
//! block_validation = "chain-state"   # or "intra-block"
//!
//! [genesis]
//! address = "0000000000000000000000000000000000000000"
//! amount = 1000.0
//! timestamp = 1700000000
//!
//! [mining]
//! max_nonce = 9223372036854775807
//! timeout_secs = 60                  # 0 disables the timeout
//!
//! [admission]
//! scorer_enabled = false
//! anomaly_threshold = 0.7
//! ```

use crate::blockchain::BlockValidationMode;
use crate::error::ChainError;
use crate::miner::{MiningLimits, DEFAULT_DIFFICULTY, MAX_DIFFICULTY, MAX_NONCE};
use crate::scoring::{AdmissionPolicy, DEFAULT_ANOMALY_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    #[serde(default)]
    pub block_validation: BlockValidationMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default = "default_genesis_address")]
    pub address: String,
    #[serde(default = "default_genesis_amount")]
    pub amount: f64,
    #[serde(default = "default_genesis_timestamp")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    #[serde(default = "default_max_nonce")]
    pub max_nonce: u64,
    #[serde(default = "default_mining_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default)]
    pub scorer_enabled: bool,
    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            ledger: LedgerConfig::default(),
            genesis: GenesisConfig::default(),
            mining: MiningConfig::default(),
            admission: AdmissionConfig::default(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            block_validation: BlockValidationMode::default(),
        }
    }
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            address: default_genesis_address(),
            amount: default_genesis_amount(),
            timestamp: default_genesis_timestamp(),
        }
    }
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            max_nonce: default_max_nonce(),
            timeout_secs: default_mining_timeout(),
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            scorer_enabled: false,
            anomaly_threshold: default_anomaly_threshold(),
        }
    }
}

impl MiningConfig {
    pub fn limits(&self) -> MiningLimits {
        MiningLimits {
            max_nonce: self.max_nonce,
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

impl AdmissionConfig {
    pub fn policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            enabled: self.scorer_enabled,
            anomaly_threshold: self.anomaly_threshold,
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ChainError> {
        let config: Config = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ChainError> {
        if self.ledger.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::Config(format!(
                "ledger.difficulty must be at most {}, got {}",
                MAX_DIFFICULTY, self.ledger.difficulty
            )));
        }
        if self.genesis.address.is_empty() {
            return Err(ChainError::Config("genesis.address must be set".to_string()));
        }
        if !(self.genesis.amount.is_finite() && self.genesis.amount > 0.0) {
            return Err(ChainError::Config(format!(
                "genesis.amount must be positive, got {}",
                self.genesis.amount
            )));
        }
        if self.mining.max_nonce > MAX_NONCE {
            return Err(ChainError::Config(format!(
                "mining.max_nonce must be at most {}, got {}",
                MAX_NONCE, self.mining.max_nonce
            )));
        }
        if !(0.0..=1.0).contains(&self.admission.anomaly_threshold) {
            return Err(ChainError::Config(format!(
                "admission.anomaly_threshold must be within [0, 1], got {}",
                self.admission.anomaly_threshold
            )));
        }
        Ok(())
    }
}

/// Loads configuration from `path`, or returns the defaults when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<Config, ChainError> {
    match path {
        Some(path) => {
            let config_str = fs::read_to_string(path).map_err(|e| {
                ChainError::Config(format!("failed to read {}: {}", path.display(), e))
            })?;
            Config::from_toml_str(&config_str)
        }
        None => Ok(Config::default()),
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_difficulty() -> u32 {
    DEFAULT_DIFFICULTY
}

fn default_genesis_address() -> String {
    "0000000000000000000000000000000000000000".to_string()
}

fn default_genesis_amount() -> f64 {
    1000.0
}

fn default_genesis_timestamp() -> i64 {
    1_700_000_000
}

fn default_max_nonce() -> u64 {
    MAX_NONCE
}

fn default_mining_timeout() -> u64 {
    60
}

fn default_anomaly_threshold() -> f64 {
    DEFAULT_ANOMALY_THRESHOLD
}
