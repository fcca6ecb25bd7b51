//! utxo-ledger - a single-node UTXO ledger with Merkle commitments and proof-of-work
//!
//! # Architecture
//!
//! The crate is organized into logical modules:
//!
//! ## Core Ledger
//! - [`transaction`] - Transaction types, canonical encoding and validation
//! - [`merkle`] - Merkle root over transaction ids
//! - [`blockchain`] - Blocks, UTXO set, ledger and block validation
//! - [`mempool`] - Pending transaction pool
//!
//! ## Consensus
//! - [`miner`] - Proof-of-work search, verification and difficulty hints
//!
//! ## Cryptography
//! - [`crypto`] - SHA-256 helpers and P-256 ECDSA signatures
//!
//! ## Node
//! - [`node`] - Facade that serialises block application and drives mining
//! - [`scoring`] - Advisory transaction scoring and admission policy
//!
//! ## Configuration & Utilities
//! - [`config`] - TOML configuration
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod mempool;
pub mod merkle;
pub mod transaction;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// Cryptography
// ============================================================================
pub mod crypto;

// ============================================================================
// Node
// ============================================================================
pub mod node;
pub mod scoring;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;

pub use error::{ChainError, ErrorKind, Result};
