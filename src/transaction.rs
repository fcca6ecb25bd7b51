//! Transaction module split into types, canonical encoding and validation

pub mod codec;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::MAX_TRANSACTION_SIZE;
