// core.rs splits responsibilities into blocks and the ledger, UTXO state, and block validation.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
