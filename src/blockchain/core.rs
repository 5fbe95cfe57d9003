// core.rs splits ledger responsibilities into submodules: block sealing and
// the ledger itself, transaction application, and chain validation.
pub mod chain;
pub mod state;
pub mod validation;

pub use chain::*;
pub use state::*;
pub use validation::*;
