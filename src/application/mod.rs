// Application layer: the services every front end (CLI, tests) talks to.

mod accounts;
mod error;
mod ledger;
mod transactions;

pub use accounts::*;
pub use error::*;
pub use ledger::*;
pub use transactions::*;
