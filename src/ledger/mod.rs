pub mod balance_ledger;
pub mod models;

pub use balance_ledger::BalanceLedger;
pub use models::{BalanceEntry, TransferKind};
