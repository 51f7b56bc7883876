// Payment-request settlement: obligation queue and reconciliation sweeps
pub mod models;
pub mod queue;
pub mod sweeper;

pub use models::{ObligationStatus, PaymentObligation};
pub use queue::SettlementQueue;
pub use sweeper::{ReconciliationSweeper, SweeperConfig};
