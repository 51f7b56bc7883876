//! Wallet-ledger reconciliation core of the payments platform.
//!
//! Keeps the internal record of user/merchant balances consistent with an
//! external append-only transaction ledger reached over a persistent
//! connection, while draining a queue of pending payment obligations as
//! funds arrive.

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod error;
pub mod hashchain;
pub mod ledger;
pub mod reconciler;
pub mod settlement;
pub mod wallet;
