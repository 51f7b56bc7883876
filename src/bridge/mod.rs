// External-ledger bridge: connection lifecycle, wire protocol, event fan-out
pub mod connection;
pub mod events;
pub mod message;

pub use connection::{BridgeHandle, ConnectionState, LedgerBridge};
pub use events::{BalancePush, LedgerEvents, TxOutcome};
pub use message::LedgerMessage;
