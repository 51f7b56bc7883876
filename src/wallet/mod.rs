pub mod models;
pub mod store;

pub use models::{OwnerKind, Wallet, WalletOwner};
pub use store::WalletStore;
