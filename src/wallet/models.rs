use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
    Merchant,
}

/// Exactly one owner per wallet: a user or a merchant, identified by an
/// opaque ref that doubles as the public key on the ledger wire.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct WalletOwner {
    pub kind: OwnerKind,
    pub owner_ref: String,
}

impl WalletOwner {
    pub fn user(owner_ref: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::User,
            owner_ref: owner_ref.into(),
        }
    }

    pub fn merchant(owner_ref: impl Into<String>) -> Self {
        Self {
            kind: OwnerKind::Merchant,
            owner_ref: owner_ref.into(),
        }
    }
}

/// Cached balance record. `total` is an authoritative cache of the external
/// ledger's view, overwritten only by balance pushes. Wallets are never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    pub id: Uuid,
    pub owner: WalletOwner,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(owner: WalletOwner) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner,
            total: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    /// Advisory only: the external ledger's later push is authoritative
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.total >= amount
    }
}
