use crate::wallet::OwnerKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notes tag tying a transfer to the settlement-queue obligation it pays
pub const OBLIGATION_NOTE_PREFIX: &str = "pending-payment-request-";

/// Notes annotation stamped by the daily sweep on force-rejected entries
pub const FORCED_REJECTION_NOTE: &str = "failed-to-be-processed";

/// Directional transfer classification by the two owner kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    U2U,
    U2M,
    M2U,
    M2M,
}

impl TransferKind {
    pub fn between(payer: OwnerKind, payee: OwnerKind) -> Self {
        match (payer, payee) {
            (OwnerKind::User, OwnerKind::User) => TransferKind::U2U,
            (OwnerKind::User, OwnerKind::Merchant) => TransferKind::U2M,
            (OwnerKind::Merchant, OwnerKind::User) => TransferKind::M2U,
            (OwnerKind::Merchant, OwnerKind::Merchant) => TransferKind::M2M,
        }
    }
}

/// One directional transfer. Created unterminal at initiation; exactly one of
/// confirmed_at/rejected_at may ever be set, and the entry is immutable
/// afterwards except by an explicit compensating entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub id: Uuid,
    /// Idempotency key, doubles as the ledger's external reference
    pub uid: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    /// Debited wallet
    pub payable_wallet: Uuid,
    /// Credited wallet
    pub receivable_wallet: Uuid,
    pub payable_merchant: Option<String>,
    pub receivable_merchant: Option<String>,
    pub kind: TransferKind,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
}

impl BalanceEntry {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_at.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.is_confirmed() || self.is_rejected()
    }
}

/// Format the notes tag for an obligation link
pub fn obligation_note(obligation_id: i64) -> String {
    format!("{}{}", OBLIGATION_NOTE_PREFIX, obligation_id)
}

/// Find an obligation link anywhere inside free-text notes
pub fn parse_obligation_note(notes: &str) -> Option<i64> {
    let start = notes.find(OBLIGATION_NOTE_PREFIX)? + OBLIGATION_NOTE_PREFIX.len();
    let digits: String = notes[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
