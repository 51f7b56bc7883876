use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Obligation lifecycle: Pending -> Processing -> Approved (terminal).
/// Pending -> Pending is a legal self-loop used by the revert path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObligationStatus {
    Pending,
    Processing,
    Approved,
}

/// A merchant-initiated charge awaiting sufficient payer balance.
/// Transitions are owned exclusively by the settlement queue and the sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentObligation {
    pub id: i64,
    pub user_id: String,
    pub merchant_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: ObligationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentObligation {
    pub fn is_pending(&self) -> bool {
        self.status == ObligationStatus::Pending
    }

    pub fn is_processing(&self) -> bool {
        self.status == ObligationStatus::Processing
    }

    pub fn is_approved(&self) -> bool {
        self.status == ObligationStatus::Approved
    }
}
