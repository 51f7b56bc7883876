use crate::error::AppResult;
use crate::hashchain::HashChainTransaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire events exchanged with the external ledger
pub const EVENT_UTXO_QUERY: &str = "UTXO_QUERY";
pub const EVENT_UTXO_UPDATE: &str = "UTXO_UPDATE";
pub const EVENT_TX_NEW: &str = "TX_NEW";
pub const EVENT_TX_CONFIRMED: &str = "TX_CONFIRMED";
pub const EVENT_TX_REJECTED: &str = "TX_REJECTED";

/// Wire-level envelope exchanged with the external ledger.
/// Exists only for the duration of a connection session, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMessage {
    pub event: String,
    pub data: Value,
}

/// Payload of an outbound UTXO_QUERY or inbound UTXO_UPDATE
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoPayload {
    pub public_key: String,
    /// Absolute balance in minor units; absent on queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
}

/// Payload of an inbound TX_CONFIRMED / TX_REJECTED
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutcomePayload {
    pub signature: String,
}

impl LedgerMessage {
    pub fn utxo_query(public_key: &str) -> AppResult<Self> {
        Ok(Self {
            event: EVENT_UTXO_QUERY.to_string(),
            data: serde_json::to_value(UtxoPayload {
                public_key: public_key.to_string(),
                amount: None,
            })?,
        })
    }

    pub fn tx_new(tx: &HashChainTransaction) -> AppResult<Self> {
        Ok(Self {
            event: EVENT_TX_NEW.to_string(),
            data: serde_json::to_value(tx)?,
        })
    }
}
