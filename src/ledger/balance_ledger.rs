use crate::bridge::{BridgeHandle, LedgerMessage};
use crate::error::{AppError, AppResult};
use crate::hashchain::{to_minor_units, HashChainTransaction, SystemWallets};
use crate::ledger::models::{
    obligation_note, parse_obligation_note, BalanceEntry, TransferKind, FORCED_REJECTION_NOTE,
};
use crate::wallet::WalletStore;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Double-entry transfer ledger. Sole owner of the terminality invariant:
/// no other component writes confirmed_at/rejected_at.
pub struct BalanceLedger {
    entries: tokio::sync::RwLock<HashMap<String, BalanceEntry>>,
    wallets: Arc<WalletStore>,
    bridge: BridgeHandle,
    system: Arc<SystemWallets>,
    shared_secret: String,
}

impl BalanceLedger {
    pub fn new(
        wallets: Arc<WalletStore>,
        bridge: BridgeHandle,
        system: Arc<SystemWallets>,
        shared_secret: String,
    ) -> Self {
        Self {
            entries: tokio::sync::RwLock::new(HashMap::new()),
            wallets,
            bridge,
            system,
            shared_secret,
        }
    }

    /// Initiate a transfer between two wallets. Returns the pending entry
    /// immediately; confirmation arrives asynchronously over the bridge.
    ///
    /// The sufficient-funds check is advisory against the cached balance;
    /// the external ledger's later push is authoritative.
    pub async fn transfer(
        &self,
        payer_ref: &str,
        payee_ref: &str,
        amount: Decimal,
        notes: impl Into<String>,
        idempotency_key: Option<String>,
    ) -> AppResult<BalanceEntry> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Transfer amount must be positive, got {}",
                amount
            )));
        }

        let payer = self.wallets.get_by_owner(payer_ref).await?;
        let payee = self.wallets.get_by_owner(payee_ref).await?;

        if !payer.can_cover(amount) {
            return Err(AppError::InsufficientFunds {
                required: amount.to_string(),
                available: payer.total.to_string(),
            });
        }

        let amount_minor = to_minor_units(amount).ok_or_else(|| {
            AppError::InvalidInput(format!("Amount {} not representable in minor units", amount))
        })?;

        let uid = idempotency_key.unwrap_or_else(|| Uuid::new_v4().to_string());
        let kind = TransferKind::between(payer.owner.kind, payee.owner.kind);

        let entry = BalanceEntry {
            id: Uuid::new_v4(),
            uid: uid.clone(),
            amount,
            payable_wallet: payer.id,
            receivable_wallet: payee.id,
            payable_merchant: matches!(kind, TransferKind::M2U | TransferKind::M2M)
                .then(|| payer_ref.to_string()),
            receivable_merchant: matches!(kind, TransferKind::U2M | TransferKind::M2M)
                .then(|| payee_ref.to_string()),
            kind,
            notes: notes.into(),
            created_at: Utc::now(),
            confirmed_at: None,
            rejected_at: None,
        };

        {
            let mut entries = self.entries.write().await;
            if entries.contains_key(&uid) {
                return Err(AppError::AlreadyExists(format!(
                    "Balance entry with uid {} already exists",
                    uid
                )));
            }
            entries.insert(uid.clone(), entry.clone());
        }

        let tx = HashChainTransaction::new(
            self.system.canonical_ref(payer_ref),
            self.system.canonical_ref(payee_ref),
            amount_minor,
            0,
            &uid,
            &self.shared_secret,
        );
        // Fire and forget; a dropped send surfaces later as a stuck pending
        // entry picked up by the reconciliation sweeps
        self.bridge.send(&LedgerMessage::tx_new(&tx)?).await;

        info!(
            "📒 Transfer {} initiated: {} -> {} ({})",
            uid, payer_ref, payee_ref, amount
        );
        Ok(entry)
    }

    /// Flip the matching pending entry to confirmed. Returns the linked
    /// obligation id, if the entry's notes carry one, for the caller to
    /// forward to the settlement queue.
    ///
    /// Unknown references are tolerated: in multi-instance deployments the
    /// ledger echoes confirmations for transfers this instance did not
    /// originate. Duplicate confirmations are idempotent no-ops.
    pub async fn confirm(&self, reference: &str) -> AppResult<Option<i64>> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(reference) else {
            info!("Untracked confirmation for {}, ignoring", reference);
            return Ok(None);
        };

        if entry.is_rejected() {
            warn!(
                "Conflict: confirmation for {} arrived after rejection, dropping",
                reference
            );
            return Ok(None);
        }
        if entry.is_confirmed() {
            return Ok(None);
        }

        entry.confirmed_at = Some(Utc::now());
        info!("✅ Transfer {} confirmed", reference);
        Ok(parse_obligation_note(&entry.notes))
    }

    /// Mirror of [`confirm`] for rejections
    pub async fn reject(&self, reference: &str) -> AppResult<Option<i64>> {
        let mut entries = self.entries.write().await;
        let Some(entry) = entries.get_mut(reference) else {
            info!("Untracked rejection for {}, ignoring", reference);
            return Ok(None);
        };

        if entry.is_confirmed() {
            warn!(
                "Conflict: rejection for {} arrived after confirmation, dropping",
                reference
            );
            return Ok(None);
        }
        if entry.is_rejected() {
            return Ok(None);
        }

        entry.rejected_at = Some(Utc::now());
        warn!("⛔ Transfer {} rejected", reference);
        Ok(parse_obligation_note(&entry.notes))
    }

    /// Daily-sweep hook: force-reject entries still unterminal past the
    /// cutoff, annotating the notes. Returns how many were rejected.
    pub async fn force_reject_stale(&self, cutoff: DateTime<Utc>) -> usize {
        let mut entries = self.entries.write().await;
        let mut rejected = 0;

        for entry in entries.values_mut() {
            if entry.is_terminal() || entry.created_at >= cutoff {
                continue;
            }
            entry.rejected_at = Some(Utc::now());
            if entry.notes.is_empty() {
                entry.notes = FORCED_REJECTION_NOTE.to_string();
            } else {
                entry.notes = format!("{} {}", entry.notes, FORCED_REJECTION_NOTE);
            }
            warn!("⏱️  Transfer {} never settled, force-rejected", entry.uid);
            rejected += 1;
        }

        rejected
    }

    /// Whether a confirmed entry already links to the given obligation.
    /// Used by the settlement queue to self-heal a missed callback.
    pub async fn has_confirmed_link(&self, obligation_id: i64) -> bool {
        let entries = self.entries.read().await;
        entries
            .values()
            .any(|e| e.is_confirmed() && parse_obligation_note(&e.notes) == Some(obligation_id))
    }

    pub async fn get_by_uid(&self, uid: &str) -> Option<BalanceEntry> {
        let entries = self.entries.read().await;
        entries.get(uid).cloned()
    }

    /// Read-only balance history for one wallet, oldest first
    pub async fn entries_for_wallet(&self, wallet_id: Uuid) -> Vec<BalanceEntry> {
        let entries = self.entries.read().await;
        let mut history: Vec<_> = entries
            .values()
            .filter(|e| e.payable_wallet == wallet_id || e.receivable_wallet == wallet_id)
            .cloned()
            .collect();
        history.sort_by_key(|e| e.created_at);
        history
    }

    /// Convenience initiation helper used by walkthroughs and tests;
    /// links the transfer to an obligation via the notes tag
    pub async fn transfer_for_obligation(
        &self,
        payer_ref: &str,
        payee_ref: &str,
        amount: Decimal,
        obligation_id: i64,
    ) -> AppResult<BalanceEntry> {
        self.transfer(
            payer_ref,
            payee_ref,
            amount,
            obligation_note(obligation_id),
            None,
        )
        .await
    }
}
