use crate::error::{AppError, AppResult};
use crate::ledger::models::obligation_note;
use crate::ledger::BalanceLedger;
use crate::settlement::models::{ObligationStatus, PaymentObligation};
use crate::wallet::Wallet;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Queue of pending payment obligations, drained opportunistically whenever
/// a wallet's balance changes.
pub struct SettlementQueue {
    obligations: tokio::sync::RwLock<BTreeMap<i64, PaymentObligation>>,
    next_id: AtomicI64,
    ledger: Arc<BalanceLedger>,
}

impl SettlementQueue {
    pub fn new(ledger: Arc<BalanceLedger>) -> Self {
        Self {
            obligations: tokio::sync::RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
            ledger,
        }
    }

    /// Record a merchant-initiated charge against a payer
    pub async fn enqueue(
        &self,
        user_id: &str,
        merchant_id: &str,
        amount: Decimal,
    ) -> AppResult<PaymentObligation> {
        if amount <= Decimal::ZERO {
            return Err(AppError::InvalidInput(format!(
                "Obligation amount must be positive, got {}",
                amount
            )));
        }

        let now = Utc::now();
        let obligation = PaymentObligation {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            user_id: user_id.to_string(),
            merchant_id: merchant_id.to_string(),
            amount,
            status: ObligationStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let mut obligations = self.obligations.write().await;
        obligations.insert(obligation.id, obligation.clone());
        info!(
            "🧾 Obligation {} enqueued: {} owes {} to {}",
            obligation.id, user_id, amount, merchant_id
        );
        Ok(obligation)
    }

    pub async fn get(&self, id: i64) -> AppResult<PaymentObligation> {
        let obligations = self.obligations.read().await;
        obligations
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Obligation {} not found", id)))
    }

    pub async fn get_pending_by_user(&self, user_id: &str) -> Vec<PaymentObligation> {
        let obligations = self.obligations.read().await;
        obligations
            .values()
            .filter(|o| o.is_pending() && o.user_id == user_id)
            .cloned()
            .collect()
    }

    /// All pending obligations, ascending id. Used by the proactive sweep.
    pub async fn pending(&self) -> Vec<PaymentObligation> {
        let obligations = self.obligations.read().await;
        obligations.values().filter(|o| o.is_pending()).cloned().collect()
    }

    /// Attempt one settlement against a wallet's current balance.
    ///
    /// Takes only the first eligible obligation per call (oldest id first,
    /// amount covered by the balance): one settlement attempt per balance
    /// change, so multiple transfers never race one balance snapshot. The
    /// picked obligation is claimed (flipped to processing) under the write
    /// lock before the transfer is issued, so a concurrent drain over the
    /// same wallet can never settle it twice; if the transfer fails the
    /// claim is released. If a confirmed transfer already links to the
    /// picked obligation, the missed callback is healed by approving it
    /// directly, and the scan retries once.
    pub async fn drain(&self, wallet: &Wallet) -> AppResult<Option<PaymentObligation>> {
        for _ in 0..2 {
            let claimed = {
                let mut obligations = self.obligations.write().await;
                let candidate_id = obligations
                    .values()
                    .find(|o| {
                        o.is_pending()
                            && o.user_id == wallet.owner.owner_ref
                            && o.amount <= wallet.total
                    })
                    .map(|o| o.id);
                let Some(id) = candidate_id else {
                    return Ok(None);
                };
                let Some(stored) = obligations.get_mut(&id) else {
                    return Ok(None);
                };
                stored.status = ObligationStatus::Processing;
                stored.updated_at = Utc::now();
                stored.clone()
            };

            if self.ledger.has_confirmed_link(claimed.id).await {
                let mut obligations = self.obligations.write().await;
                if let Some(stored) = obligations.get_mut(&claimed.id) {
                    stored.status = ObligationStatus::Approved;
                    stored.updated_at = Utc::now();
                    info!(
                        "🩹 Obligation {} already settled by a confirmed transfer, approved",
                        claimed.id
                    );
                }
                continue;
            }

            let transferred = self
                .ledger
                .transfer(
                    &claimed.user_id,
                    &claimed.merchant_id,
                    claimed.amount,
                    obligation_note(claimed.id),
                    None,
                )
                .await;

            if let Err(e) = transferred {
                let mut obligations = self.obligations.write().await;
                if let Some(stored) = obligations.get_mut(&claimed.id) {
                    stored.status = ObligationStatus::Pending;
                    stored.updated_at = Utc::now();
                }
                warn!("Settlement transfer for obligation {} failed: {}", claimed.id, e);
                return Err(e);
            }

            info!("⚙️  Obligation {} is processing", claimed.id);
            return Ok(Some(claimed));
        }

        Ok(None)
    }

    /// Processing -> Approved. Resolving an already approved obligation is a no-op.
    pub async fn resolve(&self, id: i64) -> AppResult<()> {
        let mut obligations = self.obligations.write().await;
        let obligation = obligations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Obligation {} not found", id)))?;

        match obligation.status {
            ObligationStatus::Approved => {}
            ObligationStatus::Processing => {
                obligation.status = ObligationStatus::Approved;
                obligation.updated_at = Utc::now();
                info!("✅ Obligation {} approved", id);
            }
            ObligationStatus::Pending => {
                warn!("Resolve for obligation {} which is still pending, ignoring", id);
            }
        }
        Ok(())
    }

    /// Processing -> Pending, making the obligation eligible for the next drain
    pub async fn revert_to_pending(&self, id: i64) -> AppResult<()> {
        let mut obligations = self.obligations.write().await;
        let obligation = obligations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Obligation {} not found", id)))?;

        match obligation.status {
            ObligationStatus::Pending => {}
            ObligationStatus::Processing => {
                obligation.status = ObligationStatus::Pending;
                obligation.updated_at = Utc::now();
                info!("↩️  Obligation {} reverted to pending", id);
            }
            ObligationStatus::Approved => {
                warn!("Revert for approved obligation {}, ignoring", id);
            }
        }
        Ok(())
    }

    /// Sweeper hook: revert obligations stuck in processing past the cutoff.
    /// Returns how many were reverted.
    pub async fn revert_stale_processing(&self, cutoff: DateTime<Utc>) -> usize {
        let mut obligations = self.obligations.write().await;
        let mut reverted = 0;

        for obligation in obligations.values_mut() {
            if obligation.is_processing() && obligation.updated_at < cutoff {
                obligation.status = ObligationStatus::Pending;
                obligation.updated_at = Utc::now();
                warn!(
                    "⏱️  Obligation {} stuck in processing, reverted to pending",
                    obligation.id
                );
                reverted += 1;
            }
        }

        reverted
    }
}
