//! Construction-time wiring of inbound ledger events to their handlers.
//!
//! Balance pushes land on the wallet cache and then drive a settlement
//! drain; transfer outcomes terminalize the matching balance entry and,
//! where the entry links an obligation, forward to the settlement queue.

use crate::bridge::{BalancePush, LedgerEvents, TxOutcome};
use crate::ledger::BalanceLedger;
use crate::settlement::SettlementQueue;
use crate::wallet::WalletStore;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, warn};

pub struct Reconciler {
    wallets: Arc<WalletStore>,
    ledger: Arc<BalanceLedger>,
    settlements: Arc<SettlementQueue>,
}

impl Reconciler {
    pub fn new(
        wallets: Arc<WalletStore>,
        ledger: Arc<BalanceLedger>,
        settlements: Arc<SettlementQueue>,
    ) -> Self {
        Self {
            wallets,
            ledger,
            settlements,
        }
    }

    /// Subscribe to the bridge's event channels and spawn one handler task
    /// per message type
    pub fn start(self: &Arc<Self>, events: &LedgerEvents) -> Vec<JoinHandle<()>> {
        let balance_task = {
            let reconciler = self.clone();
            let mut rx = events.subscribe_balance();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(push) => reconciler.on_balance_push(push).await,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Balance push handler lagged, skipped {} messages", n)
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        let confirmed_task = {
            let reconciler = self.clone();
            let mut rx = events.subscribe_confirmed();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(outcome) => reconciler.on_confirmed(outcome).await,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Confirmation handler lagged, skipped {} messages", n)
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        let rejected_task = {
            let reconciler = self.clone();
            let mut rx = events.subscribe_rejected();
            tokio::spawn(async move {
                loop {
                    match rx.recv().await {
                        Ok(outcome) => reconciler.on_rejected(outcome).await,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Rejection handler lagged, skipped {} messages", n)
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        vec![balance_task, confirmed_task, rejected_task]
    }

    async fn on_balance_push(&self, push: BalancePush) {
        let wallet = match self
            .wallets
            .apply_balance_push(&push.owner_ref, push.amount_minor)
            .await
        {
            Ok(wallet) => wallet,
            Err(e) => {
                warn!("Dropped balance push: {}", e);
                return;
            }
        };

        if let Err(e) = self.settlements.drain(&wallet).await {
            error!("Settlement drain failed for {}: {}", push.owner_ref, e);
        }
    }

    async fn on_confirmed(&self, outcome: TxOutcome) {
        match self.ledger.confirm(&outcome.reference).await {
            Ok(Some(obligation_id)) => {
                if let Err(e) = self.settlements.resolve(obligation_id).await {
                    error!("Could not resolve obligation {}: {}", obligation_id, e);
                }
            }
            Ok(None) => {}
            Err(e) => error!("Confirmation handling failed for {}: {}", outcome.reference, e),
        }
    }

    async fn on_rejected(&self, outcome: TxOutcome) {
        match self.ledger.reject(&outcome.reference).await {
            Ok(Some(obligation_id)) => {
                if let Err(e) = self.settlements.revert_to_pending(obligation_id).await {
                    error!("Could not revert obligation {}: {}", obligation_id, e);
                }
            }
            Ok(None) => {}
            Err(e) => error!("Rejection handling failed for {}: {}", outcome.reference, e),
        }
    }
}
