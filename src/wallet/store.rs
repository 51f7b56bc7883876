use crate::bridge::{BridgeHandle, LedgerMessage};
use crate::error::{AppError, AppResult};
use crate::hashchain::{from_minor_units, SystemWallets};
use crate::wallet::models::{Wallet, WalletOwner};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// CRUD over wallet balance records, keyed by owner ref.
///
/// Reads are "pull then trust-but-verify": every read fires a UTXO_QUERY at
/// the external ledger and returns the current cache without waiting for the
/// refreshed value. Balance truth flows one way, from the ledger's pushes.
pub struct WalletStore {
    wallets: tokio::sync::RwLock<HashMap<String, Wallet>>,
    bridge: BridgeHandle,
    system: Arc<SystemWallets>,
}

impl WalletStore {
    pub fn new(bridge: BridgeHandle, system: Arc<SystemWallets>) -> Self {
        Self {
            wallets: tokio::sync::RwLock::new(HashMap::new()),
            bridge,
            system,
        }
    }

    /// Initialize a zero-balance wallet for an owner
    pub async fn create(&self, owner: WalletOwner) -> AppResult<Wallet> {
        let mut wallets = self.wallets.write().await;
        if wallets.contains_key(&owner.owner_ref) {
            return Err(AppError::AlreadyExists(format!(
                "Wallet for owner {} already exists",
                owner.owner_ref
            )));
        }

        let wallet = Wallet::new(owner);
        wallets.insert(wallet.owner.owner_ref.clone(), wallet.clone());
        info!("💼 Wallet {} created for {}", wallet.id, wallet.owner.owner_ref);
        Ok(wallet)
    }

    /// Read the cached row and fire a refresh request at the external ledger.
    /// The returned value is the current cache, not the refreshed balance.
    pub async fn get_by_owner(&self, owner_ref: &str) -> AppResult<Wallet> {
        let wallet = {
            let wallets = self.wallets.read().await;
            wallets
                .get(owner_ref)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("Wallet for owner {} not found", owner_ref)))?
        };

        match LedgerMessage::utxo_query(self.system.canonical_ref(owner_ref)) {
            Ok(query) => self.bridge.send(&query).await,
            Err(e) => warn!("Could not build UTXO_QUERY for {}: {:?}", owner_ref, e),
        }

        Ok(wallet)
    }

    pub async fn get(&self, wallet_id: Uuid) -> AppResult<Wallet> {
        let wallets = self.wallets.read().await;
        wallets
            .values()
            .find(|w| w.id == wallet_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Wallet {} not found", wallet_id)))
    }

    /// Snapshot of every wallet, in no particular order
    pub async fn list(&self) -> Vec<Wallet> {
        let wallets = self.wallets.read().await;
        wallets.values().cloned().collect()
    }

    /// Last-writer-wins overwrite from an authoritative ledger push.
    /// The amount arrives in minor units and lands as a 2dp decimal.
    pub async fn apply_balance_push(&self, owner_ref: &str, amount_minor: i64) -> AppResult<Wallet> {
        let mut wallets = self.wallets.write().await;
        let wallet = wallets.get_mut(owner_ref).ok_or_else(|| {
            AppError::NotFound(format!("Balance push for unknown owner {}", owner_ref))
        })?;

        wallet.total = from_minor_units(amount_minor);
        wallet.updated_at = Utc::now();
        info!("💰 Balance of {} set to {}", owner_ref, wallet.total);
        Ok(wallet.clone())
    }
}
