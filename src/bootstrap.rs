use crate::bridge::{BridgeHandle, LedgerBridge, LedgerEvents};
use crate::config::Config;
use crate::error::AppResult;
use crate::hashchain::SystemWallets;
use crate::ledger::BalanceLedger;
use crate::reconciler::Reconciler;
use crate::settlement::{ReconciliationSweeper, SettlementQueue, SweeperConfig};
use crate::wallet::WalletStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Fully wired application state plus its background task handles
pub struct AppState {
    pub wallets: Arc<WalletStore>,
    pub ledger: Arc<BalanceLedger>,
    pub settlements: Arc<SettlementQueue>,
    pub bridge: BridgeHandle,
    pub events: Arc<LedgerEvents>,
    pub tasks: Vec<JoinHandle<()>>,
}

/// Construct every component with explicit wiring and start the background
/// tasks: bridge connect/read loop, inbound event handlers, sweep schedules.
pub async fn initialize_app_state(config: &Config) -> AppResult<AppState> {
    info!("Initializing reconciliation core ...");

    let events = Arc::new(LedgerEvents::new());
    let bridge = LedgerBridge::new(
        config.ledger_endpoint.clone(),
        config.ledger_reconnect_secs,
        events.clone(),
    );
    let handle = bridge.handle();
    info!("✅ Ledger bridge configured for {}", config.ledger_endpoint);

    let system = Arc::new(SystemWallets::new(config.system_wallet_refs.iter().cloned()));
    let wallets = Arc::new(WalletStore::new(handle.clone(), system.clone()));
    info!("✅ Wallet store initialized");

    let ledger = Arc::new(BalanceLedger::new(
        wallets.clone(),
        handle.clone(),
        system,
        config.ledger_shared_secret.clone(),
    ));
    info!("✅ Balance ledger initialized");

    let settlements = Arc::new(SettlementQueue::new(ledger.clone()));
    info!("✅ Settlement queue initialized");

    let mut tasks = Vec::new();

    let reconciler = Arc::new(Reconciler::new(
        wallets.clone(),
        ledger.clone(),
        settlements.clone(),
    ));
    tasks.extend(reconciler.start(&events));
    info!("✅ Inbound event handlers wired (balance push, confirm, reject)");

    tasks.push(bridge.start());
    info!("✅ Ledger bridge connect loop started");

    let sweeper = Arc::new(ReconciliationSweeper::new(
        SweeperConfig::default(),
        ledger.clone(),
        settlements.clone(),
        wallets.clone(),
    ));
    tasks.extend(sweeper.start());
    info!("✅ Reconciliation sweeps scheduled (hourly + daily)");

    Ok(AppState {
        wallets,
        ledger,
        settlements,
        bridge: handle,
        events,
        tasks,
    })
}
