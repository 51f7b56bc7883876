use tokio::sync::broadcast;
use tracing::debug;

/// Authoritative balance push from the external ledger (absolute, not a delta)
#[derive(Debug, Clone)]
pub struct BalancePush {
    pub owner_ref: String,
    pub amount_minor: i64,
}

/// Confirmation or rejection of a previously announced transfer,
/// identified by the reference segment of its signature
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub reference: String,
}

/// Broadcast channel capacity per event kind
const BROADCAST_CAPACITY: usize = 1000;

/// Typed fan-out of inbound ledger events.
///
/// The bridge owns dispatch keyed by message type; wallet/ledger/settlement
/// handlers subscribe at construction time. This replaces any ambient,
/// implicitly wired bus.
pub struct LedgerEvents {
    balance_tx: broadcast::Sender<BalancePush>,
    confirmed_tx: broadcast::Sender<TxOutcome>,
    rejected_tx: broadcast::Sender<TxOutcome>,
}

impl LedgerEvents {
    pub fn new() -> Self {
        let (balance_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (confirmed_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (rejected_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        Self {
            balance_tx,
            confirmed_tx,
            rejected_tx,
        }
    }

    pub fn publish_balance(&self, push: BalancePush) {
        debug!("📡 Balance push: {} = {}", push.owner_ref, push.amount_minor);
        let _ = self.balance_tx.send(push);
    }

    pub fn publish_confirmed(&self, outcome: TxOutcome) {
        debug!("📡 TX confirmed: {}", outcome.reference);
        let _ = self.confirmed_tx.send(outcome);
    }

    pub fn publish_rejected(&self, outcome: TxOutcome) {
        debug!("📡 TX rejected: {}", outcome.reference);
        let _ = self.rejected_tx.send(outcome);
    }

    pub fn subscribe_balance(&self) -> broadcast::Receiver<BalancePush> {
        self.balance_tx.subscribe()
    }

    pub fn subscribe_confirmed(&self) -> broadcast::Receiver<TxOutcome> {
        self.confirmed_tx.subscribe()
    }

    pub fn subscribe_rejected(&self) -> broadcast::Receiver<TxOutcome> {
        self.rejected_tx.subscribe()
    }
}

impl Default for LedgerEvents {
    fn default() -> Self {
        Self::new()
    }
}
