use crate::bridge::events::{BalancePush, LedgerEvents, TxOutcome};
use crate::bridge::message::{
    LedgerMessage, TxOutcomePayload, UtxoPayload, EVENT_TX_CONFIRMED, EVENT_TX_REJECTED,
    EVENT_UTXO_UPDATE,
};
use crate::error::{AppError, AppResult};
use crate::hashchain::reference_from_signature;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

/// Connection lifecycle: Disconnected -> Connecting -> Connected -> Disconnected,
/// on a loop. Connected is the only state from which `send` transmits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct BridgeShared {
    state: RwLock<ConnectionState>,
    writer: Mutex<Option<OwnedWriteHalf>>,
}

impl BridgeShared {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }
}

/// Cheap cloneable sender onto the bridge's single shared connection.
/// Held by WalletStore and BalanceLedger for outbound traffic.
#[derive(Clone)]
pub struct BridgeHandle {
    shared: Arc<BridgeShared>,
}

impl BridgeHandle {
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }

    /// Write one message onto the connection. Drops the message with a warning
    /// if the connection is not open: callers needing guaranteed delivery must
    /// implement their own retry/outbox.
    pub async fn send(&self, message: &LedgerMessage) {
        let line = match serde_json::to_string(message) {
            Ok(line) => line,
            Err(e) => {
                warn!("Unserializable ledger message, dropping: {:?}", e);
                return;
            }
        };

        let mut writer = self.shared.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            warn!(
                "Ledger connection not open, dropping outbound {}",
                message.event
            );
            return;
        };

        let mut framed = line.into_bytes();
        framed.push(b'\n');
        if let Err(e) = stream.write_all(&framed).await {
            warn!("Ledger write failed, dropping connection: {:?}", e);
            *writer = None;
            self.shared.set_state(ConnectionState::Disconnected);
        }
    }
}

/// Owns the persistent connection to the external ledger: connect,
/// fixed-interval reconnect, inbound dispatch and outbound send.
pub struct LedgerBridge {
    endpoint: String,
    reconnect_interval: Duration,
    shared: Arc<BridgeShared>,
    events: Arc<LedgerEvents>,
}

impl LedgerBridge {
    pub fn new(endpoint: String, reconnect_secs: u64, events: Arc<LedgerEvents>) -> Self {
        Self {
            endpoint,
            reconnect_interval: Duration::from_secs(reconnect_secs),
            shared: Arc::new(BridgeShared {
                state: RwLock::new(ConnectionState::Disconnected),
                writer: Mutex::new(None),
            }),
            events,
        }
    }

    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            shared: self.shared.clone(),
        }
    }

    /// Start the connect/read loop in the background. Retries on a fixed
    /// interval forever; intentionally no exponential backoff and no cap.
    pub fn start(&self) -> JoinHandle<()> {
        let endpoint = self.endpoint.clone();
        let interval = self.reconnect_interval;
        let shared = self.shared.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            loop {
                shared.set_state(ConnectionState::Connecting);

                let stream = match Self::connect_once(&endpoint).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!("{}", e);
                        shared.set_state(ConnectionState::Disconnected);
                        sleep(interval).await;
                        continue;
                    }
                };

                let (read_half, write_half) = stream.into_split();
                *shared.writer.lock().await = Some(write_half);
                shared.set_state(ConnectionState::Connected);
                info!("🔗 Connected to external ledger at {}", endpoint);

                let mut lines = BufReader::new(read_half).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(line)) => Self::dispatch(&events, &line),
                        Ok(None) => break,
                        Err(e) => {
                            warn!("Ledger read failed: {:?}", e);
                            break;
                        }
                    }
                }

                *shared.writer.lock().await = None;
                shared.set_state(ConnectionState::Disconnected);
                warn!(
                    "Ledger connection closed, reconnecting in {}s",
                    interval.as_secs()
                );
                sleep(interval).await;
            }
        })
    }

    async fn connect_once(endpoint: &str) -> AppResult<TcpStream> {
        TcpStream::connect(endpoint)
            .await
            .map_err(|e| AppError::LedgerUnreachable(format!("{}: {:?}", endpoint, e)))
    }

    /// Parse one inbound line and republish it on the typed event channels.
    /// Unrecognized or malformed messages are dropped, never raised.
    fn dispatch(events: &LedgerEvents, line: &str) {
        let message: LedgerMessage = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Unparseable ledger message, dropping: {:?}", e);
                return;
            }
        };

        match message.event.as_str() {
            EVENT_UTXO_UPDATE => {
                let payload: UtxoPayload = match serde_json::from_value(message.data) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Malformed UTXO_UPDATE, dropping: {:?}", e);
                        return;
                    }
                };
                let Some(amount_minor) = payload.amount else {
                    warn!("UTXO_UPDATE without amount, dropping");
                    return;
                };
                events.publish_balance(BalancePush {
                    owner_ref: payload.public_key,
                    amount_minor,
                });
            }
            EVENT_TX_CONFIRMED | EVENT_TX_REJECTED => {
                let payload: TxOutcomePayload = match serde_json::from_value(message.data) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Malformed {}, dropping: {:?}", message.event, e);
                        return;
                    }
                };
                let Some(reference) = reference_from_signature(&payload.signature) else {
                    warn!(
                        "{} signature without reference segment, dropping",
                        message.event
                    );
                    return;
                };
                let outcome = TxOutcome {
                    reference: reference.to_string(),
                };
                if message.event == EVENT_TX_CONFIRMED {
                    events.publish_confirmed(outcome);
                } else {
                    events.publish_rejected(outcome);
                }
            }
            other => {
                debug!("Dropping unrecognized ledger event: {}", other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::message::EVENT_UTXO_QUERY;

    #[tokio::test]
    async fn test_send_while_disconnected_is_a_silent_drop() {
        let events = Arc::new(LedgerEvents::new());
        let bridge = LedgerBridge::new("127.0.0.1:1".to_string(), 5, events);
        let handle = bridge.handle();

        assert_eq!(handle.state(), ConnectionState::Disconnected);

        // Must return without erroring and leave the state untouched
        let msg = LedgerMessage {
            event: EVENT_UTXO_QUERY.to_string(),
            data: serde_json::json!({"publicKey": "u-1"}),
        };
        handle.send(&msg).await;
        assert_eq!(handle.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_dispatch_utxo_update() {
        let events = LedgerEvents::new();
        let mut rx = events.subscribe_balance();

        LedgerBridge::dispatch(
            &events,
            r#"{"event":"UTXO_UPDATE","data":{"publicKey":"u-7","amount":50000}}"#,
        );

        let push = rx.recv().await.unwrap();
        assert_eq!(push.owner_ref, "u-7");
        assert_eq!(push.amount_minor, 50000);
    }

    #[tokio::test]
    async fn test_dispatch_confirmation_extracts_reference() {
        let events = LedgerEvents::new();
        let mut rx = events.subscribe_confirmed();

        LedgerBridge::dispatch(
            &events,
            r#"{"event":"TX_CONFIRMED","data":{"signature":"u1.abcdef"}}"#,
        );

        assert_eq!(rx.recv().await.unwrap().reference, "u1");
    }

    #[tokio::test]
    async fn test_dispatch_drops_unrecognized_and_malformed() {
        let events = LedgerEvents::new();
        let mut balance = events.subscribe_balance();
        let mut confirmed = events.subscribe_confirmed();

        LedgerBridge::dispatch(&events, r#"{"event":"BLOCK_MINED","data":{}}"#);
        LedgerBridge::dispatch(&events, "not json at all");
        LedgerBridge::dispatch(&events, r#"{"event":"TX_CONFIRMED","data":{"signature":"nodot"}}"#);
        LedgerBridge::dispatch(&events, r#"{"event":"UTXO_UPDATE","data":{"publicKey":"u-1"}}"#);

        assert!(balance.try_recv().is_err());
        assert!(confirmed.try_recv().is_err());
    }
}
