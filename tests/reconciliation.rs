//! End-to-end reconciliation flows against a scripted external ledger
//! reachable over a local TCP socket.

use payments_core::bootstrap::{initialize_app_state, AppState};
use payments_core::bridge::ConnectionState;
use payments_core::config::Config;
use payments_core::ledger::models::OBLIGATION_NOTE_PREFIX;
use payments_core::settlement::ObligationStatus;
use payments_core::wallet::WalletOwner;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::time::{sleep, timeout, Duration};

struct FakeLedger {
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl FakeLedger {
    /// Next outbound message matching `event`, skipping others
    /// (wallet reads emit UTXO_QUERY noise ahead of TX_NEW)
    async fn next_event(&mut self, event: &str) -> Value {
        loop {
            let line = timeout(Duration::from_secs(5), self.reader.next_line())
                .await
                .expect("timed out waiting for outbound message")
                .expect("socket read failed")
                .expect("connection closed");
            let message: Value = serde_json::from_str(&line).expect("unparseable outbound line");
            if message["event"] == event {
                return message["data"].clone();
            }
        }
    }

    async fn push(&mut self, event: &str, data: Value) {
        let line = format!("{}\n", json!({ "event": event, "data": data }));
        self.writer.write_all(line.as_bytes()).await.unwrap();
    }
}

async fn start_core() -> (AppState, FakeLedger) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        ledger_endpoint: addr.to_string(),
        ledger_shared_secret: "test-secret".to_string(),
        ledger_reconnect_secs: 1,
        system_wallet_refs: vec!["treasury-1".to_string()],
    };
    let state = initialize_app_state(&config).await.unwrap();

    let (stream, _) = timeout(Duration::from_secs(5), listener.accept())
        .await
        .expect("bridge never connected")
        .unwrap();
    wait_until(|| state.bridge.state() == ConnectionState::Connected).await;

    let (read_half, write_half) = stream.into_split();
    let ledger = FakeLedger {
        reader: BufReader::new(read_half).lines(),
        writer: write_half,
    };
    (state, ledger)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

async fn wait_until_async<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(5), async {
        while !condition().await {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition never became true");
}

#[tokio::test]
async fn test_transfer_is_confirmed_by_inbound_callback() {
    let (state, mut fake) = start_core().await;

    state.wallets.create(WalletOwner::user("A")).await.unwrap();
    state.wallets.create(WalletOwner::user("B")).await.unwrap();

    // Authoritative push funds wallet A with 1000.00
    fake.push("UTXO_UPDATE", json!({ "publicKey": "A", "amount": 100_000 }))
        .await;
    wait_until_async(|| async {
        state.wallets.get_by_owner("A").await.unwrap().total == dec!(1000)
    })
    .await;

    let entry = state
        .ledger
        .transfer("A", "B", dec!(1000), "", Some("u1".to_string()))
        .await
        .unwrap();
    assert_eq!(entry.uid, "u1");
    assert!(entry.confirmed_at.is_none());
    assert!(entry.rejected_at.is_none());

    // The announced transaction is hash-signed and carries the reference
    let tx = fake.next_event("TX_NEW").await;
    assert_eq!(tx["reference"], "u1");
    assert_eq!(tx["amount"], 100_000);
    assert_eq!(tx["fee"], 0);
    assert!(tx["signature"].as_str().unwrap().starts_with("u1."));

    fake.push("TX_CONFIRMED", json!({ "signature": "u1.abcdef" }))
        .await;
    wait_until_async(|| async {
        state
            .ledger
            .get_by_uid("u1")
            .await
            .map(|e| e.is_confirmed())
            .unwrap_or(false)
    })
    .await;

    let entry = state.ledger.get_by_uid("u1").await.unwrap();
    assert!(entry.confirmed_at.is_some());
    assert!(entry.rejected_at.is_none());
}

#[tokio::test]
async fn test_balance_push_drains_pending_obligation() {
    let (state, mut fake) = start_core().await;

    state.wallets.create(WalletOwner::user("7")).await.unwrap();
    state
        .wallets
        .create(WalletOwner::merchant("3"))
        .await
        .unwrap();

    let obligation = state
        .settlements
        .enqueue("7", "3", dec!(500))
        .await
        .unwrap();

    fake.push("UTXO_UPDATE", json!({ "publicKey": "7", "amount": 50_000 }))
        .await;
    wait_until_async(|| async {
        state.settlements.get(obligation.id).await.unwrap().status == ObligationStatus::Processing
    })
    .await;

    // The drain issued a transfer tagged with the obligation link
    let tx = fake.next_event("TX_NEW").await;
    assert_eq!(tx["amount"], 50_000);
    let reference = tx["reference"].as_str().unwrap().to_string();
    let entry = state.ledger.get_by_uid(&reference).await.unwrap();
    assert_eq!(
        entry.notes,
        format!("{}{}", OBLIGATION_NOTE_PREFIX, obligation.id)
    );

    // Confirmation settles the obligation end to end
    fake.push(
        "TX_CONFIRMED",
        json!({ "signature": tx["signature"].as_str().unwrap() }),
    )
    .await;
    wait_until_async(|| async {
        state.settlements.get(obligation.id).await.unwrap().status == ObligationStatus::Approved
    })
    .await;
}

#[tokio::test]
async fn test_rejection_reverts_obligation_for_next_drain() {
    let (state, mut fake) = start_core().await;

    state.wallets.create(WalletOwner::user("7")).await.unwrap();
    state
        .wallets
        .create(WalletOwner::merchant("3"))
        .await
        .unwrap();
    let obligation = state
        .settlements
        .enqueue("7", "3", dec!(500))
        .await
        .unwrap();

    fake.push("UTXO_UPDATE", json!({ "publicKey": "7", "amount": 50_000 }))
        .await;
    wait_until_async(|| async {
        state.settlements.get(obligation.id).await.unwrap().status == ObligationStatus::Processing
    })
    .await;

    let tx = fake.next_event("TX_NEW").await;
    fake.push(
        "TX_REJECTED",
        json!({ "signature": tx["signature"].as_str().unwrap() }),
    )
    .await;
    wait_until_async(|| async {
        state.settlements.get(obligation.id).await.unwrap().status == ObligationStatus::Pending
    })
    .await;

    let reference = tx["reference"].as_str().unwrap();
    assert!(state.ledger.get_by_uid(reference).await.unwrap().is_rejected());
}

#[tokio::test]
async fn test_wallet_read_queries_ledger_with_canonical_ref() {
    let (state, mut fake) = start_core().await;

    state.wallets.create(WalletOwner::user("u-9")).await.unwrap();
    state
        .wallets
        .create(WalletOwner::merchant("treasury-1"))
        .await
        .unwrap();

    state.wallets.get_by_owner("u-9").await.unwrap();
    let query = fake.next_event("UTXO_QUERY").await;
    assert_eq!(query["publicKey"], "u-9");

    // Reserved system wallet refs canonicalize to "root" on the wire
    state.wallets.get_by_owner("treasury-1").await.unwrap();
    let query = fake.next_event("UTXO_QUERY").await;
    assert_eq!(query["publicKey"], "root");
}

#[tokio::test]
async fn test_disconnected_send_returns_without_transmitting() {
    // Endpoint nobody listens on: the bridge stays disconnected and every
    // send is a silent drop, yet transfers still return pending entries
    let config = Config {
        ledger_endpoint: "127.0.0.1:1".to_string(),
        ledger_shared_secret: "test-secret".to_string(),
        ledger_reconnect_secs: 1,
        system_wallet_refs: vec![],
    };
    let state = initialize_app_state(&config).await.unwrap();

    state.wallets.create(WalletOwner::user("A")).await.unwrap();
    state.wallets.create(WalletOwner::user("B")).await.unwrap();
    state.wallets.apply_balance_push("A", 100_000).await.unwrap();

    let entry = state
        .ledger
        .transfer("A", "B", dec!(10), "", None)
        .await
        .unwrap();
    assert!(!entry.is_terminal());
    assert_ne!(state.bridge.state(), ConnectionState::Connected);
}
