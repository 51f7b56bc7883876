// Reconciliation sweeper - time-driven cleanup of records that never
// received their callback from the external ledger.
//
// Hourly:
// - Obligations stuck in processing for over an hour go back to pending
//   (protects against a dropped confirmation callback)
// - Pending obligations whose wallet balance now suffices are drained
//   proactively (covers balance changes that arrived with no push)
//
// Daily (midnight UTC):
// - Balance entries still unterminal after 24h are force-rejected and
//   annotated "failed-to-be-processed"
// - Obligations processing for over 24h go back to pending
//
// The windows are policy constants, not negotiated with the ledger. A real
// confirmation arriving after a forced rejection is logged as a conflict
// and dropped by the balance ledger.

use crate::ledger::BalanceLedger;
use crate::settlement::queue::SettlementQueue;
use crate::wallet::WalletStore;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info, warn};

/// Stuck-processing window for the hourly sweep
const PROCESSING_STALE_HOURS: i64 = 1;
/// Unterminal-entry window for the daily sweep
const UNTERMINAL_STALE_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct SweeperConfig {
    /// Seconds between hourly sweep runs
    pub hourly_interval_secs: u64,
    /// UTC hour for the daily sweep (0-23)
    pub daily_execution_hour: u32,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            hourly_interval_secs: 3600,
            daily_execution_hour: 0,
        }
    }
}

pub struct ReconciliationSweeper {
    config: SweeperConfig,
    ledger: Arc<BalanceLedger>,
    queue: Arc<SettlementQueue>,
    wallets: Arc<WalletStore>,
}

impl ReconciliationSweeper {
    pub fn new(
        config: SweeperConfig,
        ledger: Arc<BalanceLedger>,
        queue: Arc<SettlementQueue>,
        wallets: Arc<WalletStore>,
    ) -> Self {
        Self {
            config,
            ledger,
            queue,
            wallets,
        }
    }

    /// Start both sweep schedules in the background
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let hourly = {
            let sweeper = self.clone();
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(sweeper.config.hourly_interval_secs));
                // The first tick fires immediately; skip it so startup is quiet
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    sweeper.hourly_sweep(Utc::now()).await;
                }
            })
        };

        let daily = {
            let sweeper = self.clone();
            tokio::spawn(async move {
                loop {
                    let now = Utc::now();
                    let next_execution =
                        Self::calculate_next_daily_execution(now, sweeper.config.daily_execution_hour);
                    let wait = next_execution.signed_duration_since(now);
                    if wait.num_seconds() > 0 {
                        info!(
                            "⏰ Next daily sweep scheduled for {} UTC",
                            next_execution.format("%H:%M:%S")
                        );
                        tokio::time::sleep(Duration::from_secs(wait.num_seconds() as u64)).await;
                    }
                    sweeper.daily_sweep(Utc::now()).await;
                }
            })
        };

        vec![hourly, daily]
    }

    /// Revert stuck processing obligations and proactively drain pending
    /// obligations whose payer balance now suffices
    pub async fn hourly_sweep(&self, now: DateTime<Utc>) {
        info!("🔄 Starting hourly reconciliation sweep");

        let cutoff = now - ChronoDuration::hours(PROCESSING_STALE_HOURS);
        let reverted = self.queue.revert_stale_processing(cutoff).await;
        if reverted > 0 {
            warn!("↩️  Reverted {} stuck obligations to pending", reverted);
        }

        // One drain per distinct payer; drain itself picks the first
        // obligation the balance covers, so no affordability pre-filter here
        let mut seen_users = HashSet::new();
        for obligation in self.queue.pending().await {
            if !seen_users.insert(obligation.user_id.clone()) {
                continue;
            }
            let wallet = match self.wallets.get_by_owner(&obligation.user_id).await {
                Ok(wallet) => wallet,
                Err(e) => {
                    warn!("Sweep skipping obligation {}: {}", obligation.id, e);
                    continue;
                }
            };
            if let Err(e) = self.queue.drain(&wallet).await {
                error!("Proactive drain failed for {}: {}", obligation.user_id, e);
            }
        }

        info!("✓ Hourly sweep completed");
    }

    /// Force-reject balance entries with no callback after 24h and revert
    /// obligations processing for as long
    pub async fn daily_sweep(&self, now: DateTime<Utc>) {
        info!("🔄 Starting daily reconciliation sweep");

        let cutoff = now - ChronoDuration::hours(UNTERMINAL_STALE_HOURS);
        let rejected = self.ledger.force_reject_stale(cutoff).await;
        if rejected > 0 {
            warn!("⛔ Force-rejected {} entries with no callback in 24h", rejected);
        }

        let reverted = self.queue.revert_stale_processing(cutoff).await;
        if reverted > 0 {
            warn!("↩️  Reverted {} obligations processing for over 24h", reverted);
        }

        info!("✓ Daily sweep completed");
    }

    /// Next occurrence of the configured UTC hour
    fn calculate_next_daily_execution(now: DateTime<Utc>, execution_hour: u32) -> DateTime<Utc> {
        let mut next = now
            .date_naive()
            .and_hms_opt(execution_hour, 0, 0)
            .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap());
        let next_dt = Utc.from_utc_datetime(&next);

        if next_dt <= now {
            next = (now.date_naive() + ChronoDuration::days(1))
                .and_hms_opt(execution_hour, 0, 0)
                .unwrap_or_else(|| now.date_naive().and_hms_opt(0, 0, 0).unwrap());
            Utc.from_utc_datetime(&next)
        } else {
            next_dt
        }
    }
}
