use payments_core::bootstrap;
use payments_core::config::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// Initialize logging and tracing
fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,payments_core=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("🚀 Starting wallet-ledger reconciliation core");

    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    let state = bootstrap::initialize_app_state(&config).await?;
    info!(
        "🌐 Core running, external ledger endpoint: {}",
        config.ledger_endpoint
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    for task in state.tasks {
        task.abort();
    }

    Ok(())
}
