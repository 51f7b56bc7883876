use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// host:port of the external ledger endpoint
    pub ledger_endpoint: String,
    /// Shared secret mixed into transaction signatures
    pub ledger_shared_secret: String,
    /// Fixed reconnect delay after a dropped connection (seconds)
    pub ledger_reconnect_secs: u64,
    /// Reserved system/treasury wallet refs, canonicalized to "root" on the wire
    pub system_wallet_refs: Vec<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            ledger_endpoint: std::env::var("LEDGER_ENDPOINT")
                .unwrap_or_else(|_| "127.0.0.1:9440".to_string()),
            ledger_shared_secret: std::env::var("LEDGER_SHARED_SECRET")
                .unwrap_or_else(|_| "dev-secret".to_string()),
            ledger_reconnect_secs: std::env::var("LEDGER_RECONNECT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            system_wallet_refs: std::env::var("SYSTEM_WALLET_REFS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}
