//! Plugin configuration.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

use ethers::types::U256;

use paychan_core::constants::*;
use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::LedgerOptions;
use paychan_core::types::{parse_amount, Account};

/// Static configuration of one plugin instance.
#[derive(Clone, Debug)]
pub struct PluginConfig {
    /// Port the inbound service listens on. `None` means outbound-only;
    /// `Some(0)` picks an ephemeral port.
    pub port: Option<u16>,
    /// Interface the inbound service binds to
    pub listen_host: IpAddr,
    /// Base URL of the peer. `None` means standalone.
    pub server: Option<String>,
    /// Chain provider URL
    pub provider: String,
    /// Local account. Discovered from the provider when `None`.
    pub account: Option<Account>,
    /// Channel-state storage location handed to the ledger engine
    pub db: PathBuf,
    /// Minimum deposit of a newly opened channel
    pub minimum_channel_amount: U256,
    /// Budget for every outbound request and ledger call
    pub request_timeout_secs: u64,
    /// Largest inbound request body
    pub max_body_bytes: usize,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            port: None,
            listen_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            server: None,
            provider: DEFAULT_PROVIDER_URI.into(),
            account: None,
            db: PathBuf::from(DEFAULT_DATABASE_FILE),
            minimum_channel_amount: U256::from(DEFAULT_MINIMUM_CHANNEL_AMOUNT),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| PaychanError::Config(format!("{}='{}': {}", key, raw, e)))
        })
        .transpose()
}

impl PluginConfig {
    /// Reads configuration from `PAYCHAN_*` environment variables, loading
    /// a `.env` file first if one exists.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            port: parse_env("PAYCHAN_PORT")?,
            listen_host: parse_env("PAYCHAN_LISTEN_HOST")?.unwrap_or(defaults.listen_host),
            server: env_var("PAYCHAN_SERVER"),
            provider: env_var("PAYCHAN_PROVIDER").unwrap_or(defaults.provider),
            account: parse_env("PAYCHAN_ACCOUNT")?,
            db: env_var("PAYCHAN_DB").map(PathBuf::from).unwrap_or(defaults.db),
            minimum_channel_amount: env_var("PAYCHAN_MIN_CHANNEL_AMOUNT")
                .map(|raw| parse_amount(&raw))
                .transpose()?
                .unwrap_or(defaults.minimum_channel_amount),
            request_timeout_secs: parse_env("PAYCHAN_REQUEST_TIMEOUT")?
                .unwrap_or(defaults.request_timeout_secs),
            max_body_bytes: parse_env("PAYCHAN_MAX_BODY_BYTES")?.unwrap_or(defaults.max_body_bytes),
        })
    }

    /// Sets the listen port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the listen interface.
    pub fn with_listen_host(mut self, host: IpAddr) -> Self {
        self.listen_host = host;
        self
    }

    /// Sets the peer base URL.
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Sets the chain provider URL.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Pins the local account instead of asking the provider.
    pub fn with_account(mut self, account: Account) -> Self {
        self.account = Some(account);
        self
    }

    /// Sets the channel-state storage location.
    pub fn with_db(mut self, db: impl Into<PathBuf>) -> Self {
        self.db = db.into();
        self
    }

    /// Sets the minimum channel deposit.
    pub fn with_minimum_channel_amount(mut self, amount: U256) -> Self {
        self.minimum_channel_amount = amount;
        self
    }

    /// Sets the request timeout in seconds.
    pub fn with_request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Rejects configurations that can never connect.
    pub fn validate(&self) -> Result<()> {
        if let Some(server) = &self.server {
            url::Url::parse(server)
                .map_err(|e| PaychanError::Config(format!("invalid server URL '{}': {}", server, e)))?;
        }
        if self.request_timeout_secs == 0 {
            return Err(PaychanError::Config("request timeout must be positive".into()));
        }
        Ok(())
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Peer base URL without a trailing slash.
    pub fn server_base(&self) -> Option<&str> {
        self.server.as_deref().map(|s| s.trim_end_matches('/'))
    }

    /// Options for the ledger engine opened on connect.
    pub fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            database_file: self.db.clone(),
            minimum_channel_amount: self.minimum_channel_amount,
            request_timeout: self.request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.port, None);
        assert_eq!(config.server, None);
        assert_eq!(config.provider, "http://localhost:8545");
        assert_eq!(config.db, PathBuf::from("paychan_db"));
        assert_eq!(config.minimum_channel_amount, U256::from(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_and_server_base() {
        let config = PluginConfig::default()
            .with_port(3000)
            .with_server("http://localhost:3000/")
            .with_db("sender_db");

        assert_eq!(config.port, Some(3000));
        assert_eq!(config.server_base(), Some("http://localhost:3000"));
        assert_eq!(config.ledger_options().database_file, PathBuf::from("sender_db"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = PluginConfig::default().with_server("not a url");
        assert!(matches!(bad_url.validate(), Err(PaychanError::Config(_))));

        let zero_timeout = PluginConfig::default().with_request_timeout_secs(0);
        assert!(matches!(zero_timeout.validate(), Err(PaychanError::Config(_))));
    }

    // Single test so no other test observes the process-wide variables.
    #[test]
    fn test_from_env() {
        const KEYS: [&str; 4] = [
            "PAYCHAN_PORT",
            "PAYCHAN_SERVER",
            "PAYCHAN_MIN_CHANNEL_AMOUNT",
            "PAYCHAN_REQUEST_TIMEOUT",
        ];

        std::env::set_var("PAYCHAN_PORT", "not-a-port");
        let bad_port = PluginConfig::from_env();
        assert!(matches!(bad_port, Err(PaychanError::Config(msg)) if msg.contains("PAYCHAN_PORT")));

        std::env::set_var("PAYCHAN_PORT", "3000");
        std::env::set_var("PAYCHAN_SERVER", "http://peer.example:4000");
        std::env::set_var("PAYCHAN_MIN_CHANNEL_AMOUNT", "0x10");
        std::env::set_var("PAYCHAN_REQUEST_TIMEOUT", " 7 ");
        let config = PluginConfig::from_env();
        for key in KEYS {
            std::env::remove_var(key);
        }

        let config = config.unwrap();
        assert_eq!(config.port, Some(3000));
        assert_eq!(config.server_base(), Some("http://peer.example:4000"));
        assert_eq!(config.minimum_channel_amount, U256::from(16));
        assert_eq!(config.request_timeout(), Duration::from_secs(7));
    }
}
