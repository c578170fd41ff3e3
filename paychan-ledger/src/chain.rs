//! Chain clients for account discovery.

use std::time::Duration;

use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use tracing::{debug, instrument};

use paychan_core::constants::DEFAULT_REQUEST_TIMEOUT_SECS;
use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::ChainClient;
use paychan_core::types::Account;

/// Reads accounts from an Ethereum JSON-RPC provider (`eth_accounts`).
#[derive(Clone, Debug)]
pub struct RpcChainClient {
    provider: Provider<Http>,
    url: String,
    timeout: Duration,
}

impl RpcChainClient {
    /// Creates a client for the provider at `url`.
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = url.into();
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| PaychanError::Config(format!("invalid provider URL '{}': {}", url, e)))?;

        Ok(Self {
            provider,
            url,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        })
    }

    /// Sets the budget for a single RPC call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Provider URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn accounts(&self) -> Result<Vec<Account>> {
        let accounts = tokio::time::timeout(self.timeout, self.provider.get_accounts())
            .await
            .map_err(|_| PaychanError::Timeout {
                operation: "eth_accounts".into(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|e| PaychanError::Chain(e.to_string()))?;

        debug!(count = accounts.len(), "Fetched provider accounts");
        Ok(accounts)
    }
}

/// A fixed account list.
#[derive(Clone, Debug, Default)]
pub struct StaticChainClient {
    accounts: Vec<Account>,
}

impl StaticChainClient {
    /// Serves `accounts` in order.
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl ChainClient for StaticChainClient {
    async fn accounts(&self) -> Result<Vec<Account>> {
        Ok(self.accounts.clone())
    }
}
