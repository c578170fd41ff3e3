//! Peer handshake.
//!
//! Resolves the local account, opens the ledger engine, discovers the peer,
//! warms a channel to it, and starts the inbound service. Any failure
//! aborts the whole attempt; the service is only started once every earlier
//! step has succeeded.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::{ChainClient, LedgerFactory};
use paychan_core::types::Account;

use crate::channel::{ChannelManager, PeerLink};
use crate::client::PeerClient;
use crate::config::PluginConfig;
use crate::registry::HandlerRegistry;
use crate::server::InboundService;
use crate::state::AppState;

/// A connected peer and the client that reaches it.
pub(crate) struct Peer {
    pub link: PeerLink,
    pub client: PeerClient,
}

/// Everything a completed handshake produces.
pub(crate) struct Connection {
    pub channels: ChannelManager,
    pub peer: Option<Peer>,
    pub inbound: Option<InboundService>,
}

/// Picks the configured account or the provider's first one.
pub(crate) async fn resolve_account(config: &PluginConfig, chain: &dyn ChainClient) -> Result<Account> {
    if let Some(account) = config.account {
        return Ok(account);
    }
    let accounts = chain.accounts().await?;
    accounts.first().copied().ok_or(PaychanError::NoAccount)
}

#[instrument(skip_all, fields(server = ?config.server, port = ?config.port))]
pub(crate) async fn run(
    config: &PluginConfig,
    chain: &dyn ChainClient,
    ledgers: &dyn LedgerFactory,
    handlers: Arc<HandlerRegistry>,
) -> Result<Connection> {
    config.validate()?;

    let account = resolve_account(config, chain).await?;
    debug!(account = ?account, "Resolved local account");

    let ledger = ledgers.open(account, &config.ledger_options()).await?;
    let channels = ChannelManager::new(ledger.clone(), account, config.request_timeout());

    let peer = match config.server_base() {
        Some(base) => {
            info!(peer = base, "Attempting to connect to peer");
            let client = PeerClient::new(base, config.request_timeout())?;
            let peer_account = client.discover().await?;
            let link = PeerLink {
                base_url: client.base_url().to_string(),
                account: peer_account,
            };
            info!(peer_account = ?peer_account, "Connected to peer");

            // Open the channel now so the first real payment does not pay
            // the channel-open latency.
            channels.warm_up(&link).await?;
            Some(Peer { link, client })
        }
        None => None,
    };

    let inbound = match config.port {
        Some(port) => {
            let state = Arc::new(AppState::new(account, ledger, handlers));
            let addr = SocketAddr::new(config.listen_host, port);
            Some(InboundService::start(addr, state, config.max_body_bytes).await?)
        }
        None => None,
    };

    Ok(Connection {
        channels,
        peer,
        inbound,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use paychan_ledger::StaticChainClient;

    #[tokio::test]
    async fn test_configured_account_skips_provider() {
        let config = PluginConfig::default().with_account(Account::repeat_byte(0x05));
        let chain = StaticChainClient::default();

        let account = resolve_account(&config, &chain).await.unwrap();
        assert_eq!(account, Account::repeat_byte(0x05));
    }

    #[tokio::test]
    async fn test_first_provider_account_wins() {
        let chain = StaticChainClient::new(vec![Account::repeat_byte(0x07), Account::repeat_byte(0x08)]);

        let account = resolve_account(&PluginConfig::default(), &chain).await.unwrap();
        assert_eq!(account, Account::repeat_byte(0x07));
    }

    #[tokio::test]
    async fn test_empty_provider_is_no_account() {
        let result = resolve_account(&PluginConfig::default(), &StaticChainClient::default()).await;
        assert!(matches!(result, Err(PaychanError::NoAccount)));
    }
}
