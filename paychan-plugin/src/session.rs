//! Session facade.
//!
//! [`PaychanPlugin`] is the one object a caller holds. It runs the handshake
//! on `connect`, routes outbound sends to the peer, and tears everything
//! down on `disconnect`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use ethers::types::U256;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::{ChainClient, LedgerFactory};
use paychan_core::types::{Account, BuyReceipt};
use paychan_ledger::{MemoryLedgerFactory, RpcChainClient};

use crate::channel::TeardownReport;
use crate::config::PluginConfig;
use crate::handshake::{self, Connection};
use crate::registry::{HandlerError, HandlerRegistry};

enum SessionState {
    Disconnected,
    Connected(Box<Connection>),
}

/// One plugin instance talking to at most one peer.
///
/// # Example
///
/// ```no_run
/// use bytes::Bytes;
/// use paychan_plugin::{PaychanPlugin, PluginConfig};
///
/// # async fn run() -> paychan_core::Result<()> {
/// let config = PluginConfig::default().with_server("http://localhost:3000");
/// let plugin = PaychanPlugin::from_config(config)?;
///
/// plugin.connect().await?;
/// let reply = plugin.send_data(Bytes::from_static(b"ping")).await?;
/// plugin.send_money(1u64.into()).await?;
/// plugin.disconnect().await?;
/// # let _ = reply;
/// # Ok(())
/// # }
/// ```
pub struct PaychanPlugin {
    config: PluginConfig,
    chain: Arc<dyn ChainClient>,
    ledgers: Arc<dyn LedgerFactory>,
    handlers: Arc<HandlerRegistry>,
    state: RwLock<SessionState>,
}

impl PaychanPlugin {
    /// Creates a disconnected session over explicit collaborators.
    pub fn new(config: PluginConfig, chain: Arc<dyn ChainClient>, ledgers: Arc<dyn LedgerFactory>) -> Self {
        Self {
            config,
            chain,
            ledgers,
            handlers: Arc::new(HandlerRegistry::new()),
            state: RwLock::new(SessionState::Disconnected),
        }
    }

    /// Creates a session backed by the JSON-RPC provider in `config` and the
    /// in-process ledger engine.
    pub fn from_config(config: PluginConfig) -> Result<Self> {
        let chain = RpcChainClient::new(config.provider.clone())?.with_timeout(config.request_timeout());
        Ok(Self::new(config, Arc::new(chain), Arc::new(MemoryLedgerFactory::new())))
    }

    /// Static configuration.
    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Handler registry shared with the inbound service.
    pub fn handlers(&self) -> Arc<HandlerRegistry> {
        self.handlers.clone()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════════

    /// Runs the handshake and activates the session.
    #[instrument(skip(self))]
    pub async fn connect(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if matches!(*state, SessionState::Connected(_)) {
            return Err(PaychanError::AlreadyConnected);
        }

        info!("Connecting");
        let connection = handshake::run(
            &self.config,
            self.chain.as_ref(),
            self.ledgers.as_ref(),
            self.handlers.clone(),
        )
        .await?;

        info!(
            account = ?connection.channels.account(),
            peer = ?connection.peer.as_ref().map(|p| p.link.account),
            listening = ?connection.inbound.as_ref().map(|s| s.local_addr()),
            "Connected"
        );
        *state = SessionState::Connected(Box::new(connection));
        Ok(())
    }

    /// Stops the inbound service and closes every channel.
    ///
    /// Returns `None` if the session was not connected. Channel close
    /// failures are reported, never returned as an error.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<Option<TeardownReport>> {
        let mut state = self.state.write().await;
        let connection = match std::mem::replace(&mut *state, SessionState::Disconnected) {
            SessionState::Connected(connection) => connection,
            SessionState::Disconnected => return Ok(None),
        };

        let Connection {
            channels, inbound, ..
        } = *connection;

        if let Some(inbound) = inbound {
            inbound.stop().await;
        }
        let report = channels.teardown().await;

        info!(closed = report.closed(), failed = report.failed(), "Disconnected");
        Ok(Some(report))
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // OUTBOUND
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sends `data` to the peer and returns its data handler's response.
    pub async fn send_data(&self, data: Bytes) -> Result<Bytes> {
        let client = {
            let state = self.state.read().await;
            let connection = connected(&state)?;
            connection.peer.as_ref().ok_or(PaychanError::NoPeer)?.client.clone()
        };
        client.send_data(data).await
    }

    /// Pays `amount` to the peer.
    pub async fn send_money(&self, amount: U256) -> Result<BuyReceipt> {
        let (channels, link) = {
            let state = self.state.read().await;
            let connection = connected(&state)?;
            let peer = connection.peer.as_ref().ok_or(PaychanError::NoPeer)?;
            (connection.channels.clone(), peer.link.clone())
        };
        channels.settle(&link, amount).await
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // HANDLERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Sets the handler for inbound data.
    pub fn register_data_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Bytes, HandlerError>> + Send + 'static,
    {
        self.handlers.register_data_handler(handler);
    }

    /// Restores the default data handler.
    pub fn deregister_data_handler(&self) {
        self.handlers.deregister_data_handler();
    }

    /// Sets the handler notified of inbound money.
    pub fn register_money_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(U256) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), HandlerError>> + Send + 'static,
    {
        self.handlers.register_money_handler(handler);
    }

    /// Restores the default money handler.
    pub fn deregister_money_handler(&self) {
        self.handlers.deregister_money_handler();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // INSPECTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Whether `connect` has completed and `disconnect` has not run since.
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Connected(_))
    }

    /// Local account, once resolved by `connect`.
    pub async fn account(&self) -> Option<Account> {
        match &*self.state.read().await {
            SessionState::Connected(c) => Some(c.channels.account()),
            SessionState::Disconnected => self.config.account,
        }
    }

    /// Account of the connected peer.
    pub async fn peer_account(&self) -> Option<Account> {
        match &*self.state.read().await {
            SessionState::Connected(c) => c.peer.as_ref().map(|p| p.link.account),
            SessionState::Disconnected => None,
        }
    }

    /// Address the inbound service is bound to, while it runs.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.state.read().await {
            SessionState::Connected(c) => c.inbound.as_ref().map(|s| s.local_addr()),
            SessionState::Disconnected => None,
        }
    }
}

fn connected(state: &SessionState) -> Result<&Connection> {
    match state {
        SessionState::Connected(connection) => Ok(connection),
        SessionState::Disconnected => Err(PaychanError::NotConnected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    use parking_lot::Mutex;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use paychan_ledger::StaticChainClient;

    use crate::testing::{RecordingLedger, SharedFactory};

    fn static_chain(byte: u8) -> Arc<dyn ChainClient> {
        Arc::new(StaticChainClient::new(vec![Account::repeat_byte(byte)]))
    }

    fn recording_plugin(config: PluginConfig, ledger: Arc<RecordingLedger>) -> PaychanPlugin {
        PaychanPlugin::new(config, static_chain(0x01), Arc::new(SharedFactory(ledger)))
    }

    fn local_config() -> PluginConfig {
        PluginConfig::default()
            .with_listen_host(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_db("")
            .with_request_timeout_secs(5)
    }

    /// A receiver on an ephemeral port backed by the in-process ledger.
    async fn receiver(byte: u8) -> PaychanPlugin {
        let plugin = PaychanPlugin::new(
            local_config().with_port(0),
            static_chain(byte),
            Arc::new(MemoryLedgerFactory::new()),
        );
        plugin.connect().await.unwrap();
        plugin
    }

    /// A sender pointed at `receiver`, with its account left to discovery.
    async fn sender_to(receiver: &PaychanPlugin) -> PaychanPlugin {
        let addr = receiver.local_addr().await.unwrap();
        let plugin = PaychanPlugin::new(
            local_config().with_server(format!("http://{}", addr)),
            static_chain(0x0a),
            Arc::new(MemoryLedgerFactory::new()),
        );
        plugin.connect().await.unwrap();
        plugin
    }

    #[tokio::test]
    async fn test_connect_without_peer_never_buys() {
        let ledger = Arc::new(RecordingLedger::new());
        let plugin = recording_plugin(PluginConfig::default().with_db(""), ledger.clone());

        plugin.connect().await.unwrap();

        assert!(plugin.is_connected().await);
        assert!(ledger.buys().is_empty());
        assert_eq!(plugin.peer_account().await, None);
        assert_eq!(plugin.local_addr().await, None);
        assert_eq!(plugin.account().await, Some(Account::repeat_byte(0x01)));
    }

    #[tokio::test]
    async fn test_malformed_discovery_leaves_nothing_listening() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "peer": "x" })))
            .mount(&server)
            .await;

        let ledger = Arc::new(RecordingLedger::new());
        let plugin = recording_plugin(local_config().with_port(0).with_server(server.uri()), ledger.clone());

        let result = plugin.connect().await;

        assert!(matches!(result, Err(PaychanError::MalformedPeerResponse(_))));
        assert!(!plugin.is_connected().await);
        assert_eq!(plugin.local_addr().await, None);
        assert!(ledger.buys().is_empty());
    }

    #[tokio::test]
    async fn test_failed_warm_up_aborts_connect() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "account": "0x0202020202020202020202020202020202020202"
            })))
            .mount(&server)
            .await;

        let ledger = Arc::new(RecordingLedger::new().failing_buys());
        let plugin = recording_plugin(local_config().with_port(0).with_server(server.uri()), ledger.clone());

        let result = plugin.connect().await;

        assert!(matches!(result, Err(PaychanError::PaymentSend(_))));
        assert_eq!(ledger.buys().len(), 1);
        assert!(!plugin.is_connected().await);
        assert_eq!(plugin.local_addr().await, None);
    }

    #[tokio::test]
    async fn test_disconnect_completes_despite_close_failures() {
        let ledger = Arc::new(RecordingLedger::with_channels(4).failing_closes(&[0, 2]));
        let plugin = recording_plugin(PluginConfig::default().with_db(""), ledger.clone());
        plugin.connect().await.unwrap();

        let report = plugin.disconnect().await.unwrap().unwrap();

        assert_eq!(report.attempted(), 4);
        assert_eq!(report.failed(), 2);
        assert_eq!(ledger.close_attempts(), 4);
        assert!(!plugin.is_connected().await);
    }

    #[tokio::test]
    async fn test_repeated_disconnect_is_harmless() {
        let plugin = recording_plugin(PluginConfig::default().with_db(""), Arc::new(RecordingLedger::new()));

        assert!(plugin.disconnect().await.unwrap().is_none());
        plugin.connect().await.unwrap();
        assert!(plugin.disconnect().await.unwrap().is_some());
        assert!(plugin.disconnect().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_precondition_errors() {
        let plugin = recording_plugin(PluginConfig::default().with_db(""), Arc::new(RecordingLedger::new()));

        assert!(matches!(
            plugin.send_money(U256::from(1)).await,
            Err(PaychanError::NotConnected)
        ));
        assert!(matches!(
            plugin.send_data(Bytes::new()).await,
            Err(PaychanError::NotConnected)
        ));

        plugin.connect().await.unwrap();
        assert!(matches!(plugin.connect().await, Err(PaychanError::AlreadyConnected)));
        assert!(matches!(
            plugin.send_money(U256::from(1)).await,
            Err(PaychanError::NoPeer)
        ));
        assert!(matches!(
            plugin.send_data(Bytes::new()).await,
            Err(PaychanError::NoPeer)
        ));
    }

    #[tokio::test]
    async fn test_reconnect_runs_handshake_again() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "account": "0x0202020202020202020202020202020202020202"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let ledger = Arc::new(RecordingLedger::new());
        let plugin = recording_plugin(local_config().with_server(server.uri()), ledger.clone());

        plugin.connect().await.unwrap();
        plugin.disconnect().await.unwrap();
        plugin.connect().await.unwrap();

        assert_eq!(ledger.buys().len(), 2);
        assert_eq!(plugin.peer_account().await, Some(Account::repeat_byte(0x02)));
    }

    #[tokio::test]
    async fn test_data_round_trip() {
        let receiver = receiver(0x0b).await;
        receiver.register_data_handler(|data: Bytes| async move {
            let mut reversed = data.to_vec();
            reversed.reverse();
            Ok::<_, HandlerError>(Bytes::from(reversed))
        });
        let sender = sender_to(&receiver).await;

        let reply = sender.send_data(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(&reply[..], b"cba");

        sender.disconnect().await.unwrap();
        receiver.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_data_and_money_between_two_sessions() {
        let receiver = receiver(0x0b).await;
        receiver.register_data_handler(|_: Bytes| async {
            Ok::<_, HandlerError>(Bytes::from(vec![0xffu8; 32]))
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        receiver.register_money_handler(move |amount| {
            let sink = sink.clone();
            async move {
                sink.lock().push(amount);
                Ok::<_, HandlerError>(())
            }
        });

        let sender = sender_to(&receiver).await;
        assert_eq!(sender.account().await, Some(Account::repeat_byte(0x0a)));
        assert_eq!(sender.peer_account().await, Some(Account::repeat_byte(0x0b)));
        // Warm-up carries no price, so the handler has not fired yet.
        assert!(seen.lock().is_empty());

        let reply = sender.send_data(Bytes::from(vec![0u8; 32])).await.unwrap();
        assert_eq!(reply.len(), 32);
        assert!(reply.iter().all(|&b| b == 0xff));

        let receipt = sender.send_money(U256::from(1)).await.unwrap();
        assert!(!receipt.token.is_empty());
        assert_eq!(*seen.lock(), vec![U256::from(1)]);

        let sent = sender.disconnect().await.unwrap().unwrap();
        assert_eq!(sent.attempted(), 1);
        assert_eq!(sent.failed(), 0);
        let received = receiver.disconnect().await.unwrap().unwrap();
        assert_eq!(received.attempted(), 1);
        assert_eq!(receiver.local_addr().await, None);
    }

    #[tokio::test]
    async fn test_standalone_connect_makes_no_requests() {
        let server = MockServer::start().await;
        let plugin = PaychanPlugin::from_config(
            local_config()
                .with_provider(server.uri())
                .with_account(Account::repeat_byte(0x01)),
        )
        .unwrap();

        plugin.connect().await.unwrap();
        assert_eq!(plugin.account().await, Some(Account::repeat_byte(0x01)));
        assert_eq!(plugin.peer_account().await, None);
        plugin.disconnect().await.unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_money_handler_keeps_channel_in_sequence() {
        let receiver = receiver(0x0b).await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        receiver.register_money_handler(move |amount| {
            let first = {
                let mut seen = sink.lock();
                seen.push(amount);
                seen.len() == 1
            };
            async move {
                if first {
                    Err::<(), HandlerError>("bookkeeping offline".into())
                } else {
                    Ok(())
                }
            }
        });
        let sender = sender_to(&receiver).await;

        for _ in 0..3 {
            sender.send_money(U256::from(1)).await.unwrap();
        }

        assert_eq!(*seen.lock(), vec![U256::from(1); 3]);

        sender.disconnect().await.unwrap();
        receiver.disconnect().await.unwrap();
    }
}
