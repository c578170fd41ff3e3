//! Channel manager.
//!
//! Thin orchestration over the ledger engine: warm-up on connect, settlement
//! on send, and close-all on disconnect.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::U256;
use tracing::{error, info, instrument, warn};

use paychan_core::constants::MONEY_PATH;
use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::PaymentLedger;
use paychan_core::types::{Account, BuyReceipt, BuyRequest, ChannelId};

/// A connected peer: its base URL and its account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeerLink {
    /// Base URL without a trailing slash
    pub base_url: String,
    /// Peer account learned during discovery
    pub account: Account,
}

impl PeerLink {
    /// Gateway URL where payments to this peer are routed.
    pub fn gateway(&self) -> String {
        format!("{}{}", self.base_url, MONEY_PATH)
    }
}

/// Result of closing one channel.
#[derive(Debug)]
pub struct CloseOutcome {
    /// Channel that was closed
    pub channel_id: ChannelId,
    /// `Ok` if closed, otherwise the [`PaychanError::ChannelClose`] that was logged
    pub result: Result<()>,
}

/// Per-channel outcomes of a teardown.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// One outcome per channel attempted, in ledger order
    pub outcomes: Vec<CloseOutcome>,
}

impl TeardownReport {
    /// Number of closes attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of channels closed.
    pub fn closed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    /// Number of channels that failed to close.
    pub fn failed(&self) -> usize {
        self.attempted() - self.closed()
    }
}

/// Drives the ledger engine on behalf of one session.
#[derive(Clone)]
pub struct ChannelManager {
    ledger: Arc<dyn PaymentLedger>,
    account: Account,
    call_timeout: Duration,
}

impl ChannelManager {
    /// Creates a manager for `account` over `ledger`.
    pub fn new(ledger: Arc<dyn PaymentLedger>, account: Account, call_timeout: Duration) -> Self {
        Self {
            ledger,
            account,
            call_timeout,
        }
    }

    /// Local account.
    pub fn account(&self) -> Account {
        self.account
    }

    async fn bounded<T>(&self, operation: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| PaychanError::Timeout {
                operation: operation.into(),
                seconds: self.call_timeout.as_secs(),
            })?
    }

    /// Opens a zero-value channel to `peer` ahead of real payments.
    #[instrument(skip(self), fields(peer = ?peer.account))]
    pub async fn warm_up(&self, peer: &PeerLink) -> Result<BuyReceipt> {
        let request = BuyRequest::warm_up(peer.gateway(), peer.account);
        let receipt = self
            .bounded("channel warm-up", self.ledger.buy(request))
            .await
            .map_err(into_send_error)?;

        info!(channel_id = ?receipt.channel_id, "Channel warm");
        Ok(receipt)
    }

    /// Pays `amount` to `peer`.
    #[instrument(skip(self), fields(peer = ?peer.account, amount = %amount))]
    pub async fn settle(&self, peer: &PeerLink, amount: U256) -> Result<BuyReceipt> {
        let request = BuyRequest::new(amount, peer.gateway(), peer.account);
        self.bounded("payment", self.ledger.buy(request))
            .await
            .map_err(into_send_error)
    }

    /// Closes every channel the ledger reports.
    ///
    /// Each close is attempted independently; a failure is logged and
    /// recorded in the report but never stops the remaining closes.
    pub async fn teardown(&self) -> TeardownReport {
        let channels = match self.bounded("list channels", self.ledger.channels()).await {
            Ok(channels) => channels,
            Err(e) => {
                error!(error = %e, "Failed to list channels for teardown");
                return TeardownReport::default();
            }
        };

        let mut report = TeardownReport::default();
        for channel in channels {
            let channel_id = channel.channel_id;
            let result = self
                .bounded("close channel", self.ledger.close(&channel_id))
                .await
                .map_err(|e| PaychanError::ChannelClose {
                    channel_id: format!("{:?}", channel_id),
                    reason: e.to_string(),
                });

            match &result {
                Ok(()) => info!(channel_id = ?channel_id, "Closed channel"),
                Err(e) => error!(error = %e, "Error closing channel"),
            }
            report.outcomes.push(CloseOutcome { channel_id, result });
        }

        if report.failed() > 0 {
            warn!(
                attempted = report.attempted(),
                failed = report.failed(),
                "Teardown finished with failures"
            );
        }
        report
    }
}

fn into_send_error(err: PaychanError) -> PaychanError {
    match err {
        PaychanError::PaymentSend(_) => err,
        other => PaychanError::PaymentSend(other.to_string()),
    }
}
