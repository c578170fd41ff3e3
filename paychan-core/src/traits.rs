//! Collaborator traits for paychan.
//!
//! The session protocol does not implement payment channels or talk to the
//! chain itself. It drives these traits, which lets the ledger engine and
//! the chain client be swapped (in-memory for tests, RPC-backed in
//! production).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;

use crate::constants::{DEFAULT_DATABASE_FILE, DEFAULT_MINIMUM_CHANNEL_AMOUNT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::error::Result;
use crate::types::{Account, BuyReceipt, BuyRequest, Channel, ChannelId, Payment};

// ═══════════════════════════════════════════════════════════════════════════════
// PAYMENT LEDGER
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface of a payment-channel ledger engine bound to one local account.
///
/// Implementations own channel persistence and any locking needed to keep
/// cumulative payment values ordered under concurrent buys.
#[async_trait]
pub trait PaymentLedger: Send + Sync {
    /// Pays `request.price` to `request.receiver` through `request.gateway`.
    ///
    /// Opens a channel first if none can cover the price, then builds a
    /// [`Payment`] and posts it to the gateway.
    async fn buy(&self, request: BuyRequest) -> Result<BuyReceipt>;

    /// Validates an inbound payment and returns a settlement token.
    async fn accept_payment(&self, payment: Payment) -> Result<String>;

    /// Lists the channels this engine knows about.
    async fn channels(&self) -> Result<Vec<Channel>>;

    /// Closes one channel.
    async fn close(&self, channel_id: &ChannelId) -> Result<()>;
}

/// Options handed to a [`LedgerFactory`] when a session connects.
#[derive(Clone, Debug)]
pub struct LedgerOptions {
    /// Where the engine keeps channel state. Empty disables persistence.
    pub database_file: PathBuf,
    /// Minimum deposit of a newly opened channel
    pub minimum_channel_amount: U256,
    /// Budget for network calls made by the engine
    pub request_timeout: Duration,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            database_file: PathBuf::from(DEFAULT_DATABASE_FILE),
            minimum_channel_amount: U256::from(DEFAULT_MINIMUM_CHANNEL_AMOUNT),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Opens a ledger engine for an account resolved during the handshake.
#[async_trait]
pub trait LedgerFactory: Send + Sync {
    /// Opens (or reopens) the engine for `account`, loading any stored channels.
    async fn open(&self, account: Account, options: &LedgerOptions) -> Result<Arc<dyn PaymentLedger>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHAIN CLIENT
// ═══════════════════════════════════════════════════════════════════════════════

/// Interface to the chain provider.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Accounts managed by the provider, in provider order.
    async fn accounts(&self) -> Result<Vec<Account>>;
}
