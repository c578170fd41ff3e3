//! In-process payment ledger engine.
//!
//! Keeps every channel it funds or receives in memory, mirrors them to a
//! [`ChannelStore`], and delivers payments by posting them to the
//! receiver's gateway.
//!
//! Claims are sealed with a keccak256 digest of their fields rather than an
//! ECDSA signature: the engine works with bare account addresses and never
//! holds private keys.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::{H256, U256};
use ethers::utils::keccak256;
use rand::RngCore;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use paychan_core::constants::PAYWALL_TOKEN_HEADER;
use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::{LedgerFactory, LedgerOptions, PaymentLedger};
use paychan_core::types::{
    price_of, Account, BuyReceipt, BuyRequest, Channel, ChannelId, ChannelState, Payment,
};

use crate::store::ChannelStore;

/// Digest sealing a claim: keccak256 over channel, parties, cumulative
/// value, deposit, and metadata.
pub fn claim_digest(payment: &Payment) -> String {
    let mut buf = Vec::with_capacity(32 + 20 + 20 + 32 + 32 + payment.meta.len());
    buf.extend_from_slice(payment.channel_id.as_bytes());
    buf.extend_from_slice(payment.sender.as_bytes());
    buf.extend_from_slice(payment.receiver.as_bytes());

    let mut word = [0u8; 32];
    payment.value.to_big_endian(&mut word);
    buf.extend_from_slice(&word);
    payment.channel_value.to_big_endian(&mut word);
    buf.extend_from_slice(&word);

    buf.extend_from_slice(payment.meta.as_bytes());
    format!("0x{}", hex::encode(keccak256(&buf)))
}

/// In-process ledger engine bound to one account.
///
/// # Thread Safety
///
/// Channels live in a concurrent map. Outbound buys are serialized by one
/// lock and inbound claims by another, so cumulative values on a channel
/// never interleave while a peer paying us is never blocked by our own
/// payment to it.
pub struct MemoryLedger {
    /// Local account
    account: Account,
    /// Engine options
    options: LedgerOptions,
    /// Funded and received channels by id
    channels: DashMap<ChannelId, Channel>,
    /// Backing file, if persistence is enabled
    store: Option<ChannelStore>,
    /// Client used to post payments to gateways
    http_client: reqwest::Client,
    /// Serializes outbound buys
    buy_lock: Mutex<()>,
    /// Serializes inbound claim validation
    accept_lock: Mutex<()>,
    /// Serializes snapshot-and-save so a stale snapshot never lands last
    persist_lock: Mutex<()>,
}

impl MemoryLedger {
    /// Opens the engine for `account`, loading channels from
    /// `options.database_file` unless it is empty.
    pub async fn open(account: Account, options: LedgerOptions) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .map_err(|e| PaychanError::Config(format!("failed to build HTTP client: {}", e)))?;

        let store = if options.database_file.as_os_str().is_empty() {
            None
        } else {
            Some(ChannelStore::new(&options.database_file, account))
        };

        let channels = DashMap::new();
        if let Some(store) = &store {
            for channel in store.load().await? {
                channels.insert(channel.channel_id, channel);
            }
        }

        info!(account = ?account, channels = channels.len(), "Ledger opened");

        Ok(Self {
            account,
            options,
            channels,
            store,
            http_client,
            buy_lock: Mutex::new(()),
            accept_lock: Mutex::new(()),
            persist_lock: Mutex::new(()),
        })
    }

    /// Opens an engine with persistence disabled.
    pub async fn ephemeral(account: Account) -> Result<Self> {
        let options = LedgerOptions {
            database_file: Default::default(),
            ..LedgerOptions::default()
        };
        Self::open(account, options).await
    }

    /// Local account.
    pub fn account(&self) -> Account {
        self.account
    }

    /// Snapshot of one channel.
    pub fn channel(&self, channel_id: &ChannelId) -> Option<Channel> {
        self.channels.get(channel_id).map(|c| c.clone())
    }

    /// Snapshot of every channel, settled ones included.
    pub fn all_channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.value().clone()).collect()
    }

    async fn persist(&self) -> Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let _guard = self.persist_lock.lock().await;
        store.save(self.all_channels()).await
    }

    /// Finds an open outbound channel for the triple that covers `price`.
    fn find_channel(&self, request: &BuyRequest) -> Option<Channel> {
        self.channels
            .iter()
            .find(|c| {
                c.serves(&self.account, &request.receiver, &request.gateway)
                    && c.can_cover(request.price)
            })
            .map(|c| c.value().clone())
    }

    fn new_channel(&self, request: &BuyRequest) -> Channel {
        let mut id = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut id);
        let deposit = request.price.max(self.options.minimum_channel_amount);

        Channel::open(
            H256::from(id),
            self.account,
            request.receiver,
            request.gateway.clone(),
            deposit,
        )
    }

    async fn post_payment(&self, gateway: &str, payment: &Payment) -> Result<String> {
        let response = self
            .http_client
            .post(gateway)
            .json(payment)
            .send()
            .await
            .map_err(|e| PaychanError::PaymentSend(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaychanError::PaymentSend(format!(
                "gateway {} responded {}: {}",
                gateway, status, body
            )));
        }

        response
            .headers()
            .get(PAYWALL_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| {
                PaychanError::PaymentSend(format!("gateway {} returned no settlement token", gateway))
            })
    }
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    #[instrument(skip(self, request), fields(price = %request.price, gateway = %request.gateway))]
    async fn buy(&self, request: BuyRequest) -> Result<BuyReceipt> {
        let _guard = self.buy_lock.lock().await;

        let mut channel = match self.find_channel(&request) {
            Some(channel) => channel,
            None => {
                let channel = self.new_channel(&request);
                info!(
                    channel_id = ?channel.channel_id,
                    receiver = ?request.receiver,
                    deposit = %channel.value,
                    "Opening channel"
                );
                channel
            }
        };

        let value = channel.spent + request.price;
        let mut payment = Payment {
            channel_id: channel.channel_id,
            sender: self.account,
            receiver: request.receiver,
            price: price_of(request.price).map_err(|e| PaychanError::PaymentSend(e.to_string()))?,
            value,
            channel_value: channel.value,
            meta: request.meta.clone(),
            signature: String::new(),
        };
        payment.signature = claim_digest(&payment);

        let token = self.post_payment(&request.gateway, &payment).await?;

        channel.spent = value;
        let channel_id = channel.channel_id;
        self.channels.insert(channel_id, channel);
        self.persist().await?;

        debug!(channel_id = ?channel_id, value = %value, "Payment delivered");
        Ok(BuyReceipt { channel_id, token })
    }

    #[instrument(skip(self, payment), fields(channel_id = ?payment.channel_id, price = %payment.price))]
    async fn accept_payment(&self, payment: Payment) -> Result<String> {
        let _guard = self.accept_lock.lock().await;

        if payment.receiver != self.account {
            return Err(PaychanError::PaymentRejected(format!(
                "payment addressed to {:?}, not {:?}",
                payment.receiver, self.account
            )));
        }
        if payment.signature != claim_digest(&payment) {
            return Err(PaychanError::PaymentRejected("claim digest mismatch".into()));
        }
        if payment.price.is_negative() {
            return Err(PaychanError::PaymentRejected("negative price".into()));
        }
        if payment.value > payment.channel_value {
            return Err(PaychanError::PaymentRejected(format!(
                "claim {} exceeds deposit {}",
                payment.value, payment.channel_value
            )));
        }

        let price = payment.price.into_raw();
        let mut channel = match self.channel(&payment.channel_id) {
            Some(existing) => {
                if existing.sender != payment.sender || !existing.is_open() {
                    return Err(PaychanError::PaymentRejected(
                        "channel is not open for this sender".into(),
                    ));
                }
                if existing.value != payment.channel_value {
                    return Err(PaychanError::PaymentRejected(format!(
                        "claim deposit {} does not match channel deposit {}",
                        payment.channel_value, existing.value
                    )));
                }
                existing
            }
            None => Channel::open(
                payment.channel_id,
                payment.sender,
                self.account,
                String::new(),
                payment.channel_value,
            ),
        };

        if payment.value < channel.spent || payment.value > channel.value {
            return Err(PaychanError::PaymentRejected(format!(
                "claim value {} outside [{}, {}]",
                payment.value, channel.spent, channel.value
            )));
        }
        if channel.spent.checked_add(price) != Some(payment.value) {
            warn!(
                spent = %channel.spent,
                value = %payment.value,
                "Claim out of sequence"
            );
            return Err(PaychanError::PaymentRejected(format!(
                "claim value {} does not extend spent {} by {}",
                payment.value, channel.spent, price
            )));
        }

        channel.spent = payment.value;
        self.channels.insert(channel.channel_id, channel);
        self.persist().await?;

        Ok(uuid::Uuid::new_v4().simple().to_string())
    }

    async fn channels(&self) -> Result<Vec<Channel>> {
        Ok(self
            .channels
            .iter()
            .filter(|c| c.state != ChannelState::Settled)
            .map(|c| c.value().clone())
            .collect())
    }

    #[instrument(skip(self))]
    async fn close(&self, channel_id: &ChannelId) -> Result<()> {
        {
            let mut channel = self
                .channels
                .get_mut(channel_id)
                .ok_or_else(|| PaychanError::Ledger(format!("unknown channel {:?}", channel_id)))?;
            if channel.state == ChannelState::Settled {
                return Err(PaychanError::Ledger(format!(
                    "channel {:?} is already settled",
                    channel_id
                )));
            }
            channel.state = ChannelState::Settled;
        }
        self.persist().await?;

        info!(channel_id = ?channel_id, "Channel settled");
        Ok(())
    }
}

/// Opens a [`MemoryLedger`] per connecting session.
#[derive(Clone, Debug, Default)]
pub struct MemoryLedgerFactory;

impl MemoryLedgerFactory {
    /// Creates a new factory.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LedgerFactory for MemoryLedgerFactory {
    async fn open(&self, account: Account, options: &LedgerOptions) -> Result<Arc<dyn PaymentLedger>> {
        let ledger = MemoryLedger::open(account, options.clone()).await?;
        Ok(Arc::new(ledger))
    }
}
