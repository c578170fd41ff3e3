//! Test doubles for the ledger seam.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{H256, U256};
use parking_lot::Mutex;

use paychan_core::error::{PaychanError, Result};
use paychan_core::traits::{LedgerFactory, LedgerOptions, PaymentLedger};
use paychan_core::types::{Account, BuyReceipt, BuyRequest, Channel, ChannelId, Payment};

/// Ledger that records calls and fails on demand.
#[derive(Default)]
pub struct RecordingLedger {
    channels: Vec<Channel>,
    failing_closes: HashSet<ChannelId>,
    fail_buys: bool,
    fail_listing: bool,
    reject_payments: bool,
    buys: Mutex<Vec<BuyRequest>>,
    payments: Mutex<Vec<Payment>>,
    close_attempts: AtomicUsize,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger reporting `n` open channels.
    pub fn with_channels(n: usize) -> Self {
        let channels = (0..n)
            .map(|i| {
                Channel::open(
                    H256::from_low_u64_be(i as u64 + 1),
                    Account::repeat_byte(0x01),
                    Account::repeat_byte(0x02),
                    "http://peer/money",
                    U256::from(100),
                )
            })
            .collect();
        Self {
            channels,
            ..Self::default()
        }
    }

    /// Makes closing the channels at `indices` fail.
    pub fn failing_closes(mut self, indices: &[usize]) -> Self {
        self.failing_closes = indices
            .iter()
            .map(|&i| self.channels[i].channel_id)
            .collect();
        self
    }

    pub fn failing_buys(mut self) -> Self {
        self.fail_buys = true;
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn rejecting_payments(mut self) -> Self {
        self.reject_payments = true;
        self
    }

    pub fn buys(&self) -> Vec<BuyRequest> {
        self.buys.lock().clone()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.payments.lock().clone()
    }

    pub fn close_attempts(&self) -> usize {
        self.close_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentLedger for RecordingLedger {
    async fn buy(&self, request: BuyRequest) -> Result<BuyReceipt> {
        self.buys.lock().push(request);
        if self.fail_buys {
            return Err(PaychanError::Ledger("buy refused".into()));
        }
        Ok(BuyReceipt {
            channel_id: H256::repeat_byte(0xcc),
            token: "receipt".into(),
        })
    }

    async fn accept_payment(&self, payment: Payment) -> Result<String> {
        if self.reject_payments {
            return Err(PaychanError::PaymentRejected("bad claim".into()));
        }
        let mut payments = self.payments.lock();
        payments.push(payment);
        Ok(format!("token-{}", payments.len()))
    }

    async fn channels(&self) -> Result<Vec<Channel>> {
        if self.fail_listing {
            return Err(PaychanError::Ledger("storage offline".into()));
        }
        Ok(self.channels.clone())
    }

    async fn close(&self, channel_id: &ChannelId) -> Result<()> {
        self.close_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_closes.contains(channel_id) {
            return Err(PaychanError::Ledger("close refused".into()));
        }
        Ok(())
    }
}

/// Factory handing out one shared [`RecordingLedger`].
pub struct SharedFactory(pub Arc<RecordingLedger>);

#[async_trait]
impl LedgerFactory for SharedFactory {
    async fn open(&self, _account: Account, _options: &LedgerOptions) -> Result<Arc<dyn PaymentLedger>> {
        Ok(self.0.clone())
    }
}

/// A payment with the given price, shaped for the money endpoint.
pub fn payment_json(price: i64) -> serde_json::Value {
    serde_json::json!({
        "channel_id": format!("{:?}", ChannelId::repeat_byte(0xaa)),
        "sender": format!("{:?}", Account::repeat_byte(0x01)),
        "receiver": format!("{:?}", Account::repeat_byte(0x02)),
        "price": price,
        "value": "10",
        "channel_value": "100"
    })
}
