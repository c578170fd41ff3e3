//! Payments and buy requests.

use ethers::types::{I256, U256};
use serde::{Deserialize, Serialize};

use super::amount::{decimal_i256, decimal_u256};
use super::{Account, ChannelId};

/// A signed claim against a channel.
///
/// The sender's ledger engine builds it and posts it to the receiver's
/// gateway. Apart from [`Payment::price`], the session treats it as opaque
/// and hands it to the receiving ledger engine for validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Channel the claim is made against
    pub channel_id: ChannelId,
    /// Paying account
    pub sender: Account,
    /// Receiving account
    pub receiver: Account,
    /// Increment paid by this claim
    #[serde(with = "decimal_i256")]
    pub price: I256,
    /// Cumulative amount claimed on the channel, including `price`
    #[serde(with = "decimal_u256")]
    pub value: U256,
    /// Deposit of the channel
    #[serde(with = "decimal_u256")]
    pub channel_value: U256,
    /// Free-form metadata supplied with the buy
    #[serde(default)]
    pub meta: String,
    /// Sender's signature over the claim (0x-prefixed hex)
    #[serde(default)]
    pub signature: String,
}

impl Payment {
    /// Returns true if the claim carries a strictly positive price.
    pub fn is_priced(&self) -> bool {
        self.price.is_positive()
    }

    /// The price as an unsigned amount, if strictly positive.
    pub fn priced_amount(&self) -> Option<U256> {
        self.is_priced().then(|| self.price.into_raw())
    }
}

/// A request to pay `price` to `receiver` through `gateway`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyRequest {
    /// Amount to pay
    #[serde(with = "decimal_u256")]
    pub price: U256,
    /// Gateway URL the payment is posted to
    pub gateway: String,
    /// Receiving account
    pub receiver: Account,
    /// Free-form metadata
    #[serde(default)]
    pub meta: String,
}

impl BuyRequest {
    /// Creates a buy request with empty metadata.
    pub fn new(price: U256, gateway: impl Into<String>, receiver: Account) -> Self {
        Self {
            price,
            gateway: gateway.into(),
            receiver,
            meta: String::new(),
        }
    }

    /// Zero-value request used to open a channel ahead of real payments.
    pub fn warm_up(gateway: impl Into<String>, receiver: Account) -> Self {
        Self::new(U256::zero(), gateway, receiver)
    }
}

/// Confirmation of a completed buy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyReceipt {
    /// Channel the payment was made on
    pub channel_id: ChannelId,
    /// Settlement token returned by the gateway
    pub token: String,
}
