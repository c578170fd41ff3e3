//! Payment channel types.

use ethers::types::{H256, U256};
use serde::{Deserialize, Serialize};

use super::amount::decimal_u256;
use super::Account;

/// Identifier of a payment channel.
pub type ChannelId = H256;

/// Lifecycle state of a channel as tracked by the ledger engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Accepting payments
    Open,
    /// Close requested, awaiting settlement
    Settling,
    /// Settled; no further payments
    Settled,
}

/// A unidirectional payment channel funded by `sender` for `receiver`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier
    pub channel_id: ChannelId,
    /// Funding account
    pub sender: Account,
    /// Receiving account
    pub receiver: Account,
    /// Gateway URL payments on this channel are posted to
    #[serde(default)]
    pub gateway: String,
    /// Deposit locked in the channel
    #[serde(with = "decimal_u256")]
    pub value: U256,
    /// Cumulative amount paid so far. Never decreases.
    #[serde(with = "decimal_u256")]
    pub spent: U256,
    /// Current state
    pub state: ChannelState,
}

impl Channel {
    /// Opens a fresh channel record with nothing spent.
    pub fn open(
        channel_id: ChannelId,
        sender: Account,
        receiver: Account,
        gateway: impl Into<String>,
        value: U256,
    ) -> Self {
        Self {
            channel_id,
            sender,
            receiver,
            gateway: gateway.into(),
            value,
            spent: U256::zero(),
            state: ChannelState::Open,
        }
    }

    /// Returns true if the channel still accepts payments.
    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Deposit not yet spent.
    pub fn remaining(&self) -> U256 {
        self.value.saturating_sub(self.spent)
    }

    /// Returns true if an open channel can absorb `price` more.
    pub fn can_cover(&self, price: U256) -> bool {
        self.is_open() && self.remaining() >= price
    }

    /// Returns true if this channel serves the (sender, receiver, gateway) triple.
    pub fn serves(&self, sender: &Account, receiver: &Account, gateway: &str) -> bool {
        &self.sender == sender && &self.receiver == receiver && self.gateway == gateway
    }
}
