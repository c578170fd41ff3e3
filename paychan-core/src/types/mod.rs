//! Domain types for paychan.
//!
//! - [`Account`]: an Ethereum account taking part in a channel
//! - [`Channel`]: a payment channel as reported by the ledger engine
//! - [`Payment`]: a signed claim against a channel, posted to a gateway
//! - [`BuyRequest`] / [`BuyReceipt`]: a request to pay and its confirmation

pub mod amount;
mod channel;
mod payment;

pub use amount::{parse_amount, parse_price, price_of};
pub use channel::*;
pub use payment::*;

/// An Ethereum account identifier.
pub type Account = ethers::types::Address;
