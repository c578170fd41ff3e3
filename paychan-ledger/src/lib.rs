//! # paychan Ledger
//!
//! Reference collaborators for the paychan session protocol:
//!
//! - [`MemoryLedger`]: an in-process payment ledger engine that opens
//!   channels, posts payments to gateways, validates inbound claims, and
//!   keeps its channel state in a JSON file
//! - [`MemoryLedgerFactory`]: opens a [`MemoryLedger`] per connecting session
//! - [`RpcChainClient`]: account discovery over Ethereum JSON-RPC
//! - [`StaticChainClient`]: a fixed account list, for tests and demos

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod chain;
mod memory;
mod store;

pub use chain::{RpcChainClient, StaticChainClient};
pub use memory::{claim_digest, MemoryLedger, MemoryLedgerFactory};
pub use store::ChannelStore;
