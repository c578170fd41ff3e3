//! # paychan Plugin
//!
//! Peer session protocol over HTTP with payment-channel micropayments.
//!
//! A [`PaychanPlugin`] connects to at most one peer. On `connect` it
//! discovers the peer's account, warms a payment channel to it, and starts
//! its own inbound service. Once connected it can:
//!
//! - send opaque data to the peer and get the peer's response back
//! - pay the peer over the warmed channel
//! - answer the peer's data and payments through registered handlers
//!
//! ## Endpoints
//!
//! - `GET /` - Local account
//! - `POST /money` - Accept a payment claim
//! - `POST /data` - Hand a payload to the data handler
//!
//! ## Example
//!
//! ```rust,ignore
//! use paychan_plugin::{PaychanPlugin, PluginConfig};
//!
//! let receiver = PaychanPlugin::from_config(PluginConfig::default().with_port(3000))?;
//! receiver.register_money_handler(|amount| async move {
//!     println!("got {}", amount);
//!     Ok(())
//! });
//! receiver.connect().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod channel;
mod client;
mod config;
mod dto;
mod error;
mod handlers;
mod handshake;
mod registry;
mod routes;
mod server;
mod session;
mod state;

#[cfg(test)]
mod testing;

pub use channel::{ChannelManager, CloseOutcome, PeerLink, TeardownReport};
pub use client::PeerClient;
pub use config::PluginConfig;
pub use dto::IdentityResponse;
pub use error::ApiError;
pub use registry::{DataHandler, HandlerError, HandlerRegistry, MoneyHandler};
pub use routes::create_router;
pub use server::InboundService;
pub use session::PaychanPlugin;
pub use state::AppState;
