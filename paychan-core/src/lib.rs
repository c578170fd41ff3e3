//! # paychan Core
//!
//! Core types, errors, and traits for the paychan peer transport.
//!
//! This crate provides the building blocks shared by every other paychan crate:
//!
//! - **Types**: accounts, channels, payments, and buy requests/receipts
//! - **Errors**: the [`PaychanError`] taxonomy used across the session protocol
//! - **Constants**: wire paths, header names, and configuration defaults
//! - **Traits**: the payment ledger engine and chain client seams
//!
//! ## Example
//!
//! ```rust
//! use paychan_core::Payment;
//!
//! let json = r#"{
//!     "channel_id": "0x0000000000000000000000000000000000000000000000000000000000000001",
//!     "sender": "0x0000000000000000000000000000000000000001",
//!     "receiver": "0x0000000000000000000000000000000000000002",
//!     "price": "5",
//!     "value": "5",
//!     "channel_value": "100"
//! }"#;
//! let payment: Payment = serde_json::from_str(json).unwrap();
//! assert!(payment.is_priced());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{PaychanError, Result};
pub use traits::*;
pub use types::*;
