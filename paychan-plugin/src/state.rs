//! Shared state of the inbound service.

use std::sync::Arc;

use paychan_core::traits::PaymentLedger;
use paychan_core::types::Account;

use crate::registry::HandlerRegistry;

/// State every inbound request sees.
pub struct AppState {
    /// Local account served by the identity endpoint
    pub account: Account,
    /// Ledger engine validating inbound payments
    pub ledger: Arc<dyn PaymentLedger>,
    /// Handlers shared with the owning session
    pub handlers: Arc<HandlerRegistry>,
}

impl AppState {
    /// Creates the state for one inbound service.
    pub fn new(account: Account, ledger: Arc<dyn PaymentLedger>, handlers: Arc<HandlerRegistry>) -> Self {
        Self {
            account,
            ledger,
            handlers,
        }
    }
}
