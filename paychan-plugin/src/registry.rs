//! Handler registry.
//!
//! Holds the caller-supplied data and money handlers. Each slot is an `Arc`
//! swapped under a lock, so a request snapshots the handler current at
//! arrival and keeps it even if the caller replaces it mid-flight.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use ethers::types::U256;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;

/// Error type returned by caller-supplied handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Handles an inbound data payload and produces the response body.
pub type DataHandler =
    Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<Bytes, HandlerError>> + Send + Sync>;

/// Observes an accepted payment of a strictly positive amount.
pub type MoneyHandler =
    Arc<dyn Fn(U256) -> BoxFuture<'static, Result<(), HandlerError>> + Send + Sync>;

fn default_data_handler() -> DataHandler {
    Arc::new(|_: Bytes| async { Ok::<_, HandlerError>(Bytes::new()) }.boxed())
}

fn default_money_handler() -> MoneyHandler {
    Arc::new(|_: U256| async { Ok::<_, HandlerError>(()) }.boxed())
}

/// Current data and money handlers of a session.
pub struct HandlerRegistry {
    data: RwLock<DataHandler>,
    money: RwLock<MoneyHandler>,
}

impl HandlerRegistry {
    /// Creates a registry with no-op handlers.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(default_data_handler()),
            money: RwLock::new(default_money_handler()),
        }
    }

    /// Replaces the data handler.
    pub fn register_data_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, HandlerError>> + Send + 'static,
    {
        *self.data.write() = Arc::new(move |data| handler(data).boxed());
    }

    /// Resets the data handler to one that returns an empty body.
    pub fn deregister_data_handler(&self) {
        *self.data.write() = default_data_handler();
    }

    /// Replaces the money handler.
    pub fn register_money_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(U256) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        *self.money.write() = Arc::new(move |amount| handler(amount).boxed());
    }

    /// Resets the money handler to a no-op.
    pub fn deregister_money_handler(&self) {
        *self.money.write() = default_money_handler();
    }

    /// Snapshot of the current data handler.
    pub fn data_handler(&self) -> DataHandler {
        self.data.read().clone()
    }

    /// Snapshot of the current money handler.
    pub fn money_handler(&self) -> MoneyHandler {
        self.money.read().clone()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").finish_non_exhaustive()
    }
}
