//! Error types for paychan.
//!
//! One taxonomy covers the whole session protocol: handshake failures,
//! inbound payment rejections, outbound send failures, per-channel close
//! failures, and lifecycle precondition violations.

use thiserror::Error;

/// Result type alias using `PaychanError`.
pub type Result<T> = std::result::Result<T, PaychanError>;

/// Main error type for all paychan operations.
#[derive(Debug, Error)]
pub enum PaychanError {
    // ═══════════════════════════════════════════════════════════════════════════
    // HANDSHAKE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The chain provider has no accounts registered.
    #[error("Provider has no accounts registered")]
    NoAccount,

    /// The peer's identity endpoint could not be reached or answered non-success.
    #[error("Unable to reach peer server: {0}")]
    PeerUnreachable(String),

    /// The peer's identity response did not carry a usable account.
    #[error("Malformed peer response: {0}")]
    MalformedPeerResponse(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // PAYMENT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The ledger engine refused an inbound payment.
    #[error("Payment rejected: {0}")]
    PaymentRejected(String),

    /// An outbound buy (warm-up or settlement) failed.
    #[error("Failed to send payment: {0}")]
    PaymentSend(String),

    /// Closing a single channel failed.
    #[error("Failed to close channel {channel_id}: {reason}")]
    ChannelClose {
        /// Channel identifier (0x-prefixed hex)
        channel_id: String,
        /// Failure description
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // TRANSPORT ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Sending data to the peer failed at the network or HTTP level.
    #[error("Transport error: {0}")]
    Transport(String),

    /// An operation exceeded its time budget.
    #[error("Timed out after {seconds}s: {operation}")]
    Timeout {
        /// Operation that timed out
        operation: String,
        /// Budget in seconds
        seconds: u64,
    },

    // ═══════════════════════════════════════════════════════════════════════════
    // LIFECYCLE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// The session is not connected.
    #[error("Session is not connected")]
    NotConnected,

    /// The session is already connected.
    #[error("Session is already connected")]
    AlreadyConnected,

    /// The session was configured without a peer server.
    #[error("No peer server configured")]
    NoPeer,

    // ═══════════════════════════════════════════════════════════════════════════
    // COLLABORATOR ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// Generic ledger engine failure.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Chain client failure.
    #[error("Chain client error: {0}")]
    Chain(String),

    /// A caller-supplied handler failed.
    #[error("Handler failed: {0}")]
    Handler(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    // ═══════════════════════════════════════════════════════════════════════════
    // SERIALIZATION / STORAGE ERRORS
    // ═══════════════════════════════════════════════════════════════════════════
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File or socket I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PaychanError {
    /// Returns true if this error is recoverable (can retry).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PaychanError::PeerUnreachable(_)
                | PaychanError::Transport(_)
                | PaychanError::Timeout { .. }
                | PaychanError::Chain(_)
        )
    }

    /// Returns true if this error can only come out of `connect`.
    pub fn is_handshake_error(&self) -> bool {
        matches!(
            self,
            PaychanError::NoAccount
                | PaychanError::PeerUnreachable(_)
                | PaychanError::MalformedPeerResponse(_)
        )
    }

    /// Returns true if this error reports a lifecycle misuse by the caller.
    pub fn is_precondition_error(&self) -> bool {
        matches!(
            self,
            PaychanError::NotConnected | PaychanError::AlreadyConnected | PaychanError::NoPeer
        )
    }
}
