//! Protocol constants for paychan.
//!
//! Wire-level names shared by the inbound service and the outbound client,
//! plus the configuration defaults used when a value is not supplied.

// ═══════════════════════════════════════════════════════════════════════════════
// WIRE PROTOCOL
// ═══════════════════════════════════════════════════════════════════════════════

/// Path of the identity endpoint.
pub const IDENTITY_PATH: &str = "/";

/// Path of the money endpoint. Also the suffix of a peer's gateway URL.
pub const MONEY_PATH: &str = "/money";

/// Path of the data endpoint.
pub const DATA_PATH: &str = "/data";

/// Response header carrying the settlement token for an accepted payment.
pub const PAYWALL_TOKEN_HEADER: &str = "Paywall-Token";

/// Content type used for raw data payloads.
pub const OCTET_STREAM: &str = "application/octet-stream";

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURATION DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain provider used when none is configured.
pub const DEFAULT_PROVIDER_URI: &str = "http://localhost:8545";

/// Channel-state storage location used when none is configured.
pub const DEFAULT_DATABASE_FILE: &str = "paychan_db";

/// Minimum deposit, in base units, of a newly opened channel.
pub const DEFAULT_MINIMUM_CHANNEL_AMOUNT: u64 = 100;

/// Timeout applied to every outbound request and ledger call.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Largest request body accepted by the inbound service (2 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;
