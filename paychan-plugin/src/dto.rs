//! Wire DTOs for the inbound service.

use serde::{Deserialize, Serialize};

use paychan_core::types::Account;

/// Body of `GET /`.
#[derive(Debug, Serialize, Deserialize)]
pub struct IdentityResponse {
    /// Account of the responding node
    pub account: Account,
}
