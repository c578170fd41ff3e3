//! Inbound route handlers.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use tracing::{debug, error, info};

use paychan_core::constants::{OCTET_STREAM, PAYWALL_TOKEN_HEADER};
use paychan_core::error::PaychanError;
use paychan_core::types::Payment;

use crate::dto::IdentityResponse;
use crate::error::ApiError;
use crate::state::AppState;

type Result<T> = std::result::Result<T, ApiError>;

/// GET /
pub async fn identity(
    State(state): State<Arc<AppState>>,
    caller: Option<ConnectInfo<SocketAddr>>,
) -> Json<IdentityResponse> {
    debug!(caller = ?caller.map(|ConnectInfo(addr)| addr), "Got connection");
    Json(IdentityResponse {
        account: state.account,
    })
}

/// POST /money
pub async fn accept_money(
    State(state): State<Arc<AppState>>,
    Json(payment): Json<Payment>,
) -> Result<impl IntoResponse> {
    debug!(
        channel_id = ?payment.channel_id,
        sender = ?payment.sender,
        price = %payment.price,
        value = %payment.value,
        "Got payment"
    );

    let amount = payment.priced_amount();
    let token = state.ledger.accept_payment(payment).await?;

    // The claim is committed once the ledger accepts it; a failing handler
    // must not make the sender roll back its side of the channel.
    if let Some(amount) = amount {
        let handler = state.handlers.money_handler();
        match handler(amount).await {
            Ok(()) => info!(amount = %amount, "Received money"),
            Err(e) => error!(amount = %amount, error = %e, "Money handler failed"),
        }
    }

    Ok((StatusCode::OK, [(PAYWALL_TOKEN_HEADER, token)]))
}

/// POST /data
pub async fn accept_data(State(state): State<Arc<AppState>>, body: Bytes) -> Result<impl IntoResponse> {
    debug!(data = %hex::encode(&body), "Got data");

    let handler = state.handlers.data_handler();
    let response = handler(body)
        .await
        .map_err(|e| PaychanError::Handler(e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, OCTET_STREAM)], response))
}
