//! Server-to-server webhook from Novac.
//!
//! Ordering matters: the IP allow-list runs as middleware before this
//! handler, signature validation runs before any parsing or lookup, and
//! everything after authentication acknowledges with 200 so Novac stops
//! retrying deliveries we can never act on.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::db::queries;
use crate::error::GatewayError;
use crate::gateway::Source;
use crate::novac::PaymentStatus;
use crate::signature::verify_webhook_signature;

pub const SIGNATURE_HEADER: &str = "x-novac-signature";

/// Accepts both delivery shapes Novac uses: the simple
/// `{reference, status}` body and the extended
/// `{gatewayPaymentId, gatewayPaymentStatus, gatewayRecurringPayment}` one.
#[derive(Debug, Deserialize)]
pub struct WebhookNotification {
    #[serde(default, alias = "gatewayPaymentId")]
    pub reference: Option<String>,
    #[serde(default, alias = "gatewayPaymentStatus")]
    pub status: Option<String>,
    #[serde(default, rename = "gatewayRecurringPayment")]
    pub recurring: bool,
}

pub async fn webhook_listener(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    if let Some(secret) = &state.config.novac_webhook_secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| GatewayError::Auth("missing webhook signature".to_string()))?;

        if !verify_webhook_signature(secret, &body, signature) {
            return Err(GatewayError::Auth("invalid webhook signature".to_string()));
        }
    }

    let ack = (StatusCode::OK, Json(json!({ "ok": true })));

    let notification: WebhookNotification = match serde_json::from_slice(&body) {
        Ok(notification) => notification,
        Err(e) => {
            // Retrying will not fix a body we cannot parse.
            tracing::warn!(error = %e, "unparseable webhook body, acknowledging");
            return Ok(ack);
        }
    };

    // Recurring donations are handled by a separate integration.
    if notification.recurring {
        tracing::info!("ignoring recurring payment webhook");
        return Ok(ack);
    }

    let (Some(reference), Some(raw_status)) = (&notification.reference, &notification.status)
    else {
        tracing::warn!(?notification, "webhook missing reference or status, acknowledging");
        return Ok(ack);
    };

    let Some(donation) = queries::find_donation_by_reference(&state.db, reference).await? else {
        // Acknowledge so the response does not reveal which references exist.
        tracing::warn!(%reference, "webhook reference matched no donation");
        return Ok(ack);
    };

    let reported = PaymentStatus::parse(raw_status);
    state
        .gateway
        .reconcile(&donation, &reported, Source::Webhook)
        .await?;

    Ok(ack)
}
