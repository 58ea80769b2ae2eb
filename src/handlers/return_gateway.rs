//! Browser return from the Novac checkout.
//!
//! The donor's browser is an untrusted notification channel: every
//! outcome here ends in a redirect to the platform's success or failure
//! page, never an error response or raw processor data.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use serde::Deserialize;

use crate::AppState;
use crate::db::models::DonationStatus;
use crate::db::queries;
use crate::gateway::{Outcome, Source};
use crate::novac::PaymentStatus;

#[derive(Debug, Deserialize)]
pub struct ReturnParams {
    #[serde(rename = "donation-id", default)]
    pub donation_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

pub async fn handle_return(
    State(state): State<AppState>,
    Query(params): Query<ReturnParams>,
) -> Redirect {
    let success = Redirect::to(&state.config.success_page_url);
    let failure = Redirect::to(&state.config.failure_page_url);

    let Some((donation_id, reference)) = parse_params(&params) else {
        tracing::warn!(?params, "return redirect missing parameters");
        return failure;
    };

    let donation = match queries::find_donation_by_reference(&state.db, &reference).await {
        Ok(Some(donation)) if donation.id == donation_id => donation,
        Ok(_) => {
            tracing::warn!(donation_id, %reference, "return redirect matched no donation");
            return failure;
        }
        Err(e) => {
            tracing::error!(donation_id, %reference, error = %e, "donation lookup failed");
            return failure;
        }
    };

    // Page refresh after completion: no second verify call.
    match donation.donation_status() {
        DonationStatus::Complete => return success,
        status if status.is_terminal() => return failure,
        _ => {}
    }

    let reported = match state.gateway.verify(&reference).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!(donation_id, %reference, error = %e, "return verification failed");
            if let Err(e) = state
                .gateway
                .record_failure(donation_id, &format!("Payment verification failed: {e}"))
                .await
            {
                tracing::error!(donation_id, error = %e, "failed to record verification failure");
            }
            return failure;
        }
    };

    match state
        .gateway
        .reconcile(&donation, &reported, Source::Return)
        .await
    {
        Ok(outcome) => match outcome {
            Outcome::Transitioned(DonationStatus::Complete)
            | Outcome::AlreadyTerminal(DonationStatus::Complete)
            | Outcome::Raced(DonationStatus::Complete) => success,
            _ => failure,
        },
        Err(e) => {
            tracing::error!(donation_id, %reference, error = %e, "return reconciliation failed");
            failure
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CancelledParams {
    #[serde(rename = "donation-id", default)]
    pub donation_id: Option<String>,
}

/// Novac sends the donor here when they abandon the checkout.
pub async fn handle_cancelled_return(
    State(state): State<AppState>,
    Query(params): Query<CancelledParams>,
) -> Redirect {
    let failure = Redirect::to(&state.config.failure_page_url);

    let Some(donation_id) = params
        .donation_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse::<i64>().ok())
    else {
        tracing::warn!(?params, "cancelled return missing donation id");
        return failure;
    };

    let donation = match queries::get_donation(&state.db, donation_id).await {
        Ok(donation) => donation,
        Err(e) => {
            tracing::warn!(donation_id, error = %e, "cancelled return matched no donation");
            return failure;
        }
    };

    if let Err(e) = state
        .gateway
        .reconcile(&donation, &PaymentStatus::Cancelled, Source::Return)
        .await
    {
        tracing::error!(donation_id, error = %e, "cancellation reconciliation failed");
    }

    failure
}

fn parse_params(params: &ReturnParams) -> Option<(i64, String)> {
    let donation_id = params
        .donation_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?
        .parse::<i64>()
        .ok()?;
    let reference = params
        .reference
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())?
        .to_string();
    Some((donation_id, reference))
}
