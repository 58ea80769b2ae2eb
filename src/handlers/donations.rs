//! Platform seam: donation records and checkout kick-off.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

use crate::AppState;
use crate::currency;
use crate::db::models::NewDonation;
use crate::db::queries;
use crate::error::GatewayError;

pub async fn create_donation(
    State(state): State<AppState>,
    Json(payload): Json<NewDonation>,
) -> Result<impl IntoResponse, GatewayError> {
    validate_new_donation(&payload)?;

    let donation = queries::insert_donation(&state.db, &payload).await?;

    tracing::info!(donation_id = donation.id, "donation created");

    Ok((StatusCode::CREATED, Json(donation)))
}

pub async fn get_donation(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let donation = queries::get_donation(&state.db, id).await.map_err(|e| match e {
        sqlx::Error::RowNotFound => GatewayError::NotFound(format!("Donation {id} not found")),
        other => GatewayError::Database(other),
    })?;

    Ok(Json(donation))
}

pub async fn list_notes(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let notes = queries::list_donation_notes(&state.db, id).await?;
    Ok(Json(notes))
}

/// Starts the offsite checkout; the caller redirects the donor's browser
/// to the returned URL.
pub async fn start_checkout(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, GatewayError> {
    let checkout_url = state.gateway.initiate(id).await?;
    Ok(Json(json!({ "checkout_url": checkout_url })))
}

fn validate_new_donation(payload: &NewDonation) -> Result<(), GatewayError> {
    if payload.amount_minor <= 0 {
        return Err(GatewayError::Validation(
            "amount_minor must be positive".to_string(),
        ));
    }
    let email = payload.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(GatewayError::Validation("a valid email is required".to_string()));
    }
    if payload.first_name.trim().is_empty() {
        return Err(GatewayError::Validation("first_name is required".to_string()));
    }
    if !currency::is_supported(&payload.currency) {
        return Err(GatewayError::Validation(format!(
            "currency {} is not supported",
            payload.currency
        )));
    }
    Ok(())
}
