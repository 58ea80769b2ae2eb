use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway initialization failed: {0}")]
    Init(String),

    #[error("Payment verification failed: {0}")]
    Verification(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Auth(String),
}

impl GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Init(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Verification(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Body shown to the caller. Processor error bodies and credential
    /// details stay in the logs and donation notes, never in the response.
    fn public_message(&self) -> String {
        match self {
            GatewayError::Database(_) => "Internal server error".to_string(),
            GatewayError::Config(_) => "Payment gateway is not configured".to_string(),
            GatewayError::Init(_) => "Unable to initiate payment, please try again".to_string(),
            GatewayError::Verification(_) => "Unable to verify payment".to_string(),
            GatewayError::Validation(msg) => msg.clone(),
            GatewayError::NotFound(msg) => msg.clone(),
            GatewayError::Auth(_) => "Unauthorized".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.public_message(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_status_code() {
        let error = GatewayError::Validation("amount must be positive".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_error_status_code() {
        let error = GatewayError::NotFound("Donation 42 not found".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_auth_error_status_code() {
        let error = GatewayError::Auth("invalid signature".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_init_error_hides_processor_body() {
        let error = GatewayError::Init("HTTP 500: {\"message\":\"upstream exploded\"}".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert!(!error.public_message().contains("upstream"));
    }

    #[test]
    fn test_config_error_is_generic() {
        let error = GatewayError::Config("Novac public key is not set".to_string());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.public_message().contains("key"));
    }

    #[tokio::test]
    async fn test_validation_error_response() {
        let error = GatewayError::Validation("email is required".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
