use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::novac::types::{
    ApiEnvelope, CheckoutSession, InitiateData, InitiatePayload, PaymentStatus, VerifyData,
};

const INITIATE_TIMEOUT: Duration = Duration::from_secs(60);
const VERIFY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum NovacError {
    #[error("Novac {0} is not set")]
    MissingCredential(&'static str),
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Novac API returned HTTP {status}: {body}")]
    ApiError { status: u16, body: String },
    #[error("Novac response missing paymentRedirectUrl")]
    MissingRedirectUrl,
    #[error("Invalid response from Novac: {0}")]
    InvalidResponse(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// HTTP client for the Novac hosted-checkout API.
///
/// Initiation authenticates with the public key, verification with the
/// secret key. Either call fails fast with `MissingCredential` before any
/// network I/O when its credential is absent.
#[derive(Clone)]
pub struct NovacClient {
    client: Client,
    base_url: String,
    public_key: Option<String>,
    secret_key: Option<String>,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl NovacClient {
    pub fn new(base_url: String, public_key: Option<String>, secret_key: Option<String>) -> Self {
        let client = Client::builder().build().unwrap_or_default();

        let backoff = backoff::equal_jittered(Duration::from_secs(60), Duration::from_secs(120));
        let policy = failure_policy::consecutive_failures(3, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        NovacClient {
            client,
            base_url,
            public_key,
            secret_key,
            circuit_breaker,
        }
    }

    pub fn has_public_key(&self) -> bool {
        self.public_key.is_some()
    }

    /// Creates the checkout transaction and returns the redirect URL for
    /// the donor's browser.
    pub async fn initiate(&self, payload: &InitiatePayload) -> Result<CheckoutSession, NovacError> {
        let public_key = self
            .public_key
            .as_deref()
            .ok_or(NovacError::MissingCredential("public key"))?;

        let url = format!("{}/api/v1/initiate", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .post(&url)
            .bearer_auth(public_key)
            .timeout(INITIATE_TIMEOUT)
            .json(payload);

        let fallback_reference = payload.transaction_reference.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if !status.is_success() {
                    return Err(NovacError::ApiError {
                        status: status.as_u16(),
                        body,
                    });
                }

                let parsed: ApiEnvelope<InitiateData> = serde_json::from_str(&body)
                    .map_err(|e| NovacError::InvalidResponse(e.to_string()))?;

                let checkout_url = parsed
                    .data
                    .payment_redirect_url
                    .filter(|u| !u.is_empty())
                    .ok_or(NovacError::MissingRedirectUrl)?;

                Ok(CheckoutSession {
                    checkout_url,
                    gateway_reference: parsed.data.reference.unwrap_or(fallback_reference),
                })
            })
            .await;

        unwrap_circuit(result)
    }

    /// Asks Novac for the authoritative status of a checkout transaction.
    /// A "not successful" status is a value here, never an error.
    pub async fn verify(&self, reference: &str) -> Result<PaymentStatus, NovacError> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(NovacError::MissingCredential("secret key"))?;

        let url = format!(
            "{}/api/v1/checkout/{}/verify",
            self.base_url.trim_end_matches('/'),
            reference
        );
        let request = self
            .client
            .get(&url)
            .bearer_auth(secret_key)
            .timeout(VERIFY_TIMEOUT);

        let result = self
            .circuit_breaker
            .call(async move {
                let response = request.send().await?;
                let status = response.status();
                let body = response.text().await.unwrap_or_default();

                if !status.is_success() {
                    return Err(NovacError::ApiError {
                        status: status.as_u16(),
                        body,
                    });
                }

                let parsed: ApiEnvelope<VerifyData> = serde_json::from_str(&body)
                    .map_err(|e| NovacError::InvalidResponse(e.to_string()))?;

                Ok(PaymentStatus::parse(&parsed.data.status))
            })
            .await;

        unwrap_circuit(result)
    }
}

fn unwrap_circuit<T>(result: Result<T, FailsafeError<NovacError>>) -> Result<T, NovacError> {
    match result {
        Ok(value) => Ok(value),
        Err(FailsafeError::Rejected) => Err(NovacError::CircuitBreakerOpen(
            "Novac API circuit breaker is open".to_string(),
        )),
        Err(FailsafeError::Inner(e)) => Err(e),
    }
}
