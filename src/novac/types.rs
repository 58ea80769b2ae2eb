//! Wire types for the Novac hosted-checkout API.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/v1/initiate`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePayload {
    pub transaction_reference: String,
    /// Major-unit decimal amount, see `currency::to_major_units`.
    pub amount: BigDecimal,
    pub currency: String,
    pub redirect_url: String,
    pub checkout_customer_data: CheckoutCustomerData,
    pub checkout_customization_data: CheckoutCustomizationData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCustomerData {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCustomizationData {
    pub payment_description: String,
    pub checkout_modal_title: String,
}

/// Novac wraps every response in a `data` envelope.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiateData {
    pub payment_redirect_url: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub status: String,
}

/// Result of a successful initiation.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    /// URL the donor's browser is handed to.
    pub checkout_url: String,
    /// Novac's own id for the transaction.
    pub gateway_reference: String,
}

/// Processor status vocabulary, normalized at the boundary. Anything the
/// processor reports that we do not recognize lands in `Unknown` with the
/// raw string preserved for the logs; it is never defaulted to a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Completed,
    Failed,
    Cancelled,
    Pending,
    Unknown(String),
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "success" | "successful" | "complete" | "completed" | "paid" => {
                PaymentStatus::Completed
            }
            "failed" | "failure" | "declined" => PaymentStatus::Failed,
            "cancelled" | "canceled" => PaymentStatus::Cancelled,
            "pending" | "processing" => PaymentStatus::Pending,
            _ => PaymentStatus::Unknown(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Unknown(raw) => write!(f, "unknown({})", raw),
        }
    }
}
