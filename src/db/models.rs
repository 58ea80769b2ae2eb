use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Donation lifecycle status. Pending is the only state reconciliation
/// may transition out of; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Complete,
    Failed,
    Cancelled,
}

impl DonationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DonationStatus::Pending => "pending",
            DonationStatus::Complete => "complete",
            DonationStatus::Failed => "failed",
            DonationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(DonationStatus::Pending),
            "complete" => Some(DonationStatus::Complete),
            "failed" => Some(DonationStatus::Failed),
            "cancelled" => Some(DonationStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, DonationStatus::Pending)
    }
}

impl fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Donation {
    pub id: i64,
    /// Amount in the smallest currency unit (kobo, cents, fils).
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub form_title: Option<String>,
    pub status: String,
    /// Join key for reconciliation, minted exactly once at initiation.
    pub transaction_reference: Option<String>,
    pub checkout_url: Option<String>,
    pub gateway_transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Donation {
    /// Typed view of the raw status column. An unrecognized value is
    /// treated as terminal so reconciliation never mutates it.
    pub fn donation_status(&self) -> DonationStatus {
        DonationStatus::parse(&self.status).unwrap_or(DonationStatus::Failed)
    }

    pub fn is_pending(&self) -> bool {
        self.donation_status() == DonationStatus::Pending
    }
}

/// Operator-facing audit trail entry attached to a donation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DonationNote {
    pub id: i64,
    pub donation_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Fields the platform supplies when a donor submits the form.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDonation {
    pub amount_minor: i64,
    pub currency: String,
    pub email: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub form_title: Option<String>,
}
