//! Gateway service: transaction initiation and the reconciliation seam.
//!
//! The hosting platform interacts with this type (via the HTTP handlers)
//! instead of registering callbacks: `initiate`, `verify` and `reconcile`
//! cover the full offsite-checkout lifecycle.

pub mod reconcile;

use sqlx::PgPool;
use url::Url;
use uuid::Uuid;

use crate::currency;
use crate::db::models::{Donation, DonationStatus};
use crate::db::queries;
use crate::error::GatewayError;
use crate::novac::types::{CheckoutCustomerData, CheckoutCustomizationData, InitiatePayload};
use crate::novac::{NovacClient, NovacError, PaymentStatus};

pub use reconcile::{Outcome, Source};

/// Prefix for transaction references: `don-{donation_id}-{token}`.
const REFERENCE_PREFIX: &str = "don";

const DEFAULT_PAYMENT_DESCRIPTION: &str = "Donation";

#[derive(Clone)]
pub struct PaymentGateway {
    pool: PgPool,
    client: NovacClient,
    public_base_url: String,
}

impl PaymentGateway {
    pub fn new(pool: PgPool, client: NovacClient, public_base_url: String) -> Self {
        Self {
            pool,
            client,
            public_base_url,
        }
    }

    /// Initiates the offsite checkout for a pending donation and returns
    /// the URL to hand the donor's browser to.
    ///
    /// Idempotent per donation: a resubmit reuses the persisted reference
    /// (and checkout URL, when the earlier attempt got that far) instead
    /// of minting a second one.
    pub async fn initiate(&self, donation_id: i64) -> Result<String, GatewayError> {
        // Credential check first: no donation mutation, no network I/O.
        if !self.client.has_public_key() {
            return Err(GatewayError::Config("Novac public key is not set".to_string()));
        }

        let donation = self.load_donation(donation_id).await?;
        validate_for_initiation(&donation)?;

        let reference = match (&donation.transaction_reference, &donation.checkout_url) {
            // Earlier initiation completed; hand back the same session.
            (Some(_), Some(url)) => return Ok(url.clone()),
            // Reference persisted but the create call never finished;
            // retry the create with the same reference.
            (Some(reference), None) => reference.clone(),
            (None, _) => self.claim_reference(donation_id).await?,
        };

        // Re-check: a concurrent initiation may have stored the URL while
        // we were claiming the reference.
        let donation = self.load_donation(donation_id).await?;
        if let Some(url) = &donation.checkout_url {
            return Ok(url.clone());
        }

        let payload = self.build_payload(&donation, &reference)?;

        tracing::info!(
            donation_id,
            %reference,
            currency = %donation.currency,
            "initiating Novac checkout"
        );

        let session = match self.client.initiate(&payload).await {
            Ok(session) => session,
            Err(e) => {
                self.record_initiation_failure(donation_id, &e).await?;
                return Err(GatewayError::Init(e.to_string()));
            }
        };

        queries::set_checkout_details(
            &self.pool,
            donation_id,
            &session.checkout_url,
            &session.gateway_reference,
        )
        .await?;

        tracing::info!(
            donation_id,
            %reference,
            gateway_reference = %session.gateway_reference,
            "Novac checkout created"
        );

        Ok(session.checkout_url)
    }

    /// Queries Novac for the authoritative status of a reference.
    pub async fn verify(&self, reference: &str) -> Result<PaymentStatus, GatewayError> {
        self.client.verify(reference).await.map_err(|e| match e {
            NovacError::MissingCredential(c) => {
                GatewayError::Config(format!("Novac {c} is not set"))
            }
            other => GatewayError::Verification(other.to_string()),
        })
    }

    /// Feeds one notification into the reconciliation engine.
    pub async fn reconcile(
        &self,
        donation: &Donation,
        reported: &PaymentStatus,
        source: Source,
    ) -> Result<Outcome, GatewayError> {
        reconcile::reconcile(&self.pool, donation, reported, source).await
    }

    /// Marks a pending donation Failed with an operator note. Used when
    /// verification is unreachable; a no-op against terminal donations.
    pub async fn record_failure(&self, donation_id: i64, note: &str) -> Result<(), GatewayError> {
        let transitioned =
            queries::transition_from_pending(&self.pool, donation_id, DonationStatus::Failed, None)
                .await?;
        if transitioned {
            queries::insert_donation_note(&self.pool, donation_id, note).await?;
        }
        Ok(())
    }

    async fn load_donation(&self, donation_id: i64) -> Result<Donation, GatewayError> {
        queries::get_donation(&self.pool, donation_id)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    GatewayError::NotFound(format!("Donation {donation_id} not found"))
                }
                other => GatewayError::Database(other),
            })
    }

    /// Mints and persists the reference, or adopts the one a concurrent
    /// initiation persisted first. Exactly one reference per donation.
    async fn claim_reference(&self, donation_id: i64) -> Result<String, GatewayError> {
        let minted = mint_reference(donation_id);
        if queries::set_transaction_reference(&self.pool, donation_id, &minted).await? {
            return Ok(minted);
        }

        let donation = self.load_donation(donation_id).await?;
        donation.transaction_reference.ok_or_else(|| {
            GatewayError::Init(format!(
                "donation {donation_id} lost its transaction reference"
            ))
        })
    }

    fn build_payload(
        &self,
        donation: &Donation,
        reference: &str,
    ) -> Result<InitiatePayload, GatewayError> {
        let amount = currency::to_major_units(donation.amount_minor, &donation.currency)
            .ok_or_else(|| {
                GatewayError::Validation(format!("Currency {} is not supported", donation.currency))
            })?;

        let description = donation
            .form_title
            .clone()
            .unwrap_or_else(|| DEFAULT_PAYMENT_DESCRIPTION.to_string());

        Ok(InitiatePayload {
            transaction_reference: reference.to_string(),
            amount,
            currency: donation.currency.to_ascii_uppercase(),
            redirect_url: self.return_url(donation.id, reference)?,
            checkout_customer_data: CheckoutCustomerData {
                email: donation.email.clone(),
                first_name: donation.first_name.clone(),
                last_name: donation.last_name.clone().unwrap_or_default(),
                phone_number: donation.phone.clone().unwrap_or_default(),
            },
            checkout_customization_data: CheckoutCustomizationData {
                payment_description: description.clone(),
                checkout_modal_title: description,
            },
        })
    }

    /// Return-callback URL embedding the join keys for reconciliation.
    fn return_url(&self, donation_id: i64, reference: &str) -> Result<String, GatewayError> {
        let mut url = Url::parse(&self.public_base_url)
            .map_err(|e| GatewayError::Config(format!("invalid PUBLIC_BASE_URL: {e}")))?
            .join("/gateway/return")
            .map_err(|e| GatewayError::Config(format!("invalid PUBLIC_BASE_URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("donation-id", &donation_id.to_string())
            .append_pair("reference", reference);

        Ok(url.to_string())
    }

    async fn record_initiation_failure(
        &self,
        donation_id: i64,
        error: &NovacError,
    ) -> Result<(), GatewayError> {
        tracing::error!(donation_id, error = %error, "Novac initiation failed");
        self.record_failure(donation_id, &format!("Donation failed. Reason: {error}"))
            .await
    }
}

fn validate_for_initiation(donation: &Donation) -> Result<(), GatewayError> {
    if !donation.is_pending() {
        return Err(GatewayError::Validation(format!(
            "Donation {} is already {}",
            donation.id,
            donation.donation_status()
        )));
    }
    if donation.amount_minor <= 0 {
        return Err(GatewayError::Validation(
            "Donation amount must be positive".to_string(),
        ));
    }
    if donation.email.trim().is_empty() {
        return Err(GatewayError::Validation(
            "Donor email is required".to_string(),
        ));
    }
    if !currency::is_supported(&donation.currency) {
        return Err(GatewayError::Validation(format!(
            "Currency {} is not supported",
            donation.currency
        )));
    }
    Ok(())
}

fn mint_reference(donation_id: i64) -> String {
    format!(
        "{}-{}-{}",
        REFERENCE_PREFIX,
        donation_id,
        Uuid::new_v4().simple()
    )
}
