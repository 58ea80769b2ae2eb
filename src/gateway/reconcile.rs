//! Reconciliation of processor notifications onto donation records.
//!
//! Return redirects and webhooks race, repeat, and arrive out of order.
//! Both feed through here; the conditional UPDATE in
//! `queries::transition_from_pending` guarantees at most one terminal
//! transition is ever applied per donation, whichever source wins.

use sqlx::PgPool;
use std::fmt;

use crate::db::models::{Donation, DonationStatus};
use crate::db::queries;
use crate::error::GatewayError;
use crate::novac::PaymentStatus;

/// Which channel delivered the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Return,
    Webhook,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Return => write!(f, "return"),
            Source::Webhook => write!(f, "webhook"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This notification won; the donation moved to the given status.
    Transitioned(DonationStatus),
    /// The donation was already terminal when we looked; duplicate.
    AlreadyTerminal(DonationStatus),
    /// Reported status carries no terminal decision (pending/unknown).
    NoTransition,
    /// Another notification transitioned the donation between our read
    /// and our write; observed status after losing the race.
    Raced(DonationStatus),
}

/// Pure transition table. Returns the status to apply, or `None` when the
/// notification must not mutate the donation.
pub fn decide(current: DonationStatus, reported: &PaymentStatus) -> Option<DonationStatus> {
    if current.is_terminal() {
        return None;
    }

    match reported {
        PaymentStatus::Completed => Some(DonationStatus::Complete),
        PaymentStatus::Failed => Some(DonationStatus::Failed),
        PaymentStatus::Cancelled => Some(DonationStatus::Cancelled),
        PaymentStatus::Pending | PaymentStatus::Unknown(_) => None,
    }
}

fn audit_note(new_status: DonationStatus, reported: &PaymentStatus, source: Source) -> String {
    match new_status {
        DonationStatus::Complete => match source {
            Source::Return => "Payment completed and verified via Novac.".to_string(),
            Source::Webhook => "Payment completed via Novac webhook.".to_string(),
        },
        DonationStatus::Failed => {
            format!("Payment failed. Status reported by Novac ({source}): {reported}.")
        }
        DonationStatus::Cancelled => "Payment cancelled by donor.".to_string(),
        DonationStatus::Pending => String::new(),
    }
}

/// Applies one notification to a donation. Idempotent: duplicates and
/// late arrivals observe a terminal donation and leave it untouched, and
/// the audit note is only written by the winning transition.
pub async fn reconcile(
    pool: &PgPool,
    donation: &Donation,
    reported: &PaymentStatus,
    source: Source,
) -> Result<Outcome, GatewayError> {
    let current = donation.donation_status();

    if current.is_terminal() {
        tracing::info!(
            donation_id = donation.id,
            reference = donation.transaction_reference.as_deref(),
            %current,
            %reported,
            %source,
            "duplicate notification for terminal donation, ignoring"
        );
        return Ok(Outcome::AlreadyTerminal(current));
    }

    let Some(new_status) = decide(current, reported) else {
        tracing::info!(
            donation_id = donation.id,
            reference = donation.transaction_reference.as_deref(),
            %reported,
            %source,
            "non-terminal status reported, leaving donation pending"
        );
        return Ok(Outcome::NoTransition);
    };

    // Record the reference as the gateway transaction id on completion.
    let gateway_transaction_id = if new_status == DonationStatus::Complete {
        donation.transaction_reference.as_deref()
    } else {
        None
    };

    let won = queries::transition_from_pending(pool, donation.id, new_status, gateway_transaction_id)
        .await?;

    if !won {
        let observed = queries::get_donation(pool, donation.id)
            .await?
            .donation_status();
        tracing::info!(
            donation_id = donation.id,
            %observed,
            %source,
            "lost reconciliation race, donation already transitioned"
        );
        return Ok(Outcome::Raced(observed));
    }

    queries::insert_donation_note(pool, donation.id, &audit_note(new_status, reported, source))
        .await?;

    tracing::info!(
        donation_id = donation.id,
        reference = donation.transaction_reference.as_deref(),
        %new_status,
        %source,
        "donation transitioned"
    );

    Ok(Outcome::Transitioned(new_status))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_transitions_on_terminal_reports() {
        assert_eq!(
            decide(DonationStatus::Pending, &PaymentStatus::Completed),
            Some(DonationStatus::Complete)
        );
        assert_eq!(
            decide(DonationStatus::Pending, &PaymentStatus::Failed),
            Some(DonationStatus::Failed)
        );
        assert_eq!(
            decide(DonationStatus::Pending, &PaymentStatus::Cancelled),
            Some(DonationStatus::Cancelled)
        );
    }

    #[test]
    fn pending_ignores_non_terminal_reports() {
        assert_eq!(decide(DonationStatus::Pending, &PaymentStatus::Pending), None);
        assert_eq!(
            decide(
                DonationStatus::Pending,
                &PaymentStatus::Unknown("on-hold".to_string())
            ),
            None
        );
    }

    #[test]
    fn terminal_donation_never_transitions() {
        let reports = [
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Pending,
            PaymentStatus::Unknown("weird".to_string()),
        ];
        for current in [
            DonationStatus::Complete,
            DonationStatus::Failed,
            DonationStatus::Cancelled,
        ] {
            for reported in &reports {
                assert_eq!(decide(current, reported), None, "{current} + {reported}");
            }
        }
    }

    #[test]
    fn out_of_order_failed_after_success_is_a_no_op() {
        // A "failed" webhook landing after a "success" return must not
        // overwrite the completed donation.
        assert_eq!(decide(DonationStatus::Complete, &PaymentStatus::Failed), None);
        assert_eq!(decide(DonationStatus::Failed, &PaymentStatus::Completed), None);
    }

    #[test]
    fn decision_is_idempotent() {
        let first = decide(DonationStatus::Pending, &PaymentStatus::Completed).unwrap();
        // Re-applying the same report against the new state decides nothing.
        assert_eq!(decide(first, &PaymentStatus::Completed), None);
    }

    #[test]
    fn audit_notes_name_the_channel() {
        assert_eq!(
            audit_note(
                DonationStatus::Complete,
                &PaymentStatus::Completed,
                Source::Return
            ),
            "Payment completed and verified via Novac."
        );
        assert_eq!(
            audit_note(
                DonationStatus::Complete,
                &PaymentStatus::Completed,
                Source::Webhook
            ),
            "Payment completed via Novac webhook."
        );
        let failed = audit_note(
            DonationStatus::Failed,
            &PaymentStatus::Failed,
            Source::Webhook,
        );
        assert!(failed.contains("webhook"));
        assert!(failed.contains("failed"));
    }
}
