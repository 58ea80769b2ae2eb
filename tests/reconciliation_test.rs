//! End-to-end reconciliation properties against a real Postgres.
//!
//! These tests need `DATABASE_URL` pointing at a disposable database and
//! are skipped by default, matching how the other database tests run.

use sqlx::PgPool;
use sqlx::migrate::Migrator;
use std::path::Path;

use novac_gateway::db::models::{DonationStatus, NewDonation};
use novac_gateway::db::queries;
use novac_gateway::gateway::reconcile::{Outcome, Source, reconcile};
use novac_gateway::novac::PaymentStatus;

async fn setup_test_db() -> PgPool {
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let pool = PgPool::connect(&database_url)
        .await
        .expect("Failed to connect to test DB");
    let migrator = Migrator::new(Path::new("./migrations"))
        .await
        .expect("Failed to load migrations");
    migrator
        .run(&pool)
        .await
        .expect("Failed to run migrations on test DB");
    pool
}

async fn pending_donation_with_reference(pool: &PgPool, reference: &str) -> i64 {
    let new = NewDonation {
        amount_minor: 150_000,
        currency: "NGN".to_string(),
        email: "donor@example.org".to_string(),
        first_name: "Ada".to_string(),
        last_name: None,
        phone: None,
        form_title: Some("General fund".to_string()),
    };
    let donation = queries::insert_donation(pool, &new).await.unwrap();
    assert!(
        queries::set_transaction_reference(pool, donation.id, reference)
            .await
            .unwrap()
    );
    donation.id
}

#[tokio::test]
#[ignore]
async fn terminal_notification_transitions_exactly_once() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    let donation = queries::find_donation_by_reference(&pool, &reference)
        .await
        .unwrap()
        .unwrap();

    let outcome = reconcile(&pool, &donation, &PaymentStatus::Completed, Source::Return)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Transitioned(DonationStatus::Complete));

    let after = queries::get_donation(&pool, id).await.unwrap();
    assert_eq!(after.donation_status(), DonationStatus::Complete);
    assert_eq!(after.gateway_transaction_id.as_deref(), Some(reference.as_str()));

    let notes = queries::list_donation_notes(&pool, id).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].content, "Payment completed and verified via Novac.");
}

#[tokio::test]
#[ignore]
async fn duplicate_notification_is_idempotent() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    let donation = queries::find_donation_by_reference(&pool, &reference)
        .await
        .unwrap()
        .unwrap();

    reconcile(&pool, &donation, &PaymentStatus::Completed, Source::Webhook)
        .await
        .unwrap();

    // Same notification again, from the re-fetched record.
    let donation = queries::get_donation(&pool, id).await.unwrap();
    let outcome = reconcile(&pool, &donation, &PaymentStatus::Completed, Source::Webhook)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::AlreadyTerminal(DonationStatus::Complete));

    // No duplicate audit note.
    let notes = queries::list_donation_notes(&pool, id).await.unwrap();
    assert_eq!(notes.len(), 1);
}

#[tokio::test]
#[ignore]
async fn late_failed_webhook_does_not_overwrite_completed_donation() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    let donation = queries::find_donation_by_reference(&pool, &reference)
        .await
        .unwrap()
        .unwrap();

    reconcile(&pool, &donation, &PaymentStatus::Completed, Source::Return)
        .await
        .unwrap();

    let donation = queries::get_donation(&pool, id).await.unwrap();
    let outcome = reconcile(&pool, &donation, &PaymentStatus::Failed, Source::Webhook)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::AlreadyTerminal(DonationStatus::Complete));

    let after = queries::get_donation(&pool, id).await.unwrap();
    assert_eq!(after.donation_status(), DonationStatus::Complete);
}

#[tokio::test]
#[ignore]
async fn racing_sources_apply_a_single_transition() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    // Both notifications read the same Pending snapshot, then race.
    let snapshot = queries::get_donation(&pool, id).await.unwrap();

    let return_path = reconcile(&pool, &snapshot, &PaymentStatus::Completed, Source::Return);
    let webhook_path = reconcile(&pool, &snapshot, &PaymentStatus::Failed, Source::Webhook);
    let (return_outcome, webhook_outcome) = tokio::join!(return_path, webhook_path);

    let transitions = [return_outcome.unwrap(), webhook_outcome.unwrap()]
        .into_iter()
        .filter(|o| matches!(o, Outcome::Transitioned(_)))
        .count();
    assert_eq!(transitions, 1, "exactly one source may win");

    let after = queries::get_donation(&pool, id).await.unwrap();
    assert!(after.donation_status().is_terminal());

    let notes = queries::list_donation_notes(&pool, id).await.unwrap();
    assert_eq!(notes.len(), 1);
}

#[tokio::test]
#[ignore]
async fn pending_report_leaves_donation_pending() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    let donation = queries::get_donation(&pool, id).await.unwrap();
    let outcome = reconcile(&pool, &donation, &PaymentStatus::Pending, Source::Webhook)
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::NoTransition);

    let outcome = reconcile(
        &pool,
        &donation,
        &PaymentStatus::Unknown("on-hold".to_string()),
        Source::Webhook,
    )
    .await
    .unwrap();
    assert_eq!(outcome, Outcome::NoTransition);

    let after = queries::get_donation(&pool, id).await.unwrap();
    assert_eq!(after.donation_status(), DonationStatus::Pending);
    assert!(queries::list_donation_notes(&pool, id).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn reference_is_minted_at_most_once() {
    let pool = setup_test_db().await;
    let reference = format!("don-test-{}", uuid::Uuid::new_v4().simple());
    let id = pending_donation_with_reference(&pool, &reference).await;

    // A second initiation attempt must not replace the join key.
    let claimed = queries::set_transaction_reference(&pool, id, "don-test-second")
        .await
        .unwrap();
    assert!(!claimed);

    let after = queries::get_donation(&pool, id).await.unwrap();
    assert_eq!(after.transaction_reference.as_deref(), Some(reference.as_str()));
}
