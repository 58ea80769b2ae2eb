use sqlx::{PgPool, Result};
use crate::db::models::{Donation, DonationNote, DonationStatus, NewDonation};

// --- Donation queries ---

pub async fn insert_donation(pool: &PgPool, new: &NewDonation) -> Result<Donation> {
    sqlx::query_as::<_, Donation>(
        r#"
        INSERT INTO donations (
            amount_minor, currency, email, first_name, last_name, phone, form_title,
            status, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(new.amount_minor)
    .bind(&new.currency)
    .bind(&new.email)
    .bind(&new.first_name)
    .bind(&new.last_name)
    .bind(&new.phone)
    .bind(&new.form_title)
    .fetch_one(pool)
    .await
}

pub async fn get_donation(pool: &PgPool, id: i64) -> Result<Donation> {
    sqlx::query_as::<_, Donation>("SELECT * FROM donations WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
}

/// Resolves a notification to its donation via the persisted reference.
/// The UNIQUE constraint on the column makes this at-most-one.
pub async fn find_donation_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<Donation>> {
    sqlx::query_as::<_, Donation>("SELECT * FROM donations WHERE transaction_reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await
}

/// Attaches the freshly minted reference to a donation. Guarded on the
/// column being NULL so a reference is only ever written once; returns
/// false when another initiation already claimed it.
pub async fn set_transaction_reference(
    pool: &PgPool,
    donation_id: i64,
    reference: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE donations
        SET transaction_reference = $2, updated_at = NOW()
        WHERE id = $1 AND transaction_reference IS NULL
        "#,
    )
    .bind(donation_id)
    .bind(reference)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn set_checkout_details(
    pool: &PgPool,
    donation_id: i64,
    checkout_url: &str,
    gateway_transaction_id: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE donations
        SET checkout_url = $2, gateway_transaction_id = $3, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(donation_id)
    .bind(checkout_url)
    .bind(gateway_transaction_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// The single write the reconciliation engine performs: a conditional
/// transition out of Pending. Racing return/webhook notifications both
/// issue this; the row predicate guarantees only one of them wins.
pub async fn transition_from_pending(
    pool: &PgPool,
    donation_id: i64,
    new_status: DonationStatus,
    gateway_transaction_id: Option<&str>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE donations
        SET status = $2,
            gateway_transaction_id = COALESCE($3, gateway_transaction_id),
            updated_at = NOW()
        WHERE id = $1 AND status = 'pending'
        "#,
    )
    .bind(donation_id)
    .bind(new_status.as_str())
    .bind(gateway_transaction_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

// --- Donation note queries ---

pub async fn insert_donation_note(
    pool: &PgPool,
    donation_id: i64,
    content: &str,
) -> Result<DonationNote> {
    sqlx::query_as::<_, DonationNote>(
        r#"
        INSERT INTO donation_notes (donation_id, content, created_at)
        VALUES ($1, $2, NOW())
        RETURNING *
        "#,
    )
    .bind(donation_id)
    .bind(content)
    .fetch_one(pool)
    .await
}

pub async fn list_donation_notes(pool: &PgPool, donation_id: i64) -> Result<Vec<DonationNote>> {
    sqlx::query_as::<_, DonationNote>(
        "SELECT * FROM donation_notes WHERE donation_id = $1 ORDER BY created_at ASC",
    )
    .bind(donation_id)
    .fetch_all(pool)
    .await
}
