use chrono::{DateTime, Utc};
use csl_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{Commission, CommissionStatus, PartnerId};

pub async fn fetch_by_id(commission_id: i64, conn: &mut SqliteConnection) -> Result<Option<Commission>, sqlx::Error> {
    let commission =
        sqlx::query_as("SELECT * FROM commissions WHERE id = $1").bind(commission_id).fetch_optional(conn).await?;
    Ok(commission)
}

/// At most one commission row exists per order (enforced by a unique index).
pub async fn fetch_for_order(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Commission>, sqlx::Error> {
    let commission =
        sqlx::query_as("SELECT * FROM commissions WHERE order_id = $1").bind(order_id).fetch_optional(conn).await?;
    Ok(commission)
}

/// Creates the commission in `Pending` status with the given hold deadline.
pub(crate) async fn insert_pending(
    order_id: i64,
    partner_id: &PartnerId,
    amount: Money,
    hold_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Commission, sqlx::Error> {
    let commission: Commission = sqlx::query_as(
        "INSERT INTO commissions (order_id, partner_id, amount, status, hold_until) VALUES ($1, $2, $3, 'Pending', \
         $4) RETURNING *",
    )
    .bind(order_id)
    .bind(partner_id.as_str())
    .bind(amount)
    .bind(hold_until)
    .fetch_one(conn)
    .await?;
    debug!("🧾️ Commission #{} of {} created for partner {}", commission.id, commission.amount, commission.partner_id);
    Ok(commission)
}

/// Commissions whose hold window has elapsed, oldest deadline first.
pub async fn fetch_due(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Commission>, sqlx::Error> {
    let due = sqlx::query_as(
        "SELECT * FROM commissions WHERE status = 'Pending' AND hold_until <= $1 ORDER BY hold_until ASC, id ASC",
    )
    .bind(now)
    .fetch_all(conn)
    .await?;
    Ok(due)
}

/// Commissions on the order that a Returned/Cancelled transition must annul.
pub(crate) async fn reversible_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Commission>, sqlx::Error> {
    let rows = sqlx::query_as(
        "SELECT * FROM commissions WHERE order_id = $1 AND status IN ('Pending', 'Available') ORDER BY id ASC",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows)
}

/// Moves the commission status as a compare-and-swap. Returns `None` when the row was no longer in
/// `from` status at write time — the guard that keeps concurrent sweeps and reversals from racing
/// each other into a double release.
pub(crate) async fn update_status_guarded(
    commission_id: i64,
    from: CommissionStatus,
    to: CommissionStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Commission>, sqlx::Error> {
    let result = sqlx::query_as(
        "UPDATE commissions SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(commission_id)
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    Ok(result)
}

/// Stamps the manual-review flag exactly once. Returns true when this call set it.
pub(crate) async fn flag_for_review(commission_id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE commissions SET review_flagged_at = CURRENT_TIMESTAMP WHERE id = $1 AND review_flagged_at IS NULL",
    )
    .bind(commission_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}
