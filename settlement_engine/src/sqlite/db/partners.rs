use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Partner, PartnerId, PartnerLevel},
    risk::PartnerHistory,
    traits::LifetimeStats,
};
use csl_common::Money;

pub async fn fetch_partner(partner_id: &PartnerId, conn: &mut SqliteConnection) -> Result<Option<Partner>, sqlx::Error> {
    let partner =
        sqlx::query_as("SELECT * FROM partners WHERE id = $1").bind(partner_id.as_str()).fetch_optional(conn).await?;
    Ok(partner)
}

/// Collects the order-history counters the risk scorer consumes. Everything is derived from the
/// orders table on the fly; no counter is ever persisted.
pub async fn history(partner_id: &PartnerId, conn: &mut SqliteConnection) -> Result<PartnerHistory, sqlx::Error> {
    let pid = partner_id.as_str();
    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE partner_id = $1")
        .bind(pid)
        .fetch_one(&mut *conn)
        .await?;
    let returned_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE partner_id = $1 AND status = 'Returned'")
            .bind(pid)
            .fetch_one(&mut *conn)
            .await?;
    let cancelled_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE partner_id = $1 AND status = 'Cancelled'")
            .bind(pid)
            .fetch_one(&mut *conn)
            .await?;
    let same_device_orders: i64 = overlap_count("device_fingerprint", pid, &mut *conn).await?;
    let same_address_orders: i64 = overlap_count("ship_address", pid, &mut *conn).await?;
    let ip_overlap_orders: i64 = overlap_count("ip_address", pid, &mut *conn).await?;
    let self_purchase_orders: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE partner_id = $1 AND customer_id = (SELECT customer_id FROM partners WHERE \
         id = $1)",
    )
    .bind(pid)
    .fetch_one(&mut *conn)
    .await?;
    Ok(PartnerHistory {
        total_orders,
        returned_orders,
        cancelled_orders,
        same_device_orders,
        same_address_orders,
        self_purchase_orders,
        ip_overlap_orders,
    })
}

/// Orders that share the given column value with another order from the same partner.
async fn overlap_count(column: &str, partner_id: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    // `column` is one of three hard-coded identifiers supplied by `history`, never user input.
    let sql = format!(
        "SELECT COUNT(*) FROM orders o WHERE o.partner_id = $1 AND o.{column} IS NOT NULL AND EXISTS (SELECT 1 FROM \
         orders o2 WHERE o2.partner_id = o.partner_id AND o2.id <> o.id AND o2.{column} = o.{column})"
    );
    sqlx::query_scalar(&sql).bind(partner_id).fetch_one(conn).await
}

/// Lifetime delivered-order count and net revenue, the inputs to tier evaluation.
pub async fn lifetime_stats(partner_id: &PartnerId, conn: &mut SqliteConnection) -> Result<LifetimeStats, sqlx::Error> {
    let row: (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), SUM(subtotal - discount_total) FROM orders WHERE partner_id = $1 AND status = 'Delivered'",
    )
    .bind(partner_id.as_str())
    .fetch_one(conn)
    .await?;
    Ok(LifetimeStats { delivered_orders: row.0, net_revenue: Money::from(row.1.unwrap_or_default()) })
}

/// Upgrades the partner's level. Guarded so a concurrent sweep cannot skip a rung or downgrade.
pub(crate) async fn promote(
    partner_id: &PartnerId,
    from: PartnerLevel,
    to: PartnerLevel,
    conn: &mut SqliteConnection,
) -> Result<Option<Partner>, sqlx::Error> {
    let partner: Option<Partner> = sqlx::query_as(
        "UPDATE partners SET level = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND level = $3 RETURNING *",
    )
    .bind(to.to_string())
    .bind(partner_id.as_str())
    .bind(from.to_string())
    .fetch_optional(conn)
    .await?;
    if let Some(p) = &partner {
        debug!("🧑️ Partner {} promoted from {from} to {}", p.id, p.level);
    }
    Ok(partner)
}
