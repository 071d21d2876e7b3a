use log::warn;
use sqlx::SqliteConnection;

use crate::db_types::StockLevel;

/// Delivered-order hand-off: the reservation is consumed and the goods leave the shelf. Returns
/// false when no stock row exists for the variant, in which case nothing was written and the
/// caller decides whether that matters.
pub(crate) async fn fulfil_reservation(
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("UPDATE stock_levels SET reserved = reserved - $1, on_hand = on_hand - $1 WHERE variant_id = $2")
            .bind(quantity)
            .bind(variant_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        warn!("📦️ No stock row for variant {variant_id}; skipping fulfilment decrement");
    }
    Ok(result.rows_affected() > 0)
}

/// Cancelled-order hand-off: the reservation is released but the goods stay on the shelf.
pub(crate) async fn release_reservation(
    variant_id: &str,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE stock_levels SET reserved = reserved - $1 WHERE variant_id = $2")
        .bind(quantity)
        .bind(variant_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        warn!("📦️ No stock row for variant {variant_id}; skipping reservation release");
    }
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_stock_level(
    variant_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<StockLevel>, sqlx::Error> {
    let level = sqlx::query_as("SELECT * FROM stock_levels WHERE variant_id = $1")
        .bind(variant_id)
        .fetch_optional(conn)
        .await?;
    Ok(level)
}
