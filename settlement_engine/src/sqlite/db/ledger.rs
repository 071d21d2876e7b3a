use csl_common::Money;
use log::{debug, error};
use sqlx::SqliteConnection;

use crate::{
    api::wallet_objects::Pagination,
    db_types::{PartnerId, PartnerWalletTx, WalletTxType},
    traits::LedgerApiError,
};

/// Appends one row to the partner's wallet ledger and updates the materialized balance, inside the
/// caller's transaction.
///
/// The new `balance_after` is always recomputed from the newest existing row (zero baseline), not
/// from a cached figure. Before writing, the newest row's `balance_after` is cross-checked against
/// the partner's materialized `wallet_balance`; a mismatch means the chain has been corrupted and
/// the append fails with [`LedgerApiError::LedgerIntegrity`], aborting the enclosing transaction.
/// The check re-trips on every subsequent append for that partner, so writes stay halted until an
/// operator intervenes.
pub(crate) async fn append_tx(
    partner_id: &PartnerId,
    tx_type: WalletTxType,
    amount: Money,
    ref_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PartnerWalletTx, LedgerApiError> {
    let head: Option<i64> =
        sqlx::query_scalar("SELECT balance_after FROM wallet_txs WHERE partner_id = $1 ORDER BY id DESC LIMIT 1")
            .bind(partner_id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    let materialized: Option<i64> = sqlx::query_scalar("SELECT wallet_balance FROM partners WHERE id = $1")
        .bind(partner_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let materialized = materialized.ok_or_else(|| LedgerApiError::PartnerNotFound(partner_id.clone()))?;
    let head = head.unwrap_or_default();
    if head != materialized {
        let err = LedgerApiError::LedgerIntegrity {
            partner_id: partner_id.clone(),
            expected: Money::from(head),
            actual: Money::from(materialized),
        };
        error!("💰️ {err}");
        return Err(err);
    }
    let balance_after = Money::from(head) + amount;
    let tx: PartnerWalletTx = sqlx::query_as(
        "INSERT INTO wallet_txs (partner_id, tx_type, amount, ref_id, balance_after) VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(partner_id.as_str())
    .bind(tx_type.to_string())
    .bind(amount)
    .bind(ref_id)
    .bind(balance_after)
    .fetch_one(&mut *conn)
    .await?;
    sqlx::query("UPDATE partners SET wallet_balance = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(balance_after)
        .bind(partner_id.as_str())
        .execute(&mut *conn)
        .await?;
    debug!("💰️ {tx_type} of {amount} appended for partner {partner_id}. Balance is now {balance_after}");
    Ok(tx)
}

/// A page of the partner's ledger, newest entries first.
pub async fn transactions_for_partner(
    partner_id: &PartnerId,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<PartnerWalletTx>, sqlx::Error> {
    let rows = sqlx::query_as("SELECT * FROM wallet_txs WHERE partner_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3")
        .bind(partner_id.as_str())
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

/// The running sum of every ledger amount for the partner. This is the balance definition; the
/// materialized column is only a shortcut.
pub async fn ledger_sum(partner_id: &PartnerId, conn: &mut SqliteConnection) -> Result<Money, sqlx::Error> {
    let sum: Option<i64> = sqlx::query_scalar("SELECT SUM(amount) FROM wallet_txs WHERE partner_id = $1")
        .bind(partner_id.as_str())
        .fetch_one(conn)
        .await?;
    Ok(Money::from(sum.unwrap_or_default()))
}

/// Total of the partner's commissions still held in `Pending`.
pub async fn pending_commission_total(
    partner_id: &PartnerId,
    conn: &mut SqliteConnection,
) -> Result<Money, sqlx::Error> {
    let sum: Option<i64> =
        sqlx::query_scalar("SELECT SUM(amount) FROM commissions WHERE partner_id = $1 AND status = 'Pending'")
            .bind(partner_id.as_str())
            .fetch_one(conn)
            .await?;
    Ok(Money::from(sum.unwrap_or_default()))
}

/// Walks the partner's full ledger and checks the balance chain row by row, then compares the
/// final figure against the materialized wallet balance.
pub async fn verify_chain(partner_id: &PartnerId, conn: &mut SqliteConnection) -> Result<(), LedgerApiError> {
    let rows: Vec<PartnerWalletTx> =
        sqlx::query_as("SELECT * FROM wallet_txs WHERE partner_id = $1 ORDER BY id ASC")
            .bind(partner_id.as_str())
            .fetch_all(&mut *conn)
            .await?;
    let mut running = Money::default();
    for row in &rows {
        running += row.amount;
        if row.balance_after != running {
            return Err(LedgerApiError::LedgerIntegrity {
                partner_id: partner_id.clone(),
                expected: running,
                actual: row.balance_after,
            });
        }
    }
    let materialized: Option<i64> = sqlx::query_scalar("SELECT wallet_balance FROM partners WHERE id = $1")
        .bind(partner_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    let materialized = Money::from(materialized.ok_or_else(|| LedgerApiError::PartnerNotFound(partner_id.clone()))?);
    if materialized != running {
        return Err(LedgerApiError::LedgerIntegrity { partner_id: partner_id.clone(), expected: running, actual: materialized });
    }
    Ok(())
}
