//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the
//! [`crate::traits`] module. Every money-affecting operation runs inside a single transaction so
//! that a state-machine step, its commission writes and its stock hand-off commit or roll back as
//! one unit.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{SqliteConnection, SqlitePool};

use super::db::{commissions, db_url, ledger, new_pool, orders, partners, rules, stock};
use crate::{
    api::{
        order_objects::OrderQueryFilter,
        wallet_objects::{Pagination, WalletSummary},
    },
    db_types::{
        Commission,
        CommissionStatus,
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusEvent,
        OrderStatusType,
        Partner,
        PartnerId,
        PartnerLevel,
        PartnerWalletTx,
        WalletTxType,
    },
    risk::PartnerHistory,
    traits::{
        CommissionReversal,
        LedgerApiError,
        LedgerManagement,
        LifetimeStats,
        SettlementDatabase,
        SettlementError,
        TransitionOutcome,
        TransitionRequest,
    },
};
use crate::rules as resolver;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let (order, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        Ok((order, inserted))
    }

    /// Applies one state-machine step atomically. See the trait docs for the contract; the
    /// sequencing here is:
    /// 1. read the order and validate the edge against the transition graph;
    /// 2. compare-and-swap the status (a lost race is a `ConcurrencyConflict`);
    /// 3. append the status event;
    /// 4. run the side effects bound to the target status (commission creation + stock fulfilment
    ///    on Delivered; commission reversal on Returned/Cancelled, plus reservation release on
    ///    Cancelled).
    async fn apply_transition(&self, request: TransitionRequest) -> Result<TransitionOutcome, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_order_by_code(&request.order_code, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(request.order_code.clone()))?;
        let from = order.status;
        let target = request.target;
        if !from.can_transition_to(target) {
            return Err(SettlementError::InvalidTransition { from, to: target });
        }
        let updated = orders::transition_status(order.id, from, target, request.tracking_number.as_deref(), &mut tx)
            .await?
            .ok_or_else(|| {
                SettlementError::ConcurrencyConflict(format!(
                    "Order [{}] status moved while applying {from} -> {target}",
                    order.order_code
                ))
            })?;
        let event = orders::append_status_event(order.id, from, target, request.note.as_deref(), &mut tx).await?;
        let mut commission = None;
        let mut reversals = Vec::new();
        match target {
            OrderStatusType::Delivered => {
                commission = create_commission_for_delivery(&updated, &request, &mut tx).await?;
                let items = orders::fetch_line_items(updated.id, &mut tx).await?;
                for item in &items {
                    stock::fulfil_reservation(&item.variant_id, item.quantity, &mut tx).await?;
                }
            },
            OrderStatusType::Returned | OrderStatusType::Cancelled => {
                reversals = reverse_commissions(&updated, &mut tx).await?;
                if target == OrderStatusType::Cancelled {
                    let items = orders::fetch_line_items(updated.id, &mut tx).await?;
                    for item in &items {
                        stock::release_reservation(&item.variant_id, item.quantity, &mut tx).await?;
                    }
                }
            },
            _ => {},
        }
        tx.commit().await?;
        debug!("🗃️ Order [{}] moved {from} -> {target}", updated.order_code);
        Ok(TransitionOutcome { order: updated, previous_status: from, event, commission, reversals })
    }

    async fn fetch_due_commissions(&self, now: DateTime<Utc>) -> Result<Vec<Commission>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let due = commissions::fetch_due(now, &mut conn).await?;
        Ok(due)
    }

    async fn partner_history(&self, partner_id: &PartnerId) -> Result<PartnerHistory, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        partners::fetch_partner(partner_id, &mut conn)
            .await?
            .ok_or_else(|| SettlementError::PartnerNotFound(partner_id.clone()))?;
        let history = partners::history(partner_id, &mut conn).await?;
        Ok(history)
    }

    async fn release_commission(
        &self,
        commission: &Commission,
    ) -> Result<Option<(Commission, PartnerWalletTx)>, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let updated = match commissions::update_status_guarded(
            commission.id,
            CommissionStatus::Pending,
            CommissionStatus::Available,
            &mut tx,
        )
        .await?
        {
            Some(c) => c,
            None => {
                debug!("🗃️ Commission #{} was no longer pending at release time. Skipping.", commission.id);
                return Ok(None);
            },
        };
        let wallet_tx =
            ledger::append_tx(&commission.partner_id, WalletTxType::Earn, commission.amount, commission.id, &mut tx)
                .await?;
        tx.commit().await?;
        debug!("🗃️ Commission #{} released: {} credited to partner {}", commission.id, commission.amount, commission.partner_id);
        Ok(Some((updated, wallet_tx)))
    }

    async fn flag_commission_for_review(&self, commission_id: i64) -> Result<bool, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let newly_flagged = commissions::flag_for_review(commission_id, &mut conn).await?;
        Ok(newly_flagged)
    }

    async fn partner_lifetime_stats(&self, partner_id: &PartnerId) -> Result<LifetimeStats, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let stats = partners::lifetime_stats(partner_id, &mut conn).await?;
        Ok(stats)
    }

    async fn promote_partner(
        &self,
        partner_id: &PartnerId,
        new_level: PartnerLevel,
    ) -> Result<Partner, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let current = partners::fetch_partner(partner_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::PartnerNotFound(partner_id.clone()))?;
        let updated = partners::promote(partner_id, current.level, new_level, &mut tx).await?.ok_or_else(|| {
            SettlementError::ConcurrencyConflict(format!(
                "Partner {partner_id} level moved while promoting {} -> {new_level}",
                current.level
            ))
        })?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn record_payout(&self, commission_id: i64) -> Result<(Commission, PartnerWalletTx), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let commission = commissions::fetch_by_id(commission_id, &mut tx)
            .await?
            .ok_or(SettlementError::CommissionNotFound(commission_id))?;
        let updated =
            commissions::update_status_guarded(commission_id, CommissionStatus::Available, CommissionStatus::Paid, &mut tx)
                .await?
                .ok_or(SettlementError::CommissionStateConflict {
                    id: commission_id,
                    expected: CommissionStatus::Available,
                    actual: commission.status,
                })?;
        let wallet_tx =
            ledger::append_tx(&commission.partner_id, WalletTxType::Payout, -commission.amount, commission_id, &mut tx)
                .await?;
        tx.commit().await?;
        debug!("🗃️ Commission #{commission_id} paid out: {} debited from partner {}", commission.amount, commission.partner_id);
        Ok((updated, wallet_tx))
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

/// The commission-creation sequence, run inside the Delivered transition's transaction.
///
/// Silently does nothing when the order has no referral partner, when a commission already exists
/// for the order (the idempotency guard against retried transitions), or when no active rule
/// matches.
async fn create_commission_for_delivery(
    order: &Order,
    request: &TransitionRequest,
    conn: &mut SqliteConnection,
) -> Result<Option<Commission>, SettlementError> {
    let partner_id = match &order.partner_id {
        Some(p) => p.clone(),
        None => {
            trace!("🗃️ Order [{}] has no referral partner. No commission due.", order.order_code);
            return Ok(None);
        },
    };
    if let Some(existing) = commissions::fetch_for_order(order.id, conn).await? {
        debug!(
            "🗃️ Order [{}] already has commission #{} ({}). Skipping creation.",
            order.order_code, existing.id, existing.status
        );
        return Ok(None);
    }
    let partner = partners::fetch_partner(&partner_id, conn)
        .await?
        .ok_or_else(|| SettlementError::PartnerShouldExistForOrder(partner_id.clone(), order.order_code.clone()))?;
    let items = orders::fetch_line_items(order.id, conn).await?;
    let product_ids: Vec<String> = items.iter().map(|i| i.product_id.clone()).collect();
    let category_ids: Vec<String> = items.iter().filter_map(|i| i.category_id.clone()).collect();
    let candidates = rules::active_candidates(&product_ids, &category_ids, conn).await?;
    let resolved = match resolver::resolve(&candidates, order, &product_ids, &category_ids, partner.level) {
        Some(r) => r,
        None => {
            debug!("🗃️ No commission rule matches order [{}]. No commission due.", order.order_code);
            return Ok(None);
        },
    };
    let hold_until = Utc::now() + request.hold_window;
    let commission = commissions::insert_pending(order.id, &partner_id, resolved.amount, hold_until, conn).await?;
    Ok(Some(commission))
}

/// The reversal sequence, run inside Returned/Cancelled transitions.
///
/// Every Pending or Available commission on the order becomes Reversed. Funds that were already
/// released get a Reverse ledger entry whose balance is recomputed from the ledger head at
/// reversal time, never from a cached figure. Paid commissions are deliberately untouched;
/// clawing back a completed payout is a manual process.
async fn reverse_commissions(
    order: &Order,
    conn: &mut SqliteConnection,
) -> Result<Vec<CommissionReversal>, SettlementError> {
    let rows = commissions::reversible_for_order(order.id, conn).await?;
    let mut reversals = Vec::with_capacity(rows.len());
    for commission in rows {
        let prior = commission.status;
        let updated =
            match commissions::update_status_guarded(commission.id, prior, CommissionStatus::Reversed, conn).await? {
                Some(c) => c,
                None => {
                    warn!(
                        "🗃️ Commission #{} moved out of {prior} within the reversal transaction. This should not \
                         happen; skipping it.",
                        commission.id
                    );
                    continue;
                },
            };
        let wallet_tx = if prior == CommissionStatus::Available {
            let tx_row = ledger::append_tx(
                &commission.partner_id,
                WalletTxType::Reverse,
                -commission.amount,
                commission.id,
                conn,
            )
            .await?;
            Some(tx_row)
        } else {
            None
        };
        debug!(
            "🗃️ Commission #{} reversed (was {prior}) for order [{}]",
            commission.id, order.order_code
        );
        reversals.push(CommissionReversal { commission: updated, wallet_tx });
    }
    Ok(reversals)
}

impl LedgerManagement for SqliteDatabase {
    async fn fetch_order_by_code(&self, order_code: &OrderId) -> Result<Option<Order>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_code(order_code, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_line_items(&self, order_id: i64) -> Result<Vec<LineItem>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let items = orders::fetch_line_items(order_id, &mut conn).await?;
        Ok(items)
    }

    async fn fetch_status_events(&self, order_id: i64) -> Result<Vec<OrderStatusEvent>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let events = orders::fetch_status_events(order_id, &mut conn).await?;
        Ok(events)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_partner(&self, partner_id: &PartnerId) -> Result<Option<Partner>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let partner = partners::fetch_partner(partner_id, &mut conn).await?;
        Ok(partner)
    }

    async fn fetch_commission(&self, commission_id: i64) -> Result<Option<Commission>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let commission = commissions::fetch_by_id(commission_id, &mut conn).await?;
        Ok(commission)
    }

    async fn fetch_commission_for_order(&self, order_id: i64) -> Result<Option<Commission>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let commission = commissions::fetch_for_order(order_id, &mut conn).await?;
        Ok(commission)
    }

    async fn wallet_transactions(
        &self,
        partner_id: &PartnerId,
        pagination: &Pagination,
    ) -> Result<Vec<PartnerWalletTx>, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        let rows = ledger::transactions_for_partner(partner_id, pagination, &mut conn).await?;
        Ok(rows)
    }

    async fn wallet_summary(&self, partner_id: &PartnerId) -> Result<WalletSummary, LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        partners::fetch_partner(partner_id, &mut conn)
            .await?
            .ok_or_else(|| LedgerApiError::PartnerNotFound(partner_id.clone()))?;
        let available = ledger::ledger_sum(partner_id, &mut conn).await?;
        let pending = ledger::pending_commission_total(partner_id, &mut conn).await?;
        Ok(WalletSummary { balance: available + pending, pending, available })
    }

    async fn verify_ledger(&self, partner_id: &PartnerId) -> Result<(), LedgerApiError> {
        let mut conn = self.pool.acquire().await?;
        ledger::verify_chain(partner_id, &mut conn).await
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
