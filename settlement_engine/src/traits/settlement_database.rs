use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{Commission, CommissionStatus, Order, OrderId, OrderStatusType, Partner, PartnerId, PartnerWalletTx},
    risk::PartnerHistory,
    traits::{
        data_objects::{LifetimeStats, TransitionOutcome, TransitionRequest},
        LedgerApiError,
        LedgerManagement,
    },
};
use csl_common::Money;

/// This trait defines the highest level of behaviour for backends supporting the settlement
/// engine.
///
/// This behaviour includes:
/// * Storing incoming orders from the checkout collaborator.
/// * Applying order state-machine steps with their commission and stock side effects, atomically.
/// * The settlement sweep primitives: due-commission selection, guarded release, review flagging.
/// * The payout hand-off and partner tier promotion.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + LedgerManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Stores a new order with its line items in a single atomic transaction. This call is
    /// idempotent on the order code. Returns the order and whether it was inserted.
    async fn insert_order(&self, order: crate::db_types::NewOrder) -> Result<(Order, bool), SettlementError>;

    /// Applies one state-machine step: validates the edge against the order's current status,
    /// updates the status (compare-and-swap), appends the status event, and runs the
    /// commission-creation or reversal sequence plus the stock hand-off bound to the target
    /// status. All of it commits or none of it does.
    ///
    /// A lost status race surfaces as [`SettlementError::ConcurrencyConflict`]; callers may retry.
    async fn apply_transition(&self, request: TransitionRequest) -> Result<TransitionOutcome, SettlementError>;

    /// Commissions that are `Pending` with `hold_until <= now`, oldest first.
    async fn fetch_due_commissions(&self, now: DateTime<Utc>) -> Result<Vec<Commission>, SettlementError>;

    /// Order-history counters for the risk scorer, collected in one pass.
    async fn partner_history(&self, partner_id: &PartnerId) -> Result<PartnerHistory, SettlementError>;

    /// Releases one commission into the partner wallet: a conditional `Pending -> Available`
    /// update plus an `Earn` ledger append in the same transaction. Returns `None` when the
    /// commission was no longer pending at write time — the guard that makes concurrent sweeps
    /// unable to double-release.
    async fn release_commission(
        &self,
        commission: &Commission,
    ) -> Result<Option<(Commission, PartnerWalletTx)>, SettlementError>;

    /// Stamps `review_flagged_at` once. Returns true when this call set it.
    async fn flag_commission_for_review(&self, commission_id: i64) -> Result<bool, SettlementError>;

    /// Lifetime delivered-order count and net revenue for the tier evaluation.
    async fn partner_lifetime_stats(&self, partner_id: &PartnerId) -> Result<LifetimeStats, SettlementError>;

    /// Moves the partner to `new_level`. Level changes are upgrade-only.
    async fn promote_partner(&self, partner_id: &PartnerId, new_level: crate::db_types::PartnerLevel)
        -> Result<Partner, SettlementError>;

    /// The payout collaborator hand-off: conditionally moves the commission from `Available` to
    /// `Paid` and appends the matching `Payout` ledger entry in one transaction.
    async fn record_payout(&self, commission_id: i64) -> Result<(Commission, PartnerWalletTx), SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested partner {0} does not exist")]
    PartnerNotFound(PartnerId),
    #[error("The referral partner {0} should exist for order {1}, but does not")]
    PartnerShouldExistForOrder(PartnerId, OrderId),
    #[error("The requested commission {0} does not exist")]
    CommissionNotFound(i64),
    #[error("Order status cannot change from {from} to {to}")]
    InvalidTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("Serialization conflict, safe to retry: {0}")]
    ConcurrencyConflict(String),
    #[error("Commission {id} is {actual}, but this operation requires {expected}")]
    CommissionStateConflict { id: i64, expected: CommissionStatus, actual: CommissionStatus },
    #[error("{0}")]
    LedgerError(#[from] LedgerApiError),
    #[error("Settlement sweep halted after {processed} commissions: {reason}")]
    SweepHalted { processed: usize, reason: String },
}

impl SettlementError {
    /// Concurrency conflicts are transient; everything else needs operator attention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SettlementError::ConcurrencyConflict(_))
    }

    pub fn ledger_integrity(partner_id: PartnerId, expected: Money, actual: Money) -> Self {
        SettlementError::LedgerError(LedgerApiError::LedgerIntegrity { partner_id, expected, actual })
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
