use csl_common::Money;
use thiserror::Error;

use crate::{
    api::{
        order_objects::OrderQueryFilter,
        wallet_objects::{Pagination, WalletSummary},
    },
    db_types::{Commission, LineItem, Order, OrderId, OrderStatusEvent, Partner, PartnerId, PartnerWalletTx},
};

/// Read access to orders, partners, commissions and the wallet ledger.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement: Clone {
    async fn fetch_order_by_code(&self, order_code: &OrderId) -> Result<Option<Order>, LedgerApiError>;

    async fn fetch_line_items(&self, order_id: i64) -> Result<Vec<LineItem>, LedgerApiError>;

    async fn fetch_status_events(&self, order_id: i64) -> Result<Vec<OrderStatusEvent>, LedgerApiError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, LedgerApiError>;

    async fn fetch_partner(&self, partner_id: &PartnerId) -> Result<Option<Partner>, LedgerApiError>;

    async fn fetch_commission(&self, commission_id: i64) -> Result<Option<Commission>, LedgerApiError>;

    /// At most one commission exists per order.
    async fn fetch_commission_for_order(&self, order_id: i64) -> Result<Option<Commission>, LedgerApiError>;

    /// A page of the partner's wallet ledger, newest first.
    async fn wallet_transactions(
        &self,
        partner_id: &PartnerId,
        pagination: &Pagination,
    ) -> Result<Vec<PartnerWalletTx>, LedgerApiError>;

    /// Balance, pending and available amounts for the partner wallet.
    async fn wallet_summary(&self, partner_id: &PartnerId) -> Result<WalletSummary, LedgerApiError>;

    /// The correctness oracle: walks the full ledger, checking that every row's `balance_after`
    /// continues the chain and that the running sum matches the materialized wallet balance.
    async fn verify_ledger(&self, partner_id: &PartnerId) -> Result<(), LedgerApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("The requested partner {0} does not exist")]
    PartnerNotFound(PartnerId),
    #[error(
        "Ledger integrity violation for partner {partner_id}: chain balance {expected} but materialized balance \
         {actual}. Further writes for this partner must halt."
    )]
    LedgerIntegrity { partner_id: PartnerId, expected: Money, actual: Money },
}

impl From<sqlx::Error> for LedgerApiError {
    fn from(e: sqlx::Error) -> Self {
        LedgerApiError::DatabaseError(e.to_string())
    }
}
