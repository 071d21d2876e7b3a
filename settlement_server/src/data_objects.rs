use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use settlement_engine::{
    db_types::OrderStatusType,
    wallet_objects::{Pagination, DEFAULT_PAGE_SIZE},
};

/// Body of `POST /api/orders/{order_code}/transition`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionParams {
    pub target_status: OrderStatusType,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
}

/// Query string of `GET /api/partners/{partner_id}/ledger`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerQueryParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl LedgerQueryParams {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page.unwrap_or(0), self.page_size.unwrap_or(DEFAULT_PAGE_SIZE))
    }
}

/// Query string of `GET /api/orders`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSearchParams {
    pub status: Option<OrderStatusType>,
    pub partner_id: Option<String>,
    pub customer_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}
