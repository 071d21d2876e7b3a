use csl_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{PartnerId, PartnerWalletTx};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 500;

/// Zero-based page selection for ledger listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 0, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page: page.max(0), page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn offset(&self) -> i64 {
        self.page * self.page_size
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

/// The three wallet figures callers care about.
///
/// `available` is the ledger balance (released, spendable funds), `pending` is the sum of the
/// partner's held commissions, and `balance` is the total claim: available + pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub balance: Money,
    pub pending: Money,
    pub available: Money,
}

/// One page of a partner's wallet, with the summary figures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerLedger {
    pub partner_id: PartnerId,
    pub balance: Money,
    pub pending: Money,
    pub available: Money,
    pub transactions: Vec<PartnerWalletTx>,
}
