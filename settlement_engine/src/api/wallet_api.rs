use std::fmt::Debug;

use crate::{
    api::wallet_objects::{Pagination, PartnerLedger},
    db_types::{Partner, PartnerId},
    traits::{LedgerApiError, LedgerManagement},
};

/// `WalletApi` serves partner wallet views: the balance figures and paged ledger listings.
pub struct WalletApi<B> {
    db: B,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> WalletApi<B>
where B: LedgerManagement
{
    pub async fn fetch_partner(&self, partner_id: &PartnerId) -> Result<Option<Partner>, LedgerApiError> {
        self.db.fetch_partner(partner_id).await
    }

    /// One page of the partner's wallet, newest entries first, with the summary figures.
    pub async fn ledger(
        &self,
        partner_id: &PartnerId,
        pagination: Pagination,
    ) -> Result<PartnerLedger, LedgerApiError> {
        let summary = self.db.wallet_summary(partner_id).await?;
        let transactions = self.db.wallet_transactions(partner_id, &pagination).await?;
        Ok(PartnerLedger {
            partner_id: partner_id.clone(),
            balance: summary.balance,
            pending: summary.pending,
            available: summary.available,
            transactions,
        })
    }

    /// Walks the full ledger chain for the partner. Tests and operators use this as the
    /// correctness oracle for the materialized balance.
    pub async fn verify_ledger(&self, partner_id: &PartnerId) -> Result<(), LedgerApiError> {
        self.db.verify_ledger(partner_id).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
