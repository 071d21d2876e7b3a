use std::fmt::Debug;

use crate::{
    db_types::PartnerId,
    risk::{self, FraudSignal, RiskConfig},
    traits::{SettlementDatabase, SettlementError},
};

/// `RiskApi` computes fraud signals on demand. Nothing is cached: every call re-derives the
/// signal from the partner's order history, so it can never drift from the source data.
pub struct RiskApi<B> {
    db: B,
    config: RiskConfig,
}

impl<B> Debug for RiskApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RiskApi")
    }
}

impl<B> RiskApi<B> {
    pub fn new(db: B, config: RiskConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}

impl<B> RiskApi<B>
where B: SettlementDatabase
{
    pub async fn risk_signal(&self, partner_id: &PartnerId) -> Result<FraudSignal, SettlementError> {
        let history = self.db.partner_history(partner_id).await?;
        Ok(risk::score(partner_id, &history, &self.config))
    }
}
