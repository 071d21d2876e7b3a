use std::fmt::{Debug, Display};

use chrono::Utc;
use csl_common::Money;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{Commission, PartnerId, PartnerLevel, PartnerWalletTx},
    events::{CommissionReleasedEvent, EventProducers, PartnerPromotedEvent},
    risk::{self, FraudSignal, RiskConfig},
    traits::{LedgerApiError, LifetimeStats, SettlementDatabase, SettlementError, SweepSummary},
};

/// Tier thresholds for the partner ladder. A partner qualifies for a level when it meets both the
/// order count and the revenue figure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierConfig {
    pub agent_min_orders: i64,
    pub agent_min_revenue: Money,
    pub leader_min_orders: i64,
    pub leader_min_revenue: Money,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            agent_min_orders: 25,
            agent_min_revenue: Money::from(10_000_000),
            leader_min_orders: 100,
            leader_min_revenue: Money::from(50_000_000),
        }
    }
}

impl TierConfig {
    /// The highest level the given lifetime stats qualify for.
    pub fn level_for(&self, stats: &LifetimeStats) -> PartnerLevel {
        if stats.delivered_orders >= self.leader_min_orders && stats.net_revenue >= self.leader_min_revenue {
            PartnerLevel::Leader
        } else if stats.delivered_orders >= self.agent_min_orders && stats.net_revenue >= self.agent_min_revenue {
            PartnerLevel::Agent
        } else {
            PartnerLevel::Affiliate
        }
    }
}

/// `SettlementApi` runs the batch settlement sweep and the payout hand-off.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
    risk: RiskConfig,
    tiers: TierConfig,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers, risk: RiskConfig, tiers: TierConfig) -> Self {
        Self { db, producers, risk, tiers }
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    /// Runs one settlement sweep. Safe to invoke repeatedly and concurrently: each commission is
    /// released through a conditional status update, so a commission can enter a wallet at most
    /// once no matter how many sweeps observe it.
    ///
    /// Per commission:
    /// 1. the partner's fraud signal is recomputed; a held partner's commission stays `Pending`
    ///    (the hold deadline is never extended) and is flagged for manual review once;
    /// 2. otherwise the commission is released: status `Available` plus an `Earn` ledger entry.
    ///
    /// After the scan, every partner that earned a release is re-evaluated against the tier
    /// thresholds and promoted when due.
    ///
    /// Individual storage failures are logged and counted without aborting the sweep, so the
    /// returned summary always reflects partial progress. The exception is a ledger integrity
    /// violation, which halts the sweep immediately.
    pub async fn run_sweep(&self) -> Result<SweepSummary, SettlementError> {
        let now = Utc::now();
        let due = self.db.fetch_due_commissions(now).await?;
        info!("🧹️ Settlement sweep started. {} commissions are due.", due.len());
        let mut summary = SweepSummary::default();
        let mut affected: Vec<PartnerId> = Vec::new();
        for commission in &due {
            summary.processed_total += 1;
            let signal = match self.signal_for(&commission.partner_id).await {
                Ok(signal) => signal,
                Err(e) => {
                    error!("🧹️ Could not score partner {} for commission #{}: {e}", commission.partner_id, commission.id);
                    summary.failures += 1;
                    continue;
                },
            };
            if signal.hold_commission {
                summary.held_for_review += 1;
                match self.db.flag_commission_for_review(commission.id).await {
                    Ok(true) => info!(
                        "🧹️ Commission #{} held: partner {} risk score is {}. Flagged for manual review.",
                        commission.id, commission.partner_id, signal.score
                    ),
                    Ok(false) => trace!("🧹️ Commission #{} still held (score {}).", commission.id, signal.score),
                    Err(e) => {
                        error!("🧹️ Could not flag commission #{} for review: {e}", commission.id);
                        summary.failures += 1;
                    },
                }
                continue;
            }
            match self.db.release_commission(commission).await {
                Ok(Some((released, wallet_tx))) => {
                    summary.released += 1;
                    if !affected.contains(&commission.partner_id) {
                        affected.push(commission.partner_id.clone());
                    }
                    self.call_released_hooks(released, wallet_tx).await;
                },
                Ok(None) => {
                    debug!("🧹️ Commission #{} was already handled by another sweep. Skipping.", commission.id);
                },
                Err(e @ SettlementError::LedgerError(LedgerApiError::LedgerIntegrity { .. })) => {
                    error!("🧹️ {e}. Halting sweep.");
                    return Err(SettlementError::SweepHalted {
                        processed: summary.processed_total,
                        reason: e.to_string(),
                    });
                },
                Err(e) => {
                    error!("🧹️ Could not release commission #{}: {e}", commission.id);
                    summary.failures += 1;
                },
            }
        }
        for partner_id in &affected {
            match self.evaluate_tier(partner_id).await {
                Ok(Some(event)) => {
                    summary.tier_upgrades += 1;
                    self.call_promoted_hooks(event).await;
                },
                Ok(None) => {},
                Err(e) => {
                    error!("🧹️ Tier evaluation failed for partner {partner_id}: {e}");
                    summary.failures += 1;
                },
            }
        }
        info!("🧹️ Settlement sweep complete. {}", SweepReport(&summary));
        Ok(summary)
    }

    /// The payout collaborator hand-off: moves an `Available` commission to `Paid` and debits the
    /// wallet in one transaction.
    pub async fn record_payout(&self, commission_id: i64) -> Result<(Commission, PartnerWalletTx), SettlementError> {
        self.db.record_payout(commission_id).await
    }

    async fn signal_for(&self, partner_id: &PartnerId) -> Result<FraudSignal, SettlementError> {
        let history = self.db.partner_history(partner_id).await?;
        Ok(risk::score(partner_id, &history, &self.risk))
    }

    async fn evaluate_tier(&self, partner_id: &PartnerId) -> Result<Option<PartnerPromotedEvent>, SettlementError> {
        let partner = self
            .db
            .fetch_partner(partner_id)
            .await?
            .ok_or_else(|| SettlementError::PartnerNotFound(partner_id.clone()))?;
        let stats = self.db.partner_lifetime_stats(partner_id).await?;
        let qualified = self.tiers.level_for(&stats);
        if qualified > partner.level {
            let updated = self.db.promote_partner(partner_id, qualified).await?;
            Ok(Some(PartnerPromotedEvent { partner: updated, previous_level: partner.level }))
        } else {
            Ok(None)
        }
    }

    async fn call_released_hooks(&self, commission: Commission, wallet_tx: PartnerWalletTx) {
        for emitter in &self.producers.commission_released_producer {
            let event = CommissionReleasedEvent { commission: commission.clone(), wallet_tx: wallet_tx.clone() };
            emitter.publish_event(event).await;
        }
    }

    async fn call_promoted_hooks(&self, event: PartnerPromotedEvent) {
        for emitter in &self.producers.partner_promoted_producer {
            emitter.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

struct SweepReport<'a>(&'a SweepSummary);

impl Display for SweepReport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} processed, {} released, {} held for review, {} tier upgrades, {} failures",
            self.0.processed_total, self.0.released, self.0.held_for_review, self.0.tier_upgrades, self.0.failures
        )
    }
}
