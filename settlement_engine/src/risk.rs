//! Partner fraud-risk scoring.
//!
//! The score is a pure function over a partner's order history. Nothing here is persisted; the
//! signal is recomputed on demand so it can never drift from the source data. The weights and
//! thresholds directly gate money release, so they live in [`RiskConfig`] rather than in code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::PartnerId;

/// Order-history counters for one partner, collected in a single query pass.
#[derive(Debug, Clone, Default)]
pub struct PartnerHistory {
    pub total_orders: i64,
    pub returned_orders: i64,
    pub cancelled_orders: i64,
    /// Orders sharing a device fingerprint with another of the partner's orders.
    pub same_device_orders: i64,
    /// Orders sharing a ship address with another of the partner's orders.
    pub same_address_orders: i64,
    /// Orders placed under the partner's own customer id.
    pub self_purchase_orders: i64,
    /// Orders sharing an IP address with another of the partner's orders.
    pub ip_overlap_orders: i64,
}

impl PartnerHistory {
    pub fn return_rate(&self) -> f64 {
        if self.total_orders == 0 {
            0.0
        } else {
            self.returned_orders as f64 / self.total_orders as f64
        }
    }

    pub fn cancel_rate(&self) -> f64 {
        if self.total_orders == 0 {
            0.0
        } else {
            self.cancelled_orders as f64 / self.total_orders as f64
        }
    }
}

/// Scoring weights and gating thresholds. Defaults mirror the production policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub return_rate_high: f64,
    pub return_rate_high_score: i64,
    pub return_rate_mid: f64,
    pub return_rate_mid_score: i64,
    pub cancel_rate_high: f64,
    pub cancel_rate_high_score: i64,
    pub cancel_rate_mid: f64,
    pub cancel_rate_mid_score: i64,
    pub same_device_weight: i64,
    pub same_address_weight: i64,
    pub self_purchase_weight: i64,
    pub ip_overlap_weight: i64,
    /// Scores strictly above this hold commissions at sweep time.
    pub hold_threshold: i64,
    /// Scores strictly above this qualify the partner for a manual block. Never automatic.
    pub block_threshold: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            return_rate_high: 0.25,
            return_rate_high_score: 30,
            return_rate_mid: 0.15,
            return_rate_mid_score: 15,
            cancel_rate_high: 0.20,
            cancel_rate_high_score: 20,
            cancel_rate_mid: 0.10,
            cancel_rate_mid_score: 10,
            same_device_weight: 5,
            same_address_weight: 3,
            self_purchase_weight: 10,
            ip_overlap_weight: 5,
            hold_threshold: 40,
            block_threshold: 60,
        }
    }
}

/// The derived risk projection for one partner. Always recomputable from source data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudSignal {
    pub partner_id: PartnerId,
    pub return_rate: f64,
    pub cancel_rate: f64,
    pub same_device_count: i64,
    pub same_address_count: i64,
    pub self_purchase_count: i64,
    pub ip_overlap_count: i64,
    pub score: i64,
    /// When true, the settlement sweep leaves the partner's commissions pending.
    pub hold_commission: bool,
    /// When true, an admin may block the partner. The engine takes no automatic action.
    pub block_eligible: bool,
    pub computed_at: DateTime<Utc>,
}

/// Computes the fraud signal for a partner from its order-history counters.
pub fn score(partner_id: &PartnerId, history: &PartnerHistory, config: &RiskConfig) -> FraudSignal {
    let return_rate = history.return_rate();
    let cancel_rate = history.cancel_rate();

    let mut score = 0i64;
    if return_rate > config.return_rate_high {
        score += config.return_rate_high_score;
    } else if return_rate > config.return_rate_mid {
        score += config.return_rate_mid_score;
    }
    if cancel_rate > config.cancel_rate_high {
        score += config.cancel_rate_high_score;
    } else if cancel_rate > config.cancel_rate_mid {
        score += config.cancel_rate_mid_score;
    }
    score += config.same_device_weight * history.same_device_orders;
    score += config.same_address_weight * history.same_address_orders;
    score += config.self_purchase_weight * history.self_purchase_orders;
    score += config.ip_overlap_weight * history.ip_overlap_orders;

    FraudSignal {
        partner_id: partner_id.clone(),
        return_rate,
        cancel_rate,
        same_device_count: history.same_device_orders,
        same_address_count: history.same_address_orders,
        self_purchase_count: history.self_purchase_orders,
        ip_overlap_count: history.ip_overlap_orders,
        score,
        hold_commission: score > config.hold_threshold,
        block_eligible: score > config.block_threshold,
        computed_at: Utc::now(),
    }
}
