use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::db_types::{Commission, Order, OrderId, OrderStatusEvent, OrderStatusType, PartnerWalletTx};
use csl_common::Money;

/// Everything the backend needs to apply one state-machine step atomically.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub order_code: OrderId,
    pub target: OrderStatusType,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
    /// The return window for a commission created by this transition.
    pub hold_window: Duration,
}

impl TransitionRequest {
    pub fn new(order_code: OrderId, target: OrderStatusType, hold_window: Duration) -> Self {
        Self { order_code, target, note: None, tracking_number: None, hold_window }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_tracking_number<S: Into<String>>(mut self, tracking_number: S) -> Self {
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

/// One commission annulled by a Returned/Cancelled transition. The wallet tx is present only when
/// the commission had already been released to the wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionReversal {
    pub commission: Commission,
    pub wallet_tx: Option<PartnerWalletTx>,
}

/// The result of a committed state-machine step, including every side effect it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub order: Order,
    pub previous_status: OrderStatusType,
    pub event: OrderStatusEvent,
    /// Set when a Delivered transition created a commission.
    pub commission: Option<Commission>,
    /// Set when a Returned/Cancelled transition annulled commissions.
    pub reversals: Vec<CommissionReversal>,
}

/// Lifetime metrics used by the tier-upgrade evaluation.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LifetimeStats {
    pub delivered_orders: i64,
    pub net_revenue: Money,
}

/// What a settlement sweep did. Counters are cumulative even when individual commissions fail, so
/// callers always see partial progress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Commissions that were due (Pending with an elapsed hold) and visited.
    pub processed_total: usize,
    /// Commissions released into partner wallets.
    pub released: usize,
    /// Commissions left pending because risk gating held them.
    pub held_for_review: usize,
    /// Partners promoted to a higher tier after the scan.
    pub tier_upgrades: usize,
    /// Commissions skipped because of storage errors. Logged, never silently dropped.
    pub failures: usize,
}
