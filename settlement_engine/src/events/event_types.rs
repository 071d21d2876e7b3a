use chrono::{DateTime, Utc};
use csl_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    Commission,
    Order,
    OrderId,
    OrderStatusType,
    Partner,
    PartnerId,
    PartnerLevel,
    PartnerWalletTx,
};

/// Published on every committed state-machine step. The immutable status-event row is the durable
/// audit trail; this is the live feed for observability tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTransitionEvent {
    pub order: Order,
    pub from_status: OrderStatusType,
    pub note: Option<String>,
}

impl OrderTransitionEvent {
    pub fn new(order: Order, from_status: OrderStatusType, note: Option<String>) -> Self {
        Self { order, from_status, note }
    }
}

/// `COMMISSION_PENDING`: a delivered order produced a held commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionPendingEvent {
    pub order_code: OrderId,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub hold_until: DateTime<Utc>,
}

/// `COMMISSION_REVERSED`: a returned or cancelled order annulled its commission. `reason` is the
/// terminal status that triggered the reversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReversedEvent {
    pub order_code: OrderId,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub reason: OrderStatusType,
}

/// `COMMISSION_RELEASED`: the settlement sweep moved held funds into the partner wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionReleasedEvent {
    pub commission: Commission,
    pub wallet_tx: PartnerWalletTx,
}

/// `PARTNER_PROMOTED`: the sweep's tier evaluation moved a partner up the ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerPromotedEvent {
    pub partner: Partner,
    pub previous_level: PartnerLevel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderTransition(OrderTransitionEvent),
    CommissionPending(CommissionPendingEvent),
    CommissionReversed(CommissionReversedEvent),
    CommissionReleased(CommissionReleasedEvent),
    PartnerPromoted(PartnerPromotedEvent),
}
