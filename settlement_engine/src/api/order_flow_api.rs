use std::fmt::Debug;

use chrono::Duration;
use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType},
    events::{CommissionPendingEvent, CommissionReversedEvent, EventProducers, OrderTransitionEvent},
    traits::{SettlementDatabase, SettlementError, TransitionOutcome, TransitionRequest},
};

/// Bounded retry for serialization conflicts; validation errors are never retried.
const MAX_TRANSITION_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 25;

/// `OrderFlowApi` drives orders through the fulfillment lifecycle. It is the sole writer of order
/// status, and every status change runs its commission and stock side effects in the same
/// database transaction.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
    hold_window: Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    /// `hold_window` is the return window applied to commissions created by Delivered
    /// transitions.
    pub fn new(db: B, producers: EventProducers, hold_window: Duration) -> Self {
        Self { db, producers, hold_window }
    }
}

impl<B> OrderFlowApi<B>
where B: SettlementDatabase
{
    /// Submit a new order from the checkout collaborator.
    ///
    /// The call is idempotent on the order code: resubmitting an existing order returns the stored
    /// record and `false` in the second parameter.
    pub async fn process_new_order(&self, order: NewOrder) -> Result<(Order, bool), SettlementError> {
        let (order, inserted) = self.db.insert_order(order).await?;
        debug!("🔄️📦️ Order [{}] processing complete (inserted: {inserted})", order.order_code);
        Ok((order, inserted))
    }

    /// Changes the status of an order.
    ///
    /// The edge must exist in the transition graph for the order's current status; otherwise
    /// [`SettlementError::InvalidTransition`] is returned carrying both statuses so the caller can
    /// correct the request. Since the graph has no self-loops, retrying an already-applied
    /// transition is rejected here, which is what makes commission creation safe under retried
    /// requests.
    ///
    /// Side effects, all inside the same transaction as the status update:
    /// * every transition appends an immutable status event;
    /// * `Delivered` runs the commission-creation sequence and consumes stock reservations;
    /// * `Returned` and `Cancelled` run the commission-reversal sequence; `Cancelled` also
    ///   releases stock reservations.
    ///
    /// Serialization conflicts (two transitions racing on one order) are retried a bounded number
    /// of times with backoff before surfacing as [`SettlementError::ConcurrencyConflict`].
    ///
    /// Audit hooks fire after the transaction has committed.
    pub async fn transition(
        &self,
        order_code: &OrderId,
        target: OrderStatusType,
        note: Option<String>,
        tracking_number: Option<String>,
    ) -> Result<TransitionOutcome, SettlementError> {
        let mut request = TransitionRequest::new(order_code.clone(), target, self.hold_window);
        if let Some(note) = note {
            request = request.with_note(note);
        }
        if let Some(tracking_number) = tracking_number {
            request = request.with_tracking_number(tracking_number);
        }
        let mut attempt = 0;
        let outcome = loop {
            match self.db.apply_transition(request.clone()).await {
                Ok(outcome) => break outcome,
                Err(e) if e.is_retryable() && attempt + 1 < MAX_TRANSITION_ATTEMPTS => {
                    attempt += 1;
                    warn!("🔄️📦️ {e}. Retrying transition (attempt {attempt})");
                    tokio::time::sleep(std::time::Duration::from_millis(RETRY_BACKOFF_MS << attempt)).await;
                },
                Err(e) => return Err(e),
            }
        };
        self.call_transition_hooks(&outcome).await;
        debug!("🔄️📦️ Order [{}] is now {}", outcome.order.order_code, outcome.order.status);
        Ok(outcome)
    }

    async fn call_transition_hooks(&self, outcome: &TransitionOutcome) {
        for emitter in &self.producers.order_transition_producer {
            let event = OrderTransitionEvent::new(
                outcome.order.clone(),
                outcome.previous_status,
                outcome.event.note.clone(),
            );
            emitter.publish_event(event).await;
        }
        if let Some(commission) = &outcome.commission {
            for emitter in &self.producers.commission_pending_producer {
                let event = CommissionPendingEvent {
                    order_code: outcome.order.order_code.clone(),
                    partner_id: commission.partner_id.clone(),
                    amount: commission.amount,
                    hold_until: commission.hold_until,
                };
                emitter.publish_event(event).await;
            }
        }
        for reversal in &outcome.reversals {
            for emitter in &self.producers.commission_reversed_producer {
                let event = CommissionReversedEvent {
                    order_code: outcome.order.order_code.clone(),
                    partner_id: reversal.commission.partner_id.clone(),
                    amount: reversal.commission.amount,
                    reason: outcome.order.status,
                };
                emitter.publish_event(event).await;
            }
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}
