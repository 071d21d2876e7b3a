use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    CommissionPendingEvent,
    CommissionReleasedEvent,
    CommissionReversedEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderTransitionEvent,
    PartnerPromotedEvent,
};

/// The publishing half of the hook system. Cheap to clone; held by the engine APIs.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_transition_producer: Vec<EventProducer<OrderTransitionEvent>>,
    pub commission_pending_producer: Vec<EventProducer<CommissionPendingEvent>>,
    pub commission_reversed_producer: Vec<EventProducer<CommissionReversedEvent>>,
    pub commission_released_producer: Vec<EventProducer<CommissionReleasedEvent>>,
    pub partner_promoted_producer: Vec<EventProducer<PartnerPromotedEvent>>,
}

pub struct EventHandlers {
    pub on_order_transition: Option<EventHandler<OrderTransitionEvent>>,
    pub on_commission_pending: Option<EventHandler<CommissionPendingEvent>>,
    pub on_commission_reversed: Option<EventHandler<CommissionReversedEvent>>,
    pub on_commission_released: Option<EventHandler<CommissionReleasedEvent>>,
    pub on_partner_promoted: Option<EventHandler<PartnerPromotedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_transition = hooks.on_order_transition.map(|f| EventHandler::new(buffer_size, f));
        let on_commission_pending = hooks.on_commission_pending.map(|f| EventHandler::new(buffer_size, f));
        let on_commission_reversed = hooks.on_commission_reversed.map(|f| EventHandler::new(buffer_size, f));
        let on_commission_released = hooks.on_commission_released.map(|f| EventHandler::new(buffer_size, f));
        let on_partner_promoted = hooks.on_partner_promoted.map(|f| EventHandler::new(buffer_size, f));
        Self {
            on_order_transition,
            on_commission_pending,
            on_commission_reversed,
            on_commission_released,
            on_partner_promoted,
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_transition {
            result.order_transition_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_commission_pending {
            result.commission_pending_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_commission_reversed {
            result.commission_reversed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_commission_released {
            result.commission_released_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_partner_promoted {
            result.partner_promoted_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_transition {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_commission_pending {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_commission_reversed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_commission_released {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_partner_promoted {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

/// Async callbacks, one per event type. Register with the builder-style setters, then hand the
/// hooks to [`EventHandlers::new`].
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_transition: Option<Handler<OrderTransitionEvent>>,
    pub on_commission_pending: Option<Handler<CommissionPendingEvent>>,
    pub on_commission_reversed: Option<Handler<CommissionReversedEvent>>,
    pub on_commission_released: Option<Handler<CommissionReleasedEvent>>,
    pub on_partner_promoted: Option<Handler<PartnerPromotedEvent>>,
}

impl EventHooks {
    pub fn on_order_transition<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderTransitionEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_transition = Some(Arc::new(f));
        self
    }

    pub fn on_commission_pending<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionPendingEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_commission_pending = Some(Arc::new(f));
        self
    }

    pub fn on_commission_reversed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionReversedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_commission_reversed = Some(Arc::new(f));
        self
    }

    pub fn on_commission_released<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(CommissionReleasedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_commission_released = Some(Arc::new(f));
        self
    }

    pub fn on_partner_promoted<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PartnerPromotedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_partner_promoted = Some(Arc::new(f));
        self
    }
}
