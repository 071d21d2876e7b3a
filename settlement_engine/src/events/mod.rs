//! Audit event hooks for the settlement engine.
//!
//! The engine treats the audit/event collaborator as fire-and-forget: money movement never waits
//! on a subscriber. Components register async handlers via [`EventHooks`]; the engine publishes
//! through [`EventProducers`] after the enclosing transaction has committed, so subscribers only
//! ever observe durable state.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::{
    CommissionPendingEvent,
    CommissionReleasedEvent,
    CommissionReversedEvent,
    EventType,
    OrderTransitionEvent,
    PartnerPromotedEvent,
};
pub use hooks::{EventHandlers, EventHooks, EventProducers};
