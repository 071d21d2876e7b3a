//! The public-facing API of the settlement engine.
//!
//! Each API is a thin, generic wrapper around a [`crate::traits::SettlementDatabase`] backend:
//! * [`order_flow_api::OrderFlowApi`] — the order state machine, the sole entry point for
//!   money-affecting order events.
//! * [`settlement_api::SettlementApi`] — the settlement sweep and the payout hand-off.
//! * [`wallet_api::WalletApi`] — partner wallet ledger views.
//! * [`risk_api::RiskApi`] — on-demand fraud signals.
pub mod order_flow_api;
pub mod order_objects;
pub mod risk_api;
pub mod settlement_api;
pub mod wallet_api;
pub mod wallet_objects;
