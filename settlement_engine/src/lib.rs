//! Settlement Engine
//!
//! The settlement engine drives orders through their fulfillment lifecycle, computes partner
//! commissions from that lifecycle, holds and releases funds according to a return window and a
//! fraud-risk score, and maintains an append-only, balance-verifiable wallet ledger per partner.
//! This library contains the core logic. It is storefront-agnostic.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend (Postgres
//!    is a feature placeholder). You should never need to access the database directly. Instead,
//!    use the public API provided by the engine. The exception is the data types used in the
//!    database, defined in [`mod@db_types`], which are public.
//! 2. The engine public API ([`mod@api`]): the order state machine, the settlement sweeper, the
//!    partner wallet views and the risk scorer. Backends implement the contracts in
//!    [`mod@traits`] to serve these APIs.
//! 3. The pure policy modules [`mod@rules`] (commission rule precedence) and [`mod@risk`] (fraud
//!    scoring). Both are deterministic functions over data the backend supplies, so the
//!    money-gating behaviour is unit-testable without a database.
//!
//! The engine also provides a set of audit events that can be subscribed to ([`mod@events`]).
//! These fire after the corresponding transaction commits, e.g. `CommissionPending` when a
//! delivered order creates a held commission. A simple hook framework is used so that you can
//! react to these events without blocking money movement.
pub mod api;
pub mod db_types;
pub mod events;
pub mod risk;
pub mod rules;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use api::{
    order_flow_api::OrderFlowApi,
    order_objects,
    risk_api::RiskApi,
    settlement_api::{SettlementApi, TierConfig},
    wallet_api::WalletApi,
    wallet_objects,
};
pub use traits::{LedgerApiError, LedgerManagement, SettlementDatabase, SettlementError};
