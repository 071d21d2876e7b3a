#![allow(dead_code)]
//! Shared scaffolding for the integration tests: a throwaway database per test, plus seed helpers
//! for the rows that are owned by out-of-scope collaborators (partners, rules, stock).

use chrono::{Duration, Utc};
use csl_common::Money;
use settlement_engine::{
    db_types::{NewLineItem, NewOrder, OrderId, OrderStatusType, PartnerLevel, RuleScope},
    events::EventProducers,
    risk::RiskConfig,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    SettlementApi,
    SqliteDatabase,
    TierConfig,
    WalletApi,
};

pub const HOLD_WINDOW_DAYS: i64 = 14;

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub fn order_flow(db: &SqliteDatabase) -> OrderFlowApi<SqliteDatabase> {
    OrderFlowApi::new(db.clone(), EventProducers::default(), Duration::days(HOLD_WINDOW_DAYS))
}

pub fn settlement(db: &SqliteDatabase) -> SettlementApi<SqliteDatabase> {
    SettlementApi::new(db.clone(), EventProducers::default(), RiskConfig::default(), TierConfig::default())
}

pub fn settlement_with_tiers(db: &SqliteDatabase, tiers: TierConfig) -> SettlementApi<SqliteDatabase> {
    SettlementApi::new(db.clone(), EventProducers::default(), RiskConfig::default(), tiers)
}

pub fn wallet(db: &SqliteDatabase) -> WalletApi<SqliteDatabase> {
    WalletApi::new(db.clone())
}

pub async fn seed_partner(db: &SqliteDatabase, id: &str, customer_id: &str, level: PartnerLevel) {
    sqlx::query("INSERT INTO partners (id, customer_id, level) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(customer_id)
        .bind(level.to_string())
        .execute(db.pool())
        .await
        .expect("Error seeding partner");
}

pub async fn seed_rule(
    db: &SqliteDatabase,
    scope: RuleScope,
    scope_id: Option<&str>,
    partner_level: Option<PartnerLevel>,
    percent: Option<f64>,
    fixed_amount: Option<Money>,
) {
    sqlx::query(
        "INSERT INTO commission_rules (scope, scope_id, partner_level, percent, fixed_amount, active) VALUES ($1, \
         $2, $3, $4, $5, TRUE)",
    )
    .bind(scope.to_string())
    .bind(scope_id)
    .bind(partner_level.map(|l| l.to_string()))
    .bind(percent)
    .bind(fixed_amount)
    .execute(db.pool())
    .await
    .expect("Error seeding commission rule");
}

pub async fn seed_global_percent_rule(db: &SqliteDatabase, percent: f64) {
    seed_rule(db, RuleScope::Global, None, None, Some(percent), None).await;
}

pub async fn seed_stock(db: &SqliteDatabase, variant_id: &str, on_hand: i64, reserved: i64) {
    sqlx::query("INSERT INTO stock_levels (variant_id, on_hand, reserved) VALUES ($1, $2, $3)")
        .bind(variant_id)
        .bind(on_hand)
        .bind(reserved)
        .execute(db.pool())
        .await
        .expect("Error seeding stock level");
}

/// A referred order matching the reference scenario: subtotal 2,000,000, no discount, one line
/// item of a stocked variant.
pub fn referred_order(code: &str, partner_id: &str) -> NewOrder {
    plain_order(code).with_referral(partner_id)
}

/// The same order shape without a referral partner.
pub fn plain_order(code: &str) -> NewOrder {
    NewOrder::new(OrderId::from(code.to_string()), format!("cust-of-{code}"), Money::from(2_000_000))
        .with_item(NewLineItem::new("var-1", "prod-1", 2, Money::from(1_000_000)))
}

/// Walks an order from Created through Processing and Shipping to Delivered.
pub async fn deliver_order(api: &OrderFlowApi<SqliteDatabase>, order_code: &OrderId) {
    for target in [OrderStatusType::Processing, OrderStatusType::Shipping, OrderStatusType::Delivered] {
        api.transition(order_code, target, None, None).await.expect("Error walking order to Delivered");
    }
}

/// Rewinds a commission's hold deadline so a sweep sees it as due.
pub async fn elapse_hold(db: &SqliteDatabase, commission_id: i64) {
    sqlx::query("UPDATE commissions SET hold_until = $1 WHERE id = $2")
        .bind(Utc::now() - Duration::hours(1))
        .bind(commission_id)
        .execute(db.pool())
        .await
        .expect("Error rewinding hold deadline");
}

/// Seeds `count` extra orders for the partner that all share one device fingerprint, which pumps
/// the partner's same-device counter (and so its risk score) without touching any commission.
pub async fn seed_same_device_orders(db: &SqliteDatabase, partner_id: &str, count: usize) {
    for n in 0..count {
        sqlx::query(
            "INSERT INTO orders (order_code, customer_id, partner_id, subtotal, device_fingerprint, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(format!("risky-{partner_id}-{n}"))
        .bind(format!("cust-{n}"))
        .bind(partner_id)
        .bind(100_000i64)
        .bind("shared-device")
        .bind(Utc::now())
        .execute(db.pool())
        .await
        .expect("Error seeding risky order");
    }
}
