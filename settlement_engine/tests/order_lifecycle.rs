//! End-to-end exercises of the order state machine and its commission side effects.
mod support;

use chrono::{Duration, Utc};
use csl_common::Money;
use settlement_engine::{
    db_types::{CommissionStatus, NewLineItem, NewOrder, OrderId, OrderStatusType, PartnerLevel, RuleScope},
    sqlite::db::stock,
    LedgerManagement,
    SettlementError,
};
use support::*;

#[tokio::test]
async fn commission_created_on_delivery() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let (order, inserted) = api.process_new_order(referred_order("1000", "p-1")).await.unwrap();
    assert!(inserted);
    assert_eq!(order.status, OrderStatusType::Created);

    deliver_order(&api, &order.order_code).await;

    let commission = db.fetch_commission_for_order(order.id).await.unwrap().expect("commission should exist");
    assert_eq!(commission.amount, Money::from(200_000));
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert_eq!(commission.partner_id.as_str(), "p-1");
    // hold_until is creation + 14 days
    let now = Utc::now();
    assert!(commission.hold_until > now + Duration::days(13));
    assert!(commission.hold_until <= now + Duration::days(14) + Duration::minutes(5));
}

#[tokio::test]
async fn discount_reduces_the_commission_base() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let order = NewOrder::new(OrderId::from("1001".to_string()), "cust-1".to_string(), Money::from(2_000_000))
        .with_referral("p-1")
        .with_discount(Money::from(500_000));
    let (order, _) = api.process_new_order(order).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    let commission = db.fetch_commission_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(commission.amount, Money::from(150_000));
}

#[tokio::test]
async fn order_insert_is_idempotent_on_code() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (first, inserted) = api.process_new_order(plain_order("1002")).await.unwrap();
    assert!(inserted);
    let (second, inserted) = api.process_new_order(plain_order("1002")).await.unwrap();
    assert!(!inserted);
    assert_eq!(first.id, second.id);
}

#[tokio::test]
async fn no_referral_means_no_commission() {
    let db = new_test_db().await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let order = NewOrder::new(OrderId::from("1003".to_string()), "cust-1".to_string(), Money::from(2_000_000));
    let (order, _) = api.process_new_order(order).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    assert!(db.fetch_commission_for_order(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn no_matching_rule_is_a_valid_outcome() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    // The only rule is scoped to a product this order does not contain.
    seed_rule(&db, RuleScope::Product, Some("prod-other"), None, Some(10.0), None).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("1004", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    assert!(db.fetch_commission_for_order(order.id).await.unwrap().is_none());
}

#[tokio::test]
async fn product_rule_outranks_global_rule() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    seed_rule(&db, RuleScope::Product, Some("prod-1"), None, None, Some(Money::from(42_000))).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("1005", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    let commission = db.fetch_commission_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(commission.amount, Money::from(42_000));
}

#[tokio::test]
async fn repeated_delivery_is_rejected_and_cannot_duplicate_the_commission() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("1006", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;

    let err = api.transition(&order.order_code, OrderStatusType::Delivered, None, None).await.unwrap_err();
    match err {
        SettlementError::InvalidTransition { from, to } => {
            assert_eq!(from, OrderStatusType::Delivered);
            assert_eq!(to, OrderStatusType::Delivered);
        },
        other => panic!("Expected InvalidTransition, got {other}"),
    }
    let commission = db.fetch_commission_for_order(order.id).await.unwrap();
    assert!(commission.is_some());
}

#[tokio::test]
async fn delivered_order_only_allows_returns() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(plain_order("1007")).await.unwrap();
    deliver_order(&api, &order.order_code).await;

    let err = api.transition(&order.order_code, OrderStatusType::Processing, None, None).await.unwrap_err();
    match err {
        SettlementError::InvalidTransition { from, to } => {
            assert_eq!(from, OrderStatusType::Delivered);
            assert_eq!(to, OrderStatusType::Processing);
        },
        other => panic!("Expected InvalidTransition, got {other}"),
    }
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let err = api
        .transition(&OrderId::from("no-such-order".to_string()), OrderStatusType::Processing, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, SettlementError::OrderNotFound(_)));
}

#[tokio::test]
async fn return_before_sweep_reverses_without_ledger_entry() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("1008", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;

    let outcome = api.transition(&order.order_code, OrderStatusType::Returned, None, None).await.unwrap();
    assert_eq!(outcome.reversals.len(), 1);
    assert!(outcome.reversals[0].wallet_tx.is_none(), "a pending commission must not touch the ledger");

    let commission = db.fetch_commission_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Reversed);

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Default::default()).await.unwrap();
    assert!(ledger.transactions.is_empty());
    assert_eq!(ledger.available, Money::from(0));
    assert_eq!(ledger.pending, Money::from(0));
    wallets.verify_ledger(&commission.partner_id).await.unwrap();
}

#[tokio::test]
async fn status_events_form_the_audit_trail() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(plain_order("1009")).await.unwrap();
    api.transition(&order.order_code, OrderStatusType::Paid, Some("payment captured".to_string()), None)
        .await
        .unwrap();
    api.transition(&order.order_code, OrderStatusType::Processing, None, None).await.unwrap();
    api.transition(&order.order_code, OrderStatusType::Shipping, None, Some("TRK-123".to_string())).await.unwrap();

    let events = db.fetch_status_events(order.id).await.unwrap();
    let walk: Vec<(OrderStatusType, OrderStatusType)> = events.iter().map(|e| (e.from_status, e.to_status)).collect();
    assert_eq!(walk, vec![
        (OrderStatusType::Created, OrderStatusType::Paid),
        (OrderStatusType::Paid, OrderStatusType::Processing),
        (OrderStatusType::Processing, OrderStatusType::Shipping),
    ]);
    assert_eq!(events[0].note.as_deref(), Some("payment captured"));

    let order = db.fetch_order_by_code(&order.order_code).await.unwrap().unwrap();
    assert_eq!(order.tracking_number.as_deref(), Some("TRK-123"));
}

#[tokio::test]
async fn delivery_consumes_the_stock_reservation() {
    let db = new_test_db().await;
    seed_stock(&db, "var-1", 10, 5).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(plain_order("1010")).await.unwrap();
    deliver_order(&api, &order.order_code).await;

    let mut conn = db.pool().acquire().await.unwrap();
    let level = stock::fetch_stock_level("var-1", &mut conn).await.unwrap().unwrap();
    assert_eq!(level.on_hand, 8);
    assert_eq!(level.reserved, 3);
}

#[tokio::test]
async fn cancellation_releases_the_reservation_but_keeps_stock() {
    let db = new_test_db().await;
    seed_stock(&db, "var-1", 10, 5).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(plain_order("1011")).await.unwrap();
    api.transition(&order.order_code, OrderStatusType::Cancelled, Some("customer request".to_string()), None)
        .await
        .unwrap();

    let mut conn = db.pool().acquire().await.unwrap();
    let level = stock::fetch_stock_level("var-1", &mut conn).await.unwrap().unwrap();
    assert_eq!(level.on_hand, 10);
    assert_eq!(level.reserved, 3);
}

#[tokio::test]
async fn delivery_survives_a_missing_stock_row() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    // No stock seeded for var-1: the decrement is skipped with a warning, the commission still lands.
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("1012", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    assert!(db.fetch_commission_for_order(order.id).await.unwrap().is_some());
}

#[tokio::test]
async fn level_specific_rule_applies_to_matching_partner() {
    let db = new_test_db().await;
    seed_partner(&db, "p-agent", "partner-cust-1", PartnerLevel::Agent).await;
    seed_partner(&db, "p-affiliate", "partner-cust-2", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    seed_rule(&db, RuleScope::Global, None, Some(PartnerLevel::Agent), Some(12.0), None).await;
    let api = order_flow(&db);

    let (agent_order, _) = api.process_new_order(referred_order("1013", "p-agent")).await.unwrap();
    deliver_order(&api, &agent_order.order_code).await;
    let commission = db.fetch_commission_for_order(agent_order.id).await.unwrap().unwrap();
    assert_eq!(commission.amount, Money::from(240_000));

    let (affiliate_order, _) = api.process_new_order(referred_order("1014", "p-affiliate")).await.unwrap();
    deliver_order(&api, &affiliate_order.order_code).await;
    let commission = db.fetch_commission_for_order(affiliate_order.id).await.unwrap().unwrap();
    assert_eq!(commission.amount, Money::from(200_000));
}

#[tokio::test]
async fn line_item_helper_builds_multi_item_orders() {
    let db = new_test_db().await;
    let api = order_flow(&db);
    let order = NewOrder::new(OrderId::from("1015".to_string()), "cust-9".to_string(), Money::from(3_000_000))
        .with_item(NewLineItem::new("var-1", "prod-1", 1, Money::from(1_000_000)).in_category("cat-1"))
        .with_item(NewLineItem::new("var-2", "prod-2", 2, Money::from(1_000_000)));
    let (order, _) = api.process_new_order(order).await.unwrap();
    let items = db.fetch_line_items(order.id).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].category_id.as_deref(), Some("cat-1"));
    assert!(items[1].category_id.is_none());
}
