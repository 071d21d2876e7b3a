//! The settlement sweeper: hold-window release, risk gating, idempotency, payouts and tier
//! upgrades, with the ledger chain verified after every money movement.
mod support;

use chrono::Utc;
use csl_common::Money;
use settlement_engine::{
    db_types::{CommissionStatus, OrderStatusType, PartnerLevel, WalletTxType},
    wallet_objects::Pagination,
    LedgerManagement,
    SettlementDatabase,
    SettlementError,
    TierConfig,
};
use support::*;

/// Walks the reference order to Delivered and rewinds its hold so a sweep sees it as due.
async fn delivered_commission_due(
    db: &settlement_engine::SqliteDatabase,
    code: &str,
    partner_id: &str,
) -> (settlement_engine::db_types::Order, settlement_engine::db_types::Commission) {
    let api = order_flow(db);
    let (order, _) = api.process_new_order(referred_order(code, partner_id)).await.unwrap();
    deliver_order(&api, &order.order_code).await;
    let commission = db.fetch_commission_for_order(order.id).await.unwrap().unwrap();
    elapse_hold(db, commission.id).await;
    (order, commission)
}

#[tokio::test]
async fn sweep_releases_an_elapsed_commission_into_the_wallet() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, commission) = delivered_commission_due(&db, "2000", "p-1").await;

    let summary = settlement(&db).run_sweep().await.unwrap();
    assert_eq!(summary.processed_total, 1);
    assert_eq!(summary.released, 1);
    assert_eq!(summary.held_for_review, 0);
    assert_eq!(summary.failures, 0);

    let commission = db.fetch_commission(commission.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Available);

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Pagination::default()).await.unwrap();
    assert_eq!(ledger.transactions.len(), 1);
    let tx = &ledger.transactions[0];
    assert_eq!(tx.tx_type, WalletTxType::Earn);
    assert_eq!(tx.amount, Money::from(200_000));
    assert_eq!(tx.balance_after, Money::from(200_000));
    assert_eq!(tx.ref_id, commission.id);
    assert_eq!(ledger.available, Money::from(200_000));
    assert_eq!(ledger.pending, Money::from(0));
    assert_eq!(ledger.balance, Money::from(200_000));
    wallets.verify_ledger(&commission.partner_id).await.unwrap();
}

#[tokio::test]
async fn sweep_ignores_commissions_still_inside_the_hold_window() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let api = order_flow(&db);
    let (order, _) = api.process_new_order(referred_order("2001", "p-1")).await.unwrap();
    deliver_order(&api, &order.order_code).await;

    let summary = settlement(&db).run_sweep().await.unwrap();
    assert_eq!(summary.processed_total, 0);
    assert_eq!(summary.released, 0);

    let commission = db.fetch_commission_for_order(order.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);
}

#[tokio::test]
async fn running_the_sweep_twice_releases_each_commission_once() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, commission) = delivered_commission_due(&db, "2002", "p-1").await;

    let sweeper = settlement(&db);
    let first = sweeper.run_sweep().await.unwrap();
    assert_eq!(first.released, 1);
    let second = sweeper.run_sweep().await.unwrap();
    assert_eq!(second.processed_total, 0, "an already-released commission is no longer due");
    assert_eq!(second.released, 0);

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Pagination::default()).await.unwrap();
    assert_eq!(ledger.transactions.len(), 1, "the wallet must be credited exactly once");
    wallets.verify_ledger(&commission.partner_id).await.unwrap();
}

#[tokio::test]
async fn double_release_is_guarded_at_the_storage_layer() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, commission) = delivered_commission_due(&db, "2003", "p-1").await;

    let first = db.release_commission(&commission).await.unwrap();
    assert!(first.is_some());
    // A concurrent sweep holding the same stale row loses the conditional update and backs off.
    let second = db.release_commission(&commission).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn risky_partner_commission_stays_pending_across_sweeps() {
    let db = new_test_db().await;
    seed_partner(&db, "p-risk", "partner-cust-risk", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    // Eleven orders on one device fingerprint: score 55, above the hold threshold of 40.
    seed_same_device_orders(&db, "p-risk", 11).await;
    let (_, commission) = delivered_commission_due(&db, "2004", "p-risk").await;

    let sweeper = settlement(&db);
    for _ in 0..3 {
        let summary = sweeper.run_sweep().await.unwrap();
        assert_eq!(summary.processed_total, 1);
        assert_eq!(summary.released, 0);
        assert_eq!(summary.held_for_review, 1);
    }

    let commission = db.fetch_commission(commission.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Pending);
    assert!(commission.review_flagged_at.is_some(), "held commissions are flagged for manual review");

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Pagination::default()).await.unwrap();
    assert!(ledger.transactions.is_empty(), "risk-held funds never reach the wallet");
}

#[tokio::test]
async fn clean_partner_is_released_despite_moderate_signals() {
    let db = new_test_db().await;
    seed_partner(&db, "p-mild", "partner-cust-mild", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    // Two shared-device orders: score 10, well below the gate.
    seed_same_device_orders(&db, "p-mild", 2).await;
    let (_, commission) = delivered_commission_due(&db, "2005", "p-mild").await;

    let summary = settlement(&db).run_sweep().await.unwrap();
    assert_eq!(summary.released, 1);
    let commission = db.fetch_commission(commission.id).await.unwrap().unwrap();
    assert_eq!(commission.status, CommissionStatus::Available);
}

#[tokio::test]
async fn reversal_after_release_debits_the_wallet() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (order, commission) = delivered_commission_due(&db, "2006", "p-1").await;
    settlement(&db).run_sweep().await.unwrap();

    let api = order_flow(&db);
    let outcome = api.transition(&order.order_code, OrderStatusType::Returned, None, None).await.unwrap();
    assert_eq!(outcome.reversals.len(), 1);
    let reversal = &outcome.reversals[0];
    assert_eq!(reversal.commission.status, CommissionStatus::Reversed);
    let wallet_tx = reversal.wallet_tx.as_ref().expect("released funds must be clawed back");
    assert_eq!(wallet_tx.tx_type, WalletTxType::Reverse);
    assert_eq!(wallet_tx.amount, Money::from(-200_000));
    assert_eq!(wallet_tx.balance_after, Money::from(0));

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Pagination::default()).await.unwrap();
    assert_eq!(ledger.transactions.len(), 2);
    assert_eq!(ledger.available, Money::from(0));
    wallets.verify_ledger(&commission.partner_id).await.unwrap();
}

#[tokio::test]
async fn payout_moves_the_commission_to_paid_and_debits_the_wallet() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (order, commission) = delivered_commission_due(&db, "2007", "p-1").await;
    let sweeper = settlement(&db);
    sweeper.run_sweep().await.unwrap();

    let (paid, wallet_tx) = sweeper.record_payout(commission.id).await.unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);
    assert_eq!(wallet_tx.tx_type, WalletTxType::Payout);
    assert_eq!(wallet_tx.amount, Money::from(-200_000));
    assert_eq!(wallet_tx.balance_after, Money::from(0));

    // A payout cannot be recorded twice.
    let err = sweeper.record_payout(commission.id).await.unwrap_err();
    assert!(matches!(err, SettlementError::CommissionStateConflict { .. }));

    // Returning the order afterwards does not claw back the completed payout.
    let api = order_flow(&db);
    let outcome = api.transition(&order.order_code, OrderStatusType::Returned, None, None).await.unwrap();
    assert!(outcome.reversals.is_empty(), "paid commissions are settled by a manual process, not the engine");

    let wallets = wallet(&db);
    let ledger = wallets.ledger(&commission.partner_id, Pagination::default()).await.unwrap();
    assert_eq!(ledger.transactions.len(), 2);
    wallets.verify_ledger(&commission.partner_id).await.unwrap();
}

#[tokio::test]
async fn sweep_promotes_a_partner_that_crosses_the_tier_thresholds() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, commission) = delivered_commission_due(&db, "2008", "p-1").await;

    let tiers = TierConfig {
        agent_min_orders: 1,
        agent_min_revenue: Money::from(1_000_000),
        leader_min_orders: 100,
        leader_min_revenue: Money::from(50_000_000),
    };
    let summary = settlement_with_tiers(&db, tiers).run_sweep().await.unwrap();
    assert_eq!(summary.released, 1);
    assert_eq!(summary.tier_upgrades, 1);

    let partner = db.fetch_partner(&commission.partner_id).await.unwrap().unwrap();
    assert_eq!(partner.level, PartnerLevel::Agent);
}

#[tokio::test]
async fn untouched_partner_keeps_its_level() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, commission) = delivered_commission_due(&db, "2009", "p-1").await;

    let summary = settlement(&db).run_sweep().await.unwrap();
    assert_eq!(summary.released, 1);
    assert_eq!(summary.tier_upgrades, 0, "default thresholds are far above one delivered order");
    let partner = db.fetch_partner(&commission.partner_id).await.unwrap().unwrap();
    assert_eq!(partner.level, PartnerLevel::Affiliate);
}

#[tokio::test]
async fn wallet_balance_always_equals_the_running_sum() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let (_, first) = delivered_commission_due(&db, "2010", "p-1").await;
    let (_, second) = delivered_commission_due(&db, "2011", "p-1").await;

    let sweeper = settlement(&db);
    sweeper.run_sweep().await.unwrap();
    sweeper.record_payout(first.id).await.unwrap();

    let wallets = wallet(&db);
    let partner_id = &first.partner_id;
    let ledger = wallets.ledger(partner_id, Pagination::default()).await.unwrap();
    let sum: Money = ledger.transactions.iter().map(|t| t.amount).sum();
    assert_eq!(sum, Money::from(200_000));
    // Newest first: the head row's balance_after is the balance.
    assert_eq!(ledger.transactions.first().unwrap().balance_after, sum);
    assert_eq!(ledger.available, sum);
    wallets.verify_ledger(partner_id).await.unwrap();
    let _ = second;
}

#[tokio::test]
async fn tampered_materialized_balance_halts_the_sweep() {
    let db = new_test_db().await;
    seed_partner(&db, "p-1", "partner-cust-1", PartnerLevel::Affiliate).await;
    seed_global_percent_rule(&db, 10.0).await;
    let _ = delivered_commission_due(&db, "2012", "p-1").await;

    // Corrupt the materialized balance behind the ledger's back.
    sqlx::query("UPDATE partners SET wallet_balance = wallet_balance + 999 WHERE id = 'p-1'")
        .execute(db.pool())
        .await
        .unwrap();

    let err = settlement(&db).run_sweep().await.unwrap_err();
    assert!(matches!(err, SettlementError::SweepHalted { .. }));

    // Nothing was written: the commission is still pending and the ledger is still empty.
    let due = db.fetch_due_commissions(Utc::now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].status, CommissionStatus::Pending);
    let wallets = wallet(&db);
    let err = wallets.verify_ledger(&due[0].partner_id).await.unwrap_err();
    assert!(matches!(err, settlement_engine::LedgerApiError::LedgerIntegrity { .. }));
}
