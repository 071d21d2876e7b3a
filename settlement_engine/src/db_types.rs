use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use csl_common::Money;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------        OrderId        -------------------------------------------------------
/// The human-readable order code assigned at checkout (as opposed to the internal row id).
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------       PartnerId       -------------------------------------------------------
/// A lightweight wrapper around the external partner identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct PartnerId(pub String);

impl Display for PartnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S: Into<String>> From<S> for PartnerId {
    fn from(value: S) -> Self {
        Self(value.into())
    }
}

impl PartnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid enum value: {0}")]
pub struct ConversionError(String);

//--------------------------------------   OrderStatusType     -------------------------------------------------------
/// The fulfillment lifecycle states. `Created` is the sole initial state; `Returned` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been created by checkout and no money has moved yet.
    Created,
    /// Payment for the order has been captured.
    Paid,
    /// The order is being picked and packed.
    Processing,
    /// The order has been handed to the carrier.
    Shipping,
    /// The order reached the buyer. This is the commission-triggering state.
    Delivered,
    /// The order was returned after delivery. Terminal.
    Returned,
    /// The order was cancelled before delivery. Terminal.
    Cancelled,
}

impl OrderStatusType {
    /// The set of statuses reachable from this one. No self-loops, so a retried transition to the
    /// current status is always rejected.
    pub fn next_states(&self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            Created => &[Paid, Processing, Cancelled],
            Paid => &[Processing, Cancelled],
            Processing => &[Shipping, Cancelled],
            Shipping => &[Delivered, Returned],
            Delivered => &[Returned],
            Returned | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatusType) -> bool {
        self.next_states().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states().is_empty()
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "Created"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Processing => write!(f, "Processing"),
            OrderStatusType::Shipping => write!(f, "Shipping"),
            OrderStatusType::Delivered => write!(f, "Delivered"),
            OrderStatusType::Returned => write!(f, "Returned"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Paid" => Ok(Self::Paid),
            "Processing" => Ok(Self::Processing),
            "Shipping" => Ok(Self::Shipping),
            "Delivered" => Ok(Self::Delivered),
            "Returned" => Ok(Self::Returned),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Created");
            OrderStatusType::Created
        })
    }
}

//--------------------------------------        Order          -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: OrderId,
    pub customer_id: String,
    /// The partner that sourced the order, if any. Orders without a referral never earn commission.
    pub partner_id: Option<PartnerId>,
    pub status: OrderStatusType,
    pub subtotal: Money,
    pub discount_total: Money,
    pub tracking_number: Option<String>,
    pub device_fingerprint: Option<String>,
    pub ship_address: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The commissionable base: subtotal less discounts.
    pub fn net_total(&self) -> Money {
        self.subtotal - self.discount_total
    }
}

//--------------------------------------       NewOrder        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_code: OrderId,
    pub customer_id: String,
    pub partner_id: Option<PartnerId>,
    pub subtotal: Money,
    pub discount_total: Money,
    pub items: Vec<NewLineItem>,
    pub device_fingerprint: Option<String>,
    pub ship_address: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(order_code: OrderId, customer_id: String, subtotal: Money) -> Self {
        Self {
            order_code,
            customer_id,
            partner_id: None,
            subtotal,
            discount_total: Money::default(),
            items: Vec::new(),
            device_fingerprint: None,
            ship_address: None,
            ip_address: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_referral<P: Into<PartnerId>>(mut self, partner_id: P) -> Self {
        self.partner_id = Some(partner_id.into());
        self
    }

    pub fn with_discount(mut self, discount: Money) -> Self {
        self.discount_total = discount;
        self
    }

    pub fn with_item(mut self, item: NewLineItem) -> Self {
        self.items.push(item);
        self
    }
}

//--------------------------------------       LineItem        -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub id: i64,
    pub order_id: i64,
    pub variant_id: String,
    pub product_id: String,
    pub category_id: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

#[derive(Debug, Clone)]
pub struct NewLineItem {
    pub variant_id: String,
    pub product_id: String,
    pub category_id: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
}

impl NewLineItem {
    pub fn new<S: Into<String>>(variant_id: S, product_id: S, quantity: i64, unit_price: Money) -> Self {
        Self {
            variant_id: variant_id.into(),
            product_id: product_id.into(),
            category_id: None,
            quantity,
            unit_price,
        }
    }

    pub fn in_category<S: Into<String>>(mut self, category_id: S) -> Self {
        self.category_id = Some(category_id.into());
        self
    }
}

//--------------------------------------   OrderStatusEvent    -------------------------------------------------------
/// Immutable audit-trail record of a single transition. Never mutated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderStatusEvent {
    pub id: i64,
    pub order_id: i64,
    pub from_status: OrderStatusType,
    pub to_status: OrderStatusType,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------   CommissionStatus    -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum CommissionStatus {
    /// Created at delivery; funds held until the return window closes.
    Pending,
    /// Released into the partner wallet by the settlement sweep.
    Available,
    /// Transferred out by the payout collaborator.
    Paid,
    /// Annulled because the order was returned or cancelled.
    Reversed,
}

impl Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommissionStatus::Pending => write!(f, "Pending"),
            CommissionStatus::Available => write!(f, "Available"),
            CommissionStatus::Paid => write!(f, "Paid"),
            CommissionStatus::Reversed => write!(f, "Reversed"),
        }
    }
}

impl FromStr for CommissionStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Available" => Ok(Self::Available),
            "Paid" => Ok(Self::Paid),
            "Reversed" => Ok(Self::Reversed),
            s => Err(ConversionError(format!("Invalid commission status: {s}"))),
        }
    }
}

//--------------------------------------      Commission       -------------------------------------------------------
/// A holdable, reversible monetary claim tied to one order and one partner.
///
/// `amount` is immutable once created; only `status` (and `review_flagged_at`) change.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Commission {
    pub id: i64,
    pub order_id: i64,
    pub partner_id: PartnerId,
    pub amount: Money,
    pub status: CommissionStatus,
    /// The end of the return window. Only meaningful while `Pending`.
    pub hold_until: DateTime<Utc>,
    /// Stamped once by the sweeper when risk gating blocks release.
    pub review_flagged_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     WalletTxType      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum WalletTxType {
    /// A released commission. Positive amount.
    Earn,
    /// A transfer out of the wallet. Negative amount.
    Payout,
    /// A clawback of previously released funds. Negative amount.
    Reverse,
}

impl Display for WalletTxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletTxType::Earn => write!(f, "Earn"),
            WalletTxType::Payout => write!(f, "Payout"),
            WalletTxType::Reverse => write!(f, "Reverse"),
        }
    }
}

impl FromStr for WalletTxType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Earn" => Ok(Self::Earn),
            "Payout" => Ok(Self::Payout),
            "Reverse" => Ok(Self::Reverse),
            s => Err(ConversionError(format!("Invalid wallet tx type: {s}"))),
        }
    }
}

//--------------------------------------   PartnerWalletTx     -------------------------------------------------------
/// One row of the append-only partner wallet ledger.
///
/// For a given partner, rows are totally ordered by `id` and satisfy
/// `balance_after[n] = balance_after[n - 1] + amount[n]` with a zero baseline. Rows are never
/// mutated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PartnerWalletTx {
    pub id: i64,
    pub partner_id: PartnerId,
    pub tx_type: WalletTxType,
    pub amount: Money,
    /// The commission or payout row this entry settles.
    pub ref_id: i64,
    pub balance_after: Money,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------     PartnerLevel      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Type, Serialize, Deserialize)]
pub enum PartnerLevel {
    Affiliate,
    Agent,
    Leader,
}

impl PartnerLevel {
    /// The next rung on the ladder, if any. Downgrades are not modeled.
    pub fn next(&self) -> Option<PartnerLevel> {
        match self {
            PartnerLevel::Affiliate => Some(PartnerLevel::Agent),
            PartnerLevel::Agent => Some(PartnerLevel::Leader),
            PartnerLevel::Leader => None,
        }
    }
}

impl Display for PartnerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PartnerLevel::Affiliate => write!(f, "Affiliate"),
            PartnerLevel::Agent => write!(f, "Agent"),
            PartnerLevel::Leader => write!(f, "Leader"),
        }
    }
}

impl FromStr for PartnerLevel {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Affiliate" => Ok(Self::Affiliate),
            "Agent" => Ok(Self::Agent),
            "Leader" => Ok(Self::Leader),
            s => Err(ConversionError(format!("Invalid partner level: {s}"))),
        }
    }
}

//--------------------------------------       Partner         -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Partner {
    pub id: PartnerId,
    /// The partner's own buying identity. Orders placed under it count as self-purchases.
    pub customer_id: String,
    pub level: PartnerLevel,
    /// Materialized ledger balance, updated transactionally with every append. The ledger itself
    /// remains the source of truth.
    pub wallet_balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      RuleScope        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RuleScope {
    Global,
    Category,
    Product,
}

impl RuleScope {
    /// Precedence rank: Product outranks Category outranks Global.
    pub fn rank(&self) -> u8 {
        match self {
            RuleScope::Product => 2,
            RuleScope::Category => 1,
            RuleScope::Global => 0,
        }
    }
}

impl Display for RuleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleScope::Global => write!(f, "Global"),
            RuleScope::Category => write!(f, "Category"),
            RuleScope::Product => write!(f, "Product"),
        }
    }
}

impl FromStr for RuleScope {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Global" => Ok(Self::Global),
            "Category" => Ok(Self::Category),
            "Product" => Ok(Self::Product),
            s => Err(ConversionError(format!("Invalid rule scope: {s}"))),
        }
    }
}

//--------------------------------------    CommissionRule     -------------------------------------------------------
/// A commission rule as maintained by the rule administration collaborator. Read-only here.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CommissionRule {
    pub id: i64,
    pub scope: RuleScope,
    /// Category or product identifier. Required unless the scope is `Global`.
    pub scope_id: Option<String>,
    /// When set, the rule only applies to partners at this level.
    pub partner_level: Option<PartnerLevel>,
    pub percent: Option<f64>,
    pub fixed_amount: Option<Money>,
    pub active: bool,
}

impl CommissionRule {
    /// The commission amount this rule yields on the given net total. A fixed amount wins over a
    /// percentage; percentages round half-up.
    pub fn amount_for(&self, net_total: Money) -> Money {
        match (self.fixed_amount, self.percent) {
            (Some(fixed), _) => fixed,
            (None, Some(pct)) => net_total.percent(pct),
            (None, None) => Money::default(),
        }
    }
}

//--------------------------------------     StockLevel        -------------------------------------------------------
/// Minimal inventory hook. The engine only releases reservations and decrements on-hand counts.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct StockLevel {
    pub variant_id: String,
    pub on_hand: i64,
    pub reserved: i64,
}
