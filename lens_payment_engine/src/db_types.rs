use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
pub use lpg_common::Twd;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// The order has been created and the customer has been sent to the gateway. No notification has arrived yet.
    Pending,
    /// The gateway confirmed the payment. Terminal.
    Paid,
    /// The gateway reported a failed payment. Terminal.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            OrderStatusType::Pending
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//-------------------------------------- SubscriptionStatusType ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatusType {
    Active,
    /// Cancelled by the user. Access continues until `end_date`, but the subscription can never become active again.
    Cancelled,
}

impl Display for SubscriptionStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatusType::Active => write!(f, "Active"),
            SubscriptionStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for SubscriptionStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Self::Active),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid subscription status: {s}"))),
        }
    }
}

//--------------------------------------        OrderId        ---------------------------------------------------------
/// The local order identifier. It doubles as the gateway correlation value carried in `CustomField1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

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

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    SubscriptionId     ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubscriptionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SubscriptionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------    PaymentDetails     ---------------------------------------------------------
/// The structured blob stored alongside every order.
///
/// Orders are extended over their life (the gateway response is merged in when the notification arrives), and older
/// rows may lack fields that newer code writes. Every field is therefore optional, and unknown keys are carried along
/// untouched in `extra` so that a read-modify-write cycle never drops data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_view_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_trade_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub renewal_end: Option<DateTime<Utc>>,
    #[serde(rename = "ecpayResponse", skip_serializing_if = "Option::is_none")]
    pub gateway_response: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PaymentDetails {
    /// Parses a stored blob. An empty string is treated as an empty object.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(s)
    }

    pub fn to_json(&self) -> String {
        // A struct of strings, numbers and maps always serializes
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn with_gateway_response(mut self, response: BTreeMap<String, String>) -> Self {
        self.gateway_response = Some(response);
        self
    }
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub order_id: OrderId,
    pub user_id: String,
    /// A pending order with a subscription id is a renewal. Purchases are linked once they are paid.
    pub subscription_id: Option<SubscriptionId>,
    pub total_amount: Twd,
    pub original_amount: f64,
    pub currency: String,
    pub status: OrderStatusType,
    pub payment_details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn details(&self) -> Result<PaymentDetails, serde_json::Error> {
        PaymentDetails::from_json(&self.payment_details)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: String,
    /// Set for renewal orders only. New purchases are linked to their subscription when it is created.
    pub subscription_id: Option<SubscriptionId>,
    /// The amount charged, in the settlement currency
    pub total_amount: Twd,
    /// The plan price in the plan's own currency
    pub original_amount: f64,
    /// The plan's currency
    pub currency: String,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(user_id: String, total_amount: Twd, original_amount: f64, currency: &str) -> Self {
        Self {
            order_id: OrderId::random(),
            user_id,
            subscription_id: None,
            total_amount,
            original_amount,
            currency: currency.to_string(),
            payment_details: PaymentDetails::default(),
            created_at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: PaymentDetails) -> Self {
        self.payment_details = details;
        self
    }

    pub fn for_subscription(mut self, subscription_id: SubscriptionId) -> Self {
        self.subscription_id = Some(subscription_id);
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

//--------------------------------------     Subscription      ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(skip)]
    pub id: i64,
    #[serde(rename = "id")]
    pub subscription_id: SubscriptionId,
    pub user_id: String,
    pub plan_id: String,
    pub lens_view_id: Option<String>,
    pub status: SubscriptionStatusType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    /// The paid order that brought this subscription into existence
    pub origin_order_id: OrderId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatusType::Active
    }

    pub fn is_renewable(&self) -> bool {
        self.is_active() && self.auto_renew
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscription_id: SubscriptionId,
    pub user_id: String,
    pub plan_id: String,
    pub lens_view_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub origin_order_id: OrderId,
}

//--------------------------------------   SubscriptionPlan    ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionPlan {
    #[serde(rename = "id")]
    pub plan_id: String,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub duration_days: i64,
    #[serde(rename = "type")]
    pub plan_type: String,
    pub lens_view_id: Option<String>,
    pub active: bool,
}
