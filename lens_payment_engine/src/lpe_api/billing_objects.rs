use chrono::{DateTime, Utc};
use lpg_common::Twd;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    db_types::{Order, OrderId, OrderStatusType, Subscription, SubscriptionId, SubscriptionStatusType},
    gateway::PaymentForm,
};

/// The callback page used when the caller does not name one.
pub const DEFAULT_CALLBACK_PATH: &str = "payment/result";

//--------------------------------------      Checkout       ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    /// The site page, relative to the base url, that the customer lands on after paying.
    #[serde(default)]
    pub callback_path: Option<String>,
}

impl CheckoutRequest {
    pub fn new(user_id: &str, plan_id: &str) -> Self {
        Self { user_id: user_id.to_string(), plan_id: plan_id.to_string(), ..Default::default() }
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = Some(locale.to_string());
        self
    }

    pub fn with_callback_path(mut self, path: &str) -> Self {
        self.callback_path = Some(path.to_string());
        self
    }
}

/// A freshly created pending order and the signed form that pays for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResult {
    pub order: Order,
    #[serde(flatten)]
    pub form: PaymentForm,
}

impl CheckoutResult {
    pub fn order_id(&self) -> &OrderId {
        &self.order.order_id
    }
}

//--------------------------------------   Subscription status  ------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSummary {
    pub id: SubscriptionId,
    pub plan_id: String,
    pub plan_name: String,
    pub lens_view_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub is_expiring: bool,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionOverview {
    pub has_active_subscription: bool,
    pub active_subscriptions: Vec<SubscriptionSummary>,
    pub expiring_subscriptions_count: usize,
    pub total_active_subscriptions: usize,
}

impl SubscriptionOverview {
    pub fn new(active_subscriptions: Vec<SubscriptionSummary>) -> Self {
        let expiring_subscriptions_count = active_subscriptions.iter().filter(|s| s.is_expiring).count();
        Self {
            has_active_subscription: !active_subscriptions.is_empty(),
            total_active_subscriptions: active_subscriptions.len(),
            expiring_subscriptions_count,
            active_subscriptions,
        }
    }
}

//--------------------------------------    Payment result    ---------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: OrderId,
    pub status: OrderStatusType,
    pub total_amount: Twd,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            id: order.order_id.clone(),
            status: order.status,
            total_amount: order.total_amount,
            created_at: order.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedSubscription {
    pub id: SubscriptionId,
    pub status: SubscriptionStatusType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

impl From<&Subscription> for LinkedSubscription {
    fn from(s: &Subscription) -> Self {
        Self { id: s.subscription_id.clone(), status: s.status, start_date: s.start_date, end_date: s.end_date }
    }
}

/// What the customer's browser is shown on returning from the gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub order: OrderSummary,
    pub subscription: Option<LinkedSubscription>,
    pub is_paid: bool,
    pub has_subscription: bool,
}

impl PaymentResult {
    pub fn new(order: &Order, subscription: Option<&Subscription>) -> Self {
        Self {
            order: order.into(),
            subscription: subscription.map(LinkedSubscription::from),
            is_paid: order.status == OrderStatusType::Paid,
            has_subscription: subscription.is_some(),
        }
    }
}

/// The stored view of a trade, shaped like the gateway's own trade query response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub order_id: OrderId,
    pub status: OrderStatusType,
    pub payment_result: Map<String, Value>,
}
