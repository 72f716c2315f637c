use std::{fmt::Debug, sync::Arc};

use chrono::Duration;
use log::*;
use serde_json::{Map, Value};

use crate::{
    db_types::{Order, OrderId, OrderStatusType, Subscription, SubscriptionId, SubscriptionPlan},
    gateway::{RETURN_CODE, RETURN_CODE_SUCCESS},
    helpers::days_remaining,
    lpe_api::{
        billing_objects::{GatewayStatus, PaymentResult, SubscriptionOverview, SubscriptionSummary},
        errors::BillingApiError,
    },
    traits::{BillingDatabase, Clock},
};

/// Subscriptions ending within this many days are flagged as expiring.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

/// `SubscriptionApi` covers everything a customer does with their orders and subscriptions after checkout.
pub struct SubscriptionApi<B> {
    db: B,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for SubscriptionApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SubscriptionApi")
    }
}

impl<B> SubscriptionApi<B> {
    pub fn new(db: B, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> SubscriptionApi<B>
where B: BillingDatabase
{
    async fn owned_subscription(
        &self,
        user_id: &str,
        subscription_id: &SubscriptionId,
    ) -> Result<Subscription, BillingApiError> {
        let subscription = self
            .db
            .fetch_subscription(subscription_id)
            .await?
            .ok_or_else(|| BillingApiError::NotFound(format!("Subscription {subscription_id}")))?;
        if subscription.user_id != user_id {
            warn!("🔄️ User {user_id} asked for subscription {subscription_id}, which is not theirs");
            return Err(BillingApiError::Forbidden(format!("Subscription {subscription_id}")));
        }
        Ok(subscription)
    }

    async fn owned_order(&self, user_id: &str, order_id: &OrderId) -> Result<Order, BillingApiError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| BillingApiError::NotFound(format!("Order {order_id}")))?;
        if order.user_id != user_id {
            warn!("🔄️ User {user_id} asked for order [{order_id}], which is not theirs");
            return Err(BillingApiError::Forbidden(format!("Order {order_id}")));
        }
        Ok(order)
    }

    /// Cancels an active subscription. Auto-renewal is switched off, but access continues until the current end date.
    pub async fn cancel_subscription(
        &self,
        user_id: &str,
        subscription_id: &SubscriptionId,
    ) -> Result<Subscription, BillingApiError> {
        let subscription = self.owned_subscription(user_id, subscription_id).await?;
        if !subscription.is_active() {
            return Err(BillingApiError::InvalidState(format!(
                "Subscription {subscription_id} is {} and cannot be cancelled",
                subscription.status
            )));
        }
        let subscription = self.db.cancel_subscription(subscription_id, self.clock.now()).await?;
        info!("🔄️ User {user_id} cancelled subscription {subscription_id}. Access ends {}", subscription.end_date);
        Ok(subscription)
    }

    /// Opts an active subscription in to (or out of) renewal.
    pub async fn set_auto_renew(
        &self,
        user_id: &str,
        subscription_id: &SubscriptionId,
        enabled: bool,
    ) -> Result<Subscription, BillingApiError> {
        let subscription = self.owned_subscription(user_id, subscription_id).await?;
        if !subscription.is_active() {
            return Err(BillingApiError::InvalidState(format!(
                "Auto-renew can only be changed on an active subscription. {subscription_id} is {}",
                subscription.status
            )));
        }
        let subscription = self.db.set_auto_renew(subscription_id, enabled, self.clock.now()).await?;
        info!("🔄️ Auto-renew for subscription {subscription_id} is now {}", if enabled { "on" } else { "off" });
        Ok(subscription)
    }

    /// The user's active, unexpired subscriptions, latest ending first.
    pub async fn subscription_status(&self, user_id: &str) -> Result<SubscriptionOverview, BillingApiError> {
        let now = self.clock.now();
        let warn_before = now + Duration::days(EXPIRY_WARNING_DAYS);
        let subscriptions = self.db.fetch_subscriptions_for_user(user_id).await?;
        let mut summaries = Vec::new();
        for s in subscriptions.into_iter().filter(|s| s.is_active() && s.end_date >= now) {
            let plan_name = match self.db.fetch_plan(&s.plan_id).await? {
                Some(plan) => plan.name,
                None => {
                    debug!("🔄️ Plan {} for subscription {} is not in the catalog", s.plan_id, s.subscription_id);
                    s.plan_id.clone()
                },
            };
            summaries.push(SubscriptionSummary {
                plan_name,
                is_expiring: s.end_date <= warn_before,
                days_remaining: days_remaining(s.end_date, now),
                id: s.subscription_id,
                plan_id: s.plan_id,
                lens_view_id: s.lens_view_id,
                start_date: s.start_date,
                end_date: s.end_date,
                auto_renew: s.auto_renew,
            });
        }
        trace!("🔄️ User {user_id} has {} active subscriptions", summaries.len());
        Ok(SubscriptionOverview::new(summaries))
    }

    /// Every subscription the user has ever held, latest ending first.
    pub async fn subscriptions_for_user(&self, user_id: &str) -> Result<Vec<Subscription>, BillingApiError> {
        let subscriptions = self.db.fetch_subscriptions_for_user(user_id).await?;
        Ok(subscriptions)
    }

    /// The orders (the original purchase and every renewal) linked to one of the user's subscriptions.
    pub async fn orders_for_subscription(
        &self,
        user_id: &str,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<Order>, BillingApiError> {
        self.owned_subscription(user_id, subscription_id).await?;
        let orders = self.db.fetch_orders_for_subscription(subscription_id).await?;
        Ok(orders)
    }

    pub async fn order_for_user(&self, user_id: &str, order_id: &OrderId) -> Result<Order, BillingApiError> {
        self.owned_order(user_id, order_id).await
    }

    /// The outcome of a checkout, for the page the customer returns to.
    pub async fn payment_result(&self, user_id: &str, order_id: &OrderId) -> Result<PaymentResult, BillingApiError> {
        let order = self.owned_order(user_id, order_id).await?;
        let subscription = match &order.subscription_id {
            Some(id) if order.status == OrderStatusType::Paid => self.db.fetch_subscription(id).await?,
            _ => None,
        };
        Ok(PaymentResult::new(&order, subscription.as_ref()))
    }

    /// The stored gateway view of a trade: the payment details, with `RtnCode` set to success iff the order is paid.
    pub async fn gateway_status(&self, order_id: &OrderId) -> Result<GatewayStatus, BillingApiError> {
        let order = self
            .db
            .fetch_order(order_id)
            .await?
            .ok_or_else(|| BillingApiError::NotFound(format!("Order {order_id}")))?;
        let details = serde_json::from_str::<Value>(&order.payment_details).unwrap_or_else(|e| {
            warn!("🔄️ Payment details for order [{order_id}] are not valid JSON. {e}");
            Value::Null
        });
        let mut payment_result = match details {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let code = if order.status == OrderStatusType::Paid { RETURN_CODE_SUCCESS } else { "0" };
        payment_result.insert(RETURN_CODE.to_string(), Value::from(code));
        payment_result.insert("MerchantTradeNo".to_string(), Value::from(order_id.as_str()));
        Ok(GatewayStatus { order_id: order.order_id, status: order.status, payment_result })
    }

    /// The plans on sale for a lens, cheapest first.
    pub async fn active_plans(&self, lens_view_id: &str) -> Result<Vec<SubscriptionPlan>, BillingApiError> {
        let lens_view_id = lens_view_id.trim();
        if lens_view_id.is_empty() {
            return Err(BillingApiError::Validation("lensViewId parameter is required".into()));
        }
        let plans = self.db.active_plans_for_lens(lens_view_id).await?;
        Ok(plans)
    }
}
