use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use log::*;
use lpg_common::{Twd, SETTLEMENT_CURRENCY};
use serde::Serialize;
use serde_json::Value;

use crate::{
    db_types::{NewOrder, Order, PaymentDetails, Subscription, SubscriptionId, SubscriptionPlan},
    exchange_rates::RateCache,
    gateway::{language_for_locale, PaymentForm, PaymentGatewayClient, PaymentRequest},
    helpers::add_days,
    lpe_api::{
        billing_objects::{CheckoutRequest, CheckoutResult, DEFAULT_CALLBACK_PATH},
        errors::BillingApiError,
    },
    traits::{BillingDatabase, Clock, RateProvider},
};

/// Currency the rate cache can convert from.
const FOREIGN_CURRENCY: &str = "USD";
const RENEWAL_TRADE_DESC: &str = "Subscription renewal";
/// How long the customer has to pay a renewal. Offline payment codes from the gateway are valid for up to 7 days.
pub const RENEWAL_PAYMENT_WINDOW_DAYS: i64 = 7;

/// A pending renewal order for a subscription, with the form that pays for it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalResult {
    pub subscription: Subscription,
    #[serde(flatten)]
    pub checkout: CheckoutResult,
}

/// `CheckoutApi` turns plan purchases and renewals into pending orders and signed gateway forms.
///
/// No entitlement is granted here. Subscriptions only come into being (or get extended) when the gateway reports the
/// payment, see [`crate::WebhookApi`].
pub struct CheckoutApi<B, R> {
    db: B,
    gateway: PaymentGatewayClient,
    rates: RateCache<R>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl<B, R> Debug for CheckoutApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi ({})", self.base_url)
    }
}

impl<B, R> CheckoutApi<B, R> {
    pub fn new(
        db: B,
        gateway: PaymentGatewayClient,
        rates: RateCache<R>,
        clock: Arc<dyn Clock>,
        base_url: &str,
    ) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        Self { db, gateway, rates, clock, base_url }
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn notify_url(&self) -> String {
        format!("{}/api/ecpay/notify", self.base_url)
    }
}

impl<B, R> CheckoutApi<B, R>
where
    B: BillingDatabase,
    R: RateProvider,
{
    /// Creates a pending order for the plan and returns the signed form that pays for it.
    ///
    /// The plan's name, duration and lens, the settlement currency and rate, and the trade number are all captured in
    /// the order's payment details, so that settling the order later does not depend on the catalog.
    pub async fn create_order(&self, request: CheckoutRequest) -> Result<CheckoutResult, BillingApiError> {
        let user_id = request.user_id.trim();
        if user_id.is_empty() {
            return Err(BillingApiError::Validation("A user id is required".into()));
        }
        let plan_id = request.plan_id.trim();
        if plan_id.is_empty() {
            return Err(BillingApiError::Validation("Missing subscription plan id".into()));
        }
        let callback_path = validate_callback_path(request.callback_path.as_deref())?;
        let plan = match self.db.fetch_plan(plan_id).await? {
            Some(plan) if plan.active => plan,
            Some(_) => {
                debug!("🔄️ Plan {plan_id} is no longer on sale");
                return Err(BillingApiError::PlanNotFound(plan_id.to_string()));
            },
            None => return Err(BillingApiError::PlanNotFound(plan_id.to_string())),
        };
        let (amount, rate) = self.settlement_amount(&plan).await?;
        let now = self.clock.now();
        let trade_no = self.gateway.generate_trade_number(now);
        let details = PaymentDetails {
            plan_id: Some(plan.plan_id.clone()),
            plan_name: Some(plan.name.clone()),
            plan_duration: Some(plan.duration_days),
            lens_view_id: plan.lens_view_id.clone(),
            merchant_trade_no: Some(trade_no.clone()),
            currency: Some(plan.currency.clone()),
            exchange_rate: Some(rate),
            ..Default::default()
        };
        let order = NewOrder::new(user_id.to_string(), amount, plan.price, &plan.currency)
            .with_details(details)
            .created_at(now);
        let result_url = format!("{}/{callback_path}?order_id={}", self.base_url, order.order_id);
        let request = PaymentRequest::new(
            amount,
            &format!("{} - {}", plan.name, plan.duration_days),
            &format!("{} - {}", plan.name, plan.plan_type),
            &self.notify_url(),
        )
        .with_trade_number(&trade_no, &self.gateway.generate_trade_date(now))
        .with_redirects(&result_url, &result_url)
        .with_custom_field(1, order.order_id.as_str())
        .with_language(language_for_locale(request.locale.as_deref().unwrap_or_default().trim()));
        // A form that cannot be signed leaves no order behind
        let form = self.gateway.build_payment_form(&request, now)?;
        let checkout = self.save_order(order, form).await?;
        info!(
            "🔄️ Order [{}] created for user {user_id}: plan {plan_id}, {amount} (trade {trade_no})",
            checkout.order.order_id
        );
        Ok(checkout)
    }

    /// Creates a pending renewal order for an active, auto-renewing subscription.
    ///
    /// The renewal period starts where the current one ends, so consecutive renewals leave no gap. The subscription
    /// itself is untouched until the renewal is paid. At most one renewal may be pending at a time. A pending renewal
    /// older than [`RENEWAL_PAYMENT_WINDOW_DAYS`] can no longer be paid, so it is marked `Failed` and replaced.
    ///
    /// If `requested_by` is given, the subscription must belong to that user.
    pub async fn renew_subscription(
        &self,
        requested_by: Option<&str>,
        subscription_id: &SubscriptionId,
    ) -> Result<RenewalResult, BillingApiError> {
        let subscription = self
            .db
            .fetch_subscription(subscription_id)
            .await?
            .ok_or_else(|| BillingApiError::NotFound(format!("Subscription {subscription_id}")))?;
        if let Some(user_id) = requested_by {
            if subscription.user_id != user_id {
                warn!("🔄️ User {user_id} tried to renew subscription {subscription_id}, which is not theirs");
                return Err(BillingApiError::Forbidden(format!("Subscription {subscription_id}")));
            }
        }
        if !subscription.is_renewable() {
            let reason = if subscription.is_active() {
                format!("Auto-renew is not enabled for subscription {subscription_id}")
            } else {
                format!("Subscription {subscription_id} is not active")
            };
            return Err(BillingApiError::InvalidState(reason));
        }
        let plan = self
            .db
            .fetch_plan(&subscription.plan_id)
            .await?
            .ok_or_else(|| BillingApiError::PlanNotFound(subscription.plan_id.clone()))?;
        let now = self.clock.now();
        if let Some(pending) = self.db.fetch_pending_renewal(subscription_id).await? {
            self.release_stale_renewal(subscription_id, pending, now).await?;
        }
        let renewal_start = subscription.end_date;
        let renewal_end = add_days(renewal_start, plan.duration_days).ok_or_else(|| {
            BillingApiError::InvalidState(format!("Plan {} has an unusable duration", plan.plan_id))
        })?;
        let (amount, rate) = self.settlement_amount(&plan).await?;
        let trade_no = self.gateway.generate_trade_number(now);
        let details = PaymentDetails {
            plan_id: Some(plan.plan_id.clone()),
            plan_name: Some(plan.name.clone()),
            plan_duration: Some(plan.duration_days),
            lens_view_id: subscription.lens_view_id.clone().or_else(|| plan.lens_view_id.clone()),
            merchant_trade_no: Some(trade_no.clone()),
            currency: Some(plan.currency.clone()),
            exchange_rate: Some(rate),
            renewal_start: Some(renewal_start),
            renewal_end: Some(renewal_end),
            ..Default::default()
        };
        let order = NewOrder::new(subscription.user_id.clone(), amount, plan.price, &plan.currency)
            .with_details(details)
            .for_subscription(subscription_id.clone())
            .created_at(now);
        let request = PaymentRequest::new(
            amount,
            RENEWAL_TRADE_DESC,
            &format!("{} - renewal", plan.name),
            &self.notify_url(),
        )
        .with_trade_number(&trade_no, &self.gateway.generate_trade_date(now))
        .with_redirects(
            &format!("{}/subscriptions", self.base_url),
            &format!("{}/subscriptions/{subscription_id}", self.base_url),
        )
        .with_custom_field(1, order.order_id.as_str());
        let form = self.gateway.build_payment_form(&request, now)?;
        let checkout = self.save_order(order, form).await?;
        info!(
            "🔄️ Renewal order [{}] for subscription {subscription_id} created: {renewal_start} to {renewal_end}",
            checkout.order.order_id
        );
        Ok(RenewalResult { subscription, checkout })
    }

    async fn release_stale_renewal(
        &self,
        subscription_id: &SubscriptionId,
        pending: Order,
        now: DateTime<Utc>,
    ) -> Result<(), BillingApiError> {
        let order_id = &pending.order_id;
        if now < pending.created_at + Duration::days(RENEWAL_PAYMENT_WINDOW_DAYS) {
            debug!("🔄️ Renewal order [{order_id}] for subscription {subscription_id} is still pending");
            return Err(BillingApiError::InvalidState(format!(
                "A renewal payment for subscription {subscription_id} is already pending"
            )));
        }
        let mut details = pending.details().unwrap_or_default();
        details.extra.insert("supersededAt".into(), Value::String(now.to_rfc3339()));
        if !self.db.settle_failed_order(order_id, &details, now).await? {
            return Err(BillingApiError::InvalidState(format!(
                "The pending renewal for subscription {subscription_id} was settled in the meantime"
            )));
        }
        info!("🔄️ Renewal order [{order_id}] was never paid. It has been marked as failed");
        Ok(())
    }

    async fn save_order(&self, order: NewOrder, form: PaymentForm) -> Result<CheckoutResult, BillingApiError> {
        let order = self.db.insert_order(order).await.map_err(|e| {
            warn!("🔄️ Could not save the new order. {e}");
            BillingApiError::from(e)
        })?;
        Ok(CheckoutResult { order, form })
    }

    /// The amount to charge for the plan in the settlement currency, and the exchange rate applied.
    pub async fn settlement_amount(&self, plan: &SubscriptionPlan) -> Result<(Twd, f64), BillingApiError> {
        match plan.currency.trim().to_ascii_uppercase().as_str() {
            SETTLEMENT_CURRENCY => Ok((Twd::from_price(plan.price), 1.0)),
            FOREIGN_CURRENCY => {
                let conversion = self.rates.convert_with_rate(plan.price).await;
                trace!("🔄️ {} {FOREIGN_CURRENCY} is {} at {}", plan.price, conversion.amount, conversion.rate);
                Ok((conversion.amount, conversion.rate))
            },
            other => Err(BillingApiError::Validation(format!(
                "Plan {} is priced in {other}, which cannot be settled",
                plan.plan_id
            ))),
        }
    }
}

/// Normalises the page the customer is sent back to. It must be a relative path on our own site.
fn validate_callback_path(path: Option<&str>) -> Result<String, BillingApiError> {
    let path = path.map(|p| p.trim().trim_start_matches('/')).unwrap_or_default();
    if path.is_empty() {
        return Ok(DEFAULT_CALLBACK_PATH.to_string());
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/');
    if !path.chars().all(allowed) || path.contains("..") {
        return Err(BillingApiError::Validation(format!("{path} is not a valid callback path")));
    }
    Ok(path.to_string())
}
