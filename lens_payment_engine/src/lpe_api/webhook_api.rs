use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{NewSubscription, Order, OrderId, PaymentDetails, Subscription, SubscriptionId},
    gateway::{GatewayFields, PaymentGatewayClient, CORRELATION_FIELD, RETURN_CODE, RETURN_CODE_SUCCESS},
    helpers::add_days,
    lpe_api::errors::WebhookRejection,
    traits::{BillingDatabase, BillingError, Clock, Entitlement, SettlementResult},
};

/// The acknowledgement the gateway expects for every notification it need not resend.
pub const WEBHOOK_ACK: &str = "1|OK";

/// What a verified notification did.
#[derive(Debug, Clone)]
pub enum WebhookOutcome {
    /// A first purchase was paid and this subscription was created.
    Activated(Subscription),
    /// A renewal was paid and this subscription was extended.
    Renewed(Subscription),
    /// The gateway reported an unsuccessful payment. The order is now failed.
    PaymentFailed(OrderId),
    /// The order had already been settled. Nothing was changed.
    AlreadyProcessed(OrderId),
}

impl WebhookOutcome {
    pub fn response_text(&self) -> &'static str {
        WEBHOOK_ACK
    }
}

/// `WebhookApi` reconciles payment notifications from the gateway against stored orders.
///
/// Notifications may arrive any number of times, and concurrently. Only a notification carrying a valid checksum can
/// change state, and each order is settled at most once.
pub struct WebhookApi<B> {
    db: B,
    gateway: PaymentGatewayClient,
    clock: Arc<dyn Clock>,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B> WebhookApi<B> {
    pub fn new(db: B, gateway: PaymentGatewayClient, clock: Arc<dyn Clock>) -> Self {
        Self { db, gateway, clock }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> WebhookApi<B>
where B: BillingDatabase
{
    /// Handles a payment notification.
    ///
    /// `Ok` results are acknowledged with [`WEBHOOK_ACK`]. That includes failed payments and repeat deliveries, which
    /// the gateway need not send again. An `Err` asks the gateway to retry later; no state has been changed.
    pub async fn handle_webhook(&self, fields: GatewayFields) -> Result<WebhookOutcome, WebhookRejection> {
        if !self.gateway.verify_callback(&fields) {
            warn!(
                "🔔️ Rejecting a payment notification with an invalid checksum. Trade: {}",
                fields.get("MerchantTradeNo").unwrap_or("<none>")
            );
            return Err(WebhookRejection::InvalidSignature);
        }
        let order_id = match fields.get(CORRELATION_FIELD).map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => OrderId::from(id),
            None => {
                warn!("🔔️ Payment notification has no order id in {CORRELATION_FIELD}");
                return Err(WebhookRejection::MissingOrderId);
            },
        };
        let order = self
            .db
            .fetch_order(&order_id)
            .await
            .map_err(|e| persistence_failure(&order_id, e))?
            .ok_or_else(|| {
                warn!("🔔️ Payment notification for unknown order [{order_id}]");
                WebhookRejection::OrderNotFound
            })?;
        if order.status.is_terminal() {
            info!("🔔️ Order [{order_id}] is already {}. Acknowledging repeat notification", order.status);
            return Ok(WebhookOutcome::AlreadyProcessed(order_id));
        }
        let details = order.details().map_err(|e| {
            error!("🔔️ Order [{order_id}] has unreadable payment details. {e}");
            WebhookRejection::InvalidPaymentDetails
        })?;
        let paid = fields.get(RETURN_CODE) == Some(RETURN_CODE_SUCCESS);
        let now = self.clock.now();
        if paid {
            self.settle_paid(order, details, fields, now).await
        } else {
            self.settle_failed(order, details, fields, now).await
        }
    }

    async fn settle_paid(
        &self,
        order: Order,
        details: PaymentDetails,
        fields: GatewayFields,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookRejection> {
        let order_id = order.order_id.clone();
        let plan_id = match details.plan_id.as_deref().filter(|p| !p.is_empty()) {
            Some(p) => p.to_string(),
            None => {
                error!("🔔️ Order [{order_id}] was paid, but its payment details have no plan id");
                return Err(WebhookRejection::MissingPlanId);
            },
        };
        let (duration, catalog_lens) = match details.plan_duration.filter(|d| *d > 0) {
            Some(days) => (days, None),
            None => {
                debug!("🔔️ Order [{order_id}] has no plan duration. Looking up plan {plan_id}");
                let plan = self
                    .db
                    .fetch_plan(&plan_id)
                    .await
                    .map_err(|e| persistence_failure(&order_id, e.into()))?
                    .ok_or_else(|| {
                        warn!("🔔️ Plan {plan_id} for paid order [{order_id}] does not exist");
                        WebhookRejection::PlanNotFound
                    })?;
                (plan.duration_days, plan.lens_view_id)
            },
        };
        let is_renewal = order.subscription_id.is_some();
        let entitlement = match order.subscription_id.clone() {
            Some(subscription_id) => self.renewal_entitlement(&order_id, subscription_id, &details, duration).await?,
            None => {
                let end_date = add_days(now, duration).ok_or_else(|| {
                    error!("🔔️ Order [{order_id}] has an unusable plan duration of {duration} days");
                    WebhookRejection::InvalidPaymentDetails
                })?;
                Entitlement::New(NewSubscription {
                    subscription_id: SubscriptionId::random(),
                    user_id: order.user_id.clone(),
                    plan_id,
                    lens_view_id: details.lens_view_id.clone().or(catalog_lens),
                    start_date: now,
                    end_date,
                    origin_order_id: order_id.clone(),
                })
            },
        };
        let details = details.with_gateway_response(fields.into_inner());
        match self.db.settle_paid_order(&order_id, &details, entitlement, now).await {
            Ok(SettlementResult::AlreadySettled) => {
                info!("🔔️ Order [{order_id}] was settled by a concurrent notification");
                Ok(WebhookOutcome::AlreadyProcessed(order_id))
            },
            Ok(SettlementResult::Settled(subscription)) if is_renewal => {
                info!(
                    "🔔️ Renewal order [{order_id}] paid. Subscription {} now ends {}",
                    subscription.subscription_id, subscription.end_date
                );
                Ok(WebhookOutcome::Renewed(subscription))
            },
            Ok(SettlementResult::Settled(subscription)) => {
                info!(
                    "🔔️ Order [{order_id}] paid. Subscription {} is active until {}",
                    subscription.subscription_id, subscription.end_date
                );
                Ok(WebhookOutcome::Activated(subscription))
            },
            Err(e) => Err(persistence_failure(&order_id, e)),
        }
    }

    async fn renewal_entitlement(
        &self,
        order_id: &OrderId,
        subscription_id: SubscriptionId,
        details: &PaymentDetails,
        duration: i64,
    ) -> Result<Entitlement, WebhookRejection> {
        if let Some(end_date) = details.renewal_end {
            return Ok(Entitlement::Extend { subscription_id, end_date });
        }
        let subscription = self
            .db
            .fetch_subscription(&subscription_id)
            .await
            .map_err(|e| persistence_failure(order_id, e))?
            .ok_or_else(|| {
                error!("🔔️ Renewal order [{order_id}] refers to missing subscription {subscription_id}");
                WebhookRejection::InvalidPaymentDetails
            })?;
        let end_date =
            add_days(subscription.end_date, duration).ok_or(WebhookRejection::InvalidPaymentDetails)?;
        Ok(Entitlement::Extend { subscription_id, end_date })
    }

    async fn settle_failed(
        &self,
        order: Order,
        details: PaymentDetails,
        fields: GatewayFields,
        now: DateTime<Utc>,
    ) -> Result<WebhookOutcome, WebhookRejection> {
        let order_id = order.order_id;
        let message = fields.get("RtnMsg").unwrap_or_default().to_string();
        let code = fields.get(RETURN_CODE).unwrap_or_default().to_string();
        let details = details.with_gateway_response(fields.into_inner());
        let changed = self
            .db
            .settle_failed_order(&order_id, &details, now)
            .await
            .map_err(|e| persistence_failure(&order_id, e))?;
        if changed {
            info!("🔔️ Payment for order [{order_id}] failed with code {code}: {message}");
            Ok(WebhookOutcome::PaymentFailed(order_id))
        } else {
            info!("🔔️ Order [{order_id}] was settled by a concurrent notification");
            Ok(WebhookOutcome::AlreadyProcessed(order_id))
        }
    }
}

fn persistence_failure(order_id: &OrderId, e: BillingError) -> WebhookRejection {
    error!("🔔️ Could not settle order [{order_id}]. The gateway will be asked to retry. {e}");
    WebhookRejection::Persistence(e.to_string())
}
