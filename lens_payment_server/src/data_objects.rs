use lens_payment_engine::{
    billing_objects::CheckoutRequest,
    db_types::{OrderId, SubscriptionId},
};
use serde::Deserialize;

/// Body of `POST /api/payment/create-payment`. The buyer comes from the session, never from the body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentParams {
    #[serde(default)]
    pub plan_id: String,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub callback_path: Option<String>,
}

impl CreatePaymentParams {
    pub fn into_checkout_request(self, user_id: &str) -> CheckoutRequest {
        CheckoutRequest {
            user_id: user_id.to_string(),
            plan_id: self.plan_id,
            locale: self.locale,
            callback_path: self.callback_path,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderParams {
    pub order_id: OrderId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionParams {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRenewParams {
    pub subscription_id: SubscriptionId,
    pub auto_renew: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansQuery {
    #[serde(default)]
    pub lens_view_id: String,
}
