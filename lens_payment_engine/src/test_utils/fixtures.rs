use crate::{
    db_types::{OrderId, SubscriptionPlan},
    gateway::{GatewayConfig, GatewayFields, PaymentGatewayClient, CHECK_MAC_VALUE, CORRELATION_FIELD, RETURN_CODE},
    traits::{LatestRates, RateProvider, RateProviderError},
    SqliteDatabase,
};

// The gateway's published staging credentials.
pub const TEST_MERCHANT_ID: &str = "3002607";
pub const TEST_HASH_KEY: &str = "pwFHCqoQZGmho4w6";
pub const TEST_HASH_IV: &str = "EkRm7iFT261dpevs";
pub const TEST_GATEWAY_URL: &str = "https://payment-stage.ecpay.com.tw/Cashier/AioCheckOut/V5";

pub fn test_gateway() -> PaymentGatewayClient {
    PaymentGatewayClient::new(GatewayConfig::new(TEST_MERCHANT_ID, TEST_HASH_KEY, TEST_HASH_IV, TEST_GATEWAY_URL))
}

/// Three plans for lens `lens-1`:
/// * `monthly-usd`: 19.99 USD for 30 days
/// * `yearly-twd`: NT$2990 for 365 days
/// * `retired`: no longer on sale
pub fn sample_plans() -> Vec<SubscriptionPlan> {
    let plan = |id: &str, name: &str, price: f64, currency: &str, days: i64, active: bool| SubscriptionPlan {
        plan_id: id.to_string(),
        name: name.to_string(),
        price,
        currency: currency.to_string(),
        duration_days: days,
        plan_type: if days >= 365 { "yearly".into() } else { "monthly".into() },
        lens_view_id: Some("lens-1".into()),
        active,
    };
    vec![
        plan("monthly-usd", "Monthly", 19.99, "USD", 30, true),
        plan("yearly-twd", "Yearly", 2990.0, "TWD", 365, true),
        plan("retired", "Legacy", 9.99, "USD", 30, false),
    ]
}

pub async fn seed_plans(db: &SqliteDatabase) {
    for plan in sample_plans() {
        db.upsert_plan(&plan).await.expect("Error seeding plan");
    }
}

/// A notification as the gateway would post it for `order_id`, with a valid checksum.
pub fn signed_notification(
    gateway: &PaymentGatewayClient,
    order_id: &OrderId,
    trade_no: &str,
    rtn_code: &str,
) -> GatewayFields {
    let mut fields = GatewayFields::new();
    fields.insert("MerchantID", gateway.config().merchant_id.as_str());
    fields.insert("MerchantTradeNo", trade_no);
    fields.insert(RETURN_CODE, rtn_code);
    fields.insert("RtnMsg", if rtn_code == "1" { "Succeeded" } else { "Failed" });
    fields.insert("TradeNo", "2505011200001234");
    fields.insert("PaymentType", "Credit_CreditCard");
    fields.insert(CORRELATION_FIELD, order_id.as_str());
    let mac = gateway.build_signature(&fields);
    fields.insert(CHECK_MAC_VALUE, mac);
    fields
}

/// A rate provider that always reports the same TWD rate, or nothing at all.
#[derive(Debug, Clone, Copy)]
pub struct FixedRateProvider(pub Option<f64>);

impl RateProvider for FixedRateProvider {
    async fn fetch_latest_rates(&self) -> Result<LatestRates, RateProviderError> {
        match self.0 {
            Some(rate) => Ok([("USD".to_string(), 1.0), ("TWD".to_string(), rate)].into_iter().collect()),
            None => Err(RateProviderError::NotConfigured),
        }
    }
}
