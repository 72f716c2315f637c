use std::sync::Arc;

use chrono::{TimeZone, Utc};
use cucumber::World;
use lens_payment_engine::{
    db_types::{Order, Subscription},
    exchange_rates::RateCache,
    gateway::{PaymentForm, PaymentGatewayClient},
    test_utils::{prepare_test_env, random_db_path, seed_plans, test_gateway, FixedRateProvider},
    traits::FixedClock,
    BillingApiError,
    CheckoutApi,
    SqliteDatabase,
    SubscriptionApi,
    WebhookApi,
};
use log::*;

pub const BASE_URL: &str = "https://lens.example.com";

#[derive(Default, Debug, World)]
pub struct BillingWorld {
    pub system: Option<BillingSystem>,
    pub last_order: Option<Order>,
    pub last_form: Option<PaymentForm>,
    pub last_ack: Option<String>,
    pub last_error: Option<BillingApiError>,
    pub subscription: Option<Subscription>,
}

#[derive(Debug)]
pub struct BillingSystem {
    pub db_path: String,
    pub db: SqliteDatabase,
    pub clock: Arc<FixedClock>,
    pub gateway: PaymentGatewayClient,
    pub checkout: CheckoutApi<SqliteDatabase, FixedRateProvider>,
    pub webhooks: WebhookApi<SqliteDatabase>,
    pub subscriptions: SubscriptionApi<SqliteDatabase>,
}

impl BillingWorld {
    pub fn system(&self) -> &BillingSystem {
        self.system.as_ref().expect("Billing system not initialised")
    }

    pub fn system_mut(&mut self) -> &mut BillingSystem {
        self.system.as_mut().expect("Billing system not initialised")
    }

    pub fn last_order(&self) -> &Order {
        self.last_order.as_ref().expect("No order has been created")
    }

    pub fn subscription(&self) -> &Subscription {
        self.subscription.as_ref().expect("No subscription has been created")
    }
}

impl BillingSystem {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        seed_plans(&db).await;
        debug!("Created database: {url}");
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()));
        let gateway = test_gateway();
        let checkout = Self::checkout_api(&db, &gateway, &clock, None);
        let webhooks = WebhookApi::new(db.clone(), gateway.clone(), clock.clone());
        let subscriptions = SubscriptionApi::new(db.clone(), clock.clone());
        Self { db_path: url, db, clock, gateway, checkout, webhooks, subscriptions }
    }

    /// Replaces the checkout API with one whose rate provider always reports `rate` TWD per USD.
    pub fn set_exchange_rate(&mut self, rate: f64) {
        self.checkout = Self::checkout_api(&self.db, &self.gateway, &self.clock, Some(rate));
    }

    fn checkout_api(
        db: &SqliteDatabase,
        gateway: &PaymentGatewayClient,
        clock: &Arc<FixedClock>,
        rate: Option<f64>,
    ) -> CheckoutApi<SqliteDatabase, FixedRateProvider> {
        let rates = RateCache::new(FixedRateProvider(rate), clock.clone());
        CheckoutApi::new(db.clone(), gateway.clone(), rates, clock.clone(), BASE_URL)
    }
}
