use chrono::{DateTime, Utc};
use cucumber::given;
use lens_payment_engine::{billing_objects::CheckoutRequest, gateway::GatewayFields, WebhookOutcome};

use crate::cucumber::{world::BillingSystem, BillingWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut BillingWorld) {
    let system = BillingSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "the exchange rate is {float} TWD per USD")]
async fn exchange_rate(world: &mut BillingWorld, rate: f64) {
    world.system_mut().set_exchange_rate(rate);
}

#[given(expr = "the time is {word}")]
async fn set_time(world: &mut BillingWorld, time: String) {
    let now = time.parse::<DateTime<Utc>>().expect("Not a valid timestamp");
    world.system().clock.set(now);
}

#[given(expr = "user {word} has checked out plan {word}")]
async fn checked_out(world: &mut BillingWorld, user: String, plan: String) {
    let result = world
        .system()
        .checkout
        .create_order(CheckoutRequest::new(&user, &plan))
        .await
        .expect("Error creating order");
    world.last_order = Some(result.order);
    world.last_form = Some(result.form);
}

#[given(expr = "user {word} has a paid subscription to plan {word}")]
async fn paid_subscription(world: &mut BillingWorld, user: String, plan: String) {
    checked_out(world, user, plan).await;
    let system = world.system();
    let order = world.last_order();
    let trade_no = order.details().unwrap().merchant_trade_no.unwrap();
    let fields: GatewayFields =
        lens_payment_engine::test_utils::signed_notification(&system.gateway, &order.order_id, &trade_no, "1");
    match system.webhooks.handle_webhook(fields).await {
        Ok(WebhookOutcome::Activated(subscription)) => world.subscription = Some(subscription),
        other => panic!("Expected a new subscription, got {other:?}"),
    }
}
