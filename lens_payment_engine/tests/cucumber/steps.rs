use chrono::{DateTime, Utc};
use cucumber::{then, when};
use lens_payment_engine::{
    billing_objects::CheckoutRequest,
    db_types::{OrderStatusType, SubscriptionStatusType},
    gateway::CHECK_MAC_VALUE,
    test_utils::signed_notification,
    BillingApiError,
    BillingDatabase,
};
use lpg_common::Twd;

use crate::cucumber::BillingWorld;

fn timestamp(s: &str) -> DateTime<Utc> {
    s.parse::<DateTime<Utc>>().expect("Not a valid timestamp")
}

//--------------------------------------        Checkout       ---------------------------------------------------------
#[when(expr = "user {word} checks out plan {word}")]
async fn check_out(world: &mut BillingWorld, user: String, plan: String) {
    let request = CheckoutRequest::new(&user, &plan).with_locale("en").with_callback_path("payment/callback");
    match world.system().checkout.create_order(request).await {
        Ok(result) => {
            world.last_order = Some(result.order);
            world.last_form = Some(result.form);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[then(expr = "the last order total is {int} TWD")]
async fn order_total(world: &mut BillingWorld, total: i64) {
    assert_eq!(world.last_order().total_amount, Twd::from(total));
    let form = world.last_form.as_ref().expect("No payment form");
    assert_eq!(form.fields.get("TotalAmount"), Some(total.to_string().as_str()));
}

#[then("the last payment form is signed")]
async fn form_is_signed(world: &mut BillingWorld) {
    let form = world.last_form.as_ref().expect("No payment form");
    assert!(form.fields.contains_key(CHECK_MAC_VALUE));
    assert!(world.system().gateway.verify_callback(&form.fields));
    assert_eq!(form.fields.get("CustomField1"), Some(world.last_order().order_id.as_str()));
}

#[then("the checkout fails with plan not found")]
async fn checkout_plan_not_found(world: &mut BillingWorld) {
    let err = world.last_error.as_ref().expect("Checkout should have failed");
    assert!(matches!(err, BillingApiError::PlanNotFound(_)), "Unexpected error: {err}");
}

//--------------------------------------      Notifications      -------------------------------------------------------
async fn notify(world: &mut BillingWorld, rtn_code: &str, tamper: bool) {
    let system = world.system();
    let order = world.last_order();
    let trade_no = order.details().unwrap().merchant_trade_no.unwrap();
    let mut fields = signed_notification(&system.gateway, &order.order_id, &trade_no, rtn_code);
    if tamper {
        let mac = fields.get(CHECK_MAC_VALUE).unwrap().to_string();
        let mac = mac.chars().rev().collect::<String>();
        fields.insert(CHECK_MAC_VALUE, mac);
    }
    let ack = match system.webhooks.handle_webhook(fields).await {
        Ok(outcome) => outcome.response_text().to_string(),
        Err(rejection) => rejection.response_text(),
    };
    world.last_ack = Some(ack);
}

#[when("the gateway reports the last order as paid")]
async fn report_paid(world: &mut BillingWorld) {
    notify(world, "1", false).await;
}

#[when("the gateway reports the last order as failed")]
async fn report_failed(world: &mut BillingWorld) {
    notify(world, "10100058", false).await;
}

#[when("the gateway reports the last order as paid with a tampered checksum")]
async fn report_tampered(world: &mut BillingWorld) {
    notify(world, "1", true).await;
}

#[then(expr = "the acknowledgement is {string}")]
async fn acknowledgement(world: &mut BillingWorld, expected: String) {
    assert_eq!(world.last_ack.as_deref(), Some(expected.as_str()));
}

#[then(expr = "the last order is {word}")]
async fn order_status(world: &mut BillingWorld, status: String) {
    let expected = status.parse::<OrderStatusType>().expect("Not a valid order status");
    let id = world.last_order().order_id.clone();
    let order = world.system().db.fetch_order(&id).await.unwrap().expect("Order has vanished");
    assert_eq!(order.status, expected);
}

#[then(expr = "user {word} has {int} subscription(s)")]
async fn subscription_count(world: &mut BillingWorld, user: String, count: usize) {
    let subscriptions = world.system().db.fetch_subscriptions_for_user(&user).await.unwrap();
    assert_eq!(subscriptions.len(), count);
}

#[then(expr = "user {word} has an active subscription ending {word}")]
async fn active_subscription(world: &mut BillingWorld, user: String, end: String) {
    let overview = world.system().subscriptions.subscription_status(&user).await.unwrap();
    assert!(overview.has_active_subscription);
    assert_eq!(overview.active_subscriptions.len(), 1);
    assert_eq!(overview.active_subscriptions[0].end_date, timestamp(&end));
}

//--------------------------------------      Subscriptions      -------------------------------------------------------
fn record<T>(world: &mut BillingWorld, result: Result<T, BillingApiError>) -> Option<T> {
    match result {
        Ok(v) => {
            world.last_error = None;
            Some(v)
        },
        Err(e) => {
            world.last_error = Some(e);
            None
        },
    }
}

#[when(expr = "user {word} cancels the subscription")]
async fn cancel(world: &mut BillingWorld, user: String) {
    let id = world.subscription().subscription_id.clone();
    let result = world.system().subscriptions.cancel_subscription(&user, &id).await;
    if let Some(subscription) = record(world, result) {
        world.subscription = Some(subscription);
    }
}

#[when(expr = "user {word} turns auto-renew on")]
async fn auto_renew_on(world: &mut BillingWorld, user: String) {
    let id = world.subscription().subscription_id.clone();
    let result = world.system().subscriptions.set_auto_renew(&user, &id, true).await;
    if let Some(subscription) = record(world, result) {
        world.subscription = Some(subscription);
    }
}

#[when("the subscription is renewed")]
async fn renew(world: &mut BillingWorld) {
    let id = world.subscription().subscription_id.clone();
    let result = world.system().checkout.renew_subscription(None, &id).await;
    if let Some(renewal) = record(world, result) {
        world.last_order = Some(renewal.checkout.order);
        world.last_form = Some(renewal.checkout.form);
    }
}

#[then("the subscription is cancelled")]
async fn is_cancelled(world: &mut BillingWorld) {
    let subscription = world.subscription();
    assert_eq!(subscription.status, SubscriptionStatusType::Cancelled);
    assert!(subscription.cancelled_at.is_some());
}

#[then("auto-renew is off")]
async fn auto_renew_off(world: &mut BillingWorld) {
    assert!(!world.subscription().auto_renew);
}

#[then(expr = "the subscription ends {word}")]
async fn subscription_ends(world: &mut BillingWorld, end: String) {
    let id = world.subscription().subscription_id.clone();
    let subscription = world.system().db.fetch_subscription(&id).await.unwrap().expect("Subscription has vanished");
    assert_eq!(subscription.end_date, timestamp(&end));
}

#[then(expr = "the renewal starts {word} and ends {word}")]
async fn renewal_period(world: &mut BillingWorld, start: String, end: String) {
    let order = world.last_order();
    assert_eq!(order.subscription_id.as_ref(), Some(&world.subscription().subscription_id));
    let details = order.details().unwrap();
    assert_eq!(details.renewal_start, Some(timestamp(&start)));
    assert_eq!(details.renewal_end, Some(timestamp(&end)));
}

#[then(expr = "the subscription has {int} orders")]
async fn subscription_orders(world: &mut BillingWorld, count: usize) {
    let id = world.subscription().subscription_id.clone();
    let orders = world.system().db.fetch_orders_for_subscription(&id).await.unwrap();
    assert_eq!(orders.len(), count);
    assert!(orders.iter().all(|o| o.status == OrderStatusType::Paid));
}

#[then("the request fails with an invalid state")]
async fn invalid_state(world: &mut BillingWorld) {
    let err = world.last_error.as_ref().expect("The request should have failed");
    assert!(matches!(err, BillingApiError::InvalidState(_)), "Unexpected error: {err}");
}

#[then("the request fails as forbidden")]
async fn forbidden(world: &mut BillingWorld) {
    let err = world.last_error.as_ref().expect("The request should have failed");
    assert!(matches!(err, BillingApiError::Forbidden(_)), "Unexpected error: {err}");
}
