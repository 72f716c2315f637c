use actix_web::{http::StatusCode, web, web::ServiceConfig};
use chrono::Duration;
use lens_payment_engine::{
    db_types::{Order, OrderStatusType, Subscription, SubscriptionId, SubscriptionStatusType},
    exchange_rates::RateCache,
    test_utils::{sample_plans, test_gateway, FixedRateProvider},
    CheckoutApi,
    SubscriptionApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{get_request, now, post_request, subscription, test_clock, ALICE, BOB},
    mocks::MockBillingDb,
};
use crate::routes::{
    AutoRenewRoute,
    CancelSubscriptionRoute,
    MySubscriptionsRoute,
    RenewSubscriptionRoute,
    SubscriptionStatusRoute,
};

#[actix_web::test]
async fn status_without_user() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/subscriptions/status", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"User not authenticated."}"#);
}

#[actix_web::test]
async fn status_overview() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(ALICE, "/subscriptions/status", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let overview: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(overview["hasActiveSubscription"], true);
    assert_eq!(overview["totalActiveSubscriptions"], 2);
    assert_eq!(overview["expiringSubscriptionsCount"], 1);
    let active = overview["activeSubscriptions"].as_array().unwrap();
    assert_eq!(active[0]["id"], "sub-long");
    assert_eq!(active[0]["planName"], "Monthly");
    assert_eq!(active[0]["daysRemaining"], 200);
    assert_eq!(active[0]["isExpiring"], false);
    assert_eq!(active[1]["id"], "sub-1");
    assert_eq!(active[1]["daysRemaining"], 10);
    assert_eq!(active[1]["isExpiring"], true);
}

#[actix_web::test]
async fn list_my_subscriptions() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(ALICE, "/subscriptions", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let subscriptions: Value = serde_json::from_str(&body).unwrap();
    let ids = subscriptions.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["sub-long", "sub-1", "sub-cancelled"]);
}

#[actix_web::test]
async fn cancel_my_subscription() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-1"});
    let (status, body) = post_request(ALICE, "/subscriptions/cancel", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let subscription: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(subscription["status"], "cancelled");
    assert_eq!(subscription["autoRenew"], false);
}

#[actix_web::test]
async fn cancel_someone_elses_subscription() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-1"});
    let (status, body) = post_request(BOB, "/subscriptions/cancel", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. Subscription sub-1 belongs to another user"}"#);
}

#[actix_web::test]
async fn cancel_twice() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-cancelled"});
    let (status, body) = post_request(ALICE, "/subscriptions/cancel", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Subscription sub-cancelled is Cancelled and cannot be cancelled"}"#);
}

#[actix_web::test]
async fn cancel_without_subscription_id() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(ALICE, "/subscriptions/cancel", json!({}), configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.starts_with(r#"{"error":"Could not read request body: "#), "{body}");
}

#[actix_web::test]
async fn switch_on_auto_renew() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-1", "autoRenew": true});
    let (status, body) =
        post_request(ALICE, "/subscriptions/auto-renew", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let subscription: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(subscription["autoRenew"], true);
}

#[actix_web::test]
async fn renew_without_auto_renew() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-1"});
    let (status, body) = post_request(ALICE, "/subscriptions/renew", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Auto-renew is not enabled"), "{body}");
}

#[actix_web::test]
async fn renew_someone_elses_subscription() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-1"});
    let (status, _) = post_request(BOB, "/subscriptions/renew", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn renew_auto_renewing_subscription() {
    let _ = env_logger::try_init().ok();
    let body = json!({"subscriptionId": "sub-auto"});
    let (status, body) = post_request(ALICE, "/subscriptions/renew", body, configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let renewal: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(renewal["subscription"]["id"], "sub-auto");
    assert_eq!(renewal["order"]["subscriptionId"], "sub-auto");
    assert_eq!(renewal["order"]["status"], "pending");
    let form = &renewal["formData"];
    // No rate provider, so the fallback rate of 30 applies
    assert_eq!(form["TotalAmount"], "600");
    assert_eq!(form["TradeDesc"], "Subscription renewal");
    assert_eq!(form["CustomField1"], renewal["order"]["id"]);
    assert_eq!(form["OrderResultURL"], "https://lens.example.com/subscriptions/sub-auto");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockBillingDb::new();
    db.expect_fetch_subscriptions_for_user().returning(|user_id| {
        assert_eq!(user_id, ALICE);
        Ok(vec![subscription("sub-long", ALICE, 200), subscription("sub-1", ALICE, 10), cancelled()])
    });
    expect_lookups(&mut db);
    db.expect_cancel_subscription().times(0..=1).returning(|id, when| {
        assert_eq!(id, &SubscriptionId::from("sub-1"));
        let mut s = subscription("sub-1", ALICE, 10);
        s.status = SubscriptionStatusType::Cancelled;
        s.cancelled_at = Some(when);
        Ok(s)
    });
    db.expect_set_auto_renew().times(0..=1).returning(|id, enabled, _| {
        let mut s = subscription(id.as_str(), ALICE, 10);
        s.auto_renew = enabled;
        Ok(s)
    });
    let clock = test_clock();
    let checkout_api = CheckoutApi::new(
        renewal_db(),
        test_gateway(),
        RateCache::new(FixedRateProvider(None), clock.clone()),
        clock.clone(),
        "https://lens.example.com",
    );
    let api = SubscriptionApi::new(db, clock);
    cfg.service(SubscriptionStatusRoute::<MockBillingDb>::new())
        .service(MySubscriptionsRoute::<MockBillingDb>::new())
        .service(CancelSubscriptionRoute::<MockBillingDb>::new())
        .service(AutoRenewRoute::<MockBillingDb>::new())
        .service(RenewSubscriptionRoute::<MockBillingDb, FixedRateProvider>::new())
        .app_data(web::Data::new(api))
        .app_data(web::Data::new(checkout_api));
}

fn expect_lookups(db: &mut MockBillingDb) {
    db.expect_fetch_subscription().returning(|id| {
        let result = match id.as_str() {
            "sub-1" => Some(subscription("sub-1", ALICE, 10)),
            "sub-auto" => {
                let mut s = subscription("sub-auto", ALICE, 3);
                s.auto_renew = true;
                Some(s)
            },
            "sub-cancelled" => Some(cancelled()),
            _ => None,
        };
        Ok(result)
    });
    db.expect_fetch_plan().returning(|plan_id| Ok(sample_plans().into_iter().find(|p| p.plan_id == plan_id)));
}

fn renewal_db() -> MockBillingDb {
    let mut db = MockBillingDb::new();
    expect_lookups(&mut db);
    db.expect_fetch_pending_renewal().returning(|_| Ok(None));
    db.expect_insert_order().times(0..=1).returning(|order| {
        assert_eq!(order.subscription_id, Some(SubscriptionId::from("sub-auto")));
        Ok(Order {
            id: 2,
            order_id: order.order_id,
            user_id: order.user_id,
            subscription_id: order.subscription_id,
            total_amount: order.total_amount,
            original_amount: order.original_amount,
            currency: order.currency,
            status: OrderStatusType::Pending,
            payment_details: order.payment_details.to_json(),
            created_at: order.created_at,
            updated_at: order.created_at,
        })
    });
    db
}

fn cancelled() -> Subscription {
    let mut s = subscription("sub-cancelled", ALICE, 5);
    s.status = SubscriptionStatusType::Cancelled;
    s.cancelled_at = Some(now() - Duration::days(1));
    s
}
