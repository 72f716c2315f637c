use actix_web::{http::StatusCode, web, web::ServiceConfig};
use lens_payment_engine::{
    db_types::{Order, OrderStatusType, SubscriptionId},
    exchange_rates::RateCache,
    test_utils::{sample_plans, test_gateway, FixedRateProvider, TEST_GATEWAY_URL},
    CheckoutApi,
    SubscriptionApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{get_request, monthly_details, now, order, post_request, subscription, test_clock, ALICE, BOB},
    mocks::MockBillingDb,
};
use crate::routes::{CreatePaymentRoute, GatewayStatusRoute, OrderByIdRoute, PaymentSuccessRoute};

const BASE_URL: &str = "https://lens.example.com";

//----------------------------------------------   create-payment  ----------------------------------------------------

#[actix_web::test]
async fn create_payment_without_user() {
    let _ = env_logger::try_init().ok();
    let body = json!({"planId": "monthly-usd"});
    let (status, body) =
        post_request("", "/payment/create-payment", body, configure_checkout).await.expect("Request failed");
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"User not authenticated."}"#);
}

#[actix_web::test]
async fn create_payment_without_plan() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(ALICE, "/payment/create-payment", json!({}), configure_checkout).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. Missing subscription plan id"}"#);
}

#[actix_web::test]
async fn create_payment_for_retired_plan() {
    let _ = env_logger::try_init().ok();
    let body = json!({"planId": "retired"});
    let (status, body) =
        post_request(ALICE, "/payment/create-payment", body, configure_checkout).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Subscription plan retired does not exist"}"#);
}

#[actix_web::test]
async fn create_payment() {
    let _ = env_logger::try_init().ok();
    let body = json!({"planId": "monthly-usd", "locale": "jp", "callbackPath": "/lens/thanks"});
    let (status, body) =
        post_request(ALICE, "/payment/create-payment", body, configure_checkout).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    let order_id = result["order"]["id"].as_str().unwrap();
    assert_eq!(result["order"]["userId"], ALICE);
    assert_eq!(result["order"]["status"], "pending");
    assert_eq!(result["apiUrl"], TEST_GATEWAY_URL);
    let form = &result["formData"];
    assert_eq!(form["TotalAmount"], "630");
    assert_eq!(form["CustomField1"], order_id);
    assert_eq!(form["Language"], "JPN");
    assert_eq!(form["ReturnURL"], format!("{BASE_URL}/api/ecpay/notify"));
    assert_eq!(form["OrderResultURL"], format!("{BASE_URL}/lens/thanks?order_id={order_id}"));
    assert!(form["CheckMacValue"].as_str().is_some_and(|mac| mac.len() == 64));
}

fn configure_checkout(cfg: &mut ServiceConfig) {
    let mut db = MockBillingDb::new();
    db.expect_fetch_plan().returning(|plan_id| Ok(sample_plans().into_iter().find(|p| p.plan_id == plan_id)));
    db.expect_insert_order().times(0..=1).returning(|order| {
        Ok(Order {
            id: 1,
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
    let clock = test_clock();
    let rates = RateCache::new(FixedRateProvider(Some(31.5)), clock.clone());
    let api = CheckoutApi::new(db, test_gateway(), rates, clock, BASE_URL);
    cfg.service(CreatePaymentRoute::<MockBillingDb, FixedRateProvider>::new()).app_data(web::Data::new(api));
}

//----------------------------------------------   orders  ----------------------------------------------------

#[actix_web::test]
async fn payment_success_for_paid_order() {
    let _ = env_logger::try_init().ok();
    let body = json!({"orderId": "order-paid"});
    let (status, body) =
        post_request(ALICE, "/payment/payment-success", body, configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["isPaid"], true);
    assert_eq!(result["hasSubscription"], true);
    assert_eq!(result["order"]["id"], "order-paid");
    assert_eq!(result["subscription"]["id"], "sub-1");
}

#[actix_web::test]
async fn payment_success_for_pending_order() {
    let _ = env_logger::try_init().ok();
    let body = json!({"orderId": "order-pending"});
    let (status, body) =
        post_request(ALICE, "/payment/payment-success", body, configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["isPaid"], false);
    assert_eq!(result["hasSubscription"], false);
    assert_eq!(result["subscription"], Value::Null);
}

#[actix_web::test]
async fn fetch_my_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(ALICE, "/orders/order-paid", configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["id"], "order-paid");
    assert_eq!(result["status"], "paid");
    assert_eq!(result["subscriptionId"], "sub-1");
}

#[actix_web::test]
async fn fetch_someone_elses_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(BOB, "/orders/order-paid", configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, r#"{"error":"Insufficient Permissions. Order order-paid belongs to another user"}"#);
}

#[actix_web::test]
async fn fetch_unknown_order() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request(ALICE, "/orders/nope", configure_orders).await.expect("Request failed");
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order nope does not exist"}"#);
}

#[actix_web::test]
async fn gateway_status_probe() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/ecpay/status?orderId=order-paid", configure_orders).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["orderId"], "order-paid");
    assert_eq!(result["paymentResult"]["RtnCode"], "1");
    assert_eq!(result["paymentResult"]["MerchantTradeNo"], "order-paid");
    assert_eq!(result["paymentResult"]["planId"], "monthly-usd");

    let (status, body) = get_request("", "/ecpay/status?orderId=order-pending", configure_orders).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let result: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(result["paymentResult"]["RtnCode"], "0");

    let (status, _) = get_request("", "/ecpay/status?orderId=nope", configure_orders).await.unwrap();
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get_request("", "/ecpay/status", configure_orders).await.unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn configure_orders(cfg: &mut ServiceConfig) {
    let mut db = MockBillingDb::new();
    db.expect_fetch_order().returning(|order_id| {
        let result = match order_id.as_str() {
            "order-paid" => {
                let mut paid = order("order-paid", ALICE, OrderStatusType::Paid, monthly_details());
                paid.subscription_id = Some(SubscriptionId::from("sub-1"));
                paid.updated_at = now();
                Some(paid)
            },
            "order-pending" => Some(order("order-pending", ALICE, OrderStatusType::Pending, monthly_details())),
            _ => None,
        };
        Ok(result)
    });
    db.expect_fetch_subscription().returning(|id| {
        assert_eq!(id.as_str(), "sub-1");
        Ok(Some(subscription("sub-1", ALICE, 30)))
    });
    let api = SubscriptionApi::new(db, test_clock());
    cfg.service(PaymentSuccessRoute::<MockBillingDb>::new())
        .service(OrderByIdRoute::<MockBillingDb>::new())
        .service(GatewayStatusRoute::<MockBillingDb>::new())
        .app_data(web::Data::new(api));
}
