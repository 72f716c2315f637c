use std::sync::Arc;

use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{DateTime, Duration, TimeZone, Utc};
use lens_payment_engine::{
    db_types::{Order, OrderId, OrderStatusType, PaymentDetails, Subscription, SubscriptionId, SubscriptionStatusType},
    traits::{Clock, FixedClock},
};
use log::debug;
use lpg_common::Twd;

use crate::{
    server::{json_error_handler, query_error_handler},
    user::USER_ID_HEADER,
};

pub const ALICE: &str = "alice";
pub const BOB: &str = "bob";

/// 2025-05-01 12:00 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

pub fn test_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::new(now()))
}

pub fn order(order_id: &str, user_id: &str, status: OrderStatusType, details: PaymentDetails) -> Order {
    Order {
        id: 1,
        order_id: OrderId::from(order_id),
        user_id: user_id.to_string(),
        subscription_id: None,
        total_amount: Twd::from(630),
        original_amount: 19.99,
        currency: "USD".into(),
        status,
        payment_details: details.to_json(),
        created_at: now(),
        updated_at: now(),
    }
}

/// A monthly plan purchase, as checkout stores it.
pub fn monthly_details() -> PaymentDetails {
    PaymentDetails {
        plan_id: Some("monthly-usd".into()),
        plan_name: Some("Monthly".into()),
        plan_duration: Some(30),
        lens_view_id: Some("lens-1".into()),
        ..Default::default()
    }
}

pub fn subscription(subscription_id: &str, user_id: &str, days_left: i64) -> Subscription {
    Subscription {
        id: 1,
        subscription_id: SubscriptionId::from(subscription_id),
        user_id: user_id.to_string(),
        plan_id: "monthly-usd".into(),
        lens_view_id: Some("lens-1".into()),
        status: SubscriptionStatusType::Active,
        start_date: now() - Duration::days(1),
        end_date: now() + Duration::days(days_left),
        auto_renew: false,
        cancelled_at: None,
        origin_order_id: OrderId::from("order-1"),
        created_at: now(),
        updated_at: now(),
    }
}

pub async fn get_request(
    user: &str,
    path: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::get().uri(path);
    if !user.is_empty() {
        req = req.insert_header((USER_ID_HEADER, user));
    }
    send(req, configure).await
}

pub async fn post_request(
    user: &str,
    path: &str,
    body: serde_json::Value,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri(path).set_json(body);
    if !user.is_empty() {
        req = req.insert_header((USER_ID_HEADER, user));
    }
    send(req, configure).await
}

pub async fn post_form(
    path: &str,
    body: &str,
    configure: fn(&mut ServiceConfig),
) -> Result<(StatusCode, String), String> {
    let req = TestRequest::post()
        .uri(path)
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload(body.to_string());
    send(req, configure).await
}

async fn send(req: TestRequest, configure: fn(&mut ServiceConfig)) -> Result<(StatusCode, String), String> {
    let app = App::new()
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
