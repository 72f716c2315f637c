use actix_web::{http::StatusCode, web, web::ServiceConfig};
use lens_payment_engine::{test_utils::sample_plans, SubscriptionApi};
use serde_json::Value;

use super::{
    helpers::{get_request, test_clock},
    mocks::MockBillingDb,
};
use crate::routes::SubscriptionPlansRoute;

#[actix_web::test]
async fn plans_need_a_lens() {
    let _ = env_logger::try_init().ok();
    let (status, body) = get_request("", "/subscription-plans", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"Invalid request. lensViewId parameter is required"}"#);

    let (status, _) = get_request("", "/subscription-plans?lensViewId=%20", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn plans_for_a_lens() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        get_request("", "/subscription-plans?lensViewId=lens-1", configure).await.expect("Request failed");
    assert_eq!(status, StatusCode::OK);
    let plans: Value = serde_json::from_str(&body).unwrap();
    let plans = plans.as_array().unwrap();
    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0]["id"], "monthly-usd");
    assert_eq!(plans[0]["durationDays"], 30);
    assert_eq!(plans[0]["type"], "monthly");
    assert_eq!(plans[1]["id"], "yearly-twd");
    assert_eq!(plans[1]["currency"], "TWD");
}

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockBillingDb::new();
    db.expect_active_plans_for_lens().returning(|lens| {
        assert_eq!(lens, "lens-1");
        Ok(sample_plans().into_iter().filter(|p| p.active).collect())
    });
    let api = SubscriptionApi::new(db, test_clock());
    cfg.service(SubscriptionPlansRoute::<MockBillingDb>::new()).app_data(web::Data::new(api));
}
