//! Request handler definitions
//!
//! Define each route and its handler here. Handlers only unpack the request, call through to the engine APIs and
//! render the result; all the business rules live in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every database call and outbound request here is `async`, so
//! workers carry on serving other requests while one is in flight.
use actix_web::{get, http::StatusCode, web, HttpResponse, Responder};
use lens_payment_engine::{
    db_types::{OrderId, SubscriptionId},
    gateway::GatewayFields,
    traits::{BillingDatabase, RateProvider},
    CheckoutApi,
    SubscriptionApi,
    WebhookApi,
    WebhookRejection,
    WEBHOOK_ACK,
};
use log::*;

use crate::{
    data_objects::{AutoRenewParams, CreatePaymentParams, OrderParams, PlansQuery, SubscriptionParams},
    errors::ServerError,
    user::CurrentUser,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

#[get("/health")]
pub async fn health() -> impl Responder {
    "👍️\n"
}

//----------------------------------------------   Plans  ----------------------------------------------------
route!(subscription_plans => Get "/subscription-plans" impl BillingDatabase);
pub async fn subscription_plans<B: BillingDatabase>(
    query: web::Query<PlansQuery>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET subscription-plans for lens '{}'", query.lens_view_id);
    let plans = api.active_plans(&query.lens_view_id).await?;
    Ok(HttpResponse::Ok().json(plans))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payment/create-payment" impl BillingDatabase, RateProvider);
pub async fn create_payment<B: BillingDatabase, R: RateProvider>(
    user: CurrentUser,
    body: web::Json<CreatePaymentParams>,
    api: web::Data<CheckoutApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner().into_checkout_request(user.id());
    debug!("💻️ POST create-payment for user {user} and plan '{}'", request.plan_id);
    let checkout = api.create_order(request).await?;
    Ok(HttpResponse::Ok().json(checkout))
}

route!(payment_success => Post "/payment/payment-success" impl BillingDatabase);
pub async fn payment_success<B: BillingDatabase>(
    user: CurrentUser,
    body: web::Json<OrderParams>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = body.into_inner().order_id;
    debug!("💻️ POST payment-success for order [{order_id}]");
    let result = api.payment_result(user.id(), &order_id).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(order_by_id => Get "/orders/{order_id}" impl BillingDatabase);
pub async fn order_by_id<B: BillingDatabase>(
    user: CurrentUser,
    path: web::Path<String>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order [{order_id}] for user {user}");
    let order = api.order_for_user(user.id(), &order_id).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Subscriptions  ----------------------------------------------------
route!(my_subscriptions => Get "/subscriptions" impl BillingDatabase);
pub async fn my_subscriptions<B: BillingDatabase>(
    user: CurrentUser,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET subscriptions for user {user}");
    let subscriptions = api.subscriptions_for_user(user.id()).await?;
    Ok(HttpResponse::Ok().json(subscriptions))
}

route!(subscription_status => Get "/subscriptions/status" impl BillingDatabase);
pub async fn subscription_status<B: BillingDatabase>(
    user: CurrentUser,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET subscription status for user {user}");
    let overview = api.subscription_status(user.id()).await?;
    Ok(HttpResponse::Ok().json(overview))
}

route!(subscription_orders => Get "/subscriptions/{subscription_id}/orders" impl BillingDatabase);
pub async fn subscription_orders<B: BillingDatabase>(
    user: CurrentUser,
    path: web::Path<String>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let subscription_id = SubscriptionId::from(path.into_inner());
    debug!("💻️ GET orders for subscription {subscription_id}");
    let orders = api.orders_for_subscription(user.id(), &subscription_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(cancel_subscription => Post "/subscriptions/cancel" impl BillingDatabase);
pub async fn cancel_subscription<B: BillingDatabase>(
    user: CurrentUser,
    body: web::Json<SubscriptionParams>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let subscription_id = body.into_inner().subscription_id;
    debug!("💻️ POST cancel subscription {subscription_id} for user {user}");
    let subscription = api.cancel_subscription(user.id(), &subscription_id).await?;
    Ok(HttpResponse::Ok().json(subscription))
}

route!(auto_renew => Post "/subscriptions/auto-renew" impl BillingDatabase);
pub async fn auto_renew<B: BillingDatabase>(
    user: CurrentUser,
    body: web::Json<AutoRenewParams>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let AutoRenewParams { subscription_id, auto_renew } = body.into_inner();
    debug!("💻️ POST auto-renew={auto_renew} for subscription {subscription_id}");
    let subscription = api.set_auto_renew(user.id(), &subscription_id, auto_renew).await?;
    Ok(HttpResponse::Ok().json(subscription))
}

// The caller is optional here. When present, the subscription must be theirs.
route!(renew_subscription => Post "/subscriptions/renew" impl BillingDatabase, RateProvider);
pub async fn renew_subscription<B: BillingDatabase, R: RateProvider>(
    user: Option<CurrentUser>,
    body: web::Json<SubscriptionParams>,
    api: web::Data<CheckoutApi<B, R>>,
) -> Result<HttpResponse, ServerError> {
    let subscription_id = body.into_inner().subscription_id;
    debug!("💻️ POST renew subscription {subscription_id}");
    let renewal = api.renew_subscription(user.as_ref().map(CurrentUser::id), &subscription_id).await?;
    Ok(HttpResponse::Ok().json(renewal))
}

//----------------------------------------------   ECPay  ----------------------------------------------------
route!(gateway_status => Get "/ecpay/status" impl BillingDatabase);
pub async fn gateway_status<B: BillingDatabase>(
    query: web::Query<OrderParams>,
    api: web::Data<SubscriptionApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = query.into_inner().order_id;
    debug!("💻️ GET gateway status for order [{order_id}]");
    let status = api.gateway_status(&order_id).await?;
    Ok(HttpResponse::Ok().json(status))
}

// ECPay posts payment results here as an urlencoded form. The gateway only understands plain-text answers, so
// every outcome, including a body that cannot be read, is rendered as `1|OK` or `0|<reason>`.
route!(ecpay_notify => Post "" impl BillingDatabase);
pub async fn ecpay_notify<B: BillingDatabase>(body: web::Bytes, api: web::Data<WebhookApi<B>>) -> HttpResponse {
    trace!("💻️ POST ecpay notification ({} bytes)", body.len());
    let fields = match serde_urlencoded::from_bytes::<GatewayFields>(&body) {
        Ok(fields) => fields,
        Err(e) => {
            warn!("💻️ Could not read the payment notification body. {e}");
            return rejection_response(&WebhookRejection::InvalidSignature);
        },
    };
    match api.handle_webhook(fields).await {
        Ok(outcome) => {
            debug!("💻️ Payment notification handled: {outcome:?}");
            plain_text(StatusCode::OK, outcome.response_text())
        },
        Err(rejection) => rejection_response(&rejection),
    }
}

#[get("")]
pub async fn ecpay_notify_probe() -> impl Responder {
    plain_text(StatusCode::OK, WEBHOOK_ACK)
}

/// The answer to a notification from an address that is not on the gateway whitelist. It carries no more detail than
/// a bad signature would.
pub fn forbidden_peer() -> HttpResponse {
    plain_text(StatusCode::FORBIDDEN, &WebhookRejection::InvalidSignature.response_text())
}

fn rejection_response(rejection: &WebhookRejection) -> HttpResponse {
    let status = StatusCode::from_u16(rejection.http_status()).unwrap_or(StatusCode::BAD_REQUEST);
    plain_text(status, &rejection.response_text())
}

fn plain_text(status: StatusCode, body: &str) -> HttpResponse {
    HttpResponse::build(status).content_type("text/plain; charset=utf-8").body(body.to_string())
}
