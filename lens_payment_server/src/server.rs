use std::{net::IpAddr, sync::Arc, time::Duration};

use actix_web::{
    dev::{Server, Service, ServiceRequest},
    error::{JsonPayloadError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    Error,
    HttpRequest,
    HttpResponse,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use lens_payment_engine::{
    exchange_rates::{ExchangeRateClient, RateCache},
    gateway::PaymentGatewayClient,
    traits::{Clock, SystemClock},
    CheckoutApi,
    SqliteDatabase,
    SubscriptionApi,
    WebhookApi,
};
use log::*;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    helpers::{get_remote_ip, is_whitelisted},
    routes::{
        ecpay_notify_probe,
        forbidden_peer,
        health,
        AutoRenewRoute,
        CancelSubscriptionRoute,
        CreatePaymentRoute,
        EcpayNotifyRoute,
        GatewayStatusRoute,
        MySubscriptionsRoute,
        OrderByIdRoute,
        PaymentSuccessRoute,
        RenewSubscriptionRoute,
        SubscriptionOrdersRoute,
        SubscriptionPlansRoute,
        SubscriptionStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    if !config.gateway.is_complete() {
        return Err(ServerError::ConfigurationError(
            "The ECPay merchant id, hash key, hash IV and checkout URL must all be set".into(),
        ));
    }
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let gateway = PaymentGatewayClient::new(config.gateway.clone());
    // One rate cache for all workers
    let rates = RateCache::new(ExchangeRateClient::new(config.exchange_rates.clone()), Arc::clone(&clock));
    let notify_url = format!("{}/api/ecpay/notify", config.base_url.trim_end_matches('/'));
    let srv = HttpServer::new(move || {
        let checkout_api =
            CheckoutApi::new(db.clone(), gateway.clone(), rates.clone(), Arc::clone(&clock), &config.base_url);
        let webhook_api = WebhookApi::new(db.clone(), gateway.clone(), Arc::clone(&clock));
        let subscription_api = SubscriptionApi::new(db.clone(), Arc::clone(&clock));
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("lps::access_log"))
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::Data::new(checkout_api))
            .app_data(web::Data::new(webhook_api))
            .app_data(web::Data::new(subscription_api));
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let ecpay_whitelist = config.ecpay_whitelist.clone();
        // Must be registered before the `/api` scope
        let ecpay_scope = web::scope("/api/ecpay/notify")
            .wrap_fn(move |req, srv| {
                match reject_unlisted_peer(&req, ecpay_whitelist.as_deref(), use_x_forwarded_for, use_forwarded) {
                    None => srv.call(req),
                    Some(res) => ok(req.into_response(res)).boxed_local(),
                }
            })
            .service(EcpayNotifyRoute::<SqliteDatabase>::new())
            .service(ecpay_notify_probe);
        let api_scope = web::scope("/api")
            .service(SubscriptionPlansRoute::<SqliteDatabase>::new())
            .service(CreatePaymentRoute::<SqliteDatabase, ExchangeRateClient>::new())
            .service(PaymentSuccessRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(MySubscriptionsRoute::<SqliteDatabase>::new())
            .service(SubscriptionStatusRoute::<SqliteDatabase>::new())
            .service(SubscriptionOrdersRoute::<SqliteDatabase>::new())
            .service(CancelSubscriptionRoute::<SqliteDatabase>::new())
            .service(AutoRenewRoute::<SqliteDatabase>::new())
            .service(RenewSubscriptionRoute::<SqliteDatabase, ExchangeRateClient>::new())
            .service(GatewayStatusRoute::<SqliteDatabase>::new());
        app.service(health).service(ecpay_scope).service(api_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    info!("💻️ Payment notifications are expected at {notify_url}");
    Ok(srv)
}

/// Returns the response for a payment notification from a peer that is not on the whitelist, or `None` if the request
/// may pass.
pub(crate) fn reject_unlisted_peer(
    req: &ServiceRequest,
    whitelist: Option<&[IpAddr]>,
    use_x_forwarded_for: bool,
    use_forwarded: bool,
) -> Option<HttpResponse> {
    let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
    if is_whitelisted(peer_ip, whitelist) {
        None
    } else {
        Some(forbidden_peer())
    }
}

pub(crate) fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> Error {
    debug!("💻️ Rejecting request body. {err}");
    ServerError::InvalidRequestBody(err.to_string()).into()
}

pub(crate) fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> Error {
    debug!("💻️ Rejecting query string. {err}");
    ServerError::InvalidInput(err.to_string()).into()
}
