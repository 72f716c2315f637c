//! # Lens payment server
//! This crate hosts the HTTP front end for the Lens payment engine. It is responsible for:
//! * Turning plan purchases and renewals into signed ECPay payment forms.
//! * Receiving payment notifications from ECPay and acknowledging them in the format the gateway expects.
//! * Letting users see and manage their subscriptions.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `GET /api/subscription-plans?lensViewId=`: The plans on sale for a lens.
//! * `POST /api/payment/create-payment`: Creates a pending order and returns the payment form.
//! * `POST /api/payment/payment-success`: The result of a payment, for the page the customer returns to.
//! * `GET /api/orders/{order_id}`: A single order.
//! * `GET /api/subscriptions`: All of the current user's subscriptions.
//! * `GET /api/subscriptions/status`: The current user's active subscriptions and how long they have left.
//! * `GET /api/subscriptions/{subscription_id}/orders`: The purchase and renewal orders for a subscription.
//! * `POST /api/subscriptions/cancel`, `/api/subscriptions/auto-renew`, `/api/subscriptions/renew`.
//! * `POST /api/ecpay/notify`: The ECPay payment notification webhook. `GET` on the same path is a liveness probe.
//! * `GET /api/ecpay/status?orderId=`: The stored gateway result for an order.
//!
//! User routes identify the caller by the `lpg_user_id` header, which the session layer in front of this server sets.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod routes;
pub mod server;
pub mod user;

#[cfg(test)]
mod endpoint_tests;
