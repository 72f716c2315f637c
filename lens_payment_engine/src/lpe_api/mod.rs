//! # Lens payment engine public API
//!
//! The `lpe_api` module exposes the programmatic API for the payment engine. The API is modular, so that clients can
//! pick the parts they need.
//!
//! * [`checkout_api`] creates pending orders for plan purchases and renewals, together with the signed gateway forms
//!   that pay for them.
//! * [`webhook_api`] reconciles the gateway's payment notifications with stored orders, creating or extending
//!   subscriptions when payments succeed.
//! * [`subscription_api`] lets customers inspect and manage their subscriptions and orders.
//!
//! # API usage
//!
//! Every API is created by supplying a backend that implements the traits it needs, plus a [`crate::traits::Clock`].
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lens_payment_engine::{traits::SystemClock, SqliteDatabase, SubscriptionApi};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let api = SubscriptionApi::new(db, Arc::new(SystemClock));
//! let overview = api.subscription_status("user-1").await?;
//! ```
pub mod billing_objects;
pub mod checkout_api;
pub mod errors;
pub mod subscription_api;
pub mod webhook_api;
