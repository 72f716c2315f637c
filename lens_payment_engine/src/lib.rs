//! Lens Payment Engine
//!
//! The engine sells time-limited lens subscriptions through the ECPay payment gateway. It contains the core logic and
//! is independent of any web framework.
//!
//! The library is divided into these sections:
//! 1. Data types ([`mod@db_types`]) and the backend contracts ([`mod@traits`]). SQLite is the supported backend. You
//!    should never need to access the database directly; use the public API instead.
//! 2. The gateway client ([`mod@gateway`]), which builds signed payment forms and verifies notifications.
//! 3. Exchange rates ([`mod@exchange_rates`]): a time-bounded cache in front of an upstream rate provider, used to
//!    settle plans priced in US dollars.
//! 4. The public API: [`CheckoutApi`], [`WebhookApi`] and [`SubscriptionApi`].
//!
//! Orders move from `Pending` to either `Paid` or `Failed`, and never back. A subscription only comes into being once
//! its order has been paid.
pub mod db_types;
pub mod exchange_rates;
pub mod gateway;
pub mod helpers;
mod lpe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use lpe_api::{
    billing_objects,
    checkout_api::{CheckoutApi, RenewalResult, RENEWAL_PAYMENT_WINDOW_DAYS},
    errors::{BillingApiError, WebhookRejection},
    subscription_api::{SubscriptionApi, EXPIRY_WARNING_DAYS},
    webhook_api::{WebhookApi, WebhookOutcome, WEBHOOK_ACK},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{BillingDatabase, BillingError, PlanCatalog};
