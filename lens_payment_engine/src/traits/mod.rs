//! # Backend contracts
//!
//! This module defines the behaviour that storage backends and external collaborators must expose to be driven by
//! the engine APIs.
//!
//! * [`BillingDatabase`] owns orders and subscriptions, and performs the state transitions atomically.
//! * [`PlanCatalog`] is the read-only view onto the subscription plans on sale.
//! * [`RateProvider`] fetches the latest foreign exchange rates from an upstream service.
//! * [`Clock`] supplies the current time, so that expiry and TTL logic can be tested deterministically.
mod billing_database;
mod clock;
mod plan_catalog;
mod rate_provider;

pub(crate) use billing_database::is_unique_violation;
pub use billing_database::{BillingDatabase, BillingError, Entitlement, SettlementResult};
pub use clock::{Clock, FixedClock, SystemClock};
pub use plan_catalog::{CatalogError, PlanCatalog};
pub use rate_provider::{LatestRates, RateProvider, RateProviderError};
