//! Currency conversion for plans priced outside the settlement currency.
//!
//! [`RateCache`] keeps the latest USD rates for one hour, and degrades to a fixed fallback rate rather than failing
//! when the upstream provider is unreachable. [`ExchangeRateClient`] is the production [`RateProvider`].
//!
//! [`RateProvider`]: crate::traits::RateProvider
mod client;
mod rate_cache;

pub use client::{ExchangeRateClient, ExchangeRateConfig, DEFAULT_EXCHANGE_RATE_API_URL};
pub use rate_cache::{Conversion, RateCache, RateSnapshot, FALLBACK_TWD_RATE, RATE_TTL_SECS};
