use std::collections::HashMap;

use thiserror::Error;

/// Conversion rates for one unit of the base currency (USD), keyed by ISO currency code.
pub type LatestRates = HashMap<String, f64>;

#[derive(Debug, Clone, Error)]
pub enum RateProviderError {
    #[error("The rate provider is not configured")]
    NotConfigured,
    #[error("Could not reach the rate provider. {0}")]
    NetworkError(String),
    #[error("The rate provider returned an unsuccessful response: {0}")]
    Unsuccessful(String),
    #[error("The rate provider response did not include a rate for {0}")]
    MissingRate(String),
}

/// An upstream source of USD exchange rates.
#[allow(async_fn_in_trait)]
pub trait RateProvider {
    async fn fetch_latest_rates(&self) -> Result<LatestRates, RateProviderError>;
}
