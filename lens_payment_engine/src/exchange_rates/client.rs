use std::{collections::HashMap, fmt::Debug, sync::Arc};

use log::*;
use lpg_common::Secret;
use reqwest::Client;
use serde::Deserialize;

use crate::traits::{LatestRates, RateProvider, RateProviderError};

pub const DEFAULT_EXCHANGE_RATE_API_URL: &str = "https://v6.exchangerate-api.com/v6";

#[derive(Clone, Default)]
pub struct ExchangeRateConfig {
    pub api_key: Secret<String>,
    pub api_url: String,
}

impl Debug for ExchangeRateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRateConfig").field("api_key", &self.api_key).field("api_url", &self.api_url).finish()
    }
}

impl ExchangeRateConfig {
    pub fn new(api_key: &str, api_url: &str) -> Self {
        Self { api_key: Secret::new(api_key.to_string()), api_url: api_url.trim_end_matches('/').to_string() }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.reveal().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: String,
    #[serde(default)]
    conversion_rates: HashMap<String, f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

/// Fetches the latest USD rates from an exchangerate-api.com compatible service.
#[derive(Clone)]
pub struct ExchangeRateClient {
    config: ExchangeRateConfig,
    client: Arc<Client>,
}

impl Debug for ExchangeRateClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeRateClient({:?})", self.config)
    }
}

impl ExchangeRateClient {
    pub fn new(config: ExchangeRateConfig) -> Self {
        if !config.is_configured() {
            warn!("💱️ No exchange rate API key has been set. The fallback rate will be used for all conversions.");
        }
        Self { config, client: Arc::new(Client::new()) }
    }

    fn url(&self) -> String {
        format!("{}/{}/latest/USD", self.config.api_url, self.config.api_key.reveal())
    }
}

impl RateProvider for ExchangeRateClient {
    async fn fetch_latest_rates(&self) -> Result<LatestRates, RateProviderError> {
        if !self.config.is_configured() {
            return Err(RateProviderError::NotConfigured);
        }
        trace!("💱️ Fetching latest USD rates");
        let response =
            self.client.get(self.url()).send().await.map_err(|e| RateProviderError::NetworkError(e.to_string()))?;
        let status = response.status();
        let body = response
            .json::<LatestRatesResponse>()
            .await
            .map_err(|e| RateProviderError::Unsuccessful(format!("HTTP {status}. {e}")))?;
        if body.result != "success" {
            let reason = body.error_type.unwrap_or(body.result);
            return Err(RateProviderError::Unsuccessful(reason));
        }
        debug!("💱️ Fetched {} USD rates", body.conversion_rates.len());
        Ok(body.conversion_rates)
    }
}
