use std::{
    fmt::Debug,
    sync::{Arc, RwLock},
};

use chrono::{DateTime, Utc};
use log::*;
use lpg_common::{Twd, SETTLEMENT_CURRENCY};

use crate::traits::{Clock, LatestRates, RateProvider, RateProviderError};

/// How long a fetched set of rates stays valid, in seconds.
pub const RATE_TTL_SECS: i64 = 3600;
/// TWD per USD, used whenever no fresh rate is available.
pub const FALLBACK_TWD_RATE: f64 = 30.0;

/// A set of rates and the time they were fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct RateSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub rates: LatestRates,
}

impl RateSnapshot {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        (now - self.fetched_at).num_seconds() < RATE_TTL_SECS
    }

    /// The settlement rate, if the snapshot has a usable one.
    pub fn settlement_rate(&self) -> Option<f64> {
        self.rates.get(SETTLEMENT_CURRENCY).copied().filter(|r| r.is_finite() && *r > 0.0)
    }
}

/// The result of converting a USD amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conversion {
    pub amount: Twd,
    pub rate: f64,
}

/// A time-bounded, process-wide cache of the USD to TWD rate.
///
/// Clones share the same slot. The lock is only held to copy the snapshot in or out, never across a fetch, so
/// concurrent refreshes may race; the last one to finish wins.
pub struct RateCache<R> {
    provider: Arc<R>,
    clock: Arc<dyn Clock>,
    slot: Arc<RwLock<Option<RateSnapshot>>>,
}

impl<R> Clone for RateCache<R> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider), clock: Arc::clone(&self.clock), slot: Arc::clone(&self.slot) }
    }
}

impl<R> Debug for RateCache<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RateCache")
    }
}

impl<R: RateProvider> RateCache<R> {
    pub fn new(provider: R, clock: Arc<dyn Clock>) -> Self {
        Self { provider: Arc::new(provider), clock, slot: Arc::new(RwLock::new(None)) }
    }

    /// The current snapshot, whether fresh or not.
    pub fn snapshot(&self) -> Option<RateSnapshot> {
        match self.slot.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store(&self, snapshot: RateSnapshot) {
        match self.slot.write() {
            Ok(mut guard) => *guard = Some(snapshot),
            Err(poisoned) => *poisoned.into_inner() = Some(snapshot),
        }
    }

    /// Returns TWD per USD.
    ///
    /// A cached rate younger than [`RATE_TTL_SECS`] is returned as is. Otherwise the provider is asked for fresh rates,
    /// which are cached on success. Any failure yields [`FALLBACK_TWD_RATE`], which is never cached.
    pub async fn get_rate(&self) -> f64 {
        let now = self.clock.now();
        if let Some(rate) = self.snapshot().filter(|s| s.is_fresh(now)).and_then(|s| s.settlement_rate()) {
            trace!("💱️ Using cached rate {rate}");
            return rate;
        }
        match self.refresh(now).await {
            Ok(rate) => rate,
            Err(RateProviderError::NotConfigured) => {
                debug!("💱️ Rate provider not configured. Using fallback rate {FALLBACK_TWD_RATE}");
                FALLBACK_TWD_RATE
            },
            Err(e) => {
                warn!("💱️ Could not refresh exchange rates. Using fallback rate {FALLBACK_TWD_RATE}. {e}");
                FALLBACK_TWD_RATE
            },
        }
    }

    async fn refresh(&self, now: DateTime<Utc>) -> Result<f64, RateProviderError> {
        let rates = self.provider.fetch_latest_rates().await?;
        let snapshot = RateSnapshot { fetched_at: now, rates };
        let rate =
            snapshot.settlement_rate().ok_or_else(|| RateProviderError::MissingRate(SETTLEMENT_CURRENCY.into()))?;
        self.store(snapshot);
        info!("💱️ Exchange rates refreshed. 1 USD = {rate} {SETTLEMENT_CURRENCY}");
        Ok(rate)
    }

    /// Converts a USD amount into a whole, non-negative TWD amount, also reporting the rate used.
    pub async fn convert_with_rate(&self, amount_usd: f64) -> Conversion {
        let rate = self.get_rate().await;
        Conversion { amount: Twd::from_price(amount_usd * rate), rate }
    }

    pub async fn convert(&self, amount_usd: f64) -> Twd {
        self.convert_with_rate(amount_usd).await.amount
    }
}
