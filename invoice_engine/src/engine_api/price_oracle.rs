use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::traits::PriceSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotPrice {
    pub price: Decimal,
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

/// A single cached spot price with a time-to-live.
#[derive(Debug, Clone)]
pub struct PriceCache {
    value: Option<SpotPrice>,
    fetched_at: Option<DateTime<Utc>>,
    ttl: Duration,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self { value: None, fetched_at: None, ttl }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            Some(t) => now - t >= self.ttl,
            None => true,
        }
    }

    /// The cached price, if it is still fresh.
    pub fn current(&self, now: DateTime<Utc>) -> Option<&SpotPrice> {
        if self.is_stale(now) {
            None
        } else {
            self.value.as_ref()
        }
    }

    pub fn store(&mut self, price: SpotPrice) {
        self.fetched_at = Some(price.fetched_at);
        self.value = Some(price);
    }
}

/// Supplies spot prices from an ordered list of providers, caching the first good answer.
///
/// Cloning an oracle shares its cache, so one oracle can be built at startup and handed to every worker. A stale price
/// is never used as a fallback: if every provider fails, there is no price.
pub struct PriceOracle<S> {
    sources: Arc<Vec<S>>,
    cache: Arc<Mutex<PriceCache>>,
}

impl<S> Clone for PriceOracle<S> {
    fn clone(&self) -> Self {
        Self { sources: Arc::clone(&self.sources), cache: Arc::clone(&self.cache) }
    }
}

impl<S> std::fmt::Debug for PriceOracle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PriceOracle({} sources)", self.sources.len())
    }
}

impl<S: PriceSource> PriceOracle<S> {
    pub fn new(sources: Vec<S>, ttl: Duration) -> Self {
        Self { sources: Arc::new(sources), cache: Arc::new(Mutex::new(PriceCache::new(ttl))) }
    }

    pub async fn spot_price(&self) -> Option<SpotPrice> {
        self.refresh_if_stale().await
    }

    /// Returns the cached price if it is fresh, otherwise asks each provider in turn. The lock is held for the
    /// refresh, so concurrent callers wait for one fetch instead of all hitting the providers.
    pub async fn refresh_if_stale(&self) -> Option<SpotPrice> {
        let mut cache = self.cache.lock().await;
        let now = Utc::now();
        if let Some(price) = cache.current(now) {
            trace!("💱️ Using cached spot price {} from {}", price.price, price.source);
            return Some(price.clone());
        }
        for source in self.sources.iter() {
            let name = source.name();
            match source.fetch_spot_price().await {
                Ok(price) if price > Decimal::ZERO => {
                    debug!("💱️ Fetched spot price {price} from {name}");
                    let spot = SpotPrice { price, source: name, fetched_at: Utc::now() };
                    cache.store(spot.clone());
                    return Some(spot);
                },
                Ok(price) => warn!("💱️ {name} returned a non-positive price ({price}). Trying the next provider."),
                Err(e) => warn!("💱️ Could not fetch a spot price from {name}. {e}"),
            }
        }
        error!("💱️ No price provider returned a usable spot price.");
        None
    }
}
