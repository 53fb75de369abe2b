//! Bounded, least-recently-used cache of fetched bar series.
//!
//! Owned by a [`MarketDataAccessor`](crate::accessor::MarketDataAccessor)
//! rather than living in a global, so tests can inspect or replace it.
//! Entries never expire; they only fall out when capacity is exceeded.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::models::{
    bar::BarSeries,
    period::{Interval, Lookback},
};

/// Default number of `(ticker, period, interval)` entries kept.
pub const DEFAULT_CAPACITY: usize = 32;

/// Identity of one fetch request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ticker: String,
    pub period: Lookback,
    pub interval: Interval,
}

impl CacheKey {
    pub fn new(ticker: &str, period: Lookback, interval: &Interval) -> Self {
        Self {
            ticker: ticker.to_string(),
            period,
            interval: interval.clone(),
        }
    }
}

pub struct BarCache {
    entries: LruCache<CacheKey, BarSeries>,
}

impl BarCache {
    /// A capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(cap),
        }
    }

    /// Returns a copy of the cached series and marks it most recently used.
    pub fn get(&mut self, key: &CacheKey) -> Option<BarSeries> {
        self.entries.get(key).cloned()
    }

    pub fn put(&mut self, key: CacheKey, series: BarSeries) {
        self.entries.put(key, series);
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for BarCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
