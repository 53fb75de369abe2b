//! Blocking, cached access to historical bars with shorter-period fallback.
//!
//! The risk pipeline is synchronous, so the accessor owns a current-thread
//! tokio runtime and blocks on the async [`DataProvider`] for each request.
//! Do not call it from inside another tokio runtime.

use chrono::Utc;
use snafu::{ResultExt, Snafu};
use tracing::{debug, info, warn};

use crate::{
    cache::{BarCache, CacheKey},
    models::{
        bar::BarSeries,
        period::{Interval, Lookback},
        request_params::{AssetClass, BarsRequestParams, ProviderParams},
    },
    providers::{DataProvider, ProviderError},
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AccessError {
    /// Every period, including the fallbacks, came back empty.
    #[snafu(display("No data found for ticker: {ticker}"))]
    NoData { ticker: String, tried: Vec<Lookback> },

    /// The provider itself failed.
    #[snafu(display("Failed to fetch data for {ticker}: {source}"))]
    Provider {
        ticker: String,
        #[snafu(backtrace)]
        source: ProviderError,
    },

    #[snafu(display("Failed to start the fetch runtime: {source}"))]
    Runtime { source: std::io::Error },
}

pub struct MarketDataAccessor {
    provider: Box<dyn DataProvider>,
    cache: BarCache,
    runtime: tokio::runtime::Runtime,
    asset_class: AssetClass,
    provider_params: ProviderParams,
}

impl MarketDataAccessor {
    pub fn new(provider: Box<dyn DataProvider>, cache: BarCache) -> Result<Self, AccessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context(RuntimeSnafu)?;
        Ok(Self {
            provider,
            cache,
            runtime,
            asset_class: AssetClass::UsEquity,
            provider_params: ProviderParams::None,
        })
    }

    /// Provider-specific options sent with every request.
    pub fn with_provider_params(mut self, params: ProviderParams) -> Self {
        self.provider_params = params;
        self
    }

    pub fn cache(&self) -> &BarCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut BarCache {
        &mut self.cache
    }

    /// Returns bars for `ticker` over `period`, falling back to shorter
    /// periods when the requested one is empty.
    ///
    /// Successful results are cached under the *requested* period, so a
    /// repeated call never reaches the provider.
    pub fn fetch(
        &mut self,
        ticker: &str,
        period: Lookback,
        interval: &Interval,
    ) -> Result<BarSeries, AccessError> {
        let key = CacheKey::new(ticker, period, interval);
        if let Some(hit) = self.cache.get(&key) {
            debug!(ticker, %period, %interval, "bar cache hit");
            return Ok(hit);
        }

        let mut tried = vec![period];
        let mut series = self.fetch_once(ticker, period, interval)?;
        if series.is_empty() {
            for fallback in period.fallbacks() {
                tried.push(fallback);
                series = self.fetch_once(ticker, fallback, interval)?;
                if !series.is_empty() {
                    info!(ticker, period = %fallback, "Data found with fallback period");
                    break;
                }
            }
        }

        if series.is_empty() {
            warn!(ticker, ?tried, "no bars for any period");
            return NoDataSnafu { ticker, tried }.fail();
        }

        self.cache.put(key, series.clone());
        Ok(series)
    }

    fn fetch_once(
        &self,
        ticker: &str,
        period: Lookback,
        interval: &Interval,
    ) -> Result<BarSeries, AccessError> {
        let end = Utc::now();
        let params =
            BarsRequestParams::single(ticker, interval.timeframe().clone(), period.start_from(end), end)
                .with_asset_class(self.asset_class)
                .with_provider_params(self.provider_params.clone());

        let all = self
            .runtime
            .block_on(self.provider.fetch_bars(params))
            .context(ProviderSnafu { ticker })?;

        let mut series = all
            .into_iter()
            .find(|s| s.symbol.eq_ignore_ascii_case(ticker))
            .unwrap_or_else(|| BarSeries::new(ticker, interval.timeframe().clone(), vec![]));
        series.normalize_order();
        debug!(ticker, %period, bars = series.len(), "fetched bars");
        Ok(series)
    }
}
