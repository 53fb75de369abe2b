#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use market_data_ingestor::{
    models::{
        bar::{Bar, BarSeries},
        request_params::BarsRequestParams,
        timeframe::TimeFrame,
    },
    providers::{DataProvider, ProviderError},
};
use risk_engine::{
    RiskConfig,
    forest::{Criterion, MaxFeatures},
    search::ParamGrid,
};

/// Serves the same closes for every request, ignoring the date range.
pub struct FixedProvider {
    closes: Vec<f64>,
    calls: Arc<AtomicUsize>,
}

impl FixedProvider {
    pub fn new(closes: Vec<f64>) -> Self {
        Self {
            closes,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl DataProvider for FixedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(params
            .symbols
            .into_iter()
            .map(|s| series(&s, &self.closes))
            .collect())
    }
}

pub fn series(symbol: &str, closes: &[f64]) -> BarSeries {
    let origin = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::ohlcv(origin + Duration::days(i as i64), c, c + 0.5, c - 0.5, c, 1_000.0))
        .collect();
    BarSeries::new(symbol, TimeFrame::day(), bars)
}

/// Three steps up, one down, repeated: an uptrend with RSI near 75.
pub fn choppy_uptrend(n: usize) -> Vec<f64> {
    let mut price = 100.0;
    (0..n)
        .map(|i| {
            if i > 0 {
                price += if i % 4 == 0 { -1.0 } else { 1.0 };
            }
            price
        })
        .collect()
}

/// Default settings with a one-candidate grid so tests train quickly.
pub fn light_config(models_dir: &std::path::Path) -> RiskConfig {
    RiskConfig {
        models_dir: models_dir.to_path_buf(),
        grid: ParamGrid {
            n_estimators: vec![5],
            max_features: vec![MaxFeatures::Sqrt],
            criterion: vec![Criterion::Gini],
        },
        ..RiskConfig::default()
    }
}
