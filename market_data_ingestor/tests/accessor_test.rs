use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use market_data_ingestor::{
    accessor::{AccessError, MarketDataAccessor},
    cache::{BarCache, CacheKey},
    models::{
        bar::{Bar, BarSeries},
        period::{Interval, Lookback},
        request_params::BarsRequestParams,
    },
    providers::{DataProvider, InternalSnafu, ProviderError},
};

/// Records every request and answers with bars only for spans up to
/// `max_days` long, mimicking a listing that is younger than the request.
struct ScriptedProvider {
    calls: Arc<AtomicUsize>,
    spans: Arc<Mutex<Vec<i64>>>,
    max_days: i64,
}

#[async_trait]
impl DataProvider for ScriptedProvider {
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let span = (params.end - params.start).num_days();
        self.spans.lock().unwrap().push(span);
        if span > self.max_days {
            return Ok(vec![]);
        }
        let origin = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        // deliberately newest first with a duplicate, to exercise normalisation
        let bars = vec![
            Bar::ohlcv(origin + Duration::days(2), 12.0, 13.0, 11.0, 12.5, 900.0),
            Bar::ohlcv(origin + Duration::days(1), 11.0, 12.0, 10.0, 11.5, 800.0),
            Bar::ohlcv(origin, 10.0, 11.0, 9.0, 10.5, 700.0),
            Bar::ohlcv(origin + Duration::days(1), 11.0, 12.0, 10.0, 11.7, 850.0),
        ];
        Ok(params
            .symbols
            .into_iter()
            .map(|s| BarSeries::new(s, params.timeframe.clone(), bars.clone()))
            .collect())
    }
}

struct BrokenProvider;

#[async_trait]
impl DataProvider for BrokenProvider {
    async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
        InternalSnafu { message: "upstream down" }.fail()
    }
}

fn scripted(max_days: i64) -> (MarketDataAccessor, Arc<AtomicUsize>, Arc<Mutex<Vec<i64>>>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let spans = Arc::new(Mutex::new(Vec::new()));
    let provider = ScriptedProvider {
        calls: calls.clone(),
        spans: spans.clone(),
        max_days,
    };
    let accessor = MarketDataAccessor::new(Box::new(provider), BarCache::default()).unwrap();
    (accessor, calls, spans)
}

#[test]
fn returns_requested_period_when_available() {
    let (mut accessor, calls, _) = scripted(10_000);
    let series = accessor
        .fetch("AAPL", Lookback::Years(1), &Interval::daily())
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(series.symbol, "AAPL");
    assert_eq!(series.len(), 3, "duplicate timestamp should collapse");
    let stamps: Vec<_> = series.bars.iter().map(|b| b.timestamp).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    // last occurrence of the duplicated timestamp wins
    assert_eq!(series.bars[1].close, 11.7);
}

#[test]
fn falls_back_to_shorter_periods_in_order() {
    // only spans of about three months or less have data
    let (mut accessor, calls, spans) = scripted(95);
    let series = accessor
        .fetch("NEWCO", Lookback::Years(1), &Interval::daily())
        .unwrap();

    assert!(!series.is_empty());
    // 1y, then 6mo (empty), then 3mo (hit)
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let spans = spans.lock().unwrap();
    assert!(spans[0] > spans[1] && spans[1] > spans[2]);
}

#[test]
fn short_requests_do_not_fall_back_to_longer_periods() {
    let (mut accessor, calls, _) = scripted(0);
    let err = accessor
        .fetch("NEWCO", Lookback::Months(3), &Interval::daily())
        .unwrap_err();

    // 3mo, then only 1mo is shorter
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    match err {
        AccessError::NoData { ticker, tried } => {
            assert_eq!(ticker, "NEWCO");
            assert_eq!(tried, vec![Lookback::Months(3), Lookback::Months(1)]);
        }
        other => panic!("expected NoData, got {other:?}"),
    }
}

#[test]
fn no_data_message_names_the_ticker() {
    let (mut accessor, calls, _) = scripted(-1);
    let err = accessor
        .fetch("ZZZZ", Lookback::Years(1), &Interval::daily())
        .unwrap_err();
    assert_eq!(err.to_string(), "No data found for ticker: ZZZZ");
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[test]
fn repeated_fetch_is_served_from_cache() {
    let (mut accessor, calls, _) = scripted(10_000);
    let first = accessor
        .fetch("AAPL", Lookback::Years(1), &Interval::daily())
        .unwrap();
    let second = accessor
        .fetch("AAPL", Lookback::Years(1), &Interval::daily())
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(
        accessor
            .cache()
            .contains(&CacheKey::new("AAPL", Lookback::Years(1), &Interval::daily()))
    );
}

#[test]
fn failed_fetches_are_not_cached() {
    let (mut accessor, calls, _) = scripted(-1);
    assert!(accessor.fetch("ZZZZ", Lookback::Years(1), &Interval::daily()).is_err());
    assert!(accessor.cache().is_empty());
    assert!(accessor.fetch("ZZZZ", Lookback::Years(1), &Interval::daily()).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[test]
fn provider_errors_are_surfaced() {
    let mut accessor = MarketDataAccessor::new(Box::new(BrokenProvider), BarCache::default()).unwrap();
    let err = accessor
        .fetch("AAPL", Lookback::Years(1), &Interval::daily())
        .unwrap_err();
    assert!(matches!(err, AccessError::Provider { .. }));
    assert!(err.to_string().contains("upstream down"));
}
