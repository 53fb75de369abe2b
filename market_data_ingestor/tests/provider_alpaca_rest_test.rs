//! Live checks against the Alpaca data API. Ignored by default; run with
//! `--ignored` and `APCA_API_KEY_ID` / `APCA_API_SECRET_KEY` set.

use market_data_ingestor::{
    accessor::MarketDataAccessor,
    cache::BarCache,
    models::period::{Interval, Lookback},
    providers::alpaca_rest::AlpacaProvider,
};
use serial_test::serial;

fn keys_present() -> bool {
    std::env::var("APCA_API_KEY_ID").is_ok() && std::env::var("APCA_API_SECRET_KEY").is_ok()
}

#[test]
#[serial]
#[ignore]
fn accessor_fetches_a_month_of_daily_bars() {
    if !keys_present() {
        eprintln!("skipping: Alpaca API keys not set");
        return;
    }

    let provider = AlpacaProvider::new().expect("alpaca provider");
    let mut accessor = MarketDataAccessor::new(Box::new(provider), BarCache::default()).unwrap();

    let series = accessor
        .fetch("AAPL", Lookback::Months(1), &Interval::daily())
        .expect("AAPL should have recent bars");

    assert_eq!(series.symbol, "AAPL");
    assert!(series.len() >= 10, "a month of trading days, got {}", series.len());
    assert!(
        series.bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp),
        "bars come back oldest first without duplicates"
    );
    assert!(series.bars.iter().all(|b| b.is_complete()));
}

#[test]
#[serial]
#[ignore]
fn unknown_symbol_reports_no_data() {
    if !keys_present() {
        eprintln!("skipping: Alpaca API keys not set");
        return;
    }

    let provider = AlpacaProvider::new().expect("alpaca provider");
    let mut accessor = MarketDataAccessor::new(Box::new(provider), BarCache::default()).unwrap();

    let err = accessor
        .fetch("ZZZZQQ", Lookback::Days(5), &Interval::daily())
        .unwrap_err();
    assert!(err.to_string().contains("ZZZZQQ"), "{err}");
}
