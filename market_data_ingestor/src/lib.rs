//! Market data access for the risk pipeline.
//!
//! - [`models`]: vendor-agnostic OHLCV bars, timeframes and request params.
//! - [`providers`]: the [`DataProvider`](providers::DataProvider) seam and the
//!   Alpaca REST implementation.
//! - [`accessor`]: blocking, cached, fallback-aware access used by the analyzer.

pub mod accessor;
pub mod cache;
pub mod models;
pub mod providers;
