//! Provider abstraction for market data sources.
//!
//! [`DataProvider`] is the single seam between the risk pipeline and any
//! market data vendor. Each vendor (currently Alpaca) implements it with its
//! own API logic and validation, and the accessor only ever sees
//! `dyn DataProvider`.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use market_data_ingestor::models::{bar::BarSeries, request_params::BarsRequestParams};
//! use market_data_ingestor::providers::{DataProvider, ProviderError};
//!
//! struct EmptyProvider;
//!
//! #[async_trait]
//! impl DataProvider for EmptyProvider {
//!     async fn fetch_bars(
//!         &self,
//!         _params: BarsRequestParams,
//!     ) -> Result<Vec<BarSeries>, ProviderError> {
//!         Ok(vec![])
//!     }
//! }
//! ```

pub mod alpaca_rest;

use async_trait::async_trait;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{bar::BarSeries, request_params::BarsRequestParams};

/// Trait for fetching time-series bar data from a market data provider.
#[async_trait]
pub trait DataProvider: Send + Sync {
    /// Fetches bars for every symbol in `params`.
    ///
    /// Returns one [`BarSeries`] per symbol that had data; symbols without
    /// bars may be absent from the result.
    async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// missed environment variable.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// API key contains invalid characters.
    #[snafu(display("Invalid API key format: {source}"))]
    InvalidApiKey {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `DataProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// An error during an API request (e.g., network failure, timeout).
    #[snafu(display("API request failed: {source}"))]
    Reqwest {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The provider's API returned a specific error message (e.g., invalid API key).
    #[snafu(display("API error ({status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An internal error occurred while processing data within the provider.
    #[snafu(display("Internal provider error: {message}"))]
    Internal {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::models::timeframe::TimeFrame;

    use super::*;

    struct FixedProvider;
    struct FailingProvider;

    #[async_trait]
    impl DataProvider for FixedProvider {
        async fn fetch_bars(&self, params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
            Ok(params
                .symbols
                .into_iter()
                .map(|s| BarSeries::new(s, params.timeframe.clone(), vec![]))
                .collect())
        }
    }

    #[async_trait]
    impl DataProvider for FailingProvider {
        async fn fetch_bars(&self, _params: BarsRequestParams) -> Result<Vec<BarSeries>, ProviderError> {
            InternalSnafu { message: "boom" }.fail()
        }
    }

    // The provider is picked at runtime, which only works through `Box<dyn DataProvider>`.
    fn get_provider(name: &str) -> Box<dyn DataProvider> {
        if name == "fixed" {
            Box::new(FixedProvider)
        } else {
            Box::new(FailingProvider)
        }
    }

    fn params() -> BarsRequestParams {
        BarsRequestParams::single("AAPL", TimeFrame::day(), Utc::now(), Utc::now())
    }

    #[tokio::test]
    async fn test_dynamic_provider() {
        let series = get_provider("fixed").fetch_bars(params()).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].symbol, "AAPL");

        let err = get_provider("failing").fetch_bars(params()).await.unwrap_err();
        assert_eq!(err.to_string(), "Internal provider error: boom");
    }
}
