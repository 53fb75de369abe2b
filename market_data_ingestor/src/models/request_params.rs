use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{models::timeframe::TimeFrame, providers::alpaca_rest::params::AlpacaBarsParams};

/// Asset class of the requested symbols; lets providers route to the right endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    #[default]
    UsEquity,
    Futures,
}

/// Universal parameters for requesting time-series bar data from any market data provider.
///
/// It is the standard input for all [`DataProvider`](crate::providers::DataProvider)
/// implementations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BarsRequestParams {
    /// List of symbols to request (e.g., `["AAPL"]`, `["ESU24"]`).
    pub symbols: Vec<String>,

    /// The time interval for each bar (e.g., 1 minute, 1 day).
    ///
    /// **Validation of allowed values is performed by each data provider
    /// implementation, according to their own API rules.**
    pub timeframe: TimeFrame,

    /// Start of the requested time range (inclusive, UTC).
    pub start: DateTime<Utc>,

    /// End of the requested time range (exclusive, UTC).
    pub end: DateTime<Utc>,

    pub asset_class: AssetClass,

    /// Optional, provider-specific parameters.
    #[serde(default)]
    pub provider_specific: ProviderParams,
}

impl BarsRequestParams {
    /// One symbol over `[start, end)`, US equity, no provider extras.
    pub fn single(
        symbol: impl Into<String>,
        timeframe: TimeFrame,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            symbols: vec![symbol.into()],
            timeframe,
            start,
            end,
            asset_class: AssetClass::default(),
            provider_specific: ProviderParams::None,
        }
    }

    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = asset_class;
        self
    }

    pub fn with_provider_params(mut self, params: ProviderParams) -> Self {
        self.provider_specific = params;
        self
    }
}

/// Per-provider request options that don't belong in the universal params.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ProviderParams {
    #[default]
    None,
    Alpaca(AlpacaBarsParams),
}
