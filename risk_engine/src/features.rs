//! Indicator feature frame built from a cleaned bar series.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use market_data_ingestor::models::bar::BarSeries;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::RiskError, indicators as ind};

/// Trading days per year, used to annualise volatility.
const TRADING_DAYS: f64 = 252.0;

/// Derived columns, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Feature {
    DailyReturn,
    Volatility,
    Ma50,
    Ma200,
    Rsi,
    Macd,
    MacdSignal,
    MacdHist,
    BbUpper,
    BbMiddle,
    BbLower,
    PriceToMa50,
    PriceToMa200,
    Roc5,
    Roc10,
    Atr,
    VolumeRoc,
    Obv,
    StochK,
    StochD,
}

impl Feature {
    pub const ALL: [Feature; 20] = [
        Feature::DailyReturn,
        Feature::Volatility,
        Feature::Ma50,
        Feature::Ma200,
        Feature::Rsi,
        Feature::Macd,
        Feature::MacdSignal,
        Feature::MacdHist,
        Feature::BbUpper,
        Feature::BbMiddle,
        Feature::BbLower,
        Feature::PriceToMa50,
        Feature::PriceToMa200,
        Feature::Roc5,
        Feature::Roc10,
        Feature::Atr,
        Feature::VolumeRoc,
        Feature::Obv,
        Feature::StochK,
        Feature::StochD,
    ];

    /// Used when a stored model does not say which features it was fit on.
    pub const DEFAULT_SET: [Feature; 4] = [
        Feature::DailyReturn,
        Feature::Volatility,
        Feature::Ma50,
        Feature::Ma200,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::DailyReturn => "Daily Return",
            Feature::Volatility => "Volatility",
            Feature::Ma50 => "MA50",
            Feature::Ma200 => "MA200",
            Feature::Rsi => "RSI",
            Feature::Macd => "MACD",
            Feature::MacdSignal => "MACD_Signal",
            Feature::MacdHist => "MACD_Hist",
            Feature::BbUpper => "BB_upper",
            Feature::BbMiddle => "BB_middle",
            Feature::BbLower => "BB_lower",
            Feature::PriceToMa50 => "Price_to_MA50",
            Feature::PriceToMa200 => "Price_to_MA200",
            Feature::Roc5 => "ROC_5",
            Feature::Roc10 => "ROC_10",
            Feature::Atr => "ATR",
            Feature::VolumeRoc => "Volume_ROC",
            Feature::Obv => "OBV",
            Feature::StochK => "Stoch_K",
            Feature::StochD => "Stoch_D",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown feature: {0}")]
pub struct UnknownFeature(pub String);

impl FromStr for Feature {
    type Err = UnknownFeature;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| UnknownFeature(s.to_string()))
    }
}

impl TryFrom<String> for Feature {
    type Error = UnknownFeature;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Feature> for String {
    fn from(f: Feature) -> Self {
        f.name().to_string()
    }
}

/// Column names of `features`, in order.
pub fn names(features: &[Feature]) -> Vec<String> {
    features.iter().map(|f| f.name().to_string()).collect()
}

/// Column-oriented table of the rows where every derived value resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub dates: Vec<DateTime<Utc>>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
    columns: IndexMap<Feature, Vec<f64>>,
}

impl FeatureFrame {
    /// Computes all indicators over `series` (oldest first) and keeps the
    /// fully resolved rows.
    pub fn compute(series: &BarSeries) -> Result<Self, RiskError> {
        if series.is_empty() {
            return Err(RiskError::FeatureComputation("empty price series".into()));
        }

        let open: Vec<f64> = series.bars.iter().map(|b| b.open).collect();
        let high: Vec<f64> = series.bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = series.bars.iter().map(|b| b.low).collect();
        let close: Vec<f64> = series.bars.iter().map(|b| b.close).collect();
        let volume: Vec<f64> = series.bars.iter().map(|b| b.volume).collect();

        let daily_return = ind::pct_change(&close, 1);
        let volatility: ind::Series = ind::rolling_std(&daily_return, 21, 1)
            .into_iter()
            .map(|v| v.map(|v| v * TRADING_DAYS.sqrt()))
            .collect();
        let closes = ind::defined(&close);
        let ma50 = ind::sma(&closes, 50);
        let ma200 = ind::sma(&closes, 200);
        let macd = ind::macd(&close, 12, 26, 9);
        let bb = ind::bollinger(&close, 20, 2.0);
        let ratio = |ma: &ind::Series| -> ind::Series {
            close.iter().zip(ma).map(|(c, m)| Some(c / (*m)?)).collect()
        };
        let stoch = ind::stochastic(&high, &low, &close, 14, 3, 3);

        let mut raw: IndexMap<Feature, ind::Series> = IndexMap::with_capacity(Feature::ALL.len());
        raw.insert(Feature::DailyReturn, daily_return);
        raw.insert(Feature::Volatility, volatility);
        raw.insert(Feature::PriceToMa50, ratio(&ma50));
        raw.insert(Feature::PriceToMa200, ratio(&ma200));
        raw.insert(Feature::Ma50, ma50);
        raw.insert(Feature::Ma200, ma200);
        raw.insert(Feature::Rsi, ind::rsi(&close, 14));
        raw.insert(Feature::Macd, macd.line);
        raw.insert(Feature::MacdSignal, macd.signal);
        raw.insert(Feature::MacdHist, macd.histogram);
        raw.insert(Feature::BbUpper, bb.upper);
        raw.insert(Feature::BbMiddle, bb.middle);
        raw.insert(Feature::BbLower, bb.lower);
        raw.insert(Feature::Roc5, ind::pct_change(&close, 5));
        raw.insert(Feature::Roc10, ind::pct_change(&close, 10));
        raw.insert(Feature::Atr, ind::atr(&high, &low, &close, 14));
        raw.insert(Feature::VolumeRoc, ind::pct_change(&volume, 1));
        raw.insert(Feature::Obv, ind::obv(&close, &volume));
        raw.insert(Feature::StochK, stoch.k);
        raw.insert(Feature::StochD, stoch.d);
        raw.sort_keys();

        let keep: Vec<usize> = (0..series.len())
            .filter(|&t| {
                raw.values()
                    .all(|col| col[t].is_some_and(f64::is_finite))
            })
            .collect();

        debug!(
            symbol = %series.symbol,
            input = series.len(),
            kept = keep.len(),
            "computed feature frame"
        );

        if keep.is_empty() {
            return Err(RiskError::FeatureComputation(format!(
                "no rows left after indicator warm-up ({} bars in, 200 needed)",
                series.len()
            )));
        }

        let pick = |v: &[f64]| keep.iter().map(|&t| v[t]).collect::<Vec<_>>();
        let columns = raw
            .into_iter()
            .map(|(f, col)| {
                let vals = keep.iter().filter_map(|&t| col[t]).collect();
                (f, vals)
            })
            .collect();

        Ok(Self {
            dates: keep.iter().map(|&t| series.bars[t].timestamp).collect(),
            open: pick(&open),
            high: pick(&high),
            low: pick(&low),
            close: pick(&close),
            volume: pick(&volume),
            columns,
        })
    }

    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn has(&self, feature: Feature) -> bool {
        self.columns.contains_key(&feature)
    }

    pub fn column(&self, feature: Feature) -> Option<&[f64]> {
        self.columns.get(&feature).map(Vec::as_slice)
    }

    /// Present columns, canonical order.
    pub fn features(&self) -> impl Iterator<Item = Feature> + '_ {
        self.columns.keys().copied()
    }

    /// Value of `feature` at `row`, counting back from the newest row
    /// (`0` is the latest).
    pub fn value_back(&self, feature: Feature, back: usize) -> Option<f64> {
        let col = self.columns.get(&feature)?;
        let idx = col.len().checked_sub(back + 1)?;
        col.get(idx).copied()
    }

    pub fn latest(&self, feature: Feature) -> Option<f64> {
        self.value_back(feature, 0)
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.close.last().copied()
    }

    /// Splits `wanted` into the features this frame carries and the ones it
    /// does not, both in the order given.
    pub fn partition_available(&self, wanted: &[Feature]) -> (Vec<Feature>, Vec<Feature>) {
        wanted.iter().copied().partition(|f| self.has(*f))
    }

    /// The column called `name`, if this frame carries it.
    pub fn lookup(&self, name: &str) -> Option<Feature> {
        name.parse().ok().filter(|f| self.has(*f))
    }

    /// Row-major matrix of the given columns. Columns must be present.
    pub fn matrix(&self, features: &[Feature]) -> Vec<Vec<f64>> {
        let cols: Vec<&[f64]> = features.iter().filter_map(|f| self.column(*f)).collect();
        (0..self.len())
            .map(|t| cols.iter().map(|c| c[t]).collect())
            .collect()
    }

    /// The newest row restricted to `features`, or `None` if any is missing.
    pub fn latest_row(&self, features: &[Feature]) -> Option<Vec<f64>> {
        features.iter().map(|f| self.latest(*f)).collect()
    }

    /// Returns a copy with `feature` removed.
    pub fn without(&self, feature: Feature) -> Self {
        let mut out = self.clone();
        out.columns.shift_remove(&feature);
        out
    }
}
