//! Plain-language readings of the latest indicator values.
//!
//! Each reading falls back to `Unknown` when a column it needs is missing
//! from the frame.

use serde::Serialize;

use crate::features::{Feature, FeatureFrame};

macro_rules! labelled {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

labelled!(RsiStatus {
    Overbought => "Overbought",
    Oversold => "Oversold",
    Neutral => "Neutral",
    Unknown => "Unknown",
});

labelled!(MacdSignal {
    Bullish => "Bullish",
    Bearish => "Bearish",
    Unknown => "Unknown",
});

labelled!(PricePosition {
    AboveBoth => "Above both MAs",
    BelowBoth => "Below both MAs",
    Between => "Between MAs",
    Unknown => "Unknown",
});

labelled!(
    /// MA50 against MA200, with a cross flagged when the relation flipped
    /// on the latest bar.
    Trend {
        GoldenCross => "Golden Cross (Strongly Bullish)",
        Bullish => "Bullish",
        DeathCross => "Death Cross (Strongly Bearish)",
        Bearish => "Bearish",
        Unknown => "Unknown",
    }
);

labelled!(BandPosition {
    AboveUpper => "Above upper band",
    BelowLower => "Below lower band",
    Within => "Within bands",
    Unknown => "Unknown",
});

labelled!(StochasticSignal {
    StronglyOverbought => "Strongly Overbought",
    StronglyOversold => "Strongly Oversold",
    RisingMomentum => "Rising Momentum",
    FallingMomentum => "Falling Momentum",
    Neutral => "Neutral",
    Unknown => "Unknown",
});

pub fn rsi_status(rsi: Option<f64>) -> RsiStatus {
    match rsi {
        Some(v) if v > 70.0 => RsiStatus::Overbought,
        Some(v) if v < 30.0 => RsiStatus::Oversold,
        Some(_) => RsiStatus::Neutral,
        None => RsiStatus::Unknown,
    }
}

pub fn macd_signal(macd: Option<f64>, signal: Option<f64>) -> MacdSignal {
    let Some(m) = macd else {
        return MacdSignal::Unknown;
    };
    let bullish = match signal {
        Some(s) => m > s,
        None => m > 0.0,
    };
    if bullish { MacdSignal::Bullish } else { MacdSignal::Bearish }
}

pub fn price_position(close: f64, ma50: Option<f64>, ma200: Option<f64>) -> PricePosition {
    let (Some(a), Some(b)) = (ma50, ma200) else {
        return PricePosition::Unknown;
    };
    if close > a && close > b {
        PricePosition::AboveBoth
    } else if close < a && close < b {
        PricePosition::BelowBoth
    } else {
        PricePosition::Between
    }
}

/// `latest` and `previous` are `(ma50, ma200)` pairs. Without a previous
/// bar no cross can be detected.
pub fn trend(latest: Option<(f64, f64)>, previous: Option<(f64, f64)>) -> Trend {
    let Some((ma50, ma200)) = latest else {
        return Trend::Unknown;
    };
    if ma50 > ma200 {
        match previous {
            Some((p50, p200)) if p50 <= p200 => Trend::GoldenCross,
            _ => Trend::Bullish,
        }
    } else {
        match previous {
            Some((p50, p200)) if p50 >= p200 => Trend::DeathCross,
            _ => Trend::Bearish,
        }
    }
}

pub fn band_position(close: f64, upper: Option<f64>, lower: Option<f64>) -> BandPosition {
    let (Some(u), Some(l)) = (upper, lower) else {
        return BandPosition::Unknown;
    };
    if close > u {
        BandPosition::AboveUpper
    } else if close < l {
        BandPosition::BelowLower
    } else {
        BandPosition::Within
    }
}

pub fn stochastic_signal(k: Option<f64>, d: Option<f64>) -> StochasticSignal {
    let (Some(k), Some(d)) = (k, d) else {
        return StochasticSignal::Unknown;
    };
    if k > 80.0 && d > 80.0 {
        StochasticSignal::StronglyOverbought
    } else if k < 20.0 && d < 20.0 {
        StochasticSignal::StronglyOversold
    } else if k > d && k < 80.0 {
        StochasticSignal::RisingMomentum
    } else if k < d && k > 20.0 {
        StochasticSignal::FallingMomentum
    } else {
        StochasticSignal::Neutral
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSnapshot {
    pub rsi_value: Option<f64>,
    pub rsi_status: RsiStatus,
    pub macd_signal: MacdSignal,
    pub price_position: PricePosition,
    pub trend: Trend,
    pub bollinger_band_position: BandPosition,
    pub stochastic_signal: StochasticSignal,
}

impl SignalSnapshot {
    /// Reads the newest row. `None` only for an empty frame.
    pub fn from_frame(frame: &FeatureFrame) -> Option<Self> {
        let close = frame.latest_close()?;
        let ma_pair = |back: usize| {
            Some((
                frame.value_back(Feature::Ma50, back)?,
                frame.value_back(Feature::Ma200, back)?,
            ))
        };
        let rsi_value = frame.latest(Feature::Rsi);

        Some(Self {
            rsi_value,
            rsi_status: rsi_status(rsi_value),
            macd_signal: macd_signal(frame.latest(Feature::Macd), frame.latest(Feature::MacdSignal)),
            price_position: price_position(
                close,
                frame.latest(Feature::Ma50),
                frame.latest(Feature::Ma200),
            ),
            trend: trend(ma_pair(0), ma_pair(1)),
            bollinger_band_position: band_position(
                close,
                frame.latest(Feature::BbUpper),
                frame.latest(Feature::BbLower),
            ),
            stochastic_signal: stochastic_signal(
                frame.latest(Feature::StochK),
                frame.latest(Feature::StochD),
            ),
        })
    }
}
