//! Human-style lookback periods (`1y`, `6mo`, `5d`) and bar intervals (`1d`,
//! `1h`, `1wk`) as accepted by the accessor.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::timeframe::{TimeFrame, TimeFrameError, TimeFrameUnit};

/// How far back from "now" a request reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Lookback {
    Days(u32),
    Months(u32),
    Years(u32),
    /// Everything the provider has.
    Max,
}

/// Shorter periods tried, in order, when the requested one yields no bars.
pub const FALLBACK_PERIODS: [Lookback; 3] =
    [Lookback::Months(6), Lookback::Months(3), Lookback::Months(1)];

impl Lookback {
    /// Start of the window ending at `now`.
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let earliest = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).single();
        match *self {
            Lookback::Days(n) => now - Duration::days(i64::from(n)),
            Lookback::Months(n) => now.checked_sub_months(Months::new(n)).or(earliest).unwrap_or(now),
            Lookback::Years(n) => now
                .checked_sub_months(Months::new(n.saturating_mul(12)))
                .or(earliest)
                .unwrap_or(now),
            Lookback::Max => earliest.unwrap_or(now),
        }
    }

    /// Rough length in days, used only to order periods.
    pub fn approx_days(&self) -> u64 {
        match *self {
            Lookback::Days(n) => u64::from(n),
            Lookback::Months(n) => u64::from(n) * 30,
            Lookback::Years(n) => u64::from(n) * 365,
            Lookback::Max => u64::MAX,
        }
    }

    /// The fallback periods strictly shorter than `self`, longest first.
    pub fn fallbacks(&self) -> impl Iterator<Item = Lookback> + '_ {
        FALLBACK_PERIODS
            .into_iter()
            .filter(move |p| p.approx_days() < self.approx_days())
    }
}

impl Default for Lookback {
    fn default() -> Self {
        Lookback::Years(1)
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookback::Days(n) => write!(f, "{n}d"),
            Lookback::Months(n) => write!(f, "{n}mo"),
            Lookback::Years(n) => write!(f, "{n}y"),
            Lookback::Max => f.write_str("max"),
        }
    }
}

fn split_amount(s: &str) -> Result<(u32, &str), TimeFrameError> {
    let digits = s.chars().take_while(|c| c.is_ascii_digit()).count();
    let (num, unit) = s.split_at(digits);
    let amount = num.parse::<u32>().map_err(|_| TimeFrameError::InvalidInput {
        message: format!("missing amount in '{s}'"),
    })?;
    if amount == 0 {
        return Err(TimeFrameError::InvalidInput {
            message: format!("amount must be positive in '{s}'"),
        });
    }
    Ok((amount, unit))
}

impl FromStr for Lookback {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "max" {
            return Ok(Lookback::Max);
        }
        let (amount, unit) = split_amount(&s)?;
        match unit {
            "d" => Ok(Lookback::Days(amount)),
            "wk" => Ok(Lookback::Days(amount.saturating_mul(7))),
            "mo" => Ok(Lookback::Months(amount)),
            "y" => Ok(Lookback::Years(amount)),
            _ => Err(TimeFrameError::InvalidInput {
                message: format!("unknown period unit in '{s}'"),
            }),
        }
    }
}

impl TryFrom<String> for Lookback {
    type Error = TimeFrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Lookback> for String {
    fn from(value: Lookback) -> Self {
        value.to_string()
    }
}

/// Bar spacing of a request, e.g. `1d`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval(TimeFrame);

impl Interval {
    pub fn daily() -> Self {
        Interval(TimeFrame::day())
    }

    pub fn timeframe(&self) -> &TimeFrame {
        &self.0
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::daily()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let TimeFrame { amount, unit } = &self.0;
        match unit {
            TimeFrameUnit::Minute => write!(f, "{amount}m"),
            TimeFrameUnit::Hour => write!(f, "{amount}h"),
            TimeFrameUnit::Day => write!(f, "{amount}d"),
            TimeFrameUnit::Week => write!(f, "{amount}wk"),
            TimeFrameUnit::Month => write!(f, "{amount}mo"),
        }
    }
}

impl FromStr for Interval {
    type Err = TimeFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let (amount, unit) = split_amount(&s)?;
        let tf = match unit {
            "m" | "min" => TimeFrame::minutes(amount)?,
            "h" => TimeFrame::hours(amount)?,
            "d" => {
                TimeFrame::validate(amount, TimeFrameUnit::Day)?;
                TimeFrame::day()
            }
            "wk" => {
                TimeFrame::validate(amount, TimeFrameUnit::Week)?;
                TimeFrame::week()
            }
            "mo" => TimeFrame::months(amount)?,
            _ => {
                return Err(TimeFrameError::InvalidInput {
                    message: format!("unknown interval unit in '{s}'"),
                });
            }
        };
        Ok(Interval(tf))
    }
}

impl TryFrom<String> for Interval {
    type Error = TimeFrameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_common_periods() {
        assert_eq!("1y".parse::<Lookback>().unwrap(), Lookback::Years(1));
        assert_eq!("6mo".parse::<Lookback>().unwrap(), Lookback::Months(6));
        assert_eq!("5d".parse::<Lookback>().unwrap(), Lookback::Days(5));
        assert_eq!("2wk".parse::<Lookback>().unwrap(), Lookback::Days(14));
        assert_eq!("MAX".parse::<Lookback>().unwrap(), Lookback::Max);
        assert!("0y".parse::<Lookback>().is_err());
        assert!("1fortnight".parse::<Lookback>().is_err());
    }

    #[test]
    fn fallbacks_are_strictly_shorter() {
        let from_year: Vec<_> = Lookback::Years(1).fallbacks().collect();
        assert_eq!(from_year, FALLBACK_PERIODS.to_vec());

        let from_quarter: Vec<_> = Lookback::Months(3).fallbacks().collect();
        assert_eq!(from_quarter, vec![Lookback::Months(1)]);

        assert_eq!(Lookback::Days(10).fallbacks().count(), 0);
    }

    #[test]
    fn start_is_before_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        assert_eq!(
            Lookback::Months(1).start_from(now),
            Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
        );
        assert_eq!(
            Lookback::Years(1).start_from(now),
            Utc.with_ymd_and_hms(2023, 3, 31, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn intervals_round_trip_through_strings() {
        for raw in ["1d", "1h", "15m", "1wk", "3mo"] {
            let interval: Interval = raw.parse().unwrap();
            assert_eq!(interval.to_string(), raw);
        }
        assert!("2d".parse::<Interval>().is_err());
    }
}
