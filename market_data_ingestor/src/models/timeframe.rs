use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TimeFrameError {
    #[error("Invalid amount for {:?}: {}", unit, message)]
    InvalidAmount {
        unit: TimeFrameUnit,
        message: String,
    },

    #[error("Invalid input: {}", message)]
    InvalidInput { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeFrameUnit {
    Minute,
    Hour,
    Day,
    Week,
    Month,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeFrame {
    pub amount: u32,
    pub unit: TimeFrameUnit,
}

impl TimeFrame {
    /// Builds a timeframe without validation. Providers validate against
    /// their own API rules.
    pub fn new(amount: u32, unit: TimeFrameUnit) -> Self {
        Self { amount, unit }
    }

    pub fn minutes(amount: u32) -> Result<Self, TimeFrameError> {
        Self::validated(amount, TimeFrameUnit::Minute)
    }

    pub fn hours(amount: u32) -> Result<Self, TimeFrameError> {
        Self::validated(amount, TimeFrameUnit::Hour)
    }

    pub fn day() -> Self {
        Self::new(1, TimeFrameUnit::Day)
    }

    pub fn week() -> Self {
        Self::new(1, TimeFrameUnit::Week)
    }

    pub fn months(amount: u32) -> Result<Self, TimeFrameError> {
        Self::validated(amount, TimeFrameUnit::Month)
    }

    fn validated(amount: u32, unit: TimeFrameUnit) -> Result<Self, TimeFrameError> {
        Self::validate(amount, unit)?;
        Ok(Self { amount, unit })
    }

    /// Generic amount/unit rules shared by most bar APIs.
    pub fn validate(amount: u32, unit: TimeFrameUnit) -> Result<(), TimeFrameError> {
        match unit {
            TimeFrameUnit::Minute if !(1..=59).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Second or Minute units can only be used with amounts between 1-59."
                        .into(),
                })
            }
            TimeFrameUnit::Hour if !(1..=23).contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Hour units can only be used with amounts 1-23".into(),
                })
            }
            TimeFrameUnit::Day | TimeFrameUnit::Week if amount != 1 => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Day and Week units can only be used with amount 1".into(),
                })
            }
            TimeFrameUnit::Month if ![1, 2, 3, 6, 12].contains(&amount) => {
                Err(TimeFrameError::InvalidAmount {
                    unit,
                    message: "Month units can only be used with amount 1, 2, 3, 6 and 12".into(),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TimeFrame {
    /// Renders the Alpaca-style code, e.g. `5Min`, `1Day`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TimeFrameUnit::Minute => "Min",
            TimeFrameUnit::Hour => "Hour",
            TimeFrameUnit::Day => "Day",
            TimeFrameUnit::Week => "Week",
            TimeFrameUnit::Month => "Month",
        };
        write!(f, "{}{}", self.amount, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_minute_timeframe() {
        let tf = TimeFrame::minutes(5).unwrap();
        assert_eq!(tf.amount, 5);
        assert!(matches!(tf.unit, TimeFrameUnit::Minute));
    }

    #[test]
    fn test_valid_month_timeframes() {
        for amount in [1, 2, 3, 6, 12] {
            assert!(TimeFrame::months(amount).is_ok(), "Month with amount {} should be valid", amount);
        }
    }

    #[test]
    fn test_invalid_amounts() {
        assert!(TimeFrame::minutes(0).is_err());
        assert!(TimeFrame::minutes(60).is_err());
        assert!(TimeFrame::hours(24).is_err());
        assert!(TimeFrame::validate(2, TimeFrameUnit::Day).is_err());
        for amount in [0, 4, 5, 7, 13] {
            assert!(TimeFrame::months(amount).is_err(), "Month with amount {} should be invalid", amount);
        }
    }

    #[test]
    fn test_error_messages() {
        match TimeFrame::minutes(60) {
            Err(TimeFrameError::InvalidAmount { unit, message }) => {
                assert!(matches!(unit, TimeFrameUnit::Minute));
                assert!(message.contains("Second or Minute"));
            }
            _ => panic!("Expected InvalidAmount error"),
        }
    }

    #[test]
    fn display_uses_provider_codes() {
        assert_eq!(TimeFrame::day().to_string(), "1Day");
        assert_eq!(TimeFrame::minutes(15).unwrap().to_string(), "15Min");
    }
}
