use crate::{
    labeling::RiskLevel,
    signals::{MacdSignal, PricePosition, SignalSnapshot},
};

/// Mean of the bar-to-bar percentage changes across the last five closes,
/// in percent. `None` with fewer than five closes.
pub fn recent_trend(closes: &[f64]) -> Option<f64> {
    let tail = closes.get(closes.len().checked_sub(5)?..)?;
    let changes: Vec<f64> = tail.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect();
    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    mean.is_finite().then_some(mean * 100.0)
}

/// One sentence per triggered rule, in a fixed order: risk tier, RSI,
/// MACD, moving averages, short-term trend.
pub fn recommendations(risk: RiskLevel, signals: &SignalSnapshot, closes: &[f64]) -> Vec<String> {
    let mut out = Vec::new();

    match risk {
        RiskLevel::High => {
            out.push("High volatility detected. Consider reducing position size.".to_string())
        }
        RiskLevel::Low => out.push(
            "Low volatility may indicate consolidation. Watch for breakouts.".to_string(),
        ),
        RiskLevel::Medium => {}
    }

    match signals.rsi_value {
        Some(v) if v > 70.0 => out.push(
            "RSI indicates overbought conditions. Consider taking profits.".to_string(),
        ),
        Some(v) if v < 30.0 => out.push(
            "RSI indicates oversold conditions. Potential buying opportunity.".to_string(),
        ),
        _ => {}
    }

    match signals.macd_signal {
        MacdSignal::Bullish => {
            out.push("MACD signals bullish momentum. Potential upside ahead.".to_string())
        }
        MacdSignal::Bearish => {
            out.push("MACD signals bearish momentum. Caution advised.".to_string())
        }
        MacdSignal::Unknown => {}
    }

    match signals.price_position {
        PricePosition::AboveBoth => {
            out.push("Price above key moving averages indicates strength.".to_string())
        }
        PricePosition::BelowBoth => {
            out.push("Price below key moving averages suggests caution.".to_string())
        }
        _ => {}
    }

    match recent_trend(closes) {
        Some(t) if t > 1.0 => {
            out.push(format!("Recent uptrend of {t:.2}%. Monitor for continuation."))
        }
        Some(t) if t < -1.0 => {
            out.push(format!("Recent downtrend of {t:.2}%. Watch for reversal signals."))
        }
        _ => {}
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::{BandPosition, RsiStatus, StochasticSignal, Trend};

    fn snapshot(rsi: Option<f64>, macd: MacdSignal, pos: PricePosition) -> SignalSnapshot {
        SignalSnapshot {
            rsi_value: rsi,
            rsi_status: crate::signals::rsi_status(rsi),
            macd_signal: macd,
            price_position: pos,
            trend: Trend::Unknown,
            bollinger_band_position: BandPosition::Unknown,
            stochastic_signal: StochasticSignal::Unknown,
        }
    }

    #[test]
    fn recent_trend_needs_five_closes() {
        assert_eq!(recent_trend(&[1.0, 2.0, 3.0, 4.0]), None);
        let t = recent_trend(&[50.0, 100.0, 102.0, 104.04, 106.1208, 108.243216]).unwrap();
        assert!((t - 2.0).abs() < 1e-9);
    }

    #[test]
    fn all_rules_fire_in_order() {
        let snap = snapshot(Some(75.0), MacdSignal::Bullish, PricePosition::AboveBoth);
        let closes = [100.0, 102.0, 104.04, 106.1208, 108.243216];
        let recs = recommendations(RiskLevel::High, &snap, &closes);
        assert_eq!(
            recs,
            vec![
                "High volatility detected. Consider reducing position size.",
                "RSI indicates overbought conditions. Consider taking profits.",
                "MACD signals bullish momentum. Potential upside ahead.",
                "Price above key moving averages indicates strength.",
                "Recent uptrend of 2.00%. Monitor for continuation.",
            ]
        );
        assert_eq!(snap.rsi_status, RsiStatus::Overbought);
    }

    #[test]
    fn quiet_market_yields_few_sentences() {
        let snap = snapshot(Some(50.0), MacdSignal::Unknown, PricePosition::Between);
        let recs = recommendations(RiskLevel::Medium, &snap, &[10.0, 10.0, 10.0, 10.0, 10.0]);
        assert!(recs.is_empty());
    }

    #[test]
    fn bearish_side() {
        let snap = snapshot(Some(25.0), MacdSignal::Bearish, PricePosition::BelowBoth);
        let closes = [100.0, 97.0, 94.09, 91.2673, 88.529281];
        let recs = recommendations(RiskLevel::Low, &snap, &closes);
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0], "Low volatility may indicate consolidation. Watch for breakouts.");
        assert_eq!(recs[1], "RSI indicates oversold conditions. Potential buying opportunity.");
        assert_eq!(recs[2], "MACD signals bearish momentum. Caution advised.");
        assert_eq!(recs[3], "Price below key moving averages suggests caution.");
        assert_eq!(recs[4], "Recent downtrend of -3.00%. Watch for reversal signals.");
    }
}
