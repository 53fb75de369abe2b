//! Full-length technical indicator series.
//!
//! Every function returns one entry per input bar, oldest first. `None`
//! marks a bar where the indicator is not yet defined (warm-up) or cannot be
//! resolved (e.g. a zero-width stochastic range). Values are computed from
//! the current and earlier bars only.
//!
//! Window statistics (SMA, standard deviation, extremes, Bollinger bands)
//! and OBV are driven through `ta`. Recursive smoothing stays local because
//! `ta` seeds its EMA with the first input rather than an SMA:
//! - EMA: multiplier `2 / (span + 1)`, seeded with the SMA of the first
//!   `span` defined inputs.
//! - Wilder (RSI, ATR): multiplier `1 / period`, seeded the same way.

use ta::{
    Close, Next, Reset, Volume,
    indicators::{BollingerBands, Maximum, Minimum, OnBalanceVolume, SimpleMovingAverage, StandardDeviation},
};

pub type Series = Vec<Option<f64>>;

/// Lifts a plain slice into a fully defined series.
pub fn defined(values: &[f64]) -> Series {
    values.iter().copied().map(Some).collect()
}

// =============================================================================
// Windows
// =============================================================================

/// Streams `values` through `indicator`, emitting once `window` consecutive
/// defined inputs have been seen. A gap resets the indicator.
fn windowed<I>(values: &[Option<f64>], window: usize, mut indicator: I) -> Series
where
    I: Next<f64, Output = f64> + Reset,
{
    let mut run = 0;
    values
        .iter()
        .map(|v| match v {
            Some(v) => {
                let out = indicator.next(*v);
                run += 1;
                (run >= window).then_some(out)
            }
            None => {
                indicator.reset();
                run = 0;
                None
            }
        })
        .collect()
}

pub fn sma(values: &[Option<f64>], window: usize) -> Series {
    match SimpleMovingAverage::new(window) {
        Ok(ind) => windowed(values, window, ind),
        Err(_) => vec![None; values.len()],
    }
}

/// Rolling standard deviation with `ddof` delta degrees of freedom.
pub fn rolling_std(values: &[Option<f64>], window: usize, ddof: usize) -> Series {
    if window <= ddof {
        return vec![None; values.len()];
    }
    let Ok(ind) = StandardDeviation::new(window) else {
        return vec![None; values.len()];
    };
    // ta reports the population figure
    let correction = (window as f64 / (window - ddof) as f64).sqrt();
    windowed(values, window, ind)
        .into_iter()
        .map(|v| v.map(|v| v * correction))
        .collect()
}

pub fn rolling_min(values: &[Option<f64>], window: usize) -> Series {
    match Minimum::new(window) {
        Ok(ind) => windowed(values, window, ind),
        Err(_) => vec![None; values.len()],
    }
}

pub fn rolling_max(values: &[Option<f64>], window: usize) -> Series {
    match Maximum::new(window) {
        Ok(ind) => windowed(values, window, ind),
        Err(_) => vec![None; values.len()],
    }
}

/// `(v[t] - v[t-n]) / v[t-n]`. A zero base yields a non-finite value,
/// which callers treat as unresolved.
pub fn pct_change(values: &[f64], n: usize) -> Series {
    (0..values.len())
        .map(|t| (t >= n && n > 0).then(|| (values[t] - values[t - n]) / values[t - n]))
        .collect()
}

// =============================================================================
// Recursive smoothing
// =============================================================================

/// Recursive smoother `s[t] = s[t-1] + alpha * (v[t] - s[t-1])`, seeded with
/// the mean of the first `period` consecutive defined values. A gap after
/// seeding ends the series.
fn smooth(values: &[Option<f64>], period: usize, alpha: f64) -> Series {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let Some(first) = values.iter().position(Option::is_some) else {
        return out;
    };
    let seed_end = first + period - 1;
    if seed_end >= values.len() {
        return out;
    }
    let seed: Option<Vec<f64>> = values[first..=seed_end].iter().copied().collect();
    let Some(seed) = seed else {
        return out;
    };

    let mut prev = seed.iter().sum::<f64>() / period as f64;
    out[seed_end] = Some(prev);
    for t in (seed_end + 1)..values.len() {
        let Some(v) = values[t] else { break };
        prev += alpha * (v - prev);
        out[t] = Some(prev);
    }
    out
}

pub fn ema(values: &[Option<f64>], span: usize) -> Series {
    smooth(values, span, 2.0 / (span as f64 + 1.0))
}

pub fn wilder(values: &[Option<f64>], period: usize) -> Series {
    smooth(values, period, 1.0 / period as f64)
}

// =============================================================================
// Oscillators and bands
// =============================================================================

/// RSI over `period` bars.
///
/// 100 when there were no losses but some gains; unresolved when the price
/// did not move at all during the smoothing window.
pub fn rsi(closes: &[f64], period: usize) -> Series {
    let delta: Series = (0..closes.len())
        .map(|t| (t > 0).then(|| closes[t] - closes[t - 1]))
        .collect();
    let gains: Series = delta.iter().map(|d| d.map(|d| d.max(0.0))).collect();
    let losses: Series = delta.iter().map(|d| d.map(|d| (-d).max(0.0))).collect();
    let avg_gain = wilder(&gains, period);
    let avg_loss = wilder(&losses, period);

    avg_gain
        .iter()
        .zip(&avg_loss)
        .map(|(g, l)| match (*g, *l) {
            (Some(g), Some(l)) if l == 0.0 => (g > 0.0).then_some(100.0),
            (Some(g), Some(l)) => Some(100.0 - 100.0 / (1.0 + g / l)),
            _ => None,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Series,
    pub signal: Series,
    pub histogram: Series,
}

pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let closes = defined(closes);
    let fast = ema(&closes, fast);
    let slow = ema(&closes, slow);
    let line: Series = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal = ema(&line, signal);
    let histogram = line
        .iter()
        .zip(&signal)
        .map(|(m, s)| Some((*m)? - (*s)?))
        .collect();
    Macd {
        line,
        signal,
        histogram,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bollinger {
    pub upper: Series,
    pub middle: Series,
    pub lower: Series,
}

/// Bands at `k` population standard deviations around the `window` SMA.
pub fn bollinger(closes: &[f64], window: usize, k: f64) -> Bollinger {
    let n = closes.len();
    let mut out = Bollinger {
        upper: vec![None; n],
        middle: vec![None; n],
        lower: vec![None; n],
    };
    let Ok(mut bands) = BollingerBands::new(window, k) else {
        return out;
    };
    for (t, &c) in closes.iter().enumerate() {
        let b = bands.next(c);
        if t + 1 >= window {
            out.upper[t] = Some(b.upper);
            out.middle[t] = Some(b.average);
            out.lower[t] = Some(b.lower);
        }
    }
    out
}

/// Wilder-smoothed true range. The first bar has no previous close and
/// therefore no true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Series {
    let tr: Series = (0..close.len())
        .map(|t| {
            (t > 0).then(|| {
                let prev = close[t - 1];
                (high[t] - low[t])
                    .max((high[t] - prev).abs())
                    .max((low[t] - prev).abs())
            })
        })
        .collect();
    wilder(&tr, period)
}

struct Tick {
    close: f64,
    volume: f64,
}

impl Close for Tick {
    fn close(&self) -> f64 {
        self.close
    }
}

impl Volume for Tick {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Running sum of volume signed by the close-to-close direction, starting
/// at zero on the first bar.
pub fn obv(close: &[f64], volume: &[f64]) -> Series {
    let mut ind = OnBalanceVolume::new();
    let running: Vec<f64> = close
        .iter()
        .zip(volume)
        .map(|(&close, &volume)| ind.next(&Tick { close, volume }))
        .collect();
    // ta compares the first close against zero
    let base = running.first().copied().unwrap_or(0.0);
    running.into_iter().map(|v| Some(v - base)).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Series,
    pub d: Series,
}

/// Slow stochastic: raw %K over `k_window` bars, smoothed by `k_smooth`,
/// with %D the `d_smooth` SMA of %K.
pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    k_window: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> Stochastic {
    let lowest = rolling_min(&defined(low), k_window);
    let highest = rolling_max(&defined(high), k_window);
    let raw: Series = (0..close.len())
        .map(|t| {
            let (lo, hi) = (lowest[t]?, highest[t]?);
            let range = hi - lo;
            (range != 0.0).then(|| 100.0 * (close[t] - lo) / range)
        })
        .collect();
    let k = sma(&raw, k_smooth);
    let d = sma(&k, d_smooth);
    Stochastic { k, d }
}
