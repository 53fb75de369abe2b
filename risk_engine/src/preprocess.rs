use market_data_ingestor::models::bar::BarSeries;
use tracing::{debug, warn};

use crate::error::RiskError;

/// Fewest bars the pipeline accepts.
pub const MIN_ROWS: usize = 10;

/// Drops bars with non-finite fields, sorts by time and removes duplicate
/// timestamps (the later bar wins).
pub fn clean(mut series: BarSeries) -> Result<BarSeries, RiskError> {
    let before = series.len();
    series.bars.retain(|b| b.is_complete());
    let incomplete = before - series.len();
    if incomplete > 0 {
        warn!(symbol = %series.symbol, dropped = incomplete, "dropped bars with missing values");
    }

    series.normalize_order();
    debug!(symbol = %series.symbol, rows = series.len(), "cleaned series");

    if series.len() < MIN_ROWS {
        return Err(RiskError::InsufficientData { rows: series.len() });
    }
    Ok(series)
}
