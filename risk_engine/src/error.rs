use market_data_ingestor::accessor::AccessError;
use thiserror::Error;

use crate::{store::StoreError, trainer::TrainingError};

/// Failure of one pipeline stage.
///
/// The analyzer turns any of these into an error document; the `Display`
/// text is what ends up in its `error` field.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error(transparent)]
    DataUnavailable(#[from] AccessError),

    #[error("Insufficient data for analysis.")]
    InsufficientData { rows: usize },

    #[error("Error adding features: {0}")]
    FeatureComputation(String),

    #[error("Error labeling risk: {0}")]
    Labeling(String),

    #[error("Error training model: {0}")]
    Training(#[from] TrainingError),

    #[error("Error loading model: {0}")]
    ArtifactLoad(#[from] StoreError),

    #[error("Error predicting risk: {0}")]
    Prediction(String),
}

impl RiskError {
    /// Writes the error and its `source()` chain on one line, skipping
    /// links whose text the previous message already ends with.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut cur = std::error::Error::source(self);
        while let Some(err) = cur {
            let msg = err.to_string();
            if !out.ends_with(&msg) {
                out.push_str(": ");
                out.push_str(&msg);
            }
            cur = err.source();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_message_is_stable() {
        let err = RiskError::InsufficientData { rows: 9 };
        assert_eq!(err.to_string(), "Insufficient data for analysis.");
        assert_eq!(err.chain(), "Insufficient data for analysis.");
    }

    #[test]
    fn chain_does_not_repeat_wrapped_messages() {
        let err = RiskError::from(StoreError::MissingFeatureList {
            ticker: "AAPL".into(),
        });
        let chain = err.chain();
        assert_eq!(chain.matches("features_used").count(), 1, "{chain}");
    }
}
