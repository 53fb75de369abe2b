use serde::{Deserialize, Serialize};

use crate::{
    models::{
        request_params::{BarsRequestParams, ProviderParams},
        timeframe::{TimeFrame, TimeFrameUnit},
    },
    providers::{ProviderError, ValidationSnafu},
};

/// Specifies the corporate action adjustment for stock data.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    #[default]
    Raw,
    Split,
    Dividend,
    All,
}

/// Specifies the source feed for stock data.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Feed {
    #[default]
    Sip,
    Iex,
    Otc,
}

/// Specifies the sort order for the bars.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sort {
    #[default]
    Asc,
    Desc,
}

/// Alpaca-specific parameters for a bars request.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AlpacaBarsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<Adjustment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<Feed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

fn as_query_value<T: Serialize>(value: &T) -> Option<String> {
    // unit enums serialize to a bare JSON string
    match serde_json::to_value(value).ok()? {
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Rejects timeframes the bars endpoint does not accept.
pub fn validate_timeframe(tf: &TimeFrame) -> Result<(), ProviderError> {
    TimeFrame::validate(tf.amount, tf.unit).map_err(|e| {
        ValidationSnafu {
            message: e.to_string(),
        }
        .build()
    })?;
    if matches!(tf.unit, TimeFrameUnit::Week | TimeFrameUnit::Month) && tf.amount != 1 {
        return ValidationSnafu {
            message: format!("Alpaca does not support a {tf} timeframe"),
        }
        .fail();
    }
    Ok(())
}

/// Builds the query string pairs for one page of a bars request.
pub fn construct_params(params: &BarsRequestParams) -> Vec<(String, String)> {
    let mut query = vec![
        ("symbols".to_string(), params.symbols.join(",")),
        ("timeframe".to_string(), params.timeframe.to_string()),
        ("start".to_string(), params.start.to_rfc3339()),
        ("end".to_string(), params.end.to_rfc3339()),
    ];

    if let ProviderParams::Alpaca(extra) = &params.provider_specific {
        if let Some(v) = extra.adjustment.as_ref().and_then(as_query_value) {
            query.push(("adjustment".to_string(), v));
        }
        if let Some(v) = extra.feed.as_ref().and_then(as_query_value) {
            query.push(("feed".to_string(), v));
        }
        if let Some(currency) = &extra.currency {
            query.push(("currency".to_string(), currency.clone()));
        }
        if let Some(limit) = extra.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(v) = extra.sort.as_ref().and_then(as_query_value) {
            query.push(("sort".to_string(), v));
        }
    }
    query
}
