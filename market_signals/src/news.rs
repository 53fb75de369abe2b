//! News and social-post sentiment aggregation.
//!
//! Acquisition lives behind [`NewsSource`] and [`SocialSource`]; this module
//! only filters, scores and summarises what they return.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::sentiment::{SentimentClass, SentimentScorer};

/// Items shown in a summary.
pub const DISPLAY_LIMIT: usize = 5;
/// Articles requested from a news source per query.
pub const PAGE_SIZE: usize = 25;
/// Descriptions longer than this are cut to `DESCRIPTION_LIMIT - 3` chars
/// plus `...`.
pub const DESCRIPTION_LIMIT: usize = 200;

const REMOVED_MARKER: &str = "[Removed]";

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("{source_name} request failed: {message}")]
    Fetch { source_name: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub url: Option<String>,
    pub source: Option<ArticleSource>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct ArticleSource {
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SocialPost {
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    async fn articles(&self, query: &str, limit: usize) -> Result<Vec<Article>, NewsError>;
}

#[async_trait]
pub trait SocialSource: Send + Sync {
    async fn posts(&self, query: &str, limit: usize) -> Result<Vec<SocialPost>, NewsError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredItem {
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    pub relevant_prediction: u8,
    pub sentiment_classification: SentimentClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SentimentSummary {
    /// Mean item score; `None` when nothing was scored.
    pub overall_prediction: Option<f64>,
    pub overall_sentiment: SentimentClass,
    pub news: Vec<ScoredItem>,
}

impl SentimentSummary {
    pub fn empty() -> Self {
        Self {
            overall_prediction: None,
            overall_sentiment: SentimentClass::Unknown,
            news: Vec::new(),
        }
    }

    /// Summarises `items`, averaging `scores` for the overall figure.
    fn from_parts(scores: &[u8], items: Vec<ScoredItem>) -> Self {
        if scores.is_empty() {
            return Self::empty();
        }
        let mean = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / scores.len() as f64;
        Self {
            overall_prediction: Some(mean),
            overall_sentiment: SentimentClass::from_score(mean),
            news: items,
        }
    }
}

/// Cuts to `DESCRIPTION_LIMIT - 3` characters plus `...` when longer than
/// the limit. Counts chars, not bytes.
pub fn truncate_description(text: &str) -> String {
    if text.chars().count() > DESCRIPTION_LIMIT {
        let mut cut: String = text.chars().take(DESCRIPTION_LIMIT - 3).collect();
        cut.push_str("...");
        cut
    } else {
        text.to_string()
    }
}

fn usable_description(article: &Article) -> Option<&str> {
    let description = article.description.as_deref().filter(|d| !d.is_empty())?;
    article.url.as_deref().filter(|u| !u.is_empty())?;
    let removed = article.title.contains(REMOVED_MARKER) || description.contains(REMOVED_MARKER);
    (!article.title.is_empty() && !removed).then_some(description)
}

/// Scores up to `limit` usable articles in input order. Articles without a
/// title, description or url, or marked `[Removed]`, are skipped. The full
/// description is scored before it is truncated for display.
pub fn score_articles(scorer: &SentimentScorer, articles: &[Article], limit: usize) -> SentimentSummary {
    let mut scores = Vec::new();
    let mut items = Vec::new();
    for article in articles {
        if items.len() == limit {
            break;
        }
        let Some(description) = usable_description(article) else {
            debug!(title = %article.title, "skipping article");
            continue;
        };
        let score = scorer.score(&format!("{} {}", article.title, description));
        scores.push(score);
        items.push(ScoredItem {
            headline: article.title.clone(),
            url: article.url.clone(),
            description: Some(truncate_description(description)),
            publisher: Some(
                article
                    .source
                    .as_ref()
                    .and_then(|s| s.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
            ),
            published_at: article.published_at.clone(),
            relevant_prediction: score,
            sentiment_classification: SentimentClass::from_score(f64::from(score)),
        });
    }
    SentimentSummary::from_parts(&scores, items)
}

pub fn score_posts(scorer: &SentimentScorer, posts: &[SocialPost]) -> SentimentSummary {
    let (scores, items): (Vec<u8>, Vec<ScoredItem>) = posts
        .iter()
        .map(|post| {
            let score = scorer.score(&format!("{} {}", post.title, post.body));
            let item = ScoredItem {
                headline: post.title.clone(),
                url: None,
                description: None,
                publisher: None,
                published_at: None,
                relevant_prediction: score,
                sentiment_classification: SentimentClass::from_score(f64::from(score)),
            };
            (score, item)
        })
        .unzip();
    SentimentSummary::from_parts(&scores, items)
}

/// Merges news and social summaries: every item's score counts toward the
/// overall mean, and the first [`DISPLAY_LIMIT`] items are kept.
pub fn combine(news: SentimentSummary, social: SentimentSummary) -> SentimentSummary {
    let items: Vec<ScoredItem> = news.news.into_iter().chain(social.news).collect();
    let scores: Vec<u8> = items.iter().map(|i| i.relevant_prediction).collect();
    let mut summary = SentimentSummary::from_parts(&scores, items);
    summary.news.truncate(DISPLAY_LIMIT);
    summary
}

/// Fetches and scores news and social posts for a symbol.
pub struct SentimentAggregator {
    scorer: SentimentScorer,
    news: Box<dyn NewsSource>,
    social: Option<Box<dyn SocialSource>>,
}

impl SentimentAggregator {
    pub fn new(scorer: SentimentScorer, news: Box<dyn NewsSource>) -> Self {
        Self {
            scorer,
            news,
            social: None,
        }
    }

    pub fn with_social(mut self, social: Box<dyn SocialSource>) -> Self {
        self.social = Some(social);
        self
    }

    /// A failing source contributes nothing; the failure is logged.
    pub async fn news_sentiment(&self, symbol: &str) -> SentimentSummary {
        match self.news.articles(symbol, PAGE_SIZE).await {
            Ok(articles) => score_articles(&self.scorer, &articles, DISPLAY_LIMIT),
            Err(err) => {
                warn!(symbol, %err, "news fetch failed");
                SentimentSummary::empty()
            }
        }
    }

    pub async fn social_sentiment(&self, symbol: &str) -> SentimentSummary {
        let Some(social) = &self.social else {
            return SentimentSummary::empty();
        };
        match social.posts(symbol, DISPLAY_LIMIT).await {
            Ok(posts) => score_posts(&self.scorer, &posts),
            Err(err) => {
                warn!(symbol, %err, "social fetch failed");
                SentimentSummary::empty()
            }
        }
    }

    pub async fn stock_sentiment(&self, symbol: &str) -> SentimentSummary {
        let news = self.news_sentiment(symbol).await;
        let social = self.social_sentiment(symbol).await;
        combine(news, social)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_descriptions() {
        let long = "é".repeat(250);
        let cut = truncate_description(&long);
        assert_eq!(cut.chars().count(), 200);
        assert!(cut.ends_with("..."));
        assert_eq!(truncate_description(&"a".repeat(200)), "a".repeat(200));
    }

    #[test]
    fn articles_deserialize_from_news_api_shape() {
        let raw = r#"{
            "source": {"id": null, "name": "Reuters"},
            "title": "Shares rally",
            "description": "Strong quarter",
            "url": "https://example.com/a",
            "publishedAt": "2024-05-17T09:30:00Z"
        }"#;
        let a: Article = serde_json::from_str(raw).unwrap();
        assert_eq!(a.source.and_then(|s| s.name).as_deref(), Some("Reuters"));
        assert_eq!(a.published_at.as_deref(), Some("2024-05-17T09:30:00Z"));
    }

    #[test]
    fn empty_summary_is_unknown() {
        let s = score_articles(&SentimentScorer::default(), &[], DISPLAY_LIMIT);
        assert_eq!(s, SentimentSummary::empty());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["overall_sentiment"], "Unknown");
        assert!(json["overall_prediction"].is_null());
    }
}
