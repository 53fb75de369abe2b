use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use market_signals::{
    news::{
        Article, ArticleSource, NewsError, NewsSource, PAGE_SIZE, SentimentAggregator,
        SentimentSummary, SocialPost, SocialSource, score_articles,
    },
    sentiment::{SentimentClass, SentimentScorer},
};

fn article(title: &str, description: Option<&str>) -> Article {
    Article {
        title: title.to_string(),
        description: description.map(str::to_string),
        url: Some(format!("https://news.example/{}", title.len())),
        source: Some(ArticleSource {
            name: Some("Wire".to_string()),
        }),
        published_at: Some("2024-05-17T09:30:00Z".to_string()),
    }
}

struct StaticNews {
    articles: Vec<Article>,
    requested: Arc<AtomicUsize>,
}

#[async_trait]
impl NewsSource for StaticNews {
    async fn articles(&self, _query: &str, limit: usize) -> Result<Vec<Article>, NewsError> {
        self.requested.store(limit, Ordering::SeqCst);
        Ok(self.articles.iter().take(limit).cloned().collect())
    }
}

struct DownNews;

#[async_trait]
impl NewsSource for DownNews {
    async fn articles(&self, _query: &str, _limit: usize) -> Result<Vec<Article>, NewsError> {
        Err(NewsError::Fetch {
            source_name: "newsapi".to_string(),
            message: "HTTP 429".to_string(),
        })
    }
}

struct StaticSocial(Vec<SocialPost>);

#[async_trait]
impl SocialSource for StaticSocial {
    async fn posts(&self, _query: &str, limit: usize) -> Result<Vec<SocialPost>, NewsError> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

#[test]
fn removed_and_bare_articles_are_skipped() {
    let articles = vec![
        article("[Removed]", Some("[Removed]")),
        article("No body", None),
        article("Empty body", Some("")),
        Article {
            url: None,
            ..article("No link", Some("Shares rally"))
        },
        Article {
            url: Some(String::new()),
            ..article("Blank link", Some("Shares rally"))
        },
        article("Shares rally on strong profit", Some("A great quarter")),
    ];
    let summary = score_articles(&SentimentScorer::default(), &articles, 5);

    assert_eq!(summary.news.len(), 1);
    let item = &summary.news[0];
    assert_eq!(item.headline, "Shares rally on strong profit");
    assert_eq!(item.publisher.as_deref(), Some("Wire"));
    assert_eq!(summary.overall_prediction, Some(f64::from(item.relevant_prediction)));
    assert_eq!(summary.overall_sentiment, SentimentClass::StrongBuy);
}

#[test]
fn stops_after_the_display_limit() {
    let articles: Vec<Article> = (0..8)
        .map(|i| article(&format!("Headline {i}"), Some("steady")))
        .collect();
    let summary = score_articles(&SentimentScorer::default(), &articles, 5);
    assert_eq!(summary.news.len(), 5);
    assert_eq!(summary.news[4].headline, "Headline 4");
}

#[tokio::test]
async fn combined_sentiment_averages_every_item() {
    let requested = Arc::new(AtomicUsize::new(0));
    let news = StaticNews {
        articles: vec![
            article("Terrible losses", Some("bankruptcy fears grow")),
            article("Plunge continues", Some("investors panic")),
            article("Crash deepens", Some("worst day")),
            article("Fraud probe", Some("scandal widens")),
        ],
        requested: requested.clone(),
    };
    let social = StaticSocial(vec![
        SocialPost {
            title: "Great buy".to_string(),
            body: "excellent profit growth".to_string(),
        },
        SocialPost {
            title: "Strong rally".to_string(),
            body: "best quarter".to_string(),
        },
    ]);
    let aggregator =
        SentimentAggregator::new(SentimentScorer::default(), Box::new(news)).with_social(Box::new(social));

    let summary = aggregator.stock_sentiment("ACME").await;

    assert_eq!(requested.load(Ordering::SeqCst), PAGE_SIZE);
    assert_eq!(summary.news.len(), 5, "first five items are kept");
    assert_eq!(summary.news[4].headline, "Great buy");

    let news_only = aggregator.news_sentiment("ACME").await;
    let social_only = aggregator.social_sentiment("ACME").await;
    let all: Vec<u8> = news_only
        .news
        .iter()
        .chain(&social_only.news)
        .map(|i| i.relevant_prediction)
        .collect();
    let expected = all.iter().map(|&s| f64::from(s)).sum::<f64>() / all.len() as f64;
    assert_eq!(summary.overall_prediction, Some(expected));
    assert_eq!(summary.overall_sentiment, SentimentClass::from_score(expected));
}

#[tokio::test]
async fn failing_source_yields_unknown() {
    let aggregator = SentimentAggregator::new(SentimentScorer::default(), Box::new(DownNews));
    let summary = aggregator.stock_sentiment("ACME").await;
    assert_eq!(summary, SentimentSummary::empty());
}
