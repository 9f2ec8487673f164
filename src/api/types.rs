use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::api_types::Pagination;

/// Tone assigned to an article by the server's sentiment model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
  Positive,
  Negative,
  Neutral,
}

impl Sentiment {
  pub fn as_str(self) -> &'static str {
    match self {
      Sentiment::Positive => "positive",
      Sentiment::Negative => "negative",
      Sentiment::Neutral => "neutral",
    }
  }
}

/// News article as listed by the API
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Article {
  pub id: i64,
  pub title: String,
  pub url: String,
  pub source: String,
  pub summary: Option<String>,
  pub content: Option<String>,
  pub published_at: Option<DateTime<Utc>>,
  pub sentiment: Option<Sentiment>,
  pub sentiment_score: Option<f64>,
  #[serde(default)]
  pub tickers: Vec<String>,
}

/// One page of articles plus the pagination block from the envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticlePage {
  pub articles: Vec<Article>,
  pub pagination: Option<Pagination>,
}

/// Configured news source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
  pub id: String,
  pub name: String,
  pub url: Option<String>,
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub article_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SourceList(pub Vec<Source>);

/// Service health as reported by `/health`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HealthStatus {
  pub status: String,
  pub database: Option<String>,
  pub version: Option<String>,
  pub uptime_seconds: Option<u64>,
}

impl HealthStatus {
  pub fn is_healthy(&self) -> bool {
    matches!(self.status.as_str(), "ok" | "healthy" | "up")
  }
}

/// Counters from the article scraper
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScraperStats {
  pub total_articles: u64,
  pub articles_today: u64,
  pub sources_active: u32,
  pub failures_last_24h: u32,
  pub last_run_at: Option<DateTime<Utc>>,
  pub last_run_status: Option<String>,
}

/// Sentiment breakdown for one source
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceSentiment {
  pub source: String,
  pub average_score: f64,
  pub article_count: u64,
}

/// Aggregate sentiment across recent articles
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SentimentSummary {
  pub positive: u64,
  pub negative: u64,
  pub neutral: u64,
  pub average_score: f64,
  pub by_source: Vec<SourceSentiment>,
}

impl SentimentSummary {
  pub fn total(&self) -> u64 {
    self
      .positive
      .saturating_add(self.negative)
      .saturating_add(self.neutral)
  }
}

/// Latest quote for a ticker symbol
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StockQuote {
  pub symbol: String,
  pub price: f64,
  #[serde(default)]
  pub change: f64,
  #[serde(default)]
  pub change_percent: f64,
  pub volume: Option<u64>,
  pub updated_at: Option<DateTime<Utc>>,
}
