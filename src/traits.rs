//! Provider seams.
//!
//! Every upstream service the pipeline talks to sits behind one of these
//! async traits. The HTTP clients in the `provider_*` modules and
//! [`crate::summarize`] are the built-in implementations; tests and custom
//! binaries can register in-memory ones through [`Providers`].
//!
//! ```text
//! ┌────────────────────────────────────────────────┐
//! │                   Providers                    │
//! │ ┌───────────┐ ┌──────────┐ ┌──────┐ ┌────────┐ │
//! │ │VideoSearch│ │Transcript│ │ News │ │ Market │ │
//! │ └───────────┘ └──────────┘ └──────┘ └────────┘ │
//! │                ┌──────────┐                    │
//! │                │Summarizer│                    │
//! │                └──────────┘                    │
//! └───────────────────────┬────────────────────────┘
//!                         ▼
//!            Session actions (search, summarize, …)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{CandidateItem, FinancialStatements};
use crate::summarize::SummarizeError;

// ═══════════════════════════════════════════════════════════════════════
// Query types
// ═══════════════════════════════════════════════════════════════════════

/// Primary ordering the video provider applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoOrder {
    #[default]
    Relevance,
    ViewCount,
    Date,
}

impl VideoOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "relevance" => Some(Self::Relevance),
            "view_count" | "viewCount" | "views" => Some(Self::ViewCount),
            "date" => Some(Self::Date),
            _ => None,
        }
    }

    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Relevance => "relevance",
            Self::ViewCount => "viewCount",
            Self::Date => "date",
        }
    }
}

/// Duration bucket: short < 4 min, medium 4–20 min, long > 20 min.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationBucket {
    #[default]
    Any,
    Short,
    Medium,
    Long,
}

impl DurationBucket {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Self::Any),
            "short" => Some(Self::Short),
            "medium" => Some(Self::Medium),
            "long" => Some(Self::Long),
            _ => None,
        }
    }

    /// Query parameter value, `None` for [`DurationBucket::Any`].
    pub fn as_param(&self) -> Option<&'static str> {
        match self {
            Self::Any => None,
            Self::Short => Some("short"),
            Self::Medium => Some("medium"),
            Self::Long => Some("long"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoQuery {
    pub query: String,
    pub order: VideoOrder,
    pub duration: DurationBucket,
    pub published_after: Option<DateTime<Utc>>,
    pub page_size: usize,
}

/// News ordering; mapped from [`VideoOrder`] for the shared search form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsSort {
    #[default]
    Relevancy,
    Popularity,
    PublishedAt,
}

impl NewsSort {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Relevancy => "relevancy",
            Self::Popularity => "popularity",
            Self::PublishedAt => "publishedAt",
        }
    }
}

impl From<VideoOrder> for NewsSort {
    fn from(order: VideoOrder) -> Self {
        match order {
            VideoOrder::Relevance => Self::Relevancy,
            VideoOrder::ViewCount => Self::Popularity,
            VideoOrder::Date => Self::PublishedAt,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsQuery {
    pub query: String,
    pub published_after: Option<DateTime<Utc>>,
    pub page_size: usize,
    pub sort: NewsSort,
}

/// One page of raw provider hits.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Total hits the provider reports for the query.
    pub total: u64,
    pub items: Vec<CandidateItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoStats {
    pub view_count: Option<u64>,
    pub like_count: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════
// Provider traits
// ═══════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait VideoSearch: Send + Sync {
    async fn search(&self, query: &VideoQuery) -> Result<SearchPage>;

    /// View/like counts keyed by video id. Ids the provider doesn't know are absent.
    async fn statistics(&self, ids: &[String]) -> Result<HashMap<String, VideoStats>>;
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Concatenated transcript in the first available language, or `None`.
    async fn transcript(&self, video_id: &str, languages: &[String]) -> Result<Option<String>>;
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &NewsQuery) -> Result<SearchPage>;
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest closing price for a ticker or index symbol.
    async fn last_close(&self, symbol: &str) -> Result<f64>;

    async fn statements(&self, symbol: &str) -> Result<FinancialStatements>;

    /// Free-text company name → matching listed symbols.
    async fn lookup(&self, query: &str) -> Result<Vec<CandidateItem>>;
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Provider name for logging (e.g. `"gemini"`).
    fn name(&self) -> &str;

    async fn summarize(&self, prompt: &str) -> Result<String, SummarizeError>;
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// The set of upstream providers a session talks to.
#[derive(Clone)]
pub struct Providers {
    pub video: Arc<dyn VideoSearch>,
    pub transcript: Arc<dyn TranscriptSource>,
    pub news: Arc<dyn NewsSearch>,
    pub market: Arc<dyn MarketData>,
    pub summarizer: Arc<dyn Summarizer>,
}

impl Providers {
    /// Build the HTTP-backed providers described by the config.
    ///
    /// Missing API keys are not an error here; the affected provider
    /// reports them on first use so unrelated actions keep working.
    pub fn from_config(config: &Config) -> Result<Self> {
        use crate::provider_market::MarketClient;
        use crate::provider_news::NewsClient;
        use crate::provider_transcript::TimedTextClient;
        use crate::provider_youtube::YouTubeClient;

        Ok(Self {
            video: Arc::new(YouTubeClient::from_config(&config.youtube)?),
            transcript: Arc::new(TimedTextClient::from_config(&config.transcript)?),
            news: Arc::new(NewsClient::from_config(&config.news)?),
            market: Arc::new(MarketClient::from_config(&config.market)?),
            summarizer: crate::summarize::create_summarizer(&config.summarizer)?,
        })
    }
}
