//! Core data models used throughout newsreel.
//!
//! These types represent the search results and summaries that flow through
//! the search → filter → resort → dedupe → summarize pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What kind of thing a [`CandidateItem`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Video,
    Article,
    Financial,
}

/// Which search produced a [`ResultSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    #[default]
    Video,
    News,
    Financial,
    /// Videos and articles combined for an aggregate briefing.
    Mixed,
}

impl SourceTag {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "video" | "youtube" => Some(Self::Video),
            "news" => Some(Self::News),
            "financial" | "stock" => Some(Self::Financial),
            "mixed" | "all" => Some(Self::Mixed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::News => "news",
            Self::Financial => "financial",
            Self::Mixed => "mixed",
        }
    }
}

/// Provider-specific metadata attached to an item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_close: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
}

/// A discovered video, article, or listed company.
///
/// `id` is the video id, article URL, or ticker symbol. Everything except the
/// enrichment fields (`transcript`, `body`, and the counters in `metadata`)
/// is fixed when the provider response is parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateItem {
    pub id: String,
    pub kind: ItemKind,
    pub title: String,
    pub description: String,
    pub published_at: Option<DateTime<Utc>>,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub metadata: ItemMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl CandidateItem {
    pub fn new(id: impl Into<String>, kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            description: String::new(),
            published_at: None,
            url: String::new(),
            thumbnail_url: None,
            metadata: ItemMetadata::default(),
            transcript: None,
            body: None,
        }
    }

    /// Best available long-form text: transcript, then body, then description.
    pub fn content(&self) -> &str {
        [self.transcript.as_deref(), self.body.as_deref()]
            .into_iter()
            .flatten()
            .find(|t| !t.trim().is_empty())
            .unwrap_or(&self.description)
    }
}

/// The ordered, deduplicated outcome of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResultSet {
    pub source: SourceTag,
    pub query: String,
    /// Total hits reported by the provider (not the number of kept items).
    pub total_count: u64,
    pub items: Vec<CandidateItem>,
}

impl ResultSet {
    pub fn empty(source: SourceTag, query: impl Into<String>) -> Self {
        Self {
            source,
            query: query.into(),
            total_count: 0,
            items: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&CandidateItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryStatus {
    Generated,
    /// The text is an error message shown in place of a summary.
    Failed,
}

/// The latest generated (or failed) summary of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub covers: Vec<String>,
    pub text: String,
    pub status: SummaryStatus,
}

/// One financial statement as ordered `(field, value)` rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StatementTable {
    pub name: String,
    pub rows: Vec<(String, String)>,
}

/// Income, balance sheet, and cash flow statements for one symbol.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FinancialStatements {
    pub symbol: String,
    pub tables: Vec<StatementTable>,
}
