//! News article search (NewsAPI `everything` endpoint).

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::models::{CandidateItem, ItemKind};
use crate::period::format_rfc3339;
use crate::traits::{NewsQuery, NewsSearch, SearchPage};

/// Placeholder title NewsAPI uses for articles taken down by the publisher.
pub const REMOVED_TITLE: &str = "[Removed]";

pub struct NewsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_var: Option<String>,
}

impl NewsClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            key_var: None,
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let api_key = config
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        let mut client = Self::new(&config.base_url, api_key, config.timeout_secs)?;
        client.key_var = config.api_key_env.clone();
        Ok(client)
    }
}

#[async_trait]
impl NewsSearch for NewsClient {
    async fn search(&self, query: &NewsQuery) -> Result<SearchPage> {
        let mut params = vec![
            ("q", query.query.clone()),
            ("pageSize", query.page_size.to_string()),
            ("sortBy", query.sort.as_param().to_string()),
        ];
        if let Some(after) = query.published_after {
            params.push(("from", format_rfc3339(after)));
        }

        let mut request = self
            .client
            .get(format!("{}/everything", self.base_url))
            .query(&params);
        match (&self.api_key, &self.key_var) {
            (Some(key), _) => request = request.header("X-Api-Key", key),
            (None, Some(var)) => bail!("{} environment variable not set", var),
            (None, None) => {}
        }

        let response = request.send().await.context("news search request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("News API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let page = parse_news_response(&json)?;
        tracing::info!(query = %query.query, total = page.total, returned = page.items.len(), "news search");
        Ok(page)
    }
}

fn parse_news_response(json: &serde_json::Value) -> Result<SearchPage> {
    if json.get("status").and_then(|s| s.as_str()) == Some("error") {
        let message = json
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        bail!("News API error: {}", message);
    }

    let articles = json
        .get("articles")
        .and_then(|a| a.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid news response: missing articles array"))?;

    let str_field = |v: &serde_json::Value, key: &str| {
        v.get(key)
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .unwrap_or_default()
    };

    let mut items = Vec::with_capacity(articles.len());
    for article in articles {
        let url = str_field(article, "url");
        if url.is_empty() {
            continue;
        }
        let mut item = CandidateItem::new(url.clone(), ItemKind::Article, str_field(article, "title"));
        item.url = url;
        item.description = str_field(article, "description");
        item.thumbnail_url = article
            .get("urlToImage")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        item.published_at = article
            .get("publishedAt")
            .and_then(|s| s.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        item.metadata.source_name = article
            .pointer("/source/name")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        item.body = article
            .get("content")
            .and_then(|s| s.as_str())
            .map(str::to_string);
        items.push(item);
    }

    let total = json
        .get("totalResults")
        .and_then(|t| t.as_u64())
        .unwrap_or(items.len() as u64);

    Ok(SearchPage { total, items })
}

/// An article is worth showing if it wasn't removed and has some text.
pub fn is_presentable(item: &CandidateItem) -> bool {
    item.title != REMOVED_TITLE
        && !item.title.trim().is_empty()
        && !(item.description.trim().is_empty()
            && item.body.as_deref().map_or(true, |b| b.trim().is_empty()))
}
