//! YouTube Data API v3 video search.
//!
//! Implements [`VideoSearch`] against `GET {base}/search` (type=video) and
//! `GET {base}/videos?part=statistics`. The base URL comes from `[youtube]`
//! in the config so tests can point it at a local server.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::models::{CandidateItem, ItemKind};
use crate::period::format_rfc3339;
use crate::traits::{SearchPage, VideoQuery, VideoSearch, VideoStats};

pub struct YouTubeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_var: Option<String>,
}

impl YouTubeClient {
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

    fn key_param(&self) -> Result<Option<(&'static str, String)>> {
        match (&self.api_key, &self.key_var) {
            (Some(key), _) => Ok(Some(("key", key.clone()))),
            (None, Some(var)) => bail!("{} environment variable not set", var),
            (None, None) => Ok(None),
        }
    }

    async fn get_json(&self, path: &str, params: Vec<(&'static str, String)>) -> Result<serde_json::Value> {
        let mut params = params;
        if let Some(key) = self.key_param()? {
            params.push(key);
        }

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(&params)
            .send()
            .await
            .with_context(|| format!("YouTube {} request failed", path))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("YouTube API error {}: {}", status, body_text);
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl VideoSearch for YouTubeClient {
    async fn search(&self, query: &VideoQuery) -> Result<SearchPage> {
        let mut params = vec![
            ("part", "id,snippet".to_string()),
            ("type", "video".to_string()),
            ("q", query.query.clone()),
            ("order", query.order.as_param().to_string()),
            ("maxResults", query.page_size.to_string()),
        ];
        if let Some(duration) = query.duration.as_param() {
            params.push(("videoDuration", duration.to_string()));
        }
        if let Some(after) = query.published_after {
            params.push(("publishedAfter", format_rfc3339(after)));
        }

        let json = self.get_json("search", params).await?;
        let page = parse_search_response(&json)?;
        tracing::info!(
            query = %query.query,
            total = page.total,
            returned = page.items.len(),
            "youtube search"
        );
        Ok(page)
    }

    async fn statistics(&self, ids: &[String]) -> Result<HashMap<String, VideoStats>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let params = vec![("part", "statistics".to_string()), ("id", ids.join(","))];
        let json = self.get_json("videos", params).await?;
        Ok(parse_statistics_response(&json))
    }
}

/// Decode the HTML entities YouTube leaves in titles and descriptions.
pub(crate) fn unescape_html(s: &str) -> String {
    quick_xml::escape::unescape(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

fn parse_search_response(json: &serde_json::Value) -> Result<SearchPage> {
    let items = json
        .get("items")
        .and_then(|i| i.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid YouTube response: missing items array"))?;

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        // Channels and playlists can slip through; only videos have a videoId.
        let Some(video_id) = item.pointer("/id/videoId").and_then(|v| v.as_str()) else {
            continue;
        };
        let snippet = item.get("snippet").cloned().unwrap_or_default();
        let text = |key: &str| {
            snippet
                .get(key)
                .and_then(|v| v.as_str())
                .map(unescape_html)
                .unwrap_or_default()
        };

        let mut candidate = CandidateItem::new(video_id, ItemKind::Video, text("title"));
        candidate.description = text("description");
        candidate.url = format!("https://www.youtube.com/watch?v={}", video_id);
        candidate.published_at = snippet
            .get("publishedAt")
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        candidate.thumbnail_url = snippet
            .pointer("/thumbnails/medium/url")
            .or_else(|| snippet.pointer("/thumbnails/default/url"))
            .and_then(|v| v.as_str())
            .map(str::to_string);
        candidate.metadata.channel = snippet
            .get("channelTitle")
            .and_then(|v| v.as_str())
            .map(str::to_string);
        out.push(candidate);
    }

    let total = json
        .pointer("/pageInfo/totalResults")
        .and_then(|v| v.as_u64())
        .unwrap_or(out.len() as u64);

    Ok(SearchPage { total, items: out })
}

fn parse_statistics_response(json: &serde_json::Value) -> HashMap<String, VideoStats> {
    let count = |stats: &serde_json::Value, key: &str| {
        stats.get(key).and_then(|v| match v {
            serde_json::Value::String(s) => s.parse().ok(),
            other => other.as_u64(),
        })
    };

    json.get("items")
        .and_then(|i| i.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    let id = item.get("id")?.as_str()?.to_string();
                    let stats = item.get("statistics")?;
                    Some((
                        id,
                        VideoStats {
                            view_count: count(stats, "viewCount"),
                            like_count: count(stats, "likeCount"),
                        },
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}
