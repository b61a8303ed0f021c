//! Timed-text transcript retrieval.
//!
//! Fetches `GET {base}?v={id}&lang={lang}` for each preferred language in
//! turn and returns the first non-empty transcript, with the `<text>`
//! segments joined by single spaces. A 404 or an empty document means "not
//! in this language". A failed request moves on to the next language; the
//! call errors only when every language failed.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::traits::TranscriptSource;

pub struct TimedTextClient {
    client: reqwest::Client,
    base_url: String,
}

impl TimedTextClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        Self::new(&config.base_url, config.timeout_secs)
    }

    async fn fetch(&self, video_id: &str, lang: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("v", video_id), ("lang", lang)])
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("timed text error {}: {}", status, body_text);
        }

        let xml = response.bytes().await?;
        let text = parse_timed_text(&xml)?;
        Ok(Some(text).filter(|t| !t.is_empty()))
    }
}

#[async_trait]
impl TranscriptSource for TimedTextClient {
    async fn transcript(&self, video_id: &str, languages: &[String]) -> Result<Option<String>> {
        let mut last_error = None;
        let mut answered = false;
        for lang in languages {
            match self.fetch(video_id, lang).await {
                Ok(Some(text)) => {
                    tracing::debug!(video_id, lang = %lang, chars = text.len(), "transcript found");
                    return Ok(Some(text));
                }
                Ok(None) => answered = true,
                Err(e) => {
                    tracing::debug!(video_id, lang = %lang, error = %e, "timed text request failed");
                    last_error = Some(e);
                }
            }
        }
        // An error only counts when no language gave a definite answer.
        match last_error {
            Some(e) if !answered => Err(e),
            _ => Ok(None),
        }
    }
}

/// Join every `<text>` segment of a timed-text document.
pub fn parse_timed_text(xml: &[u8]) -> Result<String> {
    let mut segments: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"text" {
                    in_text = true;
                }
            }
            Ok(quick_xml::events::Event::Text(te)) if in_text => {
                let raw = te.unescape().unwrap_or_default();
                // Segments are HTML-escaped a second time inside the XML.
                let decoded = crate::provider_youtube::unescape_html(&raw);
                let s = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
                if !s.is_empty() {
                    segments.push(s);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"text" {
                    in_text = false;
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => bail!("invalid timed text document: {}", e),
            _ => {}
        }
        buf.clear();
    }
    Ok(segments.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_segments() {
        let xml = br#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0.5" dur="1.2">Hello there</text>
            <text start="1.7" dur="2.0">general
            kenobi</text>
            <text start="4.0" dur="1.0"></text>
        </transcript>"#;
        assert_eq!(parse_timed_text(xml).unwrap(), "Hello there general kenobi");
    }

    #[test]
    fn test_parse_double_escaped() {
        let xml = br#"<transcript><text start="0" dur="1">it&amp;#39;s fine</text></transcript>"#;
        assert_eq!(parse_timed_text(xml).unwrap(), "it's fine");
    }

    #[test]
    fn test_parse_empty_document() {
        assert_eq!(parse_timed_text(b"").unwrap(), "");
        assert_eq!(parse_timed_text(b"<transcript/>").unwrap(), "");
    }
}
