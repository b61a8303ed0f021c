//! Per-user session state and the actions that mutate it.
//!
//! A [`Session`] owns two slots: the results of the last search and the last
//! summary. Every action returns an [`ActionOutcome`]; provider failures are
//! folded into its [`Notice`] and never escape.
//!
//! # Slot rules
//!
//! | Action | `current_results` | `current_summary` |
//! |--------|-------------------|-------------------|
//! | search without keywords | unchanged | unchanged |
//! | search (success) | replaced | cleared |
//! | search (zero hits / upstream failure) | empty set | cleared |
//! | summarize_item / aggregate | unchanged | overwritten (also on failure) |
//! | recommend / insight | unchanged | unchanged |

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Config, PipelineConfig};
use crate::error::Notice;
use crate::insight::{parse_insight, Insight};
use crate::models::{
    CandidateItem, ItemKind, ResultSet, SourceTag, SummaryRecord, SummaryStatus,
};
use crate::period::PeriodFilter;
use crate::pipeline::{self, Availability, ResortKey};
use crate::prompt::{build_prompt, PromptFields, TemplateKind};
use crate::provider_news::is_presentable;
use crate::summarize::SummarizeError;
use crate::traits::{DurationBucket, NewsQuery, Providers, VideoOrder, VideoQuery};

/// Keywords beyond this many are ignored.
pub const MAX_KEYWORDS: usize = 3;

/// What the user asked to search for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub keywords: Vec<String>,
    /// Named preset from `[domains]`; used only when no keywords are given.
    pub domain: Option<String>,
    pub source: SourceTag,
    pub order: VideoOrder,
    pub duration: DurationBucket,
    pub period: PeriodFilter,
}

impl SearchForm {
    pub fn keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Space-joined query string, or `None` when there is nothing to search.
    pub fn query(&self, domains: &BTreeMap<String, Vec<String>>) -> Option<String> {
        let words: Vec<&str> = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .take(MAX_KEYWORDS)
            .collect();
        if !words.is_empty() {
            return Some(words.join(" "));
        }

        let preset = domains.get(self.domain.as_deref()?.trim())?;
        let words: Vec<&str> = preset
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    }
}

/// Result of one session action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome<T = ()> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

impl<T> ActionOutcome<T> {
    pub fn ok(value: T) -> Self {
        Self {
            value: Some(value),
            notice: None,
        }
    }

    pub fn notice(notice: Notice) -> Self {
        Self {
            value: None,
            notice: Some(notice),
        }
    }
}

impl ActionOutcome<()> {
    fn done(notice: Option<Notice>) -> Self {
        Self {
            value: notice.is_none().then_some(()),
            notice,
        }
    }
}

pub struct Session {
    config: Arc<Config>,
    providers: Providers,
    current_results: Option<ResultSet>,
    current_summary: Option<SummaryRecord>,
}

impl Session {
    pub fn new(config: Arc<Config>, providers: Providers) -> Self {
        Self {
            config,
            providers,
            current_results: None,
            current_summary: None,
        }
    }

    pub fn current_results(&self) -> Option<&ResultSet> {
        self.current_results.as_ref()
    }

    pub fn current_summary(&self) -> Option<&SummaryRecord> {
        self.current_summary.as_ref()
    }

    // ============ Search ============

    pub async fn search(&mut self, form: &SearchForm) -> ActionOutcome {
        self.search_at(form, Utc::now()).await
    }

    /// [`Session::search`] with an explicit clock, for period bounds.
    pub async fn search_at(&mut self, form: &SearchForm, now: DateTime<Utc>) -> ActionOutcome {
        let Some(query) = form.query(&self.config.domains) else {
            return ActionOutcome::notice(Notice::UserInputMissing);
        };

        self.current_summary = None;
        let published_after = form.period.lower_bound(now);
        tracing::info!(source = form.source.as_str(), %query, "search started");

        let result = match form.source {
            SourceTag::Video => self.search_videos(&query, form, published_after).await.map(|s| (s, None)),
            SourceTag::News => self.search_news(&query, form, published_after).await.map(|s| (s, None)),
            SourceTag::Financial => self.search_financial(&query).await.map(|s| (s, None)),
            SourceTag::Mixed => self.search_mixed(&query, form, published_after).await,
        };

        match result {
            Ok((set, partial_failure)) => {
                let notice = if partial_failure.is_some() {
                    partial_failure
                } else if set.total_count == 0 {
                    Some(Notice::NoResults(query))
                } else if set.is_empty() {
                    Some(Notice::ContentUnavailable(format!(
                        "none of the results for '{}' have usable content",
                        query
                    )))
                } else {
                    None
                };
                tracing::info!(kept = set.items.len(), total = set.total_count, "search finished");
                self.current_results = Some(set);
                ActionOutcome::done(notice)
            }
            Err(e) => {
                tracing::warn!(error = %e, "search failed");
                self.current_results = Some(ResultSet::empty(form.source, query));
                ActionOutcome::notice(Notice::UpstreamUnavailable(format!("{:#}", e)))
            }
        }
    }

    async fn search_videos(
        &self,
        query: &str,
        form: &SearchForm,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<ResultSet> {
        let cfg = &self.config.pipeline;
        let page = self
            .providers
            .video
            .search(&VideoQuery {
                query: query.to_string(),
                order: form.order,
                duration: form.duration,
                published_after,
                page_size: cfg.search_page_size,
            })
            .await?;

        let target = cfg.transcript_target;
        let (kept, rejected) = pipeline::filter_with_transcripts(
            page.items,
            self.providers.transcript.as_ref(),
            &cfg.languages,
            target,
        )
        .await;
        if !rejected.is_empty() {
            tracing::debug!(rejected = rejected.len(), "videos without transcripts skipped");
        }

        let items = resort_key(cfg).apply(kept, target);
        let mut items = pipeline::dedupe(items, |i| i.id.clone(), Some(target));
        self.enrich_statistics(&mut items).await;

        Ok(ResultSet {
            source: SourceTag::Video,
            query: query.to_string(),
            total_count: page.total,
            items,
        })
    }

    /// View/like counts are decoration; a failure here keeps the results.
    async fn enrich_statistics(&self, items: &mut [CandidateItem]) {
        if items.is_empty() {
            return;
        }
        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        match self.providers.video.statistics(&ids).await {
            Ok(stats) => {
                for item in items.iter_mut() {
                    if let Some(s) = stats.get(&item.id) {
                        item.metadata.view_count = s.view_count;
                        item.metadata.like_count = s.like_count;
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "video statistics unavailable"),
        }
    }

    async fn search_news(
        &self,
        query: &str,
        form: &SearchForm,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<ResultSet> {
        let cfg = &self.config.pipeline;
        let limit = cfg.news_page_size;
        let page = self
            .providers
            .news
            .search(&NewsQuery {
                query: query.to_string(),
                published_after,
                page_size: limit,
                sort: form.order.into(),
            })
            .await?;

        let items = pipeline::filter_available(page.items, is_presentable, limit);
        let items = resort_key(cfg).apply(items, limit);
        let items = pipeline::dedupe(items, |i| i.id.clone(), Some(limit));

        Ok(ResultSet {
            source: SourceTag::News,
            query: query.to_string(),
            total_count: page.total,
            items,
        })
    }

    async fn search_financial(&self, query: &str) -> Result<ResultSet> {
        let matches = self.providers.market.lookup(query).await?;
        let mut items = pipeline::dedupe(matches, |i| i.id.clone(), None);
        for item in items.iter_mut() {
            match self.providers.market.last_close(&item.id).await {
                Ok(close) => item.metadata.last_close = Some(close),
                Err(e) => tracing::debug!(symbol = %item.id, error = %e, "no closing price"),
            }
        }

        Ok(ResultSet {
            source: SourceTag::Financial,
            query: query.to_string(),
            total_count: items.len() as u64,
            items,
        })
    }

    /// Videos then articles for the same query, as input to [`Session::aggregate`].
    ///
    /// Fails only when both searches fail. When one fails, the other's
    /// results are kept and the failure comes back as a notice naming the
    /// source.
    async fn search_mixed(
        &self,
        query: &str,
        form: &SearchForm,
        published_after: Option<DateTime<Utc>>,
    ) -> Result<(ResultSet, Option<Notice>)> {
        let videos = self.search_videos(query, form, published_after).await;
        let news = self.search_news(query, form, published_after).await;

        let (videos, news) = match (videos, news) {
            (Err(e), Err(_)) => return Err(e),
            pair => pair,
        };
        let mut failures = Vec::new();
        let videos = keep_partial(videos, "video", &mut failures);
        let news = keep_partial(news, "news", &mut failures);

        let total_count = videos.total_count + news.total_count;
        let combined = videos.items.into_iter().chain(news.items).collect();
        let set = ResultSet {
            source: SourceTag::Mixed,
            query: query.to_string(),
            total_count,
            items: pipeline::dedupe(combined, |i| i.id.clone(), None),
        };
        let notice = (!failures.is_empty()).then(|| Notice::UpstreamUnavailable(failures.join("; ")));
        Ok((set, notice))
    }

    // ============ Generation ============

    pub async fn summarize_item(&mut self, id: &str) -> ActionOutcome<SummaryRecord> {
        let Some(item) = self.find(id) else {
            return ActionOutcome::notice(Notice::UnknownItem(id.to_string()));
        };
        let result = summarize_candidate(&self.providers, &self.config.pipeline, &item).await;
        self.store_summary(vec![item.id], result)
    }

    /// Aggregate analysis over every item in the current results.
    pub async fn aggregate(&mut self, topic: Option<&str>) -> ActionOutcome<SummaryRecord> {
        let Some(results) = self.current_results.as_ref().filter(|r| !r.is_empty()) else {
            return ActionOutcome::notice(Notice::ContentUnavailable(
                "run a search before aggregating".to_string(),
            ));
        };

        let topic = topic
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(results.query.as_str());
        let mut fields = PromptFields::new()
            .with("topic", topic)
            .with("language", self.config.pipeline.output_language.clone());
        for item in &results.items {
            fields.push_record(item.title.clone(), item.content().to_string());
        }
        let covers = results.items.iter().map(|i| i.id.clone()).collect();

        let result = match build_prompt(TemplateKind::AggregateAnalysis, &fields) {
            Ok(prompt) => self.providers.summarizer.summarize(&prompt).await,
            Err(e) => Err(e.into()),
        };
        self.store_summary(covers, result)
    }

    /// Why the item is worth a look. Not stored.
    pub async fn recommend(&self, id: &str) -> ActionOutcome<String> {
        let Some(item) = self.find(id) else {
            return ActionOutcome::notice(Notice::UnknownItem(id.to_string()));
        };
        let fields = PromptFields::for_item(&item, &self.config.pipeline.output_language);
        match self.generate(TemplateKind::Recommendation, &fields).await {
            Ok(text) => ActionOutcome::ok(text),
            Err(e) => ActionOutcome::notice(e.into()),
        }
    }

    /// Tags and importance for one item. Not stored.
    pub async fn insight(&self, id: &str) -> ActionOutcome<Insight> {
        let Some(item) = self.find(id) else {
            return ActionOutcome::notice(Notice::UnknownItem(id.to_string()));
        };
        let fields = PromptFields::for_item(&item, &self.config.pipeline.output_language);
        let reply = match self.generate(TemplateKind::ArticleInsight, &fields).await {
            Ok(text) => text,
            Err(e) => return ActionOutcome::notice(e.into()),
        };
        match parse_insight(&reply) {
            Ok(insight) => ActionOutcome::ok(insight),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable insight reply");
                ActionOutcome::notice(Notice::EmptyGenerativeResponse(e.to_string()))
            }
        }
    }

    /// Plain-text body of the `summary.txt` attachment.
    ///
    /// A failed summary is shown to the user but never exported.
    pub fn export_summary(&self) -> ActionOutcome<String> {
        match &self.current_summary {
            Some(record) if record.status == SummaryStatus::Generated => {
                ActionOutcome::ok(record.text.clone())
            }
            Some(_) => ActionOutcome::notice(Notice::ContentUnavailable(
                "the last summary failed".to_string(),
            )),
            None => ActionOutcome::notice(Notice::ContentUnavailable(
                "there is no summary to export".to_string(),
            )),
        }
    }

    fn find(&self, id: &str) -> Option<CandidateItem> {
        self.current_results.as_ref()?.find(id).cloned()
    }

    async fn generate(
        &self,
        kind: TemplateKind,
        fields: &PromptFields,
    ) -> Result<String, SummarizeError> {
        let prompt = build_prompt(kind, fields)?;
        self.providers.summarizer.summarize(&prompt).await
    }

    fn store_summary(
        &mut self,
        covers: Vec<String>,
        result: Result<String, SummarizeError>,
    ) -> ActionOutcome<SummaryRecord> {
        let (record, notice) = match result {
            Ok(text) => (
                SummaryRecord {
                    covers,
                    text,
                    status: SummaryStatus::Generated,
                },
                None,
            ),
            Err(e) => {
                tracing::warn!(summarizer = self.providers.summarizer.name(), error = %e, "summarize failed");
                (
                    SummaryRecord {
                        covers,
                        text: e.display_text(),
                        status: SummaryStatus::Failed,
                    },
                    Some(Notice::from(e)),
                )
            }
        };
        self.current_summary = Some(record.clone());
        ActionOutcome {
            value: Some(record),
            notice,
        }
    }
}

/// Summarize one item outside any session (used by the CLI).
///
/// Videos use their transcript, fetched on demand if the item doesn't carry
/// one. Financial items fetch statements first.
pub async fn summarize_candidate(
    providers: &Providers,
    cfg: &PipelineConfig,
    item: &CandidateItem,
) -> Result<String, SummarizeError> {
    let language = cfg.output_language.as_str();
    let fields = match item.kind {
        ItemKind::Video => {
            let transcript = match item.transcript.as_deref().filter(|t| !t.trim().is_empty()) {
                Some(t) => t.to_string(),
                None => match pipeline::probe_transcript(
                    providers.transcript.as_ref(),
                    &item.id,
                    &cfg.languages,
                )
                .await
                {
                    Availability::Available(t) => t,
                    Availability::Unavailable(reason) => {
                        return Err(SummarizeError::Unavailable(reason))
                    }
                },
            };
            PromptFields::new()
                .with("title", item.title.clone())
                .with("body", transcript)
                .with("language", language)
        }
        ItemKind::Article => PromptFields::for_item(item, language),
        ItemKind::Financial => {
            let statements = providers
                .market
                .statements(&item.id)
                .await
                .map_err(|e| SummarizeError::ProviderFailure(format!("{:#}", e)))?;
            let kind = TemplateKind::FinancialStatements;
            let fields = PromptFields::for_statements(&statements, &item.title, language);
            let prompt = build_prompt(kind, &fields)?;
            return providers.summarizer.summarize(&prompt).await;
        }
    };
    let prompt = build_prompt(TemplateKind::ItemSummary, &fields)?;
    providers.summarizer.summarize(&prompt).await
}

fn resort_key(cfg: &PipelineConfig) -> ResortKey {
    ResortKey::parse(&cfg.resort).unwrap_or(ResortKey::Newest)
}

fn keep_partial(result: Result<ResultSet>, source: &str, failures: &mut Vec<String>) -> ResultSet {
    result.unwrap_or_else(|e| {
        tracing::warn!(source, error = %e, "partial briefing: one source failed");
        failures.push(format!("{}: {:#}", source, e));
        ResultSet::default()
    })
}
