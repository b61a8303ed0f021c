//! Fixed-template prompt rendering.
//!
//! [`build_prompt`] is pure string formatting: the same [`PromptFields`] for
//! the same [`TemplateKind`] always yield byte-identical text. Nothing here
//! reads the clock or the environment; anything time-dependent must be
//! passed in as a field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{CandidateItem, FinancialStatements};

/// Separator between records in an aggregate prompt.
pub const RECORD_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// One-page report of a single item (title + body).
    ItemSummary,
    /// Cross-item analysis of N title/body records.
    AggregateAnalysis,
    /// Analysis of a field dump of financial statements.
    FinancialStatements,
    /// Short reason to watch/read an item (title + description).
    Recommendation,
    /// Tags and importance in a fixed line format, see [`crate::insight`].
    ArticleInsight,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PromptError {
    #[error("missing prompt field: {0}")]
    MissingField(&'static str),
    #[error("{0} prompt needs at least one record")]
    NoRecords(&'static str),
}

/// A titled block of content (one search result).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRecord {
    pub title: String,
    pub body: String,
}

/// Inputs to [`build_prompt`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptFields {
    values: BTreeMap<String, String>,
    records: Vec<ContentRecord>,
    tables: Vec<(String, Vec<(String, String)>)>,
}

impl PromptFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }

    pub fn push_record(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.records.push(ContentRecord {
            title: title.into(),
            body: body.into(),
        });
    }

    pub fn push_table(&mut self, name: impl Into<String>, rows: Vec<(String, String)>) {
        self.tables.push((name.into(), rows));
    }

    /// Title/body of one item plus output language.
    pub fn for_item(item: &CandidateItem, language: &str) -> Self {
        Self::new()
            .with("title", item.title.clone())
            .with("body", item.content().to_string())
            .with("description", item.description.clone())
            .with("language", language)
    }

    pub fn for_statements(statements: &FinancialStatements, company: &str, language: &str) -> Self {
        let mut fields = Self::new()
            .with("symbol", statements.symbol.clone())
            .with("company", company)
            .with("language", language);
        for table in &statements.tables {
            fields.push_table(table.name.clone(), table.rows.clone());
        }
        fields
    }

    fn get(&self, key: &'static str) -> Result<&str, PromptError> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .ok_or(PromptError::MissingField(key))
    }

    fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(default)
    }
}

pub fn build_prompt(kind: TemplateKind, fields: &PromptFields) -> Result<String, PromptError> {
    let language = fields.get_or("language", "English");

    match kind {
        TemplateKind::ItemSummary => {
            let title = fields.get("title")?;
            let body = fields.get("body")?;
            Ok(format!(
                "Summarize the title and content of the following item as a readable \
                 one-page report. The final result must be written in {language}.\n\n\
                 Title: {title}\n\n{body}"
            ))
        }
        TemplateKind::Recommendation => {
            let title = fields.get("title")?;
            let description = fields.get_or("description", "(no description)");
            Ok(format!(
                "Briefly explain in {language} why someone might want to watch or read \
                 the following item.\nTitle: {title}\nDescription: {description}"
            ))
        }
        TemplateKind::ArticleInsight => {
            let title = fields.get("title")?;
            let body = fields.get("body")?;
            Ok(format!(
                "Read the following article and answer in exactly two lines, with no other text:\n\
                 Tags: <three to five comma-separated keywords in {language}>\n\
                 Importance: <an integer from 1 (minor) to 5 (major)>\n\n\
                 Title: {title}\n\n{body}"
            ))
        }
        TemplateKind::AggregateAnalysis => {
            if fields.records.is_empty() {
                return Err(PromptError::NoRecords("aggregate_analysis"));
            }
            let topic = fields.get("topic")?;
            let joined = fields
                .records
                .iter()
                .enumerate()
                .map(|(i, r)| format!("[{}] Title: {}\n{}", i + 1, r.title, r.body))
                .collect::<Vec<_>>()
                .join(RECORD_SEPARATOR);
            Ok(format!(
                "The following {count} sources were collected for the topic \"{topic}\". \
                 Analyse them together: identify the main themes, points of agreement and \
                 disagreement, and what matters most. Structure the answer with headings \
                 and write it in {language}.\n\n{joined}",
                count = fields.records.len()
            ))
        }
        TemplateKind::FinancialStatements => {
            if fields.tables.is_empty() {
                return Err(PromptError::NoRecords("financial_statements"));
            }
            let symbol = fields.get("symbol")?;
            let company = fields.get_or("company", symbol);
            let mut dump = String::new();
            for (name, rows) in &fields.tables {
                dump.push_str(&format!("## {}\n", name));
                for (field, value) in rows {
                    dump.push_str(&format!("{}: {}\n", field, value));
                }
                dump.push('\n');
            }
            Ok(format!(
                "You are a financial analyst. Using the statements below for {company} \
                 ({symbol}), assess profitability, financial stability, and cash flow, and \
                 close with an overall view. Write the report in {language}.\n\n{}",
                dump.trim_end()
            ))
        }
    }
}
