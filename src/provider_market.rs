//! Market data: closing prices, financial statements, and symbol lookup.
//!
//! Speaks the Financial Modeling Prep v3 JSON API:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | last close | `historical-price-full/{symbol}?timeseries=1` |
//! | statements | `income-statement`, `balance-sheet-statement`, `cash-flow-statement` |
//! | lookup | `search?query=…&limit=…` |

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::models::{CandidateItem, FinancialStatements, ItemKind, StatementTable};
use crate::traits::MarketData;

const LOOKUP_LIMIT: usize = 10;

/// Fields that describe the filing rather than the company.
const SKIPPED_FIELDS: &[&str] = &["link", "finalLink", "cik", "symbol", "reportedCurrency"];

const STATEMENTS: &[(&str, &str)] = &[
    ("income-statement", "Income Statement"),
    ("balance-sheet-statement", "Balance Sheet"),
    ("cash-flow-statement", "Cash Flow Statement"),
];

pub struct MarketClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    key_var: Option<String>,
}

impl MarketClient {
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

    async fn get_json(&self, path: &str, params: &[(&str, String)]) -> Result<serde_json::Value> {
        let mut params: Vec<(&str, String)> = params.to_vec();
        match (&self.api_key, &self.key_var) {
            (Some(key), _) => params.push(("apikey", key.clone())),
            (None, Some(var)) => bail!("{} environment variable not set", var),
            (None, None) => {}
        }

        let response = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(&params)
            .send()
            .await
            .with_context(|| format!("market data request failed: {}", path))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Market API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        if let Some(message) = json.get("Error Message").and_then(|m| m.as_str()) {
            bail!("Market API error: {}", message);
        }
        Ok(json)
    }
}

#[async_trait]
impl MarketData for MarketClient {
    async fn last_close(&self, symbol: &str) -> Result<f64> {
        check_symbol(symbol)?;
        let json = self
            .get_json(
                &format!("historical-price-full/{}", symbol),
                &[("timeseries", "1".to_string())],
            )
            .await?;
        parse_last_close(&json).with_context(|| format!("no closing price for {}", symbol))
    }

    async fn statements(&self, symbol: &str) -> Result<FinancialStatements> {
        check_symbol(symbol)?;
        let mut tables = Vec::with_capacity(STATEMENTS.len());
        for (endpoint, name) in STATEMENTS {
            let json = self
                .get_json(
                    &format!("{}/{}", endpoint, symbol),
                    &[("limit", "1".to_string())],
                )
                .await?;
            if let Some(table) = parse_statement(&json, name) {
                tables.push(table);
            }
        }
        if tables.is_empty() {
            bail!("no financial statements found for {}", symbol);
        }
        Ok(FinancialStatements {
            symbol: symbol.to_string(),
            tables,
        })
    }

    async fn lookup(&self, query: &str) -> Result<Vec<CandidateItem>> {
        let json = self
            .get_json(
                "search",
                &[("query", query.to_string()), ("limit", LOOKUP_LIMIT.to_string())],
            )
            .await?;
        Ok(parse_lookup(&json))
    }
}

/// Symbols become a URL path segment, so only ticker characters are allowed
/// (`AAPL`, `BRK-B`, `005930.KS`, `^KS11`, `EURUSD=X`).
fn check_symbol(symbol: &str) -> Result<()> {
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '_'))
        && symbol.chars().any(|c| c.is_ascii_alphanumeric());
    if !valid {
        bail!("invalid market symbol: '{}'", symbol);
    }
    Ok(())
}

fn parse_last_close(json: &serde_json::Value) -> Option<f64> {
    json.get("historical")
        .and_then(|h| h.as_array())
        .and_then(|h| h.first())
        .and_then(|day| day.get("close"))
        .and_then(|c| c.as_f64())
}

/// Most recent period of one statement as `(field, value)` rows.
fn parse_statement(json: &serde_json::Value, name: &str) -> Option<StatementTable> {
    let period = json.as_array()?.first()?.as_object()?;
    let date = period.get("date").and_then(|d| d.as_str()).unwrap_or("latest");

    let rows = period
        .iter()
        .filter(|(k, _)| k.as_str() != "date" && !SKIPPED_FIELDS.contains(&k.as_str()))
        .filter_map(|(k, v)| {
            let value = match v {
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) if !s.is_empty() => s.clone(),
                _ => return None,
            };
            Some((k.clone(), value))
        })
        .collect();

    Some(StatementTable {
        name: format!("{} ({})", name, date),
        rows,
    })
}

fn parse_lookup(json: &serde_json::Value) -> Vec<CandidateItem> {
    json.as_array()
        .map(|matches| {
            matches
                .iter()
                .filter_map(|m| {
                    let symbol = m.get("symbol")?.as_str()?;
                    let name = m.get("name").and_then(|n| n.as_str()).unwrap_or(symbol);
                    let mut item = CandidateItem::new(symbol, ItemKind::Financial, name);
                    item.metadata.exchange = m
                        .get("exchangeShortName")
                        .or_else(|| m.get("stockExchange"))
                        .and_then(|e| e.as_str())
                        .map(str::to_string);
                    item.description = match &item.metadata.exchange {
                        Some(ex) => format!("{} · {}", symbol, ex),
                        None => symbol.to_string(),
                    };
                    Some(item)
                })
                .collect()
        })
        .unwrap_or_default()
}
