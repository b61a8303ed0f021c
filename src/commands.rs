//! CLI command implementations.
//!
//! Each `run_*` function drives one [`Session`] (or a provider directly) and
//! prints human-readable output to stdout. Notices are printed to stderr as
//! warnings and do not make the command fail.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Notice;
use crate::export::{render_summary, write_export, ExportFormat};
use crate::models::{CandidateItem, ItemKind, ResultSet, SourceTag, SummaryRecord};
use crate::session::{summarize_candidate, SearchForm, Session};
use crate::ticker::{fetch_display, spawn_ticker};
use crate::traits::Providers;

/// What to generate for a picked search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    Summary,
    Recommend,
    Insight,
}

impl GenerateMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(Self::Summary),
            "recommend" => Some(Self::Recommend),
            "insight" => Some(Self::Insight),
            _ => None,
        }
    }
}

fn warn_notice(notice: &Notice) {
    eprintln!("warning: {}", notice);
}

// ============ search ============

pub async fn run_search(config: Config, providers: Providers, form: &SearchForm, json: bool) -> Result<()> {
    let mut session = Session::new(Arc::new(config), providers);
    let outcome = session.search(form).await;
    if let Some(notice) = &outcome.notice {
        warn_notice(notice);
    }

    let Some(results) = session.current_results() else {
        return Ok(());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        print_results(results);
    }
    Ok(())
}

fn print_results(results: &ResultSet) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    println!(
        "{} result(s) for \"{}\" ({} reported by provider)\n",
        results.items.len(),
        results.query,
        results.total_count
    );
    for (i, item) in results.items.iter().enumerate() {
        print_item(i + 1, item);
    }
}

fn print_item(n: usize, item: &CandidateItem) {
    let kind = match item.kind {
        ItemKind::Video => "video",
        ItemKind::Article => "article",
        ItemKind::Financial => "stock",
    };
    println!("{}. [{}] {}", n, kind, item.title);
    if let Some(published) = item.published_at {
        println!("    published: {}", published.format("%Y-%m-%d %H:%M"));
    }
    if let Some(channel) = item.metadata.channel.as_deref().or(item.metadata.source_name.as_deref()) {
        println!("    source: {}", channel);
    }
    if let Some(views) = item.metadata.view_count {
        match item.metadata.like_count {
            Some(likes) => println!("    views: {}  likes: {}", views, likes),
            None => println!("    views: {}", views),
        }
    }
    if let Some(close) = item.metadata.last_close {
        println!("    last close: {:.2}", close);
    }
    if !item.url.is_empty() {
        println!("    url: {}", item.url);
    }
    if !item.description.trim().is_empty() {
        println!("    excerpt: \"{}\"", excerpt(&item.description, 160));
    }
    println!("    id: {}", item.id);
    println!();
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat.to_string(),
    }
}

// ============ summarize ============

/// Search, then generate for the `pick`-th result (1-based).
pub async fn run_summarize(
    config: Config,
    providers: Providers,
    form: &SearchForm,
    pick: usize,
    mode: GenerateMode,
    output: Option<&Path>,
) -> Result<()> {
    if pick == 0 {
        bail!("--item is 1-based");
    }
    let mut session = Session::new(Arc::new(config), providers);
    let outcome = session.search(form).await;
    if let Some(notice) = &outcome.notice {
        warn_notice(notice);
    }
    if session.current_results().map_or(true, ResultSet::is_empty) {
        return Ok(());
    }

    let Some(item) = session
        .current_results()
        .and_then(|r| r.items.get(pick - 1))
        .cloned()
    else {
        let count = session.current_results().map_or(0, |r| r.items.len());
        bail!("only {} result(s); cannot pick item {}", count, pick);
    };
    eprintln!("Generating for: {}", item.title);

    match mode {
        GenerateMode::Summary => {
            let outcome = session.summarize_item(&item.id).await;
            print_summary_outcome(outcome.value.as_ref(), outcome.notice.as_ref());
            if let (Some(path), None) = (output, &outcome.notice) {
                export_to(&session, path)?;
            }
        }
        GenerateMode::Recommend => {
            let outcome = session.recommend(&item.id).await;
            match (outcome.value, outcome.notice) {
                (Some(text), _) => println!("{}", text),
                (None, Some(notice)) => warn_notice(&notice),
                (None, None) => {}
            }
        }
        GenerateMode::Insight => {
            let outcome = session.insight(&item.id).await;
            match (outcome.value, outcome.notice) {
                (Some(insight), _) => {
                    println!("Tags: {}", insight.tags.join(", "));
                    println!("Importance: {}/5", insight.importance);
                }
                (None, Some(notice)) => warn_notice(&notice),
                (None, None) => {}
            }
        }
    }
    Ok(())
}

fn print_summary_outcome(record: Option<&SummaryRecord>, notice: Option<&Notice>) {
    if let Some(notice) = notice {
        warn_notice(notice);
    }
    if let Some(record) = record {
        println!("{}", record.text);
    }
}

fn export_to(session: &Session, path: &Path) -> Result<()> {
    let content = render_summary(
        session.current_summary(),
        session.current_results(),
        ExportFormat::for_path(path),
    )?;
    write_export(&content, Some(path))
}

// ============ brief ============

/// Videos and articles for the same keywords, analysed together.
pub async fn run_brief(
    config: Config,
    providers: Providers,
    form: &SearchForm,
    topic: Option<&str>,
    output: Option<&Path>,
) -> Result<()> {
    let form = SearchForm {
        source: SourceTag::Mixed,
        ..form.clone()
    };
    let mut session = Session::new(Arc::new(config), providers);
    let outcome = session.search(&form).await;
    if let Some(notice) = &outcome.notice {
        warn_notice(notice);
    }
    // A failed source still leaves the other's results to analyse.
    let Some(results) = session.current_results().filter(|r| !r.is_empty()) else {
        return Ok(());
    };
    eprintln!("Analysing {} source(s)...", results.items.len());

    let outcome = session.aggregate(topic).await;
    print_summary_outcome(outcome.value.as_ref(), outcome.notice.as_ref());
    if let (Some(path), None) = (output, &outcome.notice) {
        export_to(&session, path)?;
    }
    Ok(())
}

// ============ stock / financials ============

pub async fn run_stock(config: Config, providers: Providers, company: &str, json: bool) -> Result<()> {
    let form = SearchForm {
        source: SourceTag::Financial,
        ..SearchForm::keywords([company])
    };
    run_search(config, providers, &form, json).await
}

/// Statement analysis for one symbol, without a prior lookup.
pub async fn run_financials(config: Config, providers: Providers, symbol: &str, output: Option<&Path>) -> Result<()> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        warn_notice(&Notice::UserInputMissing);
        return Ok(());
    }
    let item = CandidateItem::new(symbol, ItemKind::Financial, symbol);
    match summarize_candidate(&providers, &config.pipeline, &item).await {
        Ok(text) => {
            println!("{}", text);
            if let Some(path) = output {
                write_export(&text, Some(path))?;
            }
        }
        Err(e) => warn_notice(&Notice::from(e)),
    }
    Ok(())
}

// ============ ticker ============

/// Print the index line once, or every interval until Ctrl-C.
pub async fn run_ticker(config: Config, providers: Providers, once: bool) -> Result<()> {
    let symbols = config.ticker.symbols.clone();
    if symbols.is_empty() {
        bail!("no [ticker].symbols configured");
    }

    if once {
        match fetch_display(providers.market.as_ref(), &symbols).await {
            Some(line) => println!("{}", line),
            None => warn_notice(&Notice::UpstreamUnavailable(
                "no index prices could be fetched".to_string(),
            )),
        }
        return Ok(());
    }

    let handle = spawn_ticker(
        providers.market.clone(),
        symbols,
        Duration::from_secs(config.ticker.interval_secs.max(1)),
    );
    let mut rx = handle.subscribe();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let line = rx.borrow_and_update().clone();
                println!("{} {}", chrono::Local::now().format("%H:%M:%S"), line);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_truncates_on_char_boundary() {
        assert_eq!(excerpt("short\ntext", 20), "short text");
        assert_eq!(excerpt("한국어 텍스트", 3), "한국어…");
    }

    #[test]
    fn test_generate_mode_parse() {
        assert_eq!(GenerateMode::parse("insight"), Some(GenerateMode::Insight));
        assert_eq!(GenerateMode::parse("poem"), None);
    }
}
