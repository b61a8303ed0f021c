//! HTTP-level tests for the built-in provider clients.
//!
//! A local axum app stands in for YouTube, timed text, NewsAPI, Financial
//! Modeling Prep, and Gemini. Each test starts its own copy on a free port.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{TimeZone, Utc};
use newsreel::config::Config;
use newsreel::error::Notice;
use newsreel::models::{ItemKind, SummaryStatus};
use newsreel::provider_market::MarketClient;
use newsreel::provider_news::NewsClient;
use newsreel::provider_transcript::TimedTextClient;
use newsreel::provider_youtube::YouTubeClient;
use newsreel::session::{SearchForm, Session};
use newsreel::summarize::{GeminiSummarizer, SummarizeError};
use newsreel::traits::{
    DurationBucket, MarketData, NewsQuery, NewsSearch, NewsSort, Providers, Summarizer,
    TranscriptSource, VideoOrder, VideoQuery, VideoSearch,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ─── Mock upstream ──────────────────────────────────────────────────

type Params = HashMap<String, String>;

/// Query parameters of every request, keyed by route name.
#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(String, Params)>>>);

impl Recorder {
    fn record(&self, route: &str, params: &Params) {
        self.0.lock().unwrap().push((route.to_string(), params.clone()));
    }

    fn last(&self, route: &str) -> Params {
        self.0
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| r == route)
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| panic!("no request to {}", route))
    }
}

fn video_json(id: &str, title: &str, published: &str) -> Value {
    json!({
        "id": { "kind": "youtube#video", "videoId": id },
        "snippet": {
            "title": title,
            "description": format!("about {}", id),
            "publishedAt": published,
            "channelTitle": "Test Channel",
            "thumbnails": { "medium": { "url": format!("https://img/{}.jpg", id) } }
        }
    })
}

async fn yt_search(State(rec): State<Recorder>, Query(q): Query<Params>) -> Response {
    rec.record("yt_search", &q);
    if q.get("key").map(String::as_str) != Some("yt-key") {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "error": { "message": "API key not valid" } })),
        )
            .into_response();
    }
    if q.get("q").map(String::as_str) == Some("nothing") {
        return Json(json!({ "pageInfo": { "totalResults": 0 }, "items": [] })).into_response();
    }
    Json(json!({
        "pageInfo": { "totalResults": 120 },
        "items": [
            video_json("vid_a", "Alpha &amp; Omega", "2024-01-01T00:00:00Z"),
            { "id": { "kind": "youtube#channel", "channelId": "UC1" }, "snippet": { "title": "A channel" } },
            video_json("vid_b", "No captions", "2024-01-03T00:00:00Z"),
            video_json("vid_c", "Charlie", "2024-01-02T00:00:00Z"),
        ]
    }))
    .into_response()
}

async fn yt_videos(State(rec): State<Recorder>, Query(q): Query<Params>) -> Json<Value> {
    rec.record("yt_videos", &q);
    let items: Vec<Value> = q
        .get("id")
        .map(|ids| ids.split(',').collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter()
        .map(|id| json!({ "id": id, "statistics": { "viewCount": "1500", "likeCount": "42" } }))
        .collect();
    Json(json!({ "items": items }))
}

async fn timedtext(Query(q): Query<Params>) -> Response {
    let v = q.get("v").map(String::as_str).unwrap_or("");
    let lang = q.get("lang").map(String::as_str).unwrap_or("");
    let body = match (v, lang) {
        ("vid_a", "ko") => "<transcript><text start=\"0\" dur=\"1\">안녕하세요 &amp;amp; 반갑습니다</text></transcript>",
        ("vid_c", "en") => "<transcript><text start=\"0\" dur=\"1\">Charlie</text><text start=\"1\" dur=\"1\">speaks</text></transcript>",
        ("vid_b", "en") => "",
        ("vid_d", "ko") | ("vid_e", _) => {
            return (StatusCode::BAD_GATEWAY, "upstream hiccup").into_response()
        }
        ("vid_d", "en") => "<transcript><text start=\"0\" dur=\"1\">fallback works</text></transcript>",
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    body.to_string().into_response()
}

async fn news_everything(
    State(rec): State<Recorder>,
    headers: HeaderMap,
    Query(q): Query<Params>,
) -> Response {
    rec.record("news", &q);
    if headers.get("X-Api-Key").and_then(|v| v.to_str().ok()) != Some("news-key") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "status": "error", "code": "apiKeyInvalid", "message": "Your API key is invalid" })),
        )
            .into_response();
    }
    Json(json!({
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": { "name": "Example Times" },
                "title": "Battery output doubles",
                "description": "Factories expand.",
                "url": "https://example.com/battery",
                "publishedAt": "2024-02-01T08:30:00Z",
                "content": "Factories expand across the region."
            },
            {
                "source": { "name": "Gone" },
                "title": "[Removed]",
                "description": "[Removed]",
                "url": "https://removed.com",
                "publishedAt": "2024-02-02T08:30:00Z",
                "content": "[Removed]"
            }
        ]
    }))
    .into_response()
}

async fn fmp_history(Path(symbol): Path<String>) -> Json<Value> {
    Json(json!({ "symbol": symbol, "historical": [{ "date": "2024-03-08", "close": 2650.12 }] }))
}

async fn fmp_statement(Path((kind, symbol)): Path<(String, String)>) -> Json<Value> {
    let mut period = serde_json::Map::new();
    period.insert("date".into(), json!("2023-12-31"));
    period.insert("symbol".into(), json!(symbol));
    period.insert("link".into(), json!("https://sec.gov/x"));
    period.insert(format!("{}Total", kind.replace('-', "_")), json!(1000));
    Json(Value::Array(vec![Value::Object(period)]))
}

async fn fmp_search(Query(q): Query<Params>) -> Json<Value> {
    if q.get("apikey").map(String::as_str) != Some("fmp-key") {
        return Json(json!({ "Error Message": "Invalid API KEY." }));
    }
    Json(json!([
        { "symbol": "AAPL", "name": "Apple Inc.", "exchangeShortName": "NASDAQ" },
        { "symbol": "APLE", "name": "Apple Hospitality REIT", "exchangeShortName": "NYSE" }
    ]))
}

async fn gemini(Path(action): Path<String>, Query(q): Query<Params>, Json(body): Json<Value>) -> Response {
    if !action.ends_with(":generateContent") || q.get("key").map(String::as_str) != Some("gm-key") {
        return (StatusCode::BAD_REQUEST, "bad request").into_response();
    }
    let prompt = body
        .pointer("/contents/0/parts/0/text")
        .and_then(|t| t.as_str())
        .unwrap_or("");
    if prompt.contains("BLOCKME") {
        return Json(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).into_response();
    }
    Json(json!({
        "candidates": [{
            "content": { "parts": [{ "text": "Summary: " }, { "text": format!("{} chars", prompt.len()) }] },
            "finishReason": "STOP"
        }]
    }))
    .into_response()
}

async fn start_mock() -> (String, Recorder) {
    let rec = Recorder::default();
    let app = Router::new()
        .route("/yt/search", get(yt_search))
        .route("/yt/videos", get(yt_videos))
        .route("/timedtext", get(timedtext))
        .route("/news/everything", get(news_everything))
        .route("/fmp/historical-price-full/{symbol}", get(fmp_history))
        .route("/fmp/{kind}/{symbol}", get(fmp_statement))
        .route("/fmp/search", get(fmp_search))
        .route("/gemini/models/{action}", post(gemini))
        .with_state(rec.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (format!("http://{}", addr), rec)
}

fn mock_providers(base: &str) -> Providers {
    Providers {
        video: Arc::new(YouTubeClient::new(format!("{}/yt", base), Some("yt-key".into()), 5).unwrap()),
        transcript: Arc::new(TimedTextClient::new(format!("{}/timedtext", base), 5).unwrap()),
        news: Arc::new(NewsClient::new(format!("{}/news", base), Some("news-key".into()), 5).unwrap()),
        market: Arc::new(MarketClient::new(format!("{}/fmp", base), Some("fmp-key".into()), 5).unwrap()),
        summarizer: Arc::new(
            GeminiSummarizer::new(format!("{}/gemini", base), "gemini-test", Some("gm-key".into()), 5).unwrap(),
        ),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_youtube_search_sends_filters_and_parses_videos() {
    let (base, rec) = start_mock().await;
    let client = YouTubeClient::new(format!("{}/yt", base), Some("yt-key".into()), 5).unwrap();

    let page = client
        .search(&VideoQuery {
            query: "rust async".into(),
            order: VideoOrder::ViewCount,
            duration: DurationBucket::Short,
            published_after: Some(Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()),
            page_size: 5,
        })
        .await
        .unwrap();

    assert_eq!(page.total, 120);
    let ids: Vec<&str> = page.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["vid_a", "vid_b", "vid_c"]);
    assert_eq!(page.items[0].title, "Alpha & Omega");
    assert_eq!(page.items[0].metadata.channel.as_deref(), Some("Test Channel"));

    let sent = rec.last("yt_search");
    assert_eq!(sent["q"], "rust async");
    assert_eq!(sent["order"], "viewCount");
    assert_eq!(sent["videoDuration"], "short");
    assert_eq!(sent["publishedAfter"], "2024-03-09T12:00:00Z");
    assert_eq!(sent["maxResults"], "5");
    assert_eq!(sent["type"], "video");
}

#[tokio::test]
async fn test_youtube_statistics() {
    let (base, rec) = start_mock().await;
    let client = YouTubeClient::new(format!("{}/yt", base), Some("yt-key".into()), 5).unwrap();

    let stats = client
        .statistics(&["vid_a".to_string(), "vid_c".to_string()])
        .await
        .unwrap();
    assert_eq!(stats["vid_a"].view_count, Some(1500));
    assert_eq!(stats["vid_c"].like_count, Some(42));
    assert_eq!(rec.last("yt_videos")["id"], "vid_a,vid_c");
}

#[tokio::test]
async fn test_youtube_rejected_key_is_error() {
    let (base, _) = start_mock().await;
    let client = YouTubeClient::new(format!("{}/yt", base), Some("wrong".into()), 5).unwrap();
    let err = client
        .search(&VideoQuery {
            query: "rust".into(),
            order: VideoOrder::Relevance,
            duration: DurationBucket::Any,
            published_after: None,
            page_size: 5,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("403"), "got: {}", err);
}

#[tokio::test]
async fn test_transcript_language_fallback() {
    let (base, _) = start_mock().await;
    let client = TimedTextClient::new(format!("{}/timedtext", base), 5).unwrap();
    let langs = vec!["ko".to_string(), "en".to_string()];

    assert_eq!(
        client.transcript("vid_a", &langs).await.unwrap().as_deref(),
        Some("안녕하세요 & 반갑습니다")
    );
    assert_eq!(
        client.transcript("vid_c", &langs).await.unwrap().as_deref(),
        Some("Charlie speaks")
    );
    // 404 for ko, empty body for en.
    assert_eq!(client.transcript("vid_b", &langs).await.unwrap(), None);
}

#[tokio::test]
async fn test_transcript_server_error_falls_through_to_next_language() {
    let (base, _rec) = start_mock().await;
    let client = TimedTextClient::new(format!("{}/timedtext", base), 5).unwrap();
    let langs = vec!["ko".to_string(), "en".to_string()];

    assert_eq!(
        client.transcript("vid_d", &langs).await.unwrap().as_deref(),
        Some("fallback works")
    );

    // Every language failed: the error surfaces.
    let err = client.transcript("vid_e", &langs).await.unwrap_err();
    assert!(err.to_string().contains("502"), "unexpected error: {}", err);
}

#[tokio::test]
async fn test_news_search_uses_header_key() {
    let (base, rec) = start_mock().await;
    let client = NewsClient::new(format!("{}/news", base), Some("news-key".into()), 5).unwrap();
    let page = client
        .search(&NewsQuery {
            query: "battery".into(),
            published_after: None,
            page_size: 10,
            sort: NewsSort::PublishedAt,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].kind, ItemKind::Article);

    let sent = rec.last("news");
    assert_eq!(sent["sortBy"], "publishedAt");
    assert!(!sent.contains_key("apiKey"));

    let bad = NewsClient::new(format!("{}/news", base), Some("nope".into()), 5).unwrap();
    let err = bad
        .search(&NewsQuery {
            query: "battery".into(),
            published_after: None,
            page_size: 10,
            sort: NewsSort::Relevancy,
        })
        .await
        .unwrap_err();
    assert!(err.to_string().contains("401"), "got: {}", err);
}

#[tokio::test]
async fn test_market_client() {
    let (base, _) = start_mock().await;
    let client = MarketClient::new(format!("{}/fmp", base), Some("fmp-key".into()), 5).unwrap();

    assert_eq!(client.last_close("^KS11").await.unwrap(), 2650.12);

    let statements = client.statements("AAPL").await.unwrap();
    assert_eq!(statements.symbol, "AAPL");
    let names: Vec<&str> = statements.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Income Statement (2023-12-31)",
            "Balance Sheet (2023-12-31)",
            "Cash Flow Statement (2023-12-31)"
        ]
    );
    assert_eq!(statements.tables[0].rows, vec![("income_statementTotal".to_string(), "1000".to_string())]);

    let matches = client.lookup("apple").await.unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "AAPL");

    let bad = MarketClient::new(format!("{}/fmp", base), Some("nope".into()), 5).unwrap();
    let err = bad.lookup("apple").await.unwrap_err();
    assert!(err.to_string().contains("Invalid API KEY"), "got: {}", err);
}

#[tokio::test]
async fn test_gemini_summarizer() {
    let (base, _) = start_mock().await;
    let summarizer =
        GeminiSummarizer::new(format!("{}/gemini", base), "gemini-test", Some("gm-key".into()), 5).unwrap();
    assert_eq!(summarizer.summarize("hello").await.unwrap(), "Summary: 5 chars");
    assert_eq!(
        summarizer.summarize("BLOCKME please").await,
        Err(SummarizeError::NoResponse("SAFETY".into()))
    );

    let keyless = GeminiSummarizer::new(format!("{}/gemini", base), "gemini-test", None, 5).unwrap();
    assert!(matches!(
        keyless.summarize("hello").await,
        Err(SummarizeError::ProviderFailure(_))
    ));
}

#[tokio::test]
async fn test_session_over_http_providers() {
    let (base, _) = start_mock().await;
    let mut session = Session::new(Arc::new(Config::minimal()), mock_providers(&base));

    let outcome = session.search(&SearchForm::keywords(["rust"])).await;
    assert_eq!(outcome.notice, None);
    let results = session.current_results().unwrap();
    assert_eq!(results.total_count, 120);
    // vid_b has no transcript; the rest newest first.
    let ids: Vec<&str> = results.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["vid_c", "vid_a"]);
    assert_eq!(results.items[0].transcript.as_deref(), Some("Charlie speaks"));
    assert_eq!(results.items[1].metadata.view_count, Some(1500));

    let outcome = session.summarize_item("vid_c").await;
    assert_eq!(outcome.notice, None);
    let summary = session.current_summary().unwrap();
    assert_eq!(summary.status, SummaryStatus::Generated);
    assert!(summary.text.starts_with("Summary: "));

    let outcome = session.search(&SearchForm::keywords(["nothing"])).await;
    assert_eq!(outcome.notice, Some(Notice::NoResults("nothing".into())));
    assert!(session.current_summary().is_none());
}

#[tokio::test]
async fn test_news_session_drops_removed_articles() {
    let (base, _) = start_mock().await;
    let mut session = Session::new(Arc::new(Config::minimal()), mock_providers(&base));
    let form = SearchForm {
        source: newsreel::models::SourceTag::News,
        ..SearchForm::keywords(["battery"])
    };
    session.search(&form).await;
    let results = session.current_results().unwrap();
    assert_eq!(results.items.len(), 1);
    assert_eq!(results.items[0].id, "https://example.com/battery");
}
