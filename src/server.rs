//! JSON HTTP front end.
//!
//! Hosts any number of independent [`Session`]s in memory. Each session is
//! behind its own `tokio::sync::Mutex`, so actions on one session run one at
//! a time while different sessions proceed in parallel. A session that sees
//! no request for `[server].session_idle_secs` is dropped and then answers
//! 404 like any unknown id.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/sessions` | Create a session, returns its id |
//! | `GET`  | `/sessions/{id}` | Current results and summary |
//! | `DELETE` | `/sessions/{id}` | Drop a session |
//! | `POST` | `/sessions/{id}/search` | Run a search ([`SearchForm`] body) |
//! | `POST` | `/sessions/{id}/summarize` | Summarize one item (`{"item": …}`) |
//! | `POST` | `/sessions/{id}/recommend` | Recommendation for one item |
//! | `POST` | `/sessions/{id}/insight` | Tags and importance for one item |
//! | `POST` | `/sessions/{id}/aggregate` | Analysis over all current results |
//! | `GET`  | `/sessions/{id}/summary.txt` | Summary as a text attachment |
//! | `GET`  | `/ticker` | Latest index ticker line |
//!
//! # Error Contract
//!
//! Action failures (no results, provider down, blocked generation) are not
//! HTTP errors: they come back with status 200 and a `notice` field. HTTP
//! errors are reserved for malformed requests and unknown sessions:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "no session with id …" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted for browser front ends.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Notice;
use crate::export::SUMMARY_FILE_NAME;
use crate::insight::Insight;
use crate::models::{ResultSet, SummaryRecord};
use crate::session::{ActionOutcome, SearchForm, Session};
use crate::ticker::{spawn_ticker, TickerHandle};
use crate::traits::Providers;

/// A hosted session and when a request last reached it.
struct SessionSlot {
    session: Arc<Mutex<Session>>,
    last_used: Instant,
}

/// In-memory sessions. A session idle for `idle_ttl` is dropped, either by
/// the background sweep or when a request finds it expired.
#[derive(Clone)]
struct SessionStore {
    slots: Arc<RwLock<HashMap<Uuid, SessionSlot>>>,
    idle_ttl: Duration,
}

impl SessionStore {
    fn new(idle_ttl: Duration) -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
        }
    }

    async fn insert(&self, id: Uuid, session: Session) {
        self.slots.write().await.insert(
            id,
            SessionSlot {
                session: Arc::new(Mutex::new(session)),
                last_used: Instant::now(),
            },
        );
    }

    /// The live session for `id`, marking it used.
    async fn touch(&self, id: &Uuid) -> Option<Arc<Mutex<Session>>> {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let slot = slots.get_mut(id)?;
        if now.duration_since(slot.last_used) >= self.idle_ttl {
            slots.remove(id);
            tracing::debug!(session = %id, "idle session expired");
            return None;
        }
        slot.last_used = now;
        Some(slot.session.clone())
    }

    async fn remove(&self, id: &Uuid) -> bool {
        self.slots.write().await.remove(id).is_some()
    }

    /// Drop every expired session; returns how many were dropped.
    async fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| now.duration_since(slot.last_used) < self.idle_ttl);
        before - slots.len()
    }
}

/// Periodically evict idle sessions until aborted.
fn spawn_session_sweeper(store: SessionStore) -> JoinHandle<()> {
    let period = store.idle_ttl.min(Duration::from_secs(60));
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let evicted = store.evict_idle().await;
            if evicted > 0 {
                tracing::info!(evicted, "idle sessions evicted");
            }
        }
    })
}

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    providers: Providers,
    sessions: SessionStore,
    /// Latest ticker line, when `[ticker].enabled`.
    ticker: Option<watch::Receiver<String>>,
}

impl AppState {
    async fn session(&self, id: &str) -> Result<Arc<Mutex<Session>>, AppError> {
        let uuid = Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))?;
        self.sessions
            .touch(&uuid)
            .await
            .ok_or_else(|| not_found(format!("no session with id {}", id)))
    }
}

/// Starts the HTTP server with the given providers.
///
/// Binds to `[server].bind` and runs until the process is terminated. The
/// ticker task, when enabled, and the idle-session sweep live as long as
/// the server.
pub async fn run_server(config: &Config, providers: Providers) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let config = Arc::new(config.clone());

    let ticker: Option<TickerHandle> = config.ticker.enabled.then(|| {
        spawn_ticker(
            providers.market.clone(),
            config.ticker.symbols.clone(),
            Duration::from_secs(config.ticker.interval_secs),
        )
    });

    let sessions = SessionStore::new(Duration::from_secs(config.server.session_idle_secs));
    let sweeper = spawn_session_sweeper(sessions.clone());

    let state = AppState {
        config,
        providers,
        sessions,
        ticker: ticker.as_ref().map(TickerHandle::subscribe),
    };

    let app = router(state);

    tracing::info!(%bind_addr, "server listening");
    eprintln!("newsreel server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    let served = axum::serve(listener, app).await;

    sweeper.abort();
    if let Some(ticker) = ticker {
        ticker.shutdown().await;
    }
    served?;
    Ok(())
}

fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", post(handle_create_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session).delete(handle_delete_session),
        )
        .route("/sessions/{id}/search", post(handle_search))
        .route("/sessions/{id}/summarize", post(handle_summarize))
        .route("/sessions/{id}/recommend", post(handle_recommend))
        .route("/sessions/{id}/insight", post(handle_insight))
        .route("/sessions/{id}/aggregate", post(handle_aggregate))
        .route("/sessions/{id}/summary.txt", get(handle_summary_txt))
        .route("/ticker", get(handle_ticker))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

#[derive(Serialize)]
struct SessionView {
    id: String,
    results: Option<ResultSet>,
    summary: Option<SummaryRecord>,
}

async fn handle_create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionView>) {
    let id = Uuid::new_v4();
    let session = Session::new(state.config.clone(), state.providers.clone());
    state.sessions.insert(id, session).await;
    tracing::debug!(session = %id, "session created");

    (
        StatusCode::CREATED,
        Json(SessionView {
            id: id.to_string(),
            results: None,
            summary: None,
        }),
    )
}

async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = state.session(&id).await?;
    let session = session.lock().await;
    Ok(Json(SessionView {
        id,
        results: session.current_results().cloned(),
        summary: session.current_summary().cloned(),
    }))
}

async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let uuid = Uuid::parse_str(&id).map_err(|_| bad_request(format!("invalid session id: {}", id)))?;
    if state.sessions.remove(&uuid).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("no session with id {}", id)))
    }
}

// ============ Actions ============

/// Body of an action response: the outcome's notice plus whatever the
/// action produced.
#[derive(Serialize)]
struct ActionResponse<T: Serialize> {
    #[serde(skip_serializing_if = "Option::is_none")]
    notice: Option<Notice>,
    #[serde(flatten)]
    payload: T,
}

#[derive(Serialize)]
struct SearchPayload {
    results: Option<ResultSet>,
}

#[derive(Serialize)]
struct SummaryPayload {
    summary: Option<SummaryRecord>,
}

#[derive(Serialize)]
struct TextPayload {
    text: Option<String>,
}

#[derive(Serialize)]
struct InsightPayload {
    insight: Option<Insight>,
}

#[derive(Deserialize)]
struct ItemRequest {
    item: String,
}

#[derive(Deserialize)]
struct AggregateRequest {
    #[serde(default)]
    topic: Option<String>,
}

fn respond<T: Serialize, V>(outcome: ActionOutcome<V>, payload: impl FnOnce(Option<V>) -> T) -> Json<ActionResponse<T>> {
    Json(ActionResponse {
        notice: outcome.notice,
        payload: payload(outcome.value),
    })
}

fn require_item(item: &str) -> Result<(), AppError> {
    if item.trim().is_empty() {
        return Err(bad_request("item must not be empty"));
    }
    Ok(())
}

async fn handle_search(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<SearchForm>,
) -> Result<Json<ActionResponse<SearchPayload>>, AppError> {
    let session = state.session(&id).await?;
    let mut session = session.lock().await;
    let outcome = session.search(&form).await;
    let results = session.current_results().cloned();
    Ok(respond(outcome, |_| SearchPayload { results }))
}

async fn handle_summarize(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<ActionResponse<SummaryPayload>>, AppError> {
    require_item(&req.item)?;
    let session = state.session(&id).await?;
    let outcome = session.lock().await.summarize_item(&req.item).await;
    Ok(respond(outcome, |summary| SummaryPayload { summary }))
}

async fn handle_recommend(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<ActionResponse<TextPayload>>, AppError> {
    require_item(&req.item)?;
    let session = state.session(&id).await?;
    let outcome = session.lock().await.recommend(&req.item).await;
    Ok(respond(outcome, |text| TextPayload { text }))
}

async fn handle_insight(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ItemRequest>,
) -> Result<Json<ActionResponse<InsightPayload>>, AppError> {
    require_item(&req.item)?;
    let session = state.session(&id).await?;
    let outcome = session.lock().await.insight(&req.item).await;
    Ok(respond(outcome, |insight| InsightPayload { insight }))
}

async fn handle_aggregate(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<AggregateRequest>,
) -> Result<Json<ActionResponse<SummaryPayload>>, AppError> {
    let session = state.session(&id).await?;
    let outcome = session.lock().await.aggregate(req.topic.as_deref()).await;
    Ok(respond(outcome, |summary| SummaryPayload { summary }))
}

// ============ GET /sessions/{id}/summary.txt ============

async fn handle_summary_txt(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = state.session(&id).await?;
    let outcome = session.lock().await.export_summary();
    let text = match (outcome.value, outcome.notice) {
        (Some(text), _) => text,
        (None, notice) => {
            let message = notice.map_or_else(|| "there is no summary to export".to_string(), |n| n.to_string());
            return Err(not_found(message));
        }
    };

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", SUMMARY_FILE_NAME),
        ),
    ];
    Ok((headers, text).into_response())
}

// ============ GET /ticker ============

#[derive(Serialize)]
struct TickerResponse {
    enabled: bool,
    display: String,
}

async fn handle_ticker(State(state): State<AppState>) -> Json<TickerResponse> {
    Json(match &state.ticker {
        Some(rx) => TickerResponse {
            enabled: true,
            display: rx.borrow().clone(),
        },
        None => TickerResponse {
            enabled: false,
            display: String::new(),
        },
    })
}
