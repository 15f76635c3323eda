use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use grepd_engine::DirSearcher;
use grepd_engine::DocumentStore;
use grepd_engine::EngineError;
use grepd_engine::Match;
use grepd_engine::Search;
use serde::Deserialize;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared state behind the two narrow capabilities the HTTP layer needs.
/// Handlers depend on the `Search` and `DocumentStore` traits, not on the
/// concrete engine.
#[derive(Clone)]
pub struct AppState {
    search: Arc<dyn Search>,
    store: Arc<dyn DocumentStore>,
    documents: usize,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(searcher: Arc<DirSearcher>, shutdown: CancellationToken) -> Self {
        Self {
            documents: searcher.file_set().len(),
            search: searcher.clone(),
            store: searcher,
            shutdown,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/documents/{name}", get(document_handler))
        .with_state(state)
}

pub async fn run_daemon(listen: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();
    let listener = TcpListener::bind(listen).await?;
    info!("grepd listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    documents: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        documents: state.documents,
    })
}

#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

/// `GET /search?q=<query>`. The process-wide shutdown token doubles as the
/// search's cancellation signal: once the server starts shutting down,
/// in-flight searches stop dispatching new file scans.
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<Vec<Match>> {
    Json(state.search.search(&params.q, &state.shutdown).await)
}

/// `GET /documents/{name}`. Success is the raw document body as plain text;
/// a missing or unreadable document maps to 404.
async fn document_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    match state.store.get_document(&name).await {
        Ok(content) => Ok((
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response()),
        Err(err @ EngineError::DocumentNotFound(_)) => Err(AppError::not_found(err)),
        Err(err) => Err(AppError::internal(err)),
    }
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn not_found(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: err.to_string(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}
