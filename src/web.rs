use crate::context::{RetrievalContext, RetrievalError, SimilarityResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::signal;

type SharedState = Arc<RetrievalContext>;

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

pub fn router(ctx: Arc<RetrievalContext>) -> Router {
    Router::new()
        .route("/api", get(hello))
        .route("/api/health", get(health))
        .route("/api/similarity", post(similarity))
        .route("/api/similarity/partial", post(similarity_partial))
        .fallback(not_found)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(ctx)
}

async fn start_app(ctx: RetrievalContext, addr: &str) -> anyhow::Result<()> {
    let app = router(Arc::new(ctx));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn start_daemon(ctx: RetrievalContext, addr: &str) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async { start_app(ctx, addr).await })
}

#[derive(Debug)]
struct HttpError(RetrievalError);

impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        match self.0 {
            RetrievalError::Embedding(_) => {
                log::error!("{self:?}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(json!({"error": self.0.to_string()})),
                )
            }
        }
        .into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<RetrievalError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimilarityRequest {
    pub query: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub demonstrations: usize,
    pub categories: usize,
}

async fn hello() -> Json<&'static str> {
    Json("Hello from demo-retriever!")
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"})))
}

async fn health(State(ctx): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: ctx.model_name().to_string(),
        demonstrations: ctx.demonstrations().len(),
        categories: ctx.keywords().len(),
    })
}

async fn similarity(
    State(ctx): State<SharedState>,
    Json(payload): Json<SimilarityRequest>,
) -> Result<Json<SimilarityResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || ctx.similarity(&payload.query))
        .map(Json)
        .map_err(Into::into)
}

async fn similarity_partial(
    State(ctx): State<SharedState>,
    Json(payload): Json<SimilarityRequest>,
) -> Result<Json<SimilarityResponse>, HttpError> {
    log::debug!("payload: {payload:?}");

    tokio::task::block_in_place(move || ctx.similarity_partial(&payload.query))
        .map(Json)
        .map_err(Into::into)
}
