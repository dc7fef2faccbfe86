//! HTTP route handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::verify_secret;
use super::types::{ErrorResponse, HealthResponse, SolveRequest, SolveResponse, SolveResult};
use crate::chain::TaskId;
use crate::config::Config;
use crate::llm::{LlmClient, OpenRouterClient};
use crate::runner::ChainRunner;

/// Shared application state.
pub struct AppState {
    pub runner: ChainRunner,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(runner: ChainRunner) -> Self {
        Self {
            runner,
            started_at: Instant::now(),
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/solve", post(solve))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let llm: Arc<dyn LlmClient> = Arc::new(OpenRouterClient::with_base_url(
        config.api_key.clone(),
        config.llm_base_url.clone(),
    ));
    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(ChainRunner::new(config, llm)));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

/// Validate, authenticate, then run one chain to completion.
async fn solve(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SolveRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match payload {
        Ok(req) => req,
        Err(rejection) => {
            tracing::debug!("Rejected /solve body: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let url = req.url.trim();
    let valid_url = url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    if !valid_url {
        return error_response(StatusCode::BAD_REQUEST, "url must be an absolute http(s) URL");
    }
    if req.secret.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "secret is required");
    }

    let credentials = match state.runner.config().credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!("Cannot serve /solve: {}", e);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Server credentials are not configured");
        }
    };

    if let Err(e) = verify_secret(&req.secret, &credentials.secret) {
        return e.into_response();
    }

    if req.email.as_deref().is_some_and(|e| e != credentials.email) {
        tracing::debug!("Ignoring caller email; submissions use the configured identity");
    }

    let started_at = chrono::Utc::now();
    let summary = state.runner.run(TaskId::from(url), credentials).await;
    let finished_at = chrono::Utc::now();

    Json(SolveResponse {
        status: summary.status.label().to_string(),
        url: url.to_string(),
        started_at: started_at.to_rfc3339(),
        finished_at: finished_at.to_rfc3339(),
        result: SolveResult {
            last_task: summary.last_task.to_string(),
            total_attempts: summary.total_attempts,
            tasks_visited: summary.tasks_visited,
            elapsed_ms: u64::try_from(summary.elapsed.as_millis()).unwrap_or(u64::MAX),
            message: summary.message(),
        },
    })
    .into_response()
}
