use crate::core::fanout::{aggregate, parse_targets, RaceOutcome};
use crate::core::{ConfigProvider, Deadline, Fetcher, NumberSet, NumbersPayload};
use crate::utils::error::{Result, ServiceError};
use axum::extract::{RawQuery, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Shared, read-only state of the aggregate endpoint.
pub struct AppState {
    fetcher: Arc<dyn Fetcher>,
    fetch_budget: Duration,
    query_key: String,
}

impl AppState {
    pub fn new<C: ConfigProvider + ?Sized>(fetcher: Arc<dyn Fetcher>, config: &C) -> Self {
        Self {
            fetcher,
            fetch_budget: config.fetch_budget(),
            query_key: config.query_key().to_string(),
        }
    }
}

/// Build the axum Router: the aggregate endpoint on `route` plus `/health`.
pub fn router(state: Arc<AppState>, route: &str) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(route, get(handle_numbers))
        .with_state(state)
}

/// 綁定設定的位址並開始服務，收到 Ctrl-C / SIGTERM 時優雅關閉
pub async fn serve<C: ConfigProvider + ?Sized>(config: &C, fetcher: Arc<dyn Fetcher>) -> Result<()> {
    let addr = config.listen_addr().to_string();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServiceError::BindError {
            addr: addr.clone(),
            source,
        })?;

    let app = router(Arc::new(AppState::new(fetcher, config)), config.route());
    tracing::info!(
        "🌐 Listening on http://{}{} (deadline {:?}, fetch budget {:?})",
        addr,
        config.route(),
        config.deadline(),
        config.fetch_budget()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_numbers(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> Result<Response> {
    // The deadline starts before anything else so parsing counts against the budget too.
    let deadline = Deadline::after(state.fetch_budget);

    let raw_values = query_values(query.as_deref().unwrap_or_default(), &state.query_key);
    tracing::info!(targets = raw_values.len(), "🚀 Processing new request");

    let targets = parse_targets(raw_values.iter().map(String::as_str));
    let skipped = raw_values.len() - targets.len();
    let aggregation = aggregate(Arc::clone(&state.fetcher), targets, deadline).await;

    match aggregation.race {
        RaceOutcome::AllFinished => tracing::info!("✅ All endpoints processed"),
        RaceOutcome::DeadlineReached { aborted } => {
            tracing::warn!(aborted, "⏱️ Some endpoints did not answer before the deadline")
        }
    }
    tracing::info!(
        numbers = aggregation.numbers.len(),
        succeeded = aggregation.succeeded,
        failed = aggregation.failed,
        skipped,
        elapsed = ?aggregation.elapsed,
        "📤 Responding"
    );

    render(aggregation.numbers)
}

/// Every value of the repeated `key`, in query order.
fn query_values(query: &str, key: &str) -> Vec<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .filter(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .collect()
}

fn render(numbers: NumberSet) -> Result<Response> {
    let body = serde_json::to_vec(&NumbersPayload::from(numbers))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received");
}
