//! HTTP server wiring

use crate::config::AppConfig;
use crate::handlers::{self, AppState};
use crate::metrics::MetricsReporter;
use crate::models::ModelLoader;
use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Build the router over a ready state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/predict", post(handlers::predict))
        .route("/api/predict", post(handlers::api_predict))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the model and build the shared state. Fails if the artifact cannot
/// be loaded, so no server is ever built without a model.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let model = ModelLoader::with_threads(config.model.onnx_threads)
        .load(&config.model.path)
        .with_context(|| format!("Failed to load model from {}", config.model.path))?;

    info!(model = model.kind(), path = %config.model.path, "Model ready");

    Ok(AppState::new(model, config.risk_levels.clone()))
}

/// Load the model, then bind and serve until Ctrl-C.
pub async fn run(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;
    let addr = config.bind_addr()?;

    let reporter = MetricsReporter::new(state.metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let metrics = state.metrics.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, debug = config.server.debug, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    metrics.print_summary();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
