pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(routes::health::health))
        // Metrics & advice
        .route("/api/sprint-metrics", get(routes::metrics::get_sprint_metrics))
        .route(
            "/api/recommendations",
            get(routes::recommendations::get_recommendations),
        )
        .route(
            "/api/recommendations/apply",
            post(routes::recommendations::apply_recommendation),
        )
        // Sprints & issues
        .route("/api/sprints", get(routes::sprints::list_sprints))
        .route("/api/sprints/active", get(routes::sprints::get_active_sprint))
        .route("/api/sprints/{id}", get(routes::sprints::get_sprint))
        .route(
            "/api/sprints/{id}/issues",
            get(routes::sprints::list_sprint_issues),
        )
        .route(
            "/api/sprints/{id}/snapshots",
            get(routes::sprints::list_sprint_snapshots),
        )
        .route("/api/issues/{id}", patch(routes::issues::update_issue))
        // Team
        .route(
            "/api/team",
            get(routes::team::list_team).post(routes::team::upsert_member),
        )
        // Feed
        .route("/api/activities", get(routes::activity::list_activities))
        .route("/api/achievements", get(routes::activity::list_achievements))
        // Tracker
        .route("/api/tracker/status", get(routes::tracker::tracker_status))
        .route("/api/sync", post(routes::tracker::sync))
        // Config
        .route(
            "/api/config",
            get(routes::config::get_config).patch(routes::config::update_config),
        )
        // Chat
        .route("/api/chat", post(routes::chat::chat))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn not_found(uri: axum::http::Uri) -> error::AppError {
    error::AppError::not_found(format!("no route for {uri}"))
}

/// Start the API server on `port`.
pub async fn serve(app_state: state::AppState, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(app_state, listener).await
}

/// Start the API server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    app_state: state::AppState,
    listener: tokio::net::TcpListener,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let store = app_state.store.clone();
    let app = build_router(app_state);

    tracing::info!("pitstop API listening on http://localhost:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    match std::sync::Arc::try_unwrap(store) {
        Ok(store) => store.close()?,
        Err(_) => tracing::warn!("store still referenced at shutdown; leaving it to drop"),
    }
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
