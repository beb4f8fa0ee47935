use crate::api::{handlers, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        // Alert ingestion
        .route(
            "/v1/alerts",
            post(handlers::submit_alert).get(handlers::list_alerts),
        )
        .route("/v1/alerts/:id", get(handlers::get_alert))
        // Dispatch inspection
        .route("/v1/notifications/status", get(handlers::notification_status))
        .route("/v1/notifications/recent", get(handlers::recent_outcomes))
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
        .layer(CorsLayer::permissive())
}
