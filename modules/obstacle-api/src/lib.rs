//! HTTP surface for obstacle report intake and administrator review.

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use obstacle_intake::ReportIngestor;
use obstacle_review::ApprovalWorkflow;

pub mod error;
pub mod extract;
pub mod rest;

pub use error::ApiError;
pub use extract::JsonBody;

pub struct AppState {
    pub ingestor: ReportIngestor,
    pub workflow: ApprovalWorkflow,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Intake
        .route("/api/reports", post(rest::api_submit_report).get(rest::api_list_reports))
        .route("/api/reports/{id}", get(rest::api_report_detail))
        // Review
        .route("/api/reports/{id}/duplicates", get(rest::api_report_duplicates))
        .route("/api/reports/{id}/approve", post(rest::api_approve))
        .route("/api/reports/{id}/merge", post(rest::api_merge))
        .route("/api/reports/{id}/reject", post(rest::api_reject))
        .route("/api/reports/{id}/comments", post(rest::api_add_comment))
        .with_state(state)
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Method + path + status + latency only. Bodies carry photos and
        // reporter details.
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}
