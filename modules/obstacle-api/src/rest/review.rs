use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use obstacle_common::ObstacleError;
use obstacle_review::{ApprovalOutcome, DuplicateMatch};

use super::ReportView;
use crate::{ApiError, AppState, JsonBody};

#[derive(Deserialize)]
pub struct DuplicatesQuery {
    radius: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveRequest {
    #[serde(default)]
    bypass_duplicates: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    duplicate_ids: Vec<Uuid>,
}

#[derive(Deserialize)]
pub struct RejectRequest {
    reason: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    author_id: i64,
    body: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateView {
    #[serde(flatten)]
    report: ReportView,
    distance_meters: f64,
}

impl From<DuplicateMatch> for CandidateView {
    fn from(m: DuplicateMatch) -> Self {
        Self {
            report: m.report.into(),
            distance_meters: m.distance_meters,
        }
    }
}

fn candidates(matches: Vec<DuplicateMatch>) -> Vec<CandidateView> {
    matches.into_iter().map(CandidateView::from).collect()
}

pub async fn api_report_duplicates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<DuplicatesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(radius) = params.radius.filter(|r| !r.is_finite() || *r <= 0.0) {
        return Err(ObstacleError::Validation(format!("radius must be positive, got {radius}")).into());
    }
    let matches = state.workflow.duplicates_for(id, params.radius).await?;
    Ok(Json(serde_json::json!({ "duplicates": candidates(matches) })))
}

/// `200` with `"outcome": "approved"`, or `200` with
/// `"outcome": "needs_decision"` and the candidates when duplicates exist.
pub async fn api_approve(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    body: Option<JsonBody<ApproveRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let bypass_duplicates = body.is_some_and(|JsonBody(request)| request.bypass_duplicates);
    let response = match state.workflow.approve(id, bypass_duplicates).await? {
        ApprovalOutcome::Approved { report } => serde_json::json!({
            "outcome": "approved",
            "report": ReportView::from(report),
        }),
        ApprovalOutcome::NeedsDecision { report, candidates: found } => serde_json::json!({
            "outcome": "needs_decision",
            "report": ReportView::from(report),
            "candidates": candidates(found),
        }),
    };
    Ok(Json(response))
}

pub async fn api_merge(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<MergeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .workflow
        .merge_and_approve(id, &request.duplicate_ids)
        .await?;
    let merged: Vec<ReportView> = outcome.merged.into_iter().map(ReportView::from).collect();
    Ok(Json(serde_json::json!({
        "target": ReportView::from(outcome.target),
        "merged": merged,
    })))
}

pub async fn api_reject(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<RejectRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.workflow.reject(id, &request.reason).await?;
    Ok(Json(ReportView::from(report)))
}

pub async fn api_add_comment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    JsonBody(request): JsonBody<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state
        .workflow
        .add_comment(id, request.author_id, &request.body)
        .await?;
    Ok(Json(ReportView::from(report)))
}
