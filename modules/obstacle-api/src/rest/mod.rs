pub mod review;

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use obstacle_common::{GeometryType, ObstacleError, Report, ReportStatus};
use obstacle_intake::Submission;
use obstacle_review::{list_reports, ReportListing, ReportQuery, ReportSort};

use crate::{ApiError, AppState, JsonBody};

pub use review::{api_add_comment, api_approve, api_merge, api_reject, api_report_duplicates};

/// Identity of the authenticated caller, set by the fronting auth layer.
pub const REPORTER_ID_HEADER: &str = "x-reporter-id";

// --- Views ---

/// Report as sent to clients. The photo bytes stay server side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    #[serde(flatten)]
    pub report: Report,
    pub geometry_type: GeometryType,
    pub status_label: &'static str,
    pub has_photo: bool,
}

impl From<Report> for ReportView {
    fn from(report: Report) -> Self {
        Self {
            geometry_type: report.geometry_type(),
            status_label: report.status.label(),
            has_photo: report.has_photo(),
            report,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingView {
    #[serde(flatten)]
    pub report: ReportView,
    pub duplicate_count: usize,
}

impl From<ReportListing> for ListingView {
    fn from(listing: ReportListing) -> Self {
        Self {
            report: listing.report.into(),
            duplicate_count: listing.duplicate_count,
        }
    }
}

// --- Query structs ---

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    sort: Option<String>,
    include_merged: Option<bool>,
}

impl ListQuery {
    fn into_report_query(self) -> Result<ReportQuery, ObstacleError> {
        Ok(ReportQuery {
            status: self
                .status
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .map(str::parse::<ReportStatus>)
                .transpose()?,
            sort: self
                .sort
                .as_deref()
                .map(str::parse::<ReportSort>)
                .transpose()?
                .unwrap_or_default(),
            include_merged: self.include_merged.unwrap_or(false),
        })
    }
}

// --- Helpers ---

fn authenticated_reporter(headers: &HeaderMap) -> Result<Option<i64>, ObstacleError> {
    let Some(value) = headers.get(REPORTER_ID_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(Some)
        .ok_or_else(|| ObstacleError::Validation("X-Reporter-Id must be an integer".into()))
}

// --- Handlers ---

pub async fn api_submit_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    JsonBody(submission): JsonBody<Submission>,
) -> Result<impl IntoResponse, ApiError> {
    let authenticated = authenticated_reporter(&headers)?;
    let report = state.ingestor.ingest(&submission, authenticated).await?;
    Ok((StatusCode::CREATED, Json(ReportView::from(report))))
}

pub async fn api_list_reports(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let query = params.into_report_query()?;
    let listings = list_reports(state.workflow.store(), state.workflow.detector(), &query).await?;
    let reports: Vec<ListingView> = listings.into_iter().map(ListingView::from).collect();
    Ok(Json(serde_json::json!({ "reports": reports })))
}

pub async fn api_report_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.workflow.report(id).await?;
    Ok(Json(ReportView::from(report)))
}
