use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use obstacle_common::geo::{valid_lat, valid_lon};
use obstacle_common::{
    clamp_text, ObstacleError, Report, ReportStatus, Result, COMMENTS_MAX_CHARS,
    DESCRIPTION_MAX_CHARS,
};
use obstacle_store::ReportStore;

use crate::geometry::resolve_geometry;
use crate::identity::{IdentityClaims, IdentityResolver};
use crate::photo::decode_photo;
use crate::submission::{NumberOrText, Submission};

/// Builds canonical reports from submissions and persists them.
pub struct ReportIngestor {
    reports: Arc<dyn ReportStore>,
    identities: IdentityResolver,
}

impl ReportIngestor {
    pub fn new(reports: Arc<dyn ReportStore>, identities: IdentityResolver) -> Self {
        Self { reports, identities }
    }

    /// Normalize and store one submission. The record is built completely in
    /// memory and written with a single `save`.
    pub async fn ingest(
        &self,
        submission: &Submission,
        authenticated_id: Option<i64>,
    ) -> Result<Report> {
        let obstacle_type = submission
            .obstacle_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ObstacleError::Validation("obstacleType is required".into()))?
            .to_string();

        let explicit_id = parse_reporter_id(submission.reporter_id.as_ref())?;
        let height_meters = parse_height(submission.height.as_ref())?;

        let position = resolve_geometry(
            submission.latitude.as_ref(),
            submission.longitude.as_ref(),
            submission.geometry.as_ref(),
        );
        if position.resolved && !(valid_lat(position.lat) && valid_lon(position.lon)) {
            return Err(ObstacleError::Validation(format!(
                "coordinates out of range: latitude {}, longitude {}",
                position.lat, position.lon
            )));
        }
        if !position.resolved {
            warn!(
                obstacle_type = %obstacle_type,
                has_geometry = submission.geometry.is_some(),
                "Unresolved geometry, storing report at (0, 0)"
            );
        }

        let reporter = self
            .identities
            .resolve(IdentityClaims {
                explicit_id,
                authenticated_id,
                email: submission.reporter_email.as_deref(),
            })
            .await?;

        let photo = submission
            .photo
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .and_then(|raw| match decode_photo(raw) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    warn!(error = %e, "Photo could not be decoded, storing report without it");
                    None
                }
            });

        let now = Utc::now();
        let report = Report {
            id: Uuid::new_v4(),
            reporter_id: reporter.id,
            obstacle_type,
            geometry: position.geometry,
            geometry_resolved: position.resolved,
            height_meters,
            description: clamp_text(submission.description.as_deref(), DESCRIPTION_MAX_CHARS),
            comments: clamp_text(submission.comments.as_deref(), COMMENTS_MAX_CHARS),
            status: ReportStatus::Pending,
            reject_reason: None,
            merged_into: None,
            notes: Vec::new(),
            photo,
            created_at: now,
            updated_at: now,
        };

        self.reports
            .save(&report)
            .await
            .map_err(ObstacleError::Persistence)?;

        info!(
            report_id = %report.id,
            reporter_id = report.reporter_id,
            reporter_source = %reporter.source,
            obstacle_type = %report.obstacle_type,
            geometry_type = %report.geometry_type(),
            geometry_resolved = report.geometry_resolved,
            has_photo = report.has_photo(),
            "Obstacle report ingested"
        );

        Ok(report)
    }
}

fn parse_reporter_id(raw: Option<&NumberOrText>) -> Result<Option<i64>> {
    match raw {
        None => Ok(None),
        Some(v) if v.is_blank() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| ObstacleError::Validation("reporterId must be an integer".into())),
    }
}

/// Unparseable heights are dropped; negative ones are refused.
fn parse_height(raw: Option<&NumberOrText>) -> Result<Option<f64>> {
    let Some(v) = raw.filter(|v| !v.is_blank()) else {
        return Ok(None);
    };
    match v.as_f64() {
        None => {
            warn!(height = ?v, "Height is not a number, storing report without height");
            Ok(None)
        }
        Some(h) if h < 0.0 => Err(ObstacleError::Validation(format!(
            "height must not be negative, got {h}"
        ))),
        Some(h) => Ok(Some(h)),
    }
}
