//! Approval state machine.
//!
//! ```text
//!   Pending ──approve (no duplicates, or bypassed)──▶ Approved
//!      │    ──merge_and_approve(duplicates)────────▶ Approved  (duplicates stamped merged_into)
//!      └────reject(reason)─────────────────────────▶ Rejected
//! ```
//!
//! Approved and Rejected are terminal. Comments are allowed in every state.
//! Each mutation locks the reports it touches, re-reads them, validates the
//! transition against committed state, then writes.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use obstacle_common::{
    clamp_text, ObstacleError, Report, ReportNote, ReportStatus, Result, COMMENTS_MAX_CHARS,
};
use obstacle_store::{ReportStore, StaleReport};

use crate::dedup::{DuplicateDetector, DuplicateMatch};
use crate::locks::ReportLocks;

/// Result of a direct approval request.
#[derive(Debug, Clone)]
pub enum ApprovalOutcome {
    Approved { report: Report },
    /// Duplicates exist; nothing changed. The administrator must either
    /// approve with bypass or merge.
    NeedsDecision {
        report: Report,
        candidates: Vec<DuplicateMatch>,
    },
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub target: Report,
    pub merged: Vec<Report>,
}

pub struct ApprovalWorkflow {
    reports: Arc<dyn ReportStore>,
    detector: DuplicateDetector,
    locks: ReportLocks,
}

impl ApprovalWorkflow {
    pub fn new(reports: Arc<dyn ReportStore>, detector: DuplicateDetector) -> Self {
        Self {
            reports,
            detector,
            locks: ReportLocks::new(),
        }
    }

    pub fn detector(&self) -> &DuplicateDetector {
        &self.detector
    }

    pub fn store(&self) -> &dyn ReportStore {
        self.reports.as_ref()
    }

    pub async fn report(&self, id: Uuid) -> Result<Report> {
        self.load(id).await
    }

    /// Duplicate candidates for a report against the current active set.
    /// Read-only; runs without locks against a snapshot.
    pub async fn duplicates_for(&self, id: Uuid, radius_meters: Option<f64>) -> Result<Vec<DuplicateMatch>> {
        let target = self.load(id).await?;
        let active = self.active_set().await?;
        let detector = radius_meters.map(DuplicateDetector::new).unwrap_or(self.detector);
        Ok(detector.find(&target, &active))
    }

    /// Approve a pending report. With duplicates present and no bypass, the
    /// report is left untouched and the candidates are returned.
    pub async fn approve(&self, id: Uuid, bypass_duplicates: bool) -> Result<ApprovalOutcome> {
        let _lock = self.locks.acquire(&[id]).await;
        let mut report = self.load(id).await?;
        ensure_pending(&report, "approve")?;

        if !bypass_duplicates {
            let candidates = self.detector.find(&report, &self.active_set().await?);
            if !candidates.is_empty() {
                info!(
                    report_id = %id,
                    candidates = candidates.len(),
                    "Approval held: duplicate candidates need a decision"
                );
                return Ok(ApprovalOutcome::NeedsDecision { report, candidates });
            }
        }

        report.status = ReportStatus::Approved;
        report.updated_at = Utc::now();
        self.reports
            .update(&report)
            .await
            .map_err(|err| write_failure(err, "approve"))?;

        info!(report_id = %id, bypass_duplicates, "Report approved");
        Ok(ApprovalOutcome::Approved { report })
    }

    /// Approve `target_id` and absorb every report in `duplicate_ids` into it.
    /// All-or-nothing: any invalid duplicate aborts the whole merge.
    pub async fn merge_and_approve(&self, target_id: Uuid, duplicate_ids: &[Uuid]) -> Result<MergeOutcome> {
        let mut seen = HashSet::new();
        let duplicate_ids: Vec<Uuid> = duplicate_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();
        if duplicate_ids.is_empty() {
            return Err(ObstacleError::Validation(
                "merge requires at least one duplicate id".into(),
            ));
        }
        if duplicate_ids.contains(&target_id) {
            return Err(ObstacleError::Validation(format!(
                "report {target_id} cannot be merged into itself"
            )));
        }

        let mut lock_ids = duplicate_ids.clone();
        lock_ids.push(target_id);
        let _lock = self.locks.acquire(&lock_ids).await;

        let mut target = self.load(target_id).await?;
        ensure_pending(&target, "approve")?;

        let mut duplicates = Vec::with_capacity(duplicate_ids.len());
        for id in &duplicate_ids {
            let duplicate = self.load(*id).await?;
            if let Some(into) = duplicate.merged_into {
                return Err(ObstacleError::InvalidTransition {
                    id: duplicate.id,
                    status: format!("already merged into {into}"),
                    action: "merge",
                });
            }
            if duplicate.status == ReportStatus::Rejected {
                return Err(ObstacleError::invalid_transition(
                    duplicate.id,
                    duplicate.status,
                    "merge",
                ));
            }
            duplicates.push(duplicate);
        }

        let detected: HashSet<Uuid> = self
            .detector
            .find(&target, &duplicates)
            .into_iter()
            .map(|m| m.report.id)
            .collect();
        for d in duplicates.iter().filter(|d| !detected.contains(&d.id)) {
            warn!(
                target_id = %target_id,
                duplicate_id = %d.id,
                "Merging a report the detector does not consider a duplicate"
            );
        }

        let now = Utc::now();
        target.status = ReportStatus::Approved;
        target.updated_at = now;
        for d in &mut duplicates {
            d.merged_into = Some(target.id);
            d.updated_at = now;
        }

        let mut batch = Vec::with_capacity(duplicates.len() + 1);
        batch.push(target.clone());
        batch.extend(duplicates.iter().cloned());
        self.reports
            .update_many(&batch)
            .await
            .map_err(|err| write_failure(err, "merge"))?;

        info!(
            target_id = %target_id,
            merged = duplicates.len(),
            "Report approved with duplicates merged"
        );
        Ok(MergeOutcome {
            target,
            merged: duplicates,
        })
    }

    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Report> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ObstacleError::Validation("a reject reason is required".into()));
        }

        let _lock = self.locks.acquire(&[id]).await;
        let mut report = self.load(id).await?;
        ensure_pending(&report, "reject")?;

        report.status = ReportStatus::Rejected;
        report.reject_reason = Some(reason.to_string());
        report.updated_at = Utc::now();
        self.reports
            .update(&report)
            .await
            .map_err(|err| write_failure(err, "reject"))?;

        info!(report_id = %id, "Report rejected");
        Ok(report)
    }

    /// Annotate a report in any state. Status is never touched.
    pub async fn add_comment(&self, id: Uuid, author_id: i64, body: &str) -> Result<Report> {
        let Some(body) = clamp_text(Some(body), COMMENTS_MAX_CHARS) else {
            return Err(ObstacleError::Validation("comment body is required".into()));
        };

        let _lock = self.locks.acquire(&[id]).await;
        let mut report = self.load(id).await?;

        let now = Utc::now();
        report.comments = Some(body.clone());
        report.notes.push(ReportNote {
            author_id,
            body,
            created_at: now,
        });
        report.updated_at = now;
        self.reports
            .update(&report)
            .await
            .map_err(|err| write_failure(err, "comment on"))?;

        info!(report_id = %id, author_id, notes = report.notes.len(), "Comment added");
        Ok(report)
    }

    async fn load(&self, id: Uuid) -> Result<Report> {
        self.reports
            .find_by_id(id)
            .await
            .map_err(ObstacleError::Persistence)?
            .ok_or(ObstacleError::NotFound(id))
    }

    async fn active_set(&self) -> Result<Vec<Report>> {
        self.reports
            .list_active()
            .await
            .map_err(ObstacleError::Persistence)
    }
}

/// Another process committed a decision on a report after it was read here.
/// The local lock only covers this process, so the store has the last word.
fn write_failure(err: anyhow::Error, action: &'static str) -> ObstacleError {
    match err.downcast_ref::<StaleReport>() {
        Some(stale) => {
            warn!(report_id = %stale.id, action, "Write lost to a concurrent review");
            ObstacleError::InvalidTransition {
                id: stale.id,
                status: "changed by a concurrent review".into(),
                action,
            }
        }
        None => ObstacleError::Persistence(err),
    }
}

fn ensure_pending(report: &Report, action: &'static str) -> Result<()> {
    if let Some(into) = report.merged_into {
        return Err(ObstacleError::InvalidTransition {
            id: report.id,
            status: format!("merged into {into}"),
            action,
        });
    }
    if report.status.is_terminal() {
        return Err(ObstacleError::invalid_transition(report.id, report.status, action));
    }
    Ok(())
}
