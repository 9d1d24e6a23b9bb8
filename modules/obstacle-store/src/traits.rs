// Trait abstractions for the two external stores.
//
// IdentityStore is read-only from this system's point of view; identities are
// created by the account service. ReportStore owns canonical reports.

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use obstacle_common::{Identity, Report, ReportStatus};

// ---------------------------------------------------------------------------
// IdentityStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>>;

    /// Case-insensitive lookup on the trimmed address.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>>;

    /// The identity with the lowest id, if any exist.
    async fn first_identity(&self) -> Result<Option<Identity>>;
}

// ---------------------------------------------------------------------------
// ReportStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Insert a new report. Fails if the id is already taken.
    async fn save(&self, report: &Report) -> Result<Uuid>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>>;

    /// Reports that are neither rejected nor merged away, oldest first.
    async fn list_active(&self) -> Result<Vec<Report>>;

    /// Every report including rejected and merged ones, oldest first.
    async fn list_all(&self) -> Result<Vec<Report>>;

    /// Replace an existing report. Fails if it does not exist, and with
    /// [`StaleReport`] if the write would undo a committed review decision.
    async fn update(&self, report: &Report) -> Result<()>;

    /// Replace several reports atomically: either all are written or none.
    /// Same failure rules as [`ReportStore::update`].
    async fn update_many(&self, reports: &[Report]) -> Result<()>;
}

/// The stored report already carries a review decision the write was not
/// based on: a merge target, or a terminal status.
#[derive(Debug, Error)]
#[error("report {id} was changed by a concurrent review")]
pub struct StaleReport {
    pub id: Uuid,
}

/// Whether `next` may replace `current`. Once set, `merged_into` never
/// changes, and only a pending report may change status.
pub fn is_allowed_overwrite(current: &Report, next: &Report) -> bool {
    let merge_kept = current.merged_into.is_none() || current.merged_into == next.merged_into;
    let status_kept = current.status == ReportStatus::Pending || current.status == next.status;
    merge_kept && status_kept
}
