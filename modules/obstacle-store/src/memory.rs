//! In-memory stores. Used by tests and by the API when no database is
//! configured. Thread-safe via interior `RwLock`.

use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use obstacle_common::{Identity, Report};

use crate::traits::{is_allowed_overwrite, IdentityStore, ReportStore, StaleReport};

// ---------------------------------------------------------------------------
// MemoryIdentityStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: RwLock<BTreeMap<i64, Identity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identities(identities: impl IntoIterator<Item = Identity>) -> Self {
        Self {
            identities: RwLock::new(identities.into_iter().map(|i| (i.id, i)).collect()),
        }
    }

    pub async fn insert(&self, identity: Identity) {
        self.identities.write().await.insert(identity.id, identity);
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>> {
        Ok(self.identities.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let email = email.trim();
        Ok(self
            .identities
            .read()
            .await
            .values()
            .find(|i| i.email.trim().eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn first_identity(&self) -> Result<Option<Identity>> {
        Ok(self.identities.read().await.values().next().cloned())
    }
}

// ---------------------------------------------------------------------------
// MemoryReportStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryReportStore {
    reports: RwLock<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.reports.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.reports.read().await.is_empty()
    }

    async fn sorted(&self, keep: impl Fn(&Report) -> bool) -> Vec<Report> {
        let mut reports: Vec<Report> = self
            .reports
            .read()
            .await
            .values()
            .filter(|r| keep(r))
            .cloned()
            .collect();
        reports.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        reports
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn save(&self, report: &Report) -> Result<Uuid> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.id) {
            bail!("report {} already exists", report.id);
        }
        reports.insert(report.id, report.clone());
        Ok(report.id)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.reports.read().await.get(&id).cloned())
    }

    async fn list_active(&self) -> Result<Vec<Report>> {
        Ok(self.sorted(Report::is_active).await)
    }

    async fn list_all(&self) -> Result<Vec<Report>> {
        Ok(self.sorted(|_| true).await)
    }

    async fn update(&self, report: &Report) -> Result<()> {
        let mut reports = self.reports.write().await;
        check_overwrite(&reports, report)?;
        reports.insert(report.id, report.clone());
        Ok(())
    }

    async fn update_many(&self, batch: &[Report]) -> Result<()> {
        let mut reports = self.reports.write().await;
        for report in batch {
            check_overwrite(&reports, report)?;
        }
        for report in batch {
            reports.insert(report.id, report.clone());
        }
        Ok(())
    }
}

fn check_overwrite(reports: &HashMap<Uuid, Report>, next: &Report) -> Result<()> {
    match reports.get(&next.id) {
        None => bail!("report {} does not exist", next.id),
        Some(current) if !is_allowed_overwrite(current, next) => {
            Err(StaleReport { id: next.id }.into())
        }
        Some(_) => Ok(()),
    }
}
