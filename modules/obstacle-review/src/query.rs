//! Admin listing: filter by status, sort, and annotate each report with its
//! duplicate count.

use std::str::FromStr;

use serde::Serialize;

use obstacle_common::{ObstacleError, Report, ReportStatus, Result};
use obstacle_store::ReportStore;

use crate::dedup::DuplicateDetector;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportSort {
    #[default]
    Newest,
    Oldest,
    MostDuplicates,
}

impl FromStr for ReportSort {
    type Err = ObstacleError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "newest" => Ok(ReportSort::Newest),
            "oldest" => Ok(ReportSort::Oldest),
            "duplicates" | "most_duplicates" => Ok(ReportSort::MostDuplicates),
            other => Err(ObstacleError::Validation(format!("unknown sort order: {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportQuery {
    pub status: Option<ReportStatus>,
    pub sort: ReportSort,
    /// Include reports already absorbed into another by a merge.
    pub include_merged: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportListing {
    #[serde(flatten)]
    pub report: Report,
    pub duplicate_count: usize,
}

/// Duplicate counts are computed among the reports that pass the filters.
pub async fn list_reports(
    store: &dyn ReportStore,
    detector: &DuplicateDetector,
    query: &ReportQuery,
) -> Result<Vec<ReportListing>> {
    let filtered: Vec<Report> = store
        .list_all()
        .await
        .map_err(ObstacleError::Persistence)?
        .into_iter()
        .filter(|r| query.include_merged || r.merged_into.is_none())
        .filter(|r| query.status.map_or(true, |s| r.status == s))
        .collect();

    let counts = detector.count_duplicates(&filtered);
    let mut listings: Vec<ReportListing> = filtered
        .into_iter()
        .map(|report| ReportListing {
            duplicate_count: counts.get(&report.id).copied().unwrap_or(0),
            report,
        })
        .collect();

    let newest_first = |a: &ReportListing, b: &ReportListing| {
        b.report
            .created_at
            .cmp(&a.report.created_at)
            .then_with(|| a.report.id.cmp(&b.report.id))
    };
    match query.sort {
        ReportSort::Newest => listings.sort_by(newest_first),
        ReportSort::Oldest => listings.sort_by(|a, b| {
            a.report
                .created_at
                .cmp(&b.report.created_at)
                .then_with(|| a.report.id.cmp(&b.report.id))
        }),
        ReportSort::MostDuplicates => listings.sort_by(|a, b| {
            b.duplicate_count
                .cmp(&a.duplicate_count)
                .then_with(|| newest_first(a, b))
        }),
    }
    Ok(listings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use obstacle_common::testing::{aged, north_of, report_at, KRISTIANSAND};
    use obstacle_store::MemoryReportStore;
    use uuid::Uuid;

    async fn store_with(reports: &[Report]) -> MemoryReportStore {
        let store = MemoryReportStore::new();
        for r in reports {
            store.save(r).await.unwrap();
        }
        store
    }

    fn ids(listings: &[ReportListing]) -> Vec<Uuid> {
        listings.iter().map(|l| l.report.id).collect()
    }

    #[test]
    fn sort_parsing() {
        assert_eq!("oldest".parse::<ReportSort>().unwrap(), ReportSort::Oldest);
        assert_eq!("Duplicates".parse::<ReportSort>().unwrap(), ReportSort::MostDuplicates);
        assert_eq!("".parse::<ReportSort>().unwrap(), ReportSort::Newest);
        assert!("loudest".parse::<ReportSort>().is_err());
    }

    #[tokio::test]
    async fn newest_first_by_default_and_merged_hidden() {
        let (lat, lon) = KRISTIANSAND;
        let old = aged(report_at(lat, lon, "Tower"), 60);
        let new = report_at(lat + 1.0, lon, "Tower");
        let mut merged = aged(report_at(lat, lon, "Tower"), 30);
        merged.merged_into = Some(new.id);
        let store = store_with(&[old.clone(), new.clone(), merged.clone()]).await;

        let listed = list_reports(&store, &DuplicateDetector::default(), &ReportQuery::default())
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![new.id, old.id]);

        let with_merged = ReportQuery {
            include_merged: true,
            sort: ReportSort::Oldest,
            ..Default::default()
        };
        let listed = list_reports(&store, &DuplicateDetector::default(), &with_merged)
            .await
            .unwrap();
        assert_eq!(ids(&listed), vec![old.id, merged.id, new.id]);
    }

    #[tokio::test]
    async fn status_filter() {
        let (lat, lon) = KRISTIANSAND;
        let pending = report_at(lat, lon, "Tower");
        let mut rejected = report_at(lat, lon, "Crane");
        rejected.status = ReportStatus::Rejected;
        let store = store_with(&[pending.clone(), rejected.clone()]).await;

        let query = ReportQuery {
            status: Some(ReportStatus::Rejected),
            ..Default::default()
        };
        let listed = list_reports(&store, &DuplicateDetector::default(), &query).await.unwrap();
        assert_eq!(ids(&listed), vec![rejected.id]);
        assert_eq!(listed[0].duplicate_count, 0);
    }

    #[tokio::test]
    async fn most_duplicates_first() {
        let (lat, lon) = KRISTIANSAND;
        let (n_lat, n_lon) = north_of(lat, lon, 30.0);
        let a = aged(report_at(lat, lon, "Tower"), 10);
        let b = aged(report_at(n_lat, n_lon, "Tower"), 5);
        let lonely = report_at(lat + 1.0, lon, "Tower");
        let store = store_with(&[a.clone(), b.clone(), lonely.clone()]).await;

        let query = ReportQuery {
            sort: ReportSort::MostDuplicates,
            ..Default::default()
        };
        let listed = list_reports(&store, &DuplicateDetector::default(), &query).await.unwrap();
        assert_eq!(ids(&listed), vec![b.id, a.id, lonely.id]);
        assert_eq!(listed[0].duplicate_count, 1);
        assert_eq!(listed[2].duplicate_count, 0);
    }
}
