//! Postgres adapters for the identity and report stores.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres};
use tracing::info;
use uuid::Uuid;

use obstacle_common::{Geometry, Identity, Report, ReportNote, ReportStatus};

use crate::traits::{IdentityStore, ReportStore, StaleReport};

/// Run the embedded SQL migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("running obstacle store migrations")?;
    info!("Obstacle store migrations complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// PgIdentityStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct IdentityRow {
    id: i64,
    email: String,
    display_name: Option<String>,
}

impl From<IdentityRow> for Identity {
    fn from(row: IdentityRow) -> Self {
        Identity {
            id: row.id,
            email: row.email,
            display_name: row.display_name,
        }
    }
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, display_name FROM identities WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            r#"
            SELECT id, email, display_name FROM identities
            WHERE lower(trim(email)) = lower(trim($1))
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }

    async fn first_identity(&self) -> Result<Option<Identity>> {
        let row = sqlx::query_as::<_, IdentityRow>(
            "SELECT id, email, display_name FROM identities ORDER BY id ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Identity::from))
    }
}

// ---------------------------------------------------------------------------
// PgReportStore
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct PgReportStore {
    pool: PgPool,
}

/// A row from the obstacle_reports table.
#[derive(Debug, sqlx::FromRow)]
struct ReportRow {
    id: Uuid,
    reporter_id: i64,
    obstacle_type: String,
    geometry: Json<Geometry>,
    geometry_resolved: bool,
    height_meters: Option<f64>,
    description: Option<String>,
    comments: Option<String>,
    status: String,
    reject_reason: Option<String>,
    merged_into: Option<Uuid>,
    notes: Json<Vec<ReportNote>>,
    photo: Option<Vec<u8>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = anyhow::Error;

    fn try_from(row: ReportRow) -> Result<Self> {
        let status: ReportStatus = row
            .status
            .parse()
            .with_context(|| format!("report {} has unreadable status", row.id))?;
        Ok(Report {
            id: row.id,
            reporter_id: row.reporter_id,
            obstacle_type: row.obstacle_type,
            geometry: row.geometry.0,
            geometry_resolved: row.geometry_resolved,
            height_meters: row.height_meters,
            description: row.description,
            comments: row.comments,
            status,
            reject_reason: row.reject_reason,
            merged_into: row.merged_into,
            notes: row.notes.0,
            photo: row.photo,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const REPORT_COLUMNS: &str = "id, reporter_id, obstacle_type, geometry, geometry_resolved, \
    height_meters, description, comments, status, reject_reason, merged_into, notes, photo, \
    created_at, updated_at";

const UPDATE_REPORT: &str = r#"
    UPDATE obstacle_reports SET
        obstacle_type = $2,
        geometry = $3,
        geometry_resolved = $4,
        height_meters = $5,
        description = $6,
        comments = $7,
        status = $8,
        reject_reason = $9,
        merged_into = $10,
        notes = $11,
        photo = $12,
        updated_at = $13
    WHERE id = $1
      AND (merged_into IS NULL OR merged_into = $10)
      AND (status = 'PENDING' OR status = $8)
"#;

fn update_query(report: &Report) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(UPDATE_REPORT)
        .bind(report.id)
        .bind(&report.obstacle_type)
        .bind(Json(&report.geometry))
        .bind(report.geometry_resolved)
        .bind(report.height_meters)
        .bind(&report.description)
        .bind(&report.comments)
        .bind(report.status.as_wire())
        .bind(&report.reject_reason)
        .bind(report.merged_into)
        .bind(Json(&report.notes))
        .bind(&report.photo)
        .bind(report.updated_at)
}

/// Write one report through the guarded UPDATE. Zero affected rows means
/// the report is missing or a committed decision blocked the write.
async fn write_report(conn: &mut PgConnection, report: &Report) -> Result<()> {
    let result = update_query(report).execute(&mut *conn).await?;
    if result.rows_affected() > 0 {
        return Ok(());
    }
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM obstacle_reports WHERE id = $1)",
    )
    .bind(report.id)
    .fetch_one(&mut *conn)
    .await?;
    if exists {
        return Err(StaleReport { id: report.id }.into());
    }
    bail!("report {} does not exist", report.id)
}

impl PgReportStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str) -> Result<Vec<Report>> {
        let sql = format!(
            "SELECT {REPORT_COLUMNS} FROM obstacle_reports {clause} ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, ReportRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Report::try_from).collect()
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn save(&self, report: &Report) -> Result<Uuid> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO obstacle_reports
                (id, reporter_id, obstacle_type, geometry, geometry_resolved,
                 height_meters, description, comments, status, reject_reason,
                 merged_into, notes, photo, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id
            "#,
        )
        .bind(report.id)
        .bind(report.reporter_id)
        .bind(&report.obstacle_type)
        .bind(Json(&report.geometry))
        .bind(report.geometry_resolved)
        .bind(report.height_meters)
        .bind(&report.description)
        .bind(&report.comments)
        .bind(report.status.as_wire())
        .bind(&report.reject_reason)
        .bind(report.merged_into)
        .bind(Json(&report.notes))
        .bind(&report.photo)
        .bind(report.created_at)
        .bind(report.updated_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        let sql = format!("SELECT {REPORT_COLUMNS} FROM obstacle_reports WHERE id = $1");
        let row = sqlx::query_as::<_, ReportRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Report::try_from).transpose()
    }

    async fn list_active(&self) -> Result<Vec<Report>> {
        self.fetch_where("WHERE status <> 'REJECTED' AND merged_into IS NULL")
            .await
    }

    async fn list_all(&self) -> Result<Vec<Report>> {
        self.fetch_where("").await
    }

    async fn update(&self, report: &Report) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_report(&mut conn, report).await
    }

    async fn update_many(&self, reports: &[Report]) -> Result<()> {
        let ids: Vec<Uuid> = reports.iter().map(|r| r.id).collect();
        let mut tx = self.pool.begin().await?;
        // Row locks in id order, so overlapping batches from other processes
        // queue behind this one instead of deadlocking.
        sqlx::query("SELECT id FROM obstacle_reports WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
        for report in reports {
            // An early return drops the transaction, which rolls it back.
            write_report(&mut tx, report).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
