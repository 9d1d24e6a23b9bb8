use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use obstacle_common::{AppConfig, Identity};
use obstacle_intake::{IdentityResolver, ReportIngestor};
use obstacle_review::{ApprovalWorkflow, DuplicateDetector};
use obstacle_store::{
    IdentityStore, MemoryIdentityStore, MemoryReportStore, PgIdentityStore, PgReportStore,
    ReportStore,
};

use obstacle_api::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("obstacle=info".parse()?))
        .init();

    let config = AppConfig::from_env()?;

    let (identities, reports): (Arc<dyn IdentityStore>, Arc<dyn ReportStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
                obstacle_store::postgres::migrate(&pool).await?;
                (
                    Arc::new(PgIdentityStore::new(pool.clone())),
                    Arc::new(PgReportStore::new(pool)),
                )
            }
            None => {
                let local = Identity {
                    id: config.fallback_reporter_id.unwrap_or(1),
                    email: "local@localhost".to_string(),
                    display_name: Some("Local reporter".to_string()),
                };
                info!(
                    identity_id = local.id,
                    "No DATABASE_URL, using in-memory stores with a single local identity"
                );
                (
                    Arc::new(MemoryIdentityStore::with_identities([local])),
                    Arc::new(MemoryReportStore::new()),
                )
            }
        };

    let resolver = IdentityResolver::new(identities, config.fallback_reporter_id);
    resolver.verify_fallback().await?;

    let state = Arc::new(AppState {
        ingestor: ReportIngestor::new(reports.clone(), resolver),
        workflow: ApprovalWorkflow::new(reports, DuplicateDetector::new(config.duplicate_radius_m)),
    });

    let app = router(state);

    let addr = format!("{}:{}", config.web_host, config.web_port);
    info!("Obstacle report API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
