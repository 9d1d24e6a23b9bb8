use anyhow::{Context, Result};

/// Default duplicate search radius around a report, in meters.
pub const DEFAULT_DUPLICATE_RADIUS_M: f64 = 100.0;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database. Absent means the in-memory stores are used.
    pub database_url: Option<String>,

    // Web server
    pub web_host: String,
    pub web_port: u16,

    // Intake
    pub fallback_reporter_id: Option<i64>,

    // Review
    pub duplicate_radius_m: f64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty()),
            web_host: std::env::var("WEB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            web_port: std::env::var("WEB_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("WEB_PORT must be a port number")?,
            fallback_reporter_id: std::env::var("FALLBACK_REPORTER_ID")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().parse::<i64>())
                .transpose()
                .context("FALLBACK_REPORTER_ID must be an integer identity id")?,
            duplicate_radius_m: match std::env::var("DUPLICATE_RADIUS_METERS") {
                Ok(v) => parse_radius(&v)?,
                Err(_) => DEFAULT_DUPLICATE_RADIUS_M,
            },
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        tracing::info!("Config loaded:");
        tracing::info!(
            "  DATABASE_URL: {}",
            if self.database_url.is_some() { "<set>" } else { "<not set, using memory store>" }
        );
        tracing::info!("  WEB: {}:{}", self.web_host, self.web_port);
        match self.fallback_reporter_id {
            Some(id) => tracing::info!("  FALLBACK_REPORTER_ID: {id}"),
            None => tracing::info!("  FALLBACK_REPORTER_ID: <not set, first identity is last resort>"),
        }
        tracing::info!("  DUPLICATE_RADIUS_METERS: {}", self.duplicate_radius_m);
    }
}

fn parse_radius(raw: &str) -> Result<f64> {
    let radius: f64 = raw
        .trim()
        .parse()
        .context("DUPLICATE_RADIUS_METERS must be a number")?;
    if !radius.is_finite() || radius <= 0.0 {
        anyhow::bail!("DUPLICATE_RADIUS_METERS must be positive, got {radius}");
    }
    Ok(radius)
}
