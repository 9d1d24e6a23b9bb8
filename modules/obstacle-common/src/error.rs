use thiserror::Error;
use uuid::Uuid;

use crate::types::ReportStatus;

#[derive(Error, Debug)]
pub enum ObstacleError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("No reporter identity available: the identity store is empty")]
    NoIdentityAvailable,

    #[error("Cannot {action} report {id}: it is {status}")]
    InvalidTransition {
        id: Uuid,
        status: String,
        action: &'static str,
    },

    #[error("Report {0} not found")]
    NotFound(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Persistence failure: {0:#}")]
    Persistence(#[source] anyhow::Error),
}

impl ObstacleError {
    pub fn invalid_transition(id: Uuid, status: ReportStatus, action: &'static str) -> Self {
        ObstacleError::InvalidTransition {
            id,
            status: status.to_string(),
            action,
        }
    }

    /// Errors whose detail belongs in server logs, not in client responses.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ObstacleError::NoIdentityAvailable
                | ObstacleError::Config(_)
                | ObstacleError::Persistence(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ObstacleError>;
