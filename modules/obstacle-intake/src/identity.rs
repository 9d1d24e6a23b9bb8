//! Reporter identity resolution.
//!
//! 1. Explicit reporter id that exists → that id
//! 2. Authenticated caller that exists → caller id
//! 3. Reporter email that resolves → that identity
//! 4. Configured fallback identity → fallback id
//! 5. First identity in the store (lowest id) → last resort
//!
//! An empty identity store is the only fatal case.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use obstacle_common::{ObstacleError, Result};
use obstacle_store::IdentityStore;

/// What the caller knows about who submitted a report.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityClaims<'a> {
    pub explicit_id: Option<i64>,
    pub authenticated_id: Option<i64>,
    pub email: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Explicit,
    Authenticated,
    Email,
    ConfiguredFallback,
    FirstAvailable,
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Authenticated => write!(f, "authenticated"),
            Self::Email => write!(f, "email"),
            Self::ConfiguredFallback => write!(f, "configured_fallback"),
            Self::FirstAvailable => write!(f, "first_available"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub id: i64,
    pub source: IdentitySource,
}

pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    fallback_identity_id: Option<i64>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, fallback_identity_id: Option<i64>) -> Self {
        Self {
            store,
            fallback_identity_id,
        }
    }

    /// Check once at startup that the configured fallback identity exists.
    pub async fn verify_fallback(&self) -> Result<()> {
        let Some(id) = self.fallback_identity_id else {
            return Ok(());
        };
        match self.store.find_by_id(id).await.map_err(ObstacleError::Persistence)? {
            Some(_) => Ok(()),
            None => Err(ObstacleError::Config(format!(
                "fallback reporter identity {id} does not exist"
            ))),
        }
    }

    pub async fn resolve(&self, claims: IdentityClaims<'_>) -> Result<ResolvedIdentity> {
        if let Some(id) = claims.explicit_id {
            if self.exists(id).await? {
                return Ok(ResolvedIdentity {
                    id,
                    source: IdentitySource::Explicit,
                });
            }
            debug!(reporter_id = id, "Explicit reporter id not found, trying next source");
        }

        if let Some(id) = claims.authenticated_id {
            if self.exists(id).await? {
                return Ok(ResolvedIdentity {
                    id,
                    source: IdentitySource::Authenticated,
                });
            }
            warn!(identity_id = id, "Authenticated identity missing from identity store");
        }

        if let Some(email) = claims.email.map(str::trim).filter(|e| !e.is_empty()) {
            let found = self
                .store
                .find_by_email(email)
                .await
                .map_err(ObstacleError::Persistence)?;
            if let Some(identity) = found {
                return Ok(ResolvedIdentity {
                    id: identity.id,
                    source: IdentitySource::Email,
                });
            }
            debug!("Reporter email did not match any identity");
        }

        if let Some(id) = self.fallback_identity_id {
            if self.exists(id).await? {
                debug!(reporter_id = id, "Using configured fallback reporter");
                return Ok(ResolvedIdentity {
                    id,
                    source: IdentitySource::ConfiguredFallback,
                });
            }
            warn!(reporter_id = id, "Configured fallback reporter no longer exists");
        }

        let first = self
            .store
            .first_identity()
            .await
            .map_err(ObstacleError::Persistence)?;
        match first {
            Some(identity) => {
                warn!(
                    reporter_id = identity.id,
                    "No reporter could be determined, attributing to first identity in store"
                );
                Ok(ResolvedIdentity {
                    id: identity.id,
                    source: IdentitySource::FirstAvailable,
                })
            }
            None => Err(ObstacleError::NoIdentityAvailable),
        }
    }

    async fn exists(&self, id: i64) -> Result<bool> {
        Ok(self
            .store
            .find_by_id(id)
            .await
            .map_err(ObstacleError::Persistence)?
            .is_some())
    }
}
