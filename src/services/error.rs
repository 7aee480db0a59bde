use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::store::StoreError;

/// Failure taxonomy for the orchestrator and token service.
///
/// These are expected outcomes, returned as values rather than raised across
/// the service boundary. Credential failures are deliberately
/// undifferentiated: the caller cannot tell an unknown email from a wrong
/// password (the audit log can). `Internal` carries its detail only through
/// the error source chain, never in the display message.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid client")]
    InvalidClient,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is inactive")]
    AccountInactive,

    #[error("Account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Legacy database configuration is incomplete")]
    ConfigurationIncomplete,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Password does not meet the tenant policy: {0}")]
    PasswordPolicy(String),

    #[error("{0} is not supported")]
    Unsupported(String),

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        // Paths that need finer mapping (token consume, entity lookups)
        // match on StoreError before converting.
        ServiceError::Internal(anyhow::anyhow!(err))
    }
}
