use serde::Deserialize;
use std::env;

use crate::services::ServiceError;

/// Top-level configuration for the auth core.
///
/// Resolved once at process start and passed into each component at
/// construction; no component re-reads ambient state per call.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub encryption: EncryptionConfig,
    /// Client id used when a login request does not name an application.
    pub default_client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Shared HMAC signing secret. Missing or empty is a fatal startup error.
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Clock-skew allowance applied during validation, in seconds.
    pub leeway_seconds: u64,
    /// Default access-token lifetime, overridable per application.
    pub access_token_expiry_minutes: i64,
    /// Default refresh-token lifetime, overridable per application.
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncryptionConfig {
    /// Master key for at-rest secret encryption. Missing is a fatal startup
    /// error.
    pub master_key: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let config = AuthConfig {
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET", None)?,
                issuer: get_env("JWT_ISSUER", Some("auth-core"))?,
                audience: get_env("JWT_AUDIENCE", Some("auth-core-clients"))?,
                leeway_seconds: parse_env("JWT_LEEWAY_SECONDS", Some("60"))?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    Some("15"),
                )?,
                refresh_token_expiry_days: parse_env("JWT_REFRESH_TOKEN_EXPIRY_DAYS", Some("7"))?,
            },
            encryption: EncryptionConfig {
                master_key: get_env("ENCRYPTION_MASTER_KEY", None)?,
            },
            default_client_id: get_env("DEFAULT_CLIENT_ID", Some("default"))?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(config_error("JWT_SECRET must not be empty"));
        }
        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(config_error("JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"));
        }
        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(config_error("JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"));
        }
        if self.encryption.master_key.trim().is_empty() {
            return Err(config_error("ENCRYPTION_MASTER_KEY must not be empty"));
        }
        Ok(())
    }
}

fn config_error(msg: &str) -> ServiceError {
    ServiceError::Internal(anyhow::anyhow!("configuration error: {msg}"))
}

fn get_env(key: &str, default: Option<&str>) -> Result<String, ServiceError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => match default {
            Some(def) => Ok(def.to_string()),
            None => Err(config_error(&format!("{key} is required but not set"))),
        },
    }
}

fn parse_env<T>(key: &str, default: Option<&str>) -> Result<T, ServiceError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default)?;
    raw.parse()
        .map_err(|e| config_error(&format!("{key}: {e}")))
}
