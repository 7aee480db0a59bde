//! JWT signing and validation.
//!
//! Both token kinds are HMAC-SHA256 compact tokens signed with the single
//! shared secret from configuration. Refresh tokens carry a marker claim and
//! are additionally backed by a persisted hash record; the signature alone is
//! never sufficient for a refresh (see the token service).

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::services::ServiceError;

/// Value of the `token_use` marker claim on refresh tokens.
pub const REFRESH_TOKEN_USE: &str = "refresh";

/// Claims carried by an access token.
///
/// `tenant_id` is omitted entirely for tenant-less users; `security_stamp`
/// lets resource servers detect stale tokens without a database round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    pub email: String,
    /// Unique token id for replay tracing.
    pub jti: String,
    pub client_id: String,
    pub security_stamp: String,
    pub is_system_admin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    /// Caller-supplied extra claims, inlined at the top level.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: String,
    pub jti: String,
    /// Marker distinguishing refresh tokens from access tokens.
    pub token_use: String,
    pub client_id: String,
    pub security_stamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    leeway_seconds: u64,
}

impl JwtService {
    /// Missing signing secret is a fatal startup condition.
    pub fn new(config: &JwtConfig) -> Result<Self, ServiceError> {
        if config.secret.trim().is_empty() {
            return Err(ServiceError::Internal(anyhow::anyhow!(
                "JWT signing secret is not configured"
            )));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            leeway_seconds: config.leeway_seconds,
        })
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn sign_access(&self, claims: &AccessTokenClaims) -> Result<String, ServiceError> {
        self.sign(claims)
    }

    pub fn sign_refresh(&self, claims: &RefreshTokenClaims) -> Result<String, ServiceError> {
        self.sign(claims)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, ServiceError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("token encoding: {e}")))
    }

    /// Validate signature, issuer, audience, and expiry (with clock-skew
    /// leeway) of an access token.
    pub fn decode_access(&self, token: &str) -> Result<AccessTokenClaims, ServiceError> {
        decode::<AccessTokenClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|_| ServiceError::InvalidOrExpiredToken)
    }

    /// As `decode_access`, and additionally require the refresh marker claim.
    pub fn decode_refresh(&self, token: &str) -> Result<RefreshTokenClaims, ServiceError> {
        let claims = decode::<RefreshTokenClaims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|_| ServiceError::InvalidOrExpiredToken)?;

        if claims.token_use != REFRESH_TOKEN_USE {
            return Err(ServiceError::InvalidOrExpiredToken);
        }
        Ok(claims)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_seconds;
        validation.validate_nbf = true;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation
    }
}
