//! Access/refresh token issuance, validation, rotation, and revocation.
//!
//! The persisted hash record is the authoritative validity source for refresh
//! tokens; a valid signature is necessary but not sufficient. Rotation
//! consumes the old row and persists its successor in one store transaction,
//! so two racing refreshes with one token produce exactly one winner and an
//! interrupted rotation never strands a consumed token.

use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::models::{Application, RefreshToken, User};
use crate::services::jwt::{
    AccessTokenClaims, JwtService, RefreshTokenClaims, REFRESH_TOKEN_USE,
};
use crate::services::ServiceError;
use crate::store::{AuthStore, StoreError};

/// Revocation reason recorded when a token's embedded stamp no longer matches
/// the user's current one.
pub const REVOKE_REASON_STAMP_CHANGED: &str = "Security stamp changed";

/// Token pair returned to a successfully authenticated caller.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenService {
    store: Arc<dyn AuthStore>,
    jwt: JwtService,
    default_access_minutes: i64,
    default_refresh_days: i64,
}

impl TokenService {
    pub fn new(store: Arc<dyn AuthStore>, jwt: JwtService, config: &JwtConfig) -> Self {
        Self {
            store,
            jwt,
            default_access_minutes: config.access_token_expiry_minutes,
            default_refresh_days: config.refresh_token_expiry_days,
        }
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }

    /// Application override in seconds, else the configured default.
    fn access_lifetime(&self, application: &Application) -> Duration {
        application
            .access_token_lifetime_secs
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::minutes(self.default_access_minutes))
    }

    fn refresh_lifetime(&self, application: &Application) -> Duration {
        application
            .refresh_token_lifetime_secs
            .map(Duration::seconds)
            .unwrap_or_else(|| Duration::days(self.default_refresh_days))
    }

    /// Mint a signed access token for an existing user/application pair.
    pub async fn issue_access_token(
        &self,
        user_id: Uuid,
        application_id: Uuid,
        extra_claims: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ServiceError> {
        let user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        let application = self
            .store
            .application_by_id(application_id)
            .await?
            .ok_or(ServiceError::NotFound("application"))?;

        self.build_access_token(&user, &application, extra_claims)
    }

    fn build_access_token(
        &self,
        user: &User,
        application: &Application,
        extra_claims: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let exp = now + self.access_lifetime(application);

        let claims = AccessTokenClaims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            client_id: application.client_id.clone(),
            security_stamp: user.security_stamp.clone(),
            is_system_admin: user.is_system_admin,
            tenant_id: user.tenant_id.map(|id| id.to_string()),
            roles: user.role_list(),
            iss: self.jwt.issuer().to_string(),
            aud: self.jwt.audience().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: exp.timestamp(),
            extra: extra_claims,
        };

        self.jwt.sign_access(&claims)
    }

    /// Mint a signed refresh token and persist its hash record. Returns the
    /// raw signed string; only `SHA-256(raw)` is stored.
    pub async fn issue_refresh_token(
        &self,
        user: &User,
        application: &Application,
        ip_address: Option<String>,
        user_agent: Option<String>,
        parent_token_id: Option<Uuid>,
    ) -> Result<String, ServiceError> {
        let (raw, record) =
            self.build_refresh_token(user, application, ip_address, user_agent, parent_token_id)?;
        self.store.insert_refresh_token(&record).await?;
        Ok(raw)
    }

    /// Sign a refresh token and build its hash record without touching the
    /// store; the caller decides how the record is persisted.
    fn build_refresh_token(
        &self,
        user: &User,
        application: &Application,
        ip_address: Option<String>,
        user_agent: Option<String>,
        parent_token_id: Option<Uuid>,
    ) -> Result<(String, RefreshToken), ServiceError> {
        let now = Utc::now();
        let expires_at = now + self.refresh_lifetime(application);
        let token_id = Uuid::new_v4();

        let claims = RefreshTokenClaims {
            sub: user.id.to_string(),
            jti: token_id.to_string(),
            token_use: REFRESH_TOKEN_USE.to_string(),
            client_id: application.client_id.clone(),
            security_stamp: user.security_stamp.clone(),
            tenant_id: user.tenant_id.map(|id| id.to_string()),
            iss: self.jwt.issuer().to_string(),
            aud: self.jwt.audience().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let raw = self.jwt.sign_refresh(&claims)?;

        let record = RefreshToken::new(
            token_id,
            user.id,
            application.id,
            user.tenant_id,
            &raw,
            expires_at,
            ip_address,
            user_agent,
            parent_token_id,
        );

        Ok((raw, record))
    }

    /// Issue a fresh access+refresh pair scoped to the user's tenant and the
    /// application.
    pub async fn issue_pair(
        &self,
        user: &User,
        application: &Application,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenResponse, ServiceError> {
        let access_token =
            self.build_access_token(user, application, serde_json::Map::new())?;
        let refresh_token = self
            .issue_refresh_token(user, application, ip_address, user_agent, None)
            .await?;

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_lifetime(application).num_seconds(),
        })
    }

    /// Full refresh-token validation: signature, issuer, audience, expiry
    /// (with leeway), marker claim, subject match, persisted row Active, and
    /// the user's current security stamp. Fails closed: any internal error
    /// reads as an invalid token.
    pub async fn validate_refresh_token(
        &self,
        raw: &str,
        expected_user_id: Uuid,
    ) -> Result<RefreshToken, ServiceError> {
        let claims = self.jwt.decode_refresh(raw)?;

        let subject = Uuid::parse_str(&claims.sub)
            .map_err(|_| ServiceError::InvalidOrExpiredToken)?;
        if subject != expected_user_id {
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        let hash = RefreshToken::hash_token(raw);
        let record = self
            .store
            .refresh_token_by_hash(&hash)
            .await
            .map_err(|_| ServiceError::InvalidOrExpiredToken)?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        if !record.is_active(Utc::now()) {
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        let user = self
            .store
            .user_by_id(record.user_id)
            .await
            .map_err(|_| ServiceError::InvalidOrExpiredToken)?
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        if user.security_stamp != claims.security_stamp {
            // Credentials changed since issuance; kill the token.
            tracing::warn!(user_id = %user.id, "Refresh token presented with stale security stamp");
            let _ = self
                .store
                .revoke_refresh_token(&hash, REVOKE_REASON_STAMP_CHANGED, None)
                .await;
            return Err(ServiceError::InvalidOrExpiredToken);
        }

        Ok(record)
    }

    /// Validate and rotate: mark the presented token Used and persist its
    /// replacement in a single store transaction, linked through
    /// `parent_token_id`. The losing side of a duplicate submission fails
    /// the consume step, and an interrupted caller leaves the store with
    /// either both rows or neither.
    pub async fn rotate(
        &self,
        raw: &str,
        user: &User,
        application: &Application,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<TokenResponse, ServiceError> {
        let record = self.validate_refresh_token(raw, user.id).await?;

        // Sign both tokens up front; only the combined store call mutates.
        let access_token = self.build_access_token(user, application, serde_json::Map::new())?;
        let (refresh_token, replacement) =
            self.build_refresh_token(user, application, ip_address, user_agent, Some(record.id))?;

        match self
            .store
            .consume_and_replace(&record.token_hash, &replacement)
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound | StoreError::Conflict(_)) => {
                return Err(ServiceError::InvalidOrExpiredToken)
            }
            Err(e) => return Err(e.into()),
        }

        Ok(TokenResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.access_lifetime(application).num_seconds(),
        })
    }

    /// Idempotent revocation; returns `false` when the token was unknown or
    /// already revoked.
    pub async fn revoke_refresh_token(
        &self,
        raw: &str,
        reason: &str,
        ip_address: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let hash = RefreshToken::hash_token(raw);
        Ok(self
            .store
            .revoke_refresh_token(&hash, reason, ip_address)
            .await?)
    }

    /// Bulk-revoke every live token for a user ("log out everywhere", forced
    /// on password change).
    pub async fn revoke_all_for_user(
        &self,
        user_id: Uuid,
        reason: &str,
    ) -> Result<u64, ServiceError> {
        Ok(self.store.revoke_all_for_user(user_id, reason).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationType;
    use crate::store::MemoryStore;

    fn jwt_config() -> JwtConfig {
        JwtConfig {
            secret: "unit-test-signing-secret-thats-long-enough".to_string(),
            issuer: "auth-core".to_string(),
            audience: "auth-core-clients".to_string(),
            leeway_seconds: 60,
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        }
    }

    async fn setup() -> (Arc<MemoryStore>, TokenService, User, Application) {
        let store = Arc::new(MemoryStore::new());
        let config = jwt_config();
        let jwt = JwtService::new(&config).unwrap();
        let service = TokenService::new(store.clone(), jwt, &config);

        let user = User::new(None, "user@example.com", String::new());
        store.insert_user(&user).await.unwrap();
        let application = Application::new(None, "App", "client-1", ApplicationType::Native);
        store.insert_application(&application).await.unwrap();

        (store, service, user, application)
    }

    #[tokio::test]
    async fn stored_rows_hold_only_hashes_and_never_collide() {
        let (store, service, user, application) = setup().await;

        let mut raws = Vec::new();
        for _ in 0..20 {
            let raw = service
                .issue_refresh_token(&user, &application, None, None, None)
                .await
                .unwrap();
            raws.push(raw);
        }

        let rows = store.all_refresh_tokens().await;
        assert_eq!(rows.len(), 20);
        let mut hashes: Vec<_> = rows.iter().map(|r| r.token_hash.clone()).collect();
        for raw in &raws {
            assert!(!hashes.contains(raw), "raw token must never be persisted");
        }
        hashes.sort();
        hashes.dedup();
        assert_eq!(hashes.len(), 20, "distinct tokens must hash distinctly");
    }

    #[tokio::test]
    async fn stale_security_stamp_revokes_the_row() {
        let (store, service, mut user, application) = setup().await;

        let raw = service
            .issue_refresh_token(&user, &application, None, None, None)
            .await
            .unwrap();

        user.rotate_security_stamp();
        store.update_user(&user).await.unwrap();

        let result = service.validate_refresh_token(&raw, user.id).await;
        assert!(matches!(result, Err(ServiceError::InvalidOrExpiredToken)));

        let row = store
            .refresh_token_by_hash(&RefreshToken::hash_token(&raw))
            .await
            .unwrap()
            .unwrap();
        assert!(row.is_revoked);
        assert_eq!(row.revoked_reason.as_deref(), Some(REVOKE_REASON_STAMP_CHANGED));
    }

    #[tokio::test]
    async fn rotation_persists_the_successor_with_the_consumed_row() {
        let (store, service, user, application) = setup().await;
        let raw = service
            .issue_refresh_token(&user, &application, None, None, None)
            .await
            .unwrap();

        let pair = service
            .rotate(&raw, &user, &application, None, None)
            .await
            .unwrap();

        // One store call committed both sides of the rotation.
        let old = store
            .refresh_token_by_hash(&RefreshToken::hash_token(&raw))
            .await
            .unwrap()
            .unwrap();
        let new = store
            .refresh_token_by_hash(&RefreshToken::hash_token(&pair.refresh_token))
            .await
            .unwrap()
            .unwrap();
        assert!(old.is_used);
        assert_eq!(new.parent_token_id, Some(old.id));
        assert!(new.is_active(Utc::now()));
    }

    #[tokio::test]
    async fn subject_mismatch_is_rejected() {
        let (_store, service, user, application) = setup().await;
        let raw = service
            .issue_refresh_token(&user, &application, None, None, None)
            .await
            .unwrap();
        let result = service.validate_refresh_token(&raw, Uuid::new_v4()).await;
        assert!(matches!(result, Err(ServiceError::InvalidOrExpiredToken)));
    }

    #[tokio::test]
    async fn application_lifetime_override_wins() {
        let (store, service, user, mut application) = setup().await;
        application.access_token_lifetime_secs = Some(120);
        store.insert_application(&application).await.unwrap();

        let pair = service
            .issue_pair(&user, &application, None, None)
            .await
            .unwrap();
        assert_eq!(pair.expires_in, 120);
    }
}
