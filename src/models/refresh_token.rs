use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Persisted refresh-token record.
///
/// Only the SHA-256 hash of the signed token is stored, never the raw value.
/// State machine: Active -> Used (rotation), Active -> Revoked (logout,
/// password change, revoke-all), any -> Expired (lazy, checked at read time).
/// Used rows are kept so reuse of a rotated token is detectable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub application_id: Uuid,
    pub tenant_id: Option<Uuid>,
    /// Hex-encoded SHA-256 of the raw token value.
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub revoked_by_ip: Option<String>,
    pub created_by_ip: Option<String>,
    pub user_agent: Option<String>,
    /// Previous token in the rotation chain, when this one was minted by a
    /// refresh.
    pub parent_token_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        application_id: Uuid,
        tenant_id: Option<Uuid>,
        raw_token: &str,
        expires_at: DateTime<Utc>,
        created_by_ip: Option<String>,
        user_agent: Option<String>,
        parent_token_id: Option<Uuid>,
    ) -> Self {
        Self {
            id,
            user_id,
            application_id,
            tenant_id,
            token_hash: Self::hash_token(raw_token),
            expires_at,
            is_used: false,
            used_at: None,
            is_revoked: false,
            revoked_at: None,
            revoked_reason: None,
            revoked_by_ip: None,
            created_by_ip,
            user_agent,
            parent_token_id,
            created_at: Utc::now(),
        }
    }

    /// Hash a raw token value with SHA-256.
    pub fn hash_token(raw_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(raw_token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Valid for refresh: not used, not revoked, not expired.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && !self.is_revoked && !self.is_expired(now)
    }
}
