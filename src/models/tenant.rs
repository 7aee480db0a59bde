use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a tenant. Only `Active` and `Trial` tenants may
/// authenticate users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantStatus {
    Active,
    Suspended,
    Trial,
    Cancelled,
}

/// Per-tenant password composition rules, enforced on register and
/// password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_uppercase: true,
            require_lowercase: true,
            require_digit: true,
            require_special: false,
        }
    }
}

impl PasswordPolicy {
    /// Check a candidate password against this policy.
    pub fn validate(&self, password: &str) -> Result<(), String> {
        if password.chars().count() < self.min_length {
            return Err(format!(
                "password must be at least {} characters",
                self.min_length
            ));
        }
        if self.require_uppercase && !password.chars().any(|c| c.is_uppercase()) {
            return Err("password must contain an uppercase letter".to_string());
        }
        if self.require_lowercase && !password.chars().any(|c| c.is_lowercase()) {
            return Err("password must contain a lowercase letter".to_string());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return Err("password must contain a digit".to_string());
        }
        if self.require_special && password.chars().all(|c| c.is_alphanumeric()) {
            return Err("password must contain a special character".to_string());
        }
        Ok(())
    }
}

/// Isolation boundary for users and applications.
///
/// Tenants are soft-deleted only; the orchestrator reads the policy fields on
/// every login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    /// Unique, lowercase letters/digits/hyphens only.
    pub subdomain: String,
    pub status: TenantStatus,
    pub password_policy: PasswordPolicy,
    pub session_timeout_minutes: i64,
    pub max_failed_login_attempts: i32,
    pub lockout_duration_minutes: i64,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: impl Into<String>, subdomain: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            subdomain: subdomain.into(),
            status: TenantStatus::Active,
            password_policy: PasswordPolicy::default(),
            session_timeout_minutes: 60,
            max_failed_login_attempts: 5,
            lockout_duration_minutes: 15,
            is_deleted: false,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether users of this tenant may authenticate.
    pub fn can_authenticate(&self) -> bool {
        !self.is_deleted && matches!(self.status, TenantStatus::Active | TenantStatus::Trial)
    }
}

/// Subdomains are lowercase letters, digits, and hyphens; they must not be
/// empty or start/end with a hyphen.
pub fn is_valid_subdomain(subdomain: &str) -> bool {
    !subdomain.is_empty()
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
