use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A local account, scoped to a tenant unless it is a system administrator.
///
/// `security_stamp` is an opaque version token: any change invalidates every
/// refresh token issued under the previous value. `password_hash` is empty
/// for accounts that authenticate through the legacy bridge or a federated
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// `None` only for system administrators, which are exempt from tenant
    /// scoping.
    pub tenant_id: Option<Uuid>,
    /// Stored lowercase; unique per tenant.
    pub email: String,
    pub password_hash: String,
    pub security_stamp: String,
    pub failed_login_attempts: i32,
    pub lockout_end: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub email_verified: bool,
    pub is_system_admin: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Comma-separated role names, embedded as individual claims.
    pub roles: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(tenant_id: Option<Uuid>, email: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            email: email.trim().to_lowercase(),
            password_hash,
            security_stamp: new_security_stamp(),
            failed_login_attempts: 0,
            lockout_end: None,
            is_active: true,
            email_verified: false,
            is_system_admin: false,
            first_name: None,
            last_name: None,
            roles: String::new(),
            last_login_at: None,
            last_login_ip: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Split the stored comma list into individual role names.
    pub fn role_list(&self) -> Vec<String> {
        self.roles
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn is_locked_out(&self, now: DateTime<Utc>) -> bool {
        self.lockout_end.is_some_and(|end| end > now)
    }

    /// Invalidate every refresh token issued under the current stamp.
    pub fn rotate_security_stamp(&mut self) {
        self.security_stamp = new_security_stamp();
        self.updated_at = Utc::now();
    }
}

fn new_security_stamp() -> String {
    Uuid::new_v4().simple().to_string()
}
