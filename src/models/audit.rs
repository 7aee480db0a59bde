use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category stamped on every event this core emits.
pub const AUDIT_CATEGORY_AUTHENTICATION: &str = "Authentication";

/// State transitions the orchestrator reports to the audit collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    Login,
    LoginFailed,
    Logout,
    TokenRefreshed,
    TokenRefreshFailed,
    PasswordChanged,
    UserLocked,
    UserCreated,
}

impl AuditEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "Login",
            Self::LoginFailed => "LoginFailed",
            Self::Logout => "Logout",
            Self::TokenRefreshed => "TokenRefreshed",
            Self::TokenRefreshFailed => "TokenRefreshFailed",
            Self::PasswordChanged => "PasswordChanged",
            Self::UserLocked => "UserLocked",
            Self::UserCreated => "UserCreated",
        }
    }
}

/// Append-only audit fact; never updated or deleted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub event_category: String,
    pub tenant_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub application_id: Option<Uuid>,
    pub success: bool,
    pub error_message: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn success(event_type: AuditEventType) -> Self {
        Self {
            event_type,
            event_category: AUDIT_CATEGORY_AUTHENTICATION.to_string(),
            tenant_id: None,
            user_id: None,
            application_id: None,
            success: true,
            error_message: None,
            ip_address: None,
            user_agent: None,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(event_type: AuditEventType, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(error_message.into()),
            ..Self::success(event_type)
        }
    }

    pub fn with_tenant(mut self, tenant_id: Option<Uuid>) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_application(mut self, application_id: Uuid) -> Self {
        self.application_id = Some(application_id);
        self
    }

    pub fn with_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }
}
