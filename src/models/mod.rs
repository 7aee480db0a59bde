pub mod application;
pub mod audit;
pub mod refresh_token;
pub mod tenant;
pub mod user;
pub mod user_mapping;

pub use application::{
    Application, ApplicationType, DatabaseDialect, ExternalProvider, ExternalProviderConfig,
    HashAlgorithm, LegacyDatabaseConfig,
};
pub use audit::{AuditEvent, AuditEventType, AUDIT_CATEGORY_AUTHENTICATION};
pub use refresh_token::RefreshToken;
pub use tenant::{PasswordPolicy, Tenant, TenantStatus};
pub use user::User;
pub use user_mapping::ApplicationUserMapping;
