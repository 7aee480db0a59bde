pub mod audit;
pub mod auth;
pub mod credential;
pub mod encryption;
mod error;
pub mod jwt;
pub mod legacy;
pub mod lockout;
pub mod token;

pub use audit::{AuditSink, MemoryAuditSink, TracingAuditSink};
pub use auth::{AuthService, LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, UserInfo};
pub use encryption::EncryptionService;
pub use error::ServiceError;
pub use jwt::JwtService;
pub use legacy::{LegacyBridge, LegacyConnection, LegacyConnectorFactory, LegacyUser};
pub use token::{TokenResponse, TokenService};
