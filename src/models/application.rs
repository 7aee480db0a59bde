use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// How an application authenticates its users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationType {
    /// Local users with bcrypt password hashes.
    Native,
    /// Users live in an external database reached through the legacy bridge.
    LegacyDatabase,
    /// External identity provider only; no local credentials.
    Federated,
}

/// Supported legacy database engines.
///
/// A closed enum: the bridge dispatches on it when building queries, so adding
/// an engine is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseDialect {
    SqlServer,
    MySql,
    Postgres,
    Oracle,
}

impl DatabaseDialect {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SqlServer => "sqlserver",
            Self::MySql => "mysql",
            Self::Postgres => "postgres",
            Self::Oracle => "oracle",
        }
    }

    /// Positional bind-parameter marker for this engine, 1-based.
    pub fn placeholder(self, position: usize) -> String {
        match self {
            Self::SqlServer => format!("@p{position}"),
            Self::MySql => "?".to_string(),
            Self::Postgres => format!("${position}"),
            Self::Oracle => format!(":{position}"),
        }
    }

    /// Quote a column or table identifier for this engine.
    pub fn quote_identifier(self, identifier: &str) -> String {
        match self {
            Self::SqlServer => format!("[{identifier}]"),
            Self::MySql => format!("`{identifier}`"),
            Self::Postgres | Self::Oracle => format!("\"{identifier}\""),
        }
    }
}

impl FromStr for DatabaseDialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "mysql" => Ok(Self::MySql),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "oracle" => Ok(Self::Oracle),
            other => Err(format!("unknown database dialect: {other}")),
        }
    }
}

/// Password-hash formats the credential verifier understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
    Bcrypt,
    /// `iterations:base64(salt):base64(hash)` with an HMAC-SHA256 PRF.
    Pbkdf2Sha256,
    /// ASP.NET Identity v3 format: base64 of 0x01 || salt(16) || subkey(32).
    AspNetIdentity,
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            "bcrypt" => Ok(Self::Bcrypt),
            "pbkdf2" | "pbkdf2-sha256" => Ok(Self::Pbkdf2Sha256),
            "aspnetidentity" | "aspnet-identity" => Ok(Self::AspNetIdentity),
            other => Err(format!("unknown hash algorithm: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExternalProvider {
    Google,
    Apple,
    LinkedIn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalProviderConfig {
    pub provider: ExternalProvider,
    pub client_id: String,
    /// Encrypted with the at-rest encryption service, never stored plain.
    pub encrypted_client_secret: String,
}

/// Connection and mapping details for an application's legacy user database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyDatabaseConfig {
    /// Encrypted with the at-rest encryption service.
    pub encrypted_connection_string: String,
    pub dialect: DatabaseDialect,
    pub table_name: String,
    pub id_column: String,
    pub email_column: String,
    pub username_column: Option<String>,
    pub password_column: String,
    pub first_name_column: Option<String>,
    pub last_name_column: Option<String>,
    /// Additional columns surfaced in the legacy user's data bag.
    pub extra_columns: Vec<String>,
    pub hash_algorithm: HashAlgorithm,
}

impl LegacyDatabaseConfig {
    /// All mandatory fields present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.encrypted_connection_string.is_empty()
            && !self.table_name.is_empty()
            && !self.id_column.is_empty()
            && !self.email_column.is_empty()
            && !self.password_column.is_empty()
    }
}

/// An OAuth client belonging to a tenant (or cross-tenant when `tenant_id`
/// is `None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Application {
    pub id: Uuid,
    pub tenant_id: Option<Uuid>,
    pub name: String,
    /// Public client identifier presented on login.
    pub client_id: String,
    /// bcrypt hash of the client secret; the plain secret is never stored.
    pub client_secret_hash: String,
    pub app_type: ApplicationType,
    pub is_active: bool,
    /// Override of the configured default access-token lifetime, in seconds.
    pub access_token_lifetime_secs: Option<i64>,
    /// Override of the configured default refresh-token lifetime, in seconds.
    pub refresh_token_lifetime_secs: Option<i64>,
    pub external_providers: Vec<ExternalProviderConfig>,
    pub legacy_database: Option<LegacyDatabaseConfig>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        tenant_id: Option<Uuid>,
        name: impl Into<String>,
        client_id: impl Into<String>,
        app_type: ApplicationType,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.into(),
            client_id: client_id.into(),
            client_secret_hash: String::new(),
            app_type,
            is_active: true,
            access_token_lifetime_secs: None,
            refresh_token_lifetime_secs: None,
            external_providers: Vec::new(),
            legacy_database: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a usable legacy-database configuration is attached.
    pub fn has_legacy_database(&self) -> bool {
        self.legacy_database
            .as_ref()
            .is_some_and(LegacyDatabaseConfig::is_complete)
    }
}
