//! Bridge to an application's external legacy user database.
//!
//! The core never links engine drivers; callers supply a
//! [`LegacyConnectorFactory`] and the bridge hands it a dialect plus a
//! decrypted connection string. The bridge owns query construction, identifier
//! allow-listing, and credential verification against the configured hash
//! format. Every failure mode collapses to [`ServiceError::InvalidCredentials`]
//! at the login boundary; the distinctions below exist for logging and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::models::{Application, DatabaseDialect, LegacyDatabaseConfig};
use crate::services::{credential, EncryptionService, ServiceError};

/// A user row fetched from a legacy database, mapped through the
/// application's column configuration.
#[derive(Debug, Clone)]
pub struct LegacyUser {
    /// The legacy row's primary key, as text.
    pub legacy_id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Values of the configured extra columns, keyed by column name.
    pub extra: HashMap<String, String>,
}

/// One open connection to a legacy database.
#[async_trait]
pub trait LegacyConnection: Send + Sync {
    /// Run a single-row lookup with one bound parameter and return the row
    /// as column-name -> text, or `None` when no row matches.
    async fn fetch_row(
        &self,
        sql: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<HashMap<String, String>>>;
}

/// Opens connections for the supported engines.
#[async_trait]
pub trait LegacyConnectorFactory: Send + Sync {
    async fn connect(
        &self,
        dialect: DatabaseDialect,
        connection_string: &str,
    ) -> anyhow::Result<Box<dyn LegacyConnection>>;
}

/// Internal failure detail; the login path reports all of these uniformly.
#[derive(Debug, Error)]
pub enum LegacyAuthError {
    #[error("legacy database configuration is incomplete")]
    ConfigurationIncomplete,
    #[error("legacy database connection failed")]
    Connection(#[source] anyhow::Error),
    #[error("legacy database query failed")]
    Query(#[source] anyhow::Error),
    #[error("no matching legacy user")]
    NotFound,
    #[error("legacy password verification failed")]
    BadPassword,
}

#[derive(Clone)]
pub struct LegacyBridge {
    factory: Arc<dyn LegacyConnectorFactory>,
    encryption: EncryptionService,
}

impl LegacyBridge {
    pub fn new(factory: Arc<dyn LegacyConnectorFactory>, encryption: EncryptionService) -> Self {
        Self { factory, encryption }
    }

    /// Authenticate `identifier` (email, or username when the application
    /// maps one) against the application's legacy database.
    pub async fn authenticate(
        &self,
        application: &Application,
        identifier: &str,
        password: &str,
    ) -> Result<LegacyUser, LegacyAuthError> {
        let config = application
            .legacy_database
            .as_ref()
            .filter(|c| c.is_complete())
            .ok_or(LegacyAuthError::ConfigurationIncomplete)?;

        let sql = build_lookup_query(config).ok_or(LegacyAuthError::ConfigurationIncomplete)?;

        let connection_string = self
            .encryption
            .decrypt(&config.encrypted_connection_string)
            .map_err(|e| LegacyAuthError::Connection(anyhow::anyhow!(e)))?;

        let connection = self
            .factory
            .connect(config.dialect, &connection_string)
            .await
            .map_err(LegacyAuthError::Connection)?;

        let row = connection
            .fetch_row(&sql, identifier)
            .await
            .map_err(LegacyAuthError::Query)?
            .ok_or(LegacyAuthError::NotFound)?;

        let stored_hash = row
            .get(&config.password_column)
            .map(String::as_str)
            .unwrap_or_default();
        if !credential::verify(password, stored_hash, config.hash_algorithm) {
            return Err(LegacyAuthError::BadPassword);
        }

        Ok(map_row(config, &row))
    }
}

impl From<LegacyAuthError> for ServiceError {
    fn from(err: LegacyAuthError) -> Self {
        match err {
            LegacyAuthError::ConfigurationIncomplete => ServiceError::ConfigurationIncomplete,
            LegacyAuthError::NotFound | LegacyAuthError::BadPassword => {
                ServiceError::InvalidCredentials
            }
            LegacyAuthError::Connection(e) | LegacyAuthError::Query(e) => {
                ServiceError::Internal(e)
            }
        }
    }
}

fn map_row(config: &LegacyDatabaseConfig, row: &HashMap<String, String>) -> LegacyUser {
    let column = |name: &str| row.get(name).cloned();

    let mut extra = HashMap::new();
    for name in &config.extra_columns {
        if let Some(value) = row.get(name) {
            extra.insert(name.clone(), value.clone());
        }
    }

    LegacyUser {
        legacy_id: column(&config.id_column).unwrap_or_default(),
        email: column(&config.email_column).unwrap_or_default().to_lowercase(),
        first_name: config.first_name_column.as_deref().and_then(column),
        last_name: config.last_name_column.as_deref().and_then(column),
        extra,
    }
}

/// Build the single-row lookup for the configured table.
///
/// Every identifier is checked against the allow-list before interpolation;
/// the user-supplied identifier itself only ever travels as a bound
/// parameter. Returns `None` when any configured identifier fails the check.
fn build_lookup_query(config: &LegacyDatabaseConfig) -> Option<String> {
    let dialect = config.dialect;

    if !valid_identifier(&config.table_name, true) {
        return None;
    }

    let mut select_columns = vec![
        config.id_column.as_str(),
        config.email_column.as_str(),
        config.password_column.as_str(),
    ];
    if let Some(c) = config.username_column.as_deref() {
        select_columns.push(c);
    }
    if let Some(c) = config.first_name_column.as_deref() {
        select_columns.push(c);
    }
    if let Some(c) = config.last_name_column.as_deref() {
        select_columns.push(c);
    }
    for c in &config.extra_columns {
        select_columns.push(c);
    }

    if select_columns.iter().any(|c| !valid_identifier(c, false)) {
        return None;
    }

    let select_list = select_columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    let table = quote_table(dialect, &config.table_name);
    let placeholder = dialect.placeholder(1);

    let predicate = match config.username_column.as_deref() {
        Some(username) => format!(
            "{} = {placeholder} OR {} = {placeholder}",
            dialect.quote_identifier(&config.email_column),
            dialect.quote_identifier(username),
        ),
        None => format!(
            "{} = {placeholder}",
            dialect.quote_identifier(&config.email_column),
        ),
    };

    Some(format!("SELECT {select_list} FROM {table} WHERE {predicate}"))
}

/// Table names may be schema-qualified; each dotted segment is quoted
/// separately.
fn quote_table(dialect: DatabaseDialect, table: &str) -> String {
    table
        .split('.')
        .map(|segment| dialect.quote_identifier(segment))
        .collect::<Vec<_>>()
        .join(".")
}

/// Identifiers are restricted to ASCII alphanumerics and underscores;
/// table names may additionally contain `.` as a schema separator.
fn valid_identifier(identifier: &str, allow_dot: bool) -> bool {
    if identifier.is_empty() {
        return false;
    }
    identifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || (allow_dot && c == '.'))
}
