//! Shared fixtures for the integration suites: an in-memory store, a
//! capturing audit sink, and a fake legacy connector.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use auth_core::config::{AuthConfig, EncryptionConfig, JwtConfig};
use auth_core::models::{Application, ApplicationType, DatabaseDialect, Tenant, User};
use auth_core::services::{
    AuthService, EncryptionService, JwtService, LegacyBridge, LegacyConnection,
    LegacyConnectorFactory, LoginRequest, MemoryAuditSink, TokenService,
};
use auth_core::store::{AuthStore, MemoryStore};

/// Low bcrypt cost keeps seeded users cheap; production uses the default.
pub const TEST_BCRYPT_COST: u32 = 4;

pub fn test_config() -> AuthConfig {
    AuthConfig {
        jwt: JwtConfig {
            secret: "integration-test-signing-secret-thats-long-enough".to_string(),
            issuer: "auth-core".to_string(),
            audience: "auth-core-clients".to_string(),
            leeway_seconds: 0,
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        encryption: EncryptionConfig {
            master_key: "integration-test-master-key".to_string(),
        },
        default_client_id: "default".to_string(),
    }
}

/// Serves canned rows keyed by the bound lookup identifier; the SQL text is
/// ignored.
#[derive(Default, Clone)]
pub struct FakeLegacyFactory {
    rows: Arc<Mutex<HashMap<String, HashMap<String, String>>>>,
}

impl FakeLegacyFactory {
    pub async fn add_row(&self, identifier: &str, row: HashMap<String, String>) {
        self.rows
            .lock()
            .await
            .insert(identifier.to_string(), row);
    }
}

#[async_trait]
impl LegacyConnectorFactory for FakeLegacyFactory {
    async fn connect(
        &self,
        _dialect: DatabaseDialect,
        _connection_string: &str,
    ) -> anyhow::Result<Box<dyn LegacyConnection>> {
        Ok(Box::new(FakeLegacyConnection {
            rows: self.rows.lock().await.clone(),
        }))
    }
}

struct FakeLegacyConnection {
    rows: HashMap<String, HashMap<String, String>>,
}

#[async_trait]
impl LegacyConnection for FakeLegacyConnection {
    async fn fetch_row(
        &self,
        _sql: &str,
        identifier: &str,
    ) -> anyhow::Result<Option<HashMap<String, String>>> {
        Ok(self.rows.get(identifier).cloned())
    }
}

pub struct Harness {
    pub config: AuthConfig,
    pub store: Arc<MemoryStore>,
    pub audit: Arc<MemoryAuditSink>,
    pub legacy_rows: FakeLegacyFactory,
    pub encryption: EncryptionService,
    pub tokens: TokenService,
    pub auth: AuthService,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn harness() -> Harness {
    init_tracing();
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let jwt = JwtService::new(&config.jwt).unwrap();
    let tokens = TokenService::new(store.clone() as Arc<dyn AuthStore>, jwt, &config.jwt);
    let encryption = EncryptionService::new(&config.encryption);
    let legacy_rows = FakeLegacyFactory::default();
    let legacy = LegacyBridge::new(Arc::new(legacy_rows.clone()), encryption.clone());
    let audit = Arc::new(MemoryAuditSink::new());
    let auth = AuthService::new(
        store.clone() as Arc<dyn AuthStore>,
        tokens.clone(),
        legacy,
        audit.clone(),
        &config,
    );

    Harness {
        config,
        store,
        audit,
        legacy_rows,
        encryption,
        tokens,
        auth,
    }
}

pub async fn seed_tenant(store: &MemoryStore) -> Tenant {
    let tenant = Tenant::new("Acme", "acme");
    store.insert_tenant(&tenant).await.unwrap();
    tenant
}

pub async fn seed_application(
    store: &MemoryStore,
    client_id: &str,
    tenant_id: Option<Uuid>,
) -> Application {
    let app = Application::new(tenant_id, "Test App", client_id, ApplicationType::Native);
    store.insert_application(&app).await.unwrap();
    app
}

pub async fn seed_user(
    store: &MemoryStore,
    tenant_id: Option<Uuid>,
    email: &str,
    password: &str,
) -> User {
    let hash = bcrypt::hash(password, TEST_BCRYPT_COST).unwrap();
    let mut user = User::new(tenant_id, email, hash);
    user.email_verified = true;
    store.insert_user(&user).await.unwrap();
    user
}

pub fn login_request(email: &str, password: &str, client_id: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
        client_id: Some(client_id.to_string()),
        tenant_subdomain: None,
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("integration-tests".to_string()),
    }
}
