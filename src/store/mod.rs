//! Persistence collaborator contract.
//!
//! The engine itself is external; this core only requires keyed lookups,
//! inserts/updates, and an atomic consume operation for refresh-token
//! rotation. [`MemoryStore`] is the reference implementation used by the
//! integration tests.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Application, ApplicationUserMapping, RefreshToken, Tenant, User};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    /// The record exists but is not in a state that permits the operation,
    /// e.g. consuming a refresh token that is already used.
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error("store backend error")]
    Backend(#[from] anyhow::Error),
}

/// Transactional repository surface required by the auth core.
///
/// Implementations must make `consume_refresh_token` and
/// `consume_and_replace` atomic with respect to concurrent calls for the
/// same hash (single transaction or row-level lock): of two racing
/// rotations, exactly one may observe the row as active, and
/// `consume_and_replace` commits the Used transition and the successor
/// insert together.
#[async_trait]
pub trait AuthStore: Send + Sync {
    // Tenants
    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, StoreError>;
    async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, StoreError>;
    async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), StoreError>;

    // Applications
    async fn application_by_id(&self, id: Uuid) -> Result<Option<Application>, StoreError>;
    async fn application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, StoreError>;
    async fn insert_application(&self, application: &Application) -> Result<(), StoreError>;

    // Users
    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    /// Case-insensitive email lookup scoped to a tenant (or to the
    /// tenant-less pool when `tenant_id` is `None`).
    async fn user_by_email(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    /// System administrators are looked up independent of tenant.
    async fn system_admin_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    // Legacy user mappings
    async fn mapping_by_legacy_id(
        &self,
        application_id: Uuid,
        legacy_user_id: &str,
    ) -> Result<Option<ApplicationUserMapping>, StoreError>;
    async fn insert_mapping(&self, mapping: &ApplicationUserMapping) -> Result<(), StoreError>;

    // Refresh tokens
    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError>;
    async fn refresh_token_by_hash(&self, hash: &str)
        -> Result<Option<RefreshToken>, StoreError>;
    /// Atomically transition an Active token to Used and return it.
    ///
    /// Fails with `NotFound` when no row matches the hash and with
    /// `Conflict` when the row is already used, revoked, or expired. Expiry
    /// is evaluated lazily here; nothing sweeps expired rows.
    async fn consume_refresh_token(&self, hash: &str) -> Result<RefreshToken, StoreError>;
    /// Consume an Active token and persist its replacement in one
    /// transaction: either both rows commit or neither does, so a rotation
    /// interrupted mid-flight never strands a consumed token without its
    /// successor. Fails like `consume_refresh_token` for a dead row, and
    /// with `Conflict` when the replacement's hash already exists.
    async fn consume_and_replace(
        &self,
        hash: &str,
        replacement: &RefreshToken,
    ) -> Result<RefreshToken, StoreError>;
    /// Revoke a token if it is not already revoked. Returns whether a row
    /// transitioned (idempotent: revoking twice reports `false`).
    async fn revoke_refresh_token(
        &self,
        hash: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> Result<bool, StoreError>;
    /// Revoke every non-revoked token for a user; returns the count.
    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64, StoreError>;
}
