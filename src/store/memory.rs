use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{Application, ApplicationUserMapping, RefreshToken, Tenant, User};
use crate::store::{AuthStore, StoreError};

/// In-memory store backed by a single mutex.
///
/// The one lock makes every operation atomic, including the combined
/// consume-and-replace that rotation relies on, which is exactly the
/// transactional guarantee the contract asks of a real engine.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    tenants: HashMap<Uuid, Tenant>,
    applications: HashMap<Uuid, Application>,
    users: HashMap<Uuid, User>,
    mappings: Vec<ApplicationUserMapping>,
    /// Keyed by token hash.
    refresh_tokens: HashMap<String, RefreshToken>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users; used by tests asserting lazy materialization.
    pub async fn user_count(&self) -> usize {
        self.inner.lock().await.users.len()
    }

    /// Snapshot of all refresh-token rows; used by tests asserting hash-only
    /// storage.
    pub async fn all_refresh_tokens(&self) -> Vec<RefreshToken> {
        self.inner
            .lock()
            .await
            .refresh_tokens
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuthStore for MemoryStore {
    async fn tenant_by_id(&self, id: Uuid) -> Result<Option<Tenant>, StoreError> {
        Ok(self.inner.lock().await.tenants.get(&id).cloned())
    }

    async fn tenant_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>, StoreError> {
        let needle = subdomain.to_lowercase();
        Ok(self
            .inner
            .lock()
            .await
            .tenants
            .values()
            .find(|t| t.subdomain == needle)
            .cloned())
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .tenants
            .insert(tenant.id, tenant.clone());
        Ok(())
    }

    async fn application_by_id(&self, id: Uuid) -> Result<Option<Application>, StoreError> {
        Ok(self.inner.lock().await.applications.get(&id).cloned())
    }

    async fn application_by_client_id(
        &self,
        client_id: &str,
    ) -> Result<Option<Application>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .applications
            .values()
            .find(|a| a.client_id == client_id)
            .cloned())
    }

    async fn insert_application(&self, application: &Application) -> Result<(), StoreError> {
        self.inner
            .lock()
            .await
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    async fn user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.inner.lock().await.users.get(&id).cloned())
    }

    async fn user_by_email(
        &self,
        tenant_id: Option<Uuid>,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let needle = email.trim().to_lowercase();
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.tenant_id == tenant_id && u.email == needle)
            .cloned())
    }

    async fn system_admin_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let needle = email.trim().to_lowercase();
        Ok(self
            .inner
            .lock()
            .await
            .users
            .values()
            .find(|u| u.is_system_admin && u.tenant_id.is_none() && u.email == needle)
            .cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner
            .users
            .values()
            .any(|u| u.tenant_id == user.tenant_id && u.email == user.email)
        {
            return Err(StoreError::Conflict("email already exists in tenant"));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn mapping_by_legacy_id(
        &self,
        application_id: Uuid,
        legacy_user_id: &str,
    ) -> Result<Option<ApplicationUserMapping>, StoreError> {
        Ok(self
            .inner
            .lock()
            .await
            .mappings
            .iter()
            .find(|m| m.application_id == application_id && m.legacy_user_id == legacy_user_id)
            .cloned())
    }

    async fn insert_mapping(&self, mapping: &ApplicationUserMapping) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.mappings.iter().any(|m| {
            m.application_id == mapping.application_id
                && m.legacy_user_id == mapping.legacy_user_id
        }) {
            return Err(StoreError::Conflict("mapping already exists"));
        }
        inner.mappings.push(mapping.clone());
        Ok(())
    }

    async fn insert_refresh_token(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.refresh_tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Conflict("token hash collision"));
        }
        inner
            .refresh_tokens
            .insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn refresh_token_by_hash(
        &self,
        hash: &str,
    ) -> Result<Option<RefreshToken>, StoreError> {
        Ok(self.inner.lock().await.refresh_tokens.get(hash).cloned())
    }

    async fn consume_refresh_token(&self, hash: &str) -> Result<RefreshToken, StoreError> {
        let mut inner = self.inner.lock().await;
        mark_used(&mut inner, hash)
    }

    async fn consume_and_replace(
        &self,
        hash: &str,
        replacement: &RefreshToken,
    ) -> Result<RefreshToken, StoreError> {
        // Both writes happen under the one lock, so an interrupted caller
        // observes either no change or both rows.
        let mut inner = self.inner.lock().await;
        if inner.refresh_tokens.contains_key(&replacement.token_hash) {
            return Err(StoreError::Conflict("token hash collision"));
        }
        let consumed = mark_used(&mut inner, hash)?;
        inner
            .refresh_tokens
            .insert(replacement.token_hash.clone(), replacement.clone());
        Ok(consumed)
    }

    async fn revoke_refresh_token(
        &self,
        hash: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.refresh_tokens.get_mut(hash) {
            Some(token) if !token.is_revoked => {
                token.is_revoked = true;
                token.revoked_at = Some(Utc::now());
                token.revoked_reason = Some(reason.to_string());
                token.revoked_by_ip = ip.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_user(&self, user_id: Uuid, reason: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut revoked = 0;
        for token in inner.refresh_tokens.values_mut() {
            if token.user_id == user_id && !token.is_revoked {
                token.is_revoked = true;
                token.revoked_at = Some(now);
                token.revoked_reason = Some(reason.to_string());
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

fn mark_used(inner: &mut Inner, hash: &str) -> Result<RefreshToken, StoreError> {
    let token = inner
        .refresh_tokens
        .get_mut(hash)
        .ok_or(StoreError::NotFound)?;

    let now = Utc::now();
    if token.is_revoked {
        return Err(StoreError::Conflict("token is revoked"));
    }
    if token.is_used {
        return Err(StoreError::Conflict("token was already used"));
    }
    if token.is_expired(now) {
        return Err(StoreError::Conflict("token is expired"));
    }

    token.is_used = true;
    token.used_at = Some(now);
    Ok(token.clone())
}
