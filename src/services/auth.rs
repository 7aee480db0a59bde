//! Login/refresh/logout orchestration.
//!
//! `AuthService` is the entry point callers hold; it wires the store, token
//! service, legacy bridge, and audit sink together. Credential failures are
//! normalized before they leave this module: unknown email and wrong password
//! produce the same error, and only the audit trail records the difference.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{
    Application, ApplicationUserMapping, AuditEvent, AuditEventType, Tenant, User,
};
use crate::services::legacy::LegacyAuthError;
use crate::services::lockout::{self, LockoutPolicy};
use crate::services::token::TokenResponse;
use crate::services::{AuditSink, LegacyBridge, ServiceError, TokenService};
use crate::store::{AuthStore, StoreError};
use crate::utils::password;

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Defaults to the configured default client when absent.
    pub client_id: Option<String>,
    pub tenant_subdomain: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefreshRequest {
    pub refresh_token: String,
    pub client_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub tenant_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Projection of a user returned alongside tokens; never includes hashes or
/// the security stamp.
#[derive(Debug, Clone, serde::Serialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub tenant_id: Option<Uuid>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_verified: bool,
    pub is_system_admin: bool,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            tenant_id: user.tenant_id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email_verified: user.email_verified,
            is_system_admin: user.is_system_admin,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub tokens: TokenResponse,
    pub user: UserInfo,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn AuthStore>,
    tokens: TokenService,
    legacy: LegacyBridge,
    audit: Arc<dyn AuditSink>,
    default_client_id: String,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn AuthStore>,
        tokens: TokenService,
        legacy: LegacyBridge,
        audit: Arc<dyn AuditSink>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            legacy,
            audit,
            default_client_id: config.default_client_id.clone(),
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate an email/password pair against an application.
    ///
    /// User resolution order: system administrator, tenant-scoped local user,
    /// then the legacy bridge when the application carries a usable legacy
    /// configuration (materializing a shadow user on first contact).
    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
        let client_id = request
            .client_id
            .as_deref()
            .unwrap_or(&self.default_client_id);
        let application = self
            .store
            .application_by_client_id(client_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(ServiceError::InvalidClient)?;

        let tenant = self
            .resolve_tenant(&application, request.tenant_subdomain.as_deref())
            .await?;
        if let Some(t) = &tenant {
            if !t.can_authenticate() {
                return Err(ServiceError::AccountInactive);
            }
        }
        let tenant_id = tenant.as_ref().map(|t| t.id);

        let email = request.email.trim().to_lowercase();

        let resolved = match self.store.system_admin_by_email(&email).await? {
            Some(admin) => Some(admin),
            None => self.store.user_by_email(tenant_id, &email).await?,
        };

        let user = match resolved {
            Some(user) => user,
            None if application.has_legacy_database() => {
                return self
                    .login_via_bridge(&application, tenant_id, &email, &request)
                    .await;
            }
            None => {
                self.audit_login_failure(tenant_id, None, &application, &request, "unknown user")
                    .await;
                return Err(ServiceError::InvalidCredentials);
            }
        };

        self.complete_login(user, &application, tenant.as_ref(), &request)
            .await
    }

    /// A local lookup missed but the application bridges to a legacy
    /// database: authenticate there, then find or create the shadow user.
    async fn login_via_bridge(
        &self,
        application: &Application,
        tenant_id: Option<Uuid>,
        email: &str,
        request: &LoginRequest,
    ) -> Result<LoginResponse, ServiceError> {
        let legacy_user = match self
            .legacy
            .authenticate(application, email, &request.password)
            .await
        {
            Ok(found) => found,
            Err(LegacyAuthError::ConfigurationIncomplete) => {
                return Err(ServiceError::ConfigurationIncomplete)
            }
            Err(err) => {
                tracing::debug!(client_id = %application.client_id, error = %err, "legacy authentication failed");
                self.audit_login_failure(tenant_id, None, application, request, "legacy rejection")
                    .await;
                return Err(ServiceError::InvalidCredentials);
            }
        };

        let mut user = match self
            .store
            .mapping_by_legacy_id(application.id, &legacy_user.legacy_id)
            .await?
        {
            Some(mapping) => self
                .store
                .user_by_id(mapping.user_id)
                .await?
                .ok_or(ServiceError::NotFound("user"))?,
            None => {
                // Shadow users carry no local hash; the bridge stays the
                // credential authority. The legacy address counts as
                // verified.
                let mut shadow = User::new(tenant_id, &legacy_user.email, String::new());
                shadow.email_verified = true;
                shadow.first_name = legacy_user.first_name.clone();
                shadow.last_name = legacy_user.last_name.clone();
                self.store.insert_user(&shadow).await?;

                let mapping = ApplicationUserMapping::new(
                    application.id,
                    shadow.id,
                    &legacy_user.legacy_id,
                );
                self.store.insert_mapping(&mapping).await?;
                tracing::info!(user_id = %shadow.id, client_id = %application.client_id, "materialized shadow user for legacy account");
                shadow
            }
        };

        if !user.is_active {
            self.audit_login_failure(tenant_id, Some(user.id), application, request, "account inactive")
                .await;
            return Err(ServiceError::AccountInactive);
        }

        lockout::register_success(&mut user, Utc::now(), request.ip_address.clone());
        self.store.update_user(&user).await?;

        self.finish_login(user, application, request).await
    }

    /// Local-user path: activity and lockout gates, then password
    /// verification against the local hash or, for hashless shadow users,
    /// through the bridge.
    async fn complete_login(
        &self,
        mut user: User,
        application: &Application,
        tenant: Option<&Tenant>,
        request: &LoginRequest,
    ) -> Result<LoginResponse, ServiceError> {
        let now = Utc::now();
        let tenant_id = tenant.map(|t| t.id);

        if !user.is_active {
            self.audit_login_failure(tenant_id, Some(user.id), application, request, "account inactive")
                .await;
            return Err(ServiceError::AccountInactive);
        }

        if let Some(until) = user.lockout_end.filter(|end| *end > now) {
            self.audit_login_failure(tenant_id, Some(user.id), application, request, "account locked")
                .await;
            return Err(ServiceError::AccountLocked { until });
        }

        let verified = if !user.password_hash.is_empty() {
            password::verify_password(&request.password, &user.password_hash)
        } else if application.has_legacy_database() {
            self.legacy
                .authenticate(application, &user.email, &request.password)
                .await
                .is_ok()
        } else {
            false
        };

        if !verified {
            // System administrators accrue a counter but never auto-lock.
            let newly_locked = if user.is_system_admin {
                user.failed_login_attempts = user.failed_login_attempts.saturating_add(1);
                user.updated_at = now;
                false
            } else {
                lockout::register_failure(&mut user, tenant.map(LockoutPolicy::from_tenant), now)
            };
            self.store.update_user(&user).await?;

            if newly_locked {
                tracing::warn!(user_id = %user.id, "account locked after repeated failures");
                self.audit
                    .record(
                        AuditEvent::failure(AuditEventType::UserLocked, "too many failed attempts")
                            .with_tenant(tenant_id)
                            .with_user(user.id)
                            .with_application(application.id)
                            .with_ip(request.ip_address.clone()),
                    )
                    .await;
            }
            self.audit_login_failure(tenant_id, Some(user.id), application, request, "invalid password")
                .await;
            return Err(ServiceError::InvalidCredentials);
        }

        lockout::register_success(&mut user, now, request.ip_address.clone());
        self.store.update_user(&user).await?;

        self.finish_login(user, application, request).await
    }

    async fn finish_login(
        &self,
        user: User,
        application: &Application,
        request: &LoginRequest,
    ) -> Result<LoginResponse, ServiceError> {
        let tokens = self
            .tokens
            .issue_pair(
                &user,
                application,
                request.ip_address.clone(),
                request.user_agent.clone(),
            )
            .await?;

        self.audit
            .record(
                AuditEvent::success(AuditEventType::Login)
                    .with_tenant(user.tenant_id)
                    .with_user(user.id)
                    .with_application(application.id)
                    .with_ip(request.ip_address.clone())
                    .with_user_agent(request.user_agent.clone()),
            )
            .await;

        Ok(LoginResponse {
            tokens,
            user: UserInfo::from(&user),
        })
    }

    /// Rotate a refresh token. The presented token must be bound to the
    /// requesting client and still Active; rotation consumes it.
    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenResponse, ServiceError> {
        match self.refresh_inner(&request).await {
            Ok((response, user, application)) => {
                self.audit
                    .record(
                        AuditEvent::success(AuditEventType::TokenRefreshed)
                            .with_tenant(user.tenant_id)
                            .with_user(user.id)
                            .with_application(application.id)
                            .with_ip(request.ip_address.clone()),
                    )
                    .await;
                Ok(response)
            }
            Err(err) => {
                self.audit
                    .record(
                        AuditEvent::failure(AuditEventType::TokenRefreshFailed, err.to_string())
                            .with_ip(request.ip_address.clone()),
                    )
                    .await;
                Err(err)
            }
        }
    }

    async fn refresh_inner(
        &self,
        request: &RefreshRequest,
    ) -> Result<(TokenResponse, User, Application), ServiceError> {
        let hash = crate::models::RefreshToken::hash_token(&request.refresh_token);
        let record = self
            .store
            .refresh_token_by_hash(&hash)
            .await?
            .filter(|r| r.is_active(Utc::now()))
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let application = self
            .store
            .application_by_id(record.application_id)
            .await?
            .filter(|a| a.is_active)
            .ok_or(ServiceError::InvalidClient)?;
        if application.client_id != request.client_id {
            return Err(ServiceError::InvalidClient);
        }

        let user = self
            .store
            .user_by_id(record.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(ServiceError::InvalidOrExpiredToken)?;

        let response = self
            .tokens
            .rotate(
                &request.refresh_token,
                &user,
                &application,
                request.ip_address.clone(),
                request.user_agent.clone(),
            )
            .await?;

        Ok((response, user, application))
    }

    /// Revoke the presented refresh token. Audited whether or not the token
    /// existed; a repeat logout is not an error.
    pub async fn logout(
        &self,
        refresh_token: &str,
        ip_address: Option<String>,
    ) -> Result<(), ServiceError> {
        let revoked = self
            .tokens
            .revoke_refresh_token(refresh_token, "Logout", ip_address.as_deref())
            .await?;
        tracing::debug!(revoked, "logout");

        self.audit
            .record(AuditEvent::success(AuditEventType::Logout).with_ip(ip_address))
            .await;
        Ok(())
    }

    /// Change a user's password. Rotates the security stamp and revokes every
    /// outstanding refresh token.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        let mut user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;

        if !password::verify_password(current_password, &user.password_hash) {
            return Err(ServiceError::InvalidCredentials);
        }

        self.password_policy_for(user.tenant_id)
            .await?
            .validate(new_password)
            .map_err(ServiceError::PasswordPolicy)?;

        user.password_hash = password::hash_password(new_password)?;
        user.rotate_security_stamp();
        self.store.update_user(&user).await?;
        self.tokens
            .revoke_all_for_user(user.id, "Password changed")
            .await?;

        self.audit
            .record(
                AuditEvent::success(AuditEventType::PasswordChanged)
                    .with_tenant(user.tenant_id)
                    .with_user(user.id),
            )
            .await;
        Ok(())
    }

    /// Create a local user. The account stays inactive until email
    /// verification; registration never logs the user in.
    pub async fn register(&self, request: RegisterRequest) -> Result<UserInfo, ServiceError> {
        let email = request.email.trim().to_lowercase();

        self.password_policy_for(request.tenant_id)
            .await?
            .validate(&request.password)
            .map_err(ServiceError::PasswordPolicy)?;

        if self
            .store
            .user_by_email(request.tenant_id, &email)
            .await?
            .is_some()
        {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let hash = password::hash_password(&request.password)?;
        let mut user = User::new(request.tenant_id, &email, hash);
        user.is_active = false;
        user.first_name = request.first_name;
        user.last_name = request.last_name;

        match self.store.insert_user(&user).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(ServiceError::EmailAlreadyRegistered),
            Err(e) => return Err(e.into()),
        }

        self.audit
            .record(
                AuditEvent::success(AuditEventType::UserCreated)
                    .with_tenant(user.tenant_id)
                    .with_user(user.id),
            )
            .await;

        Ok(UserInfo::from(&user))
    }

    /// Administrative unlock: clears the failure counter and the lockout
    /// window.
    pub async fn unlock_user(&self, user_id: Uuid) -> Result<(), ServiceError> {
        let mut user = self
            .store
            .user_by_id(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))?;
        lockout::unlock(&mut user);
        self.store.update_user(&user).await?;
        Ok(())
    }

    /// External-provider login needs the provider exchange; not wired yet.
    pub async fn login_external(
        &self,
        _provider: &str,
        _id_token: &str,
    ) -> Result<LoginResponse, ServiceError> {
        Err(ServiceError::Unsupported(
            "external provider login".to_string(),
        ))
    }

    /// Always success-shaped so callers cannot probe which emails exist.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), ServiceError> {
        tracing::debug!(email = %email.trim().to_lowercase(), "password reset requested");
        Ok(())
    }

    pub async fn confirm_password_reset(
        &self,
        _token: &str,
        _new_password: &str,
    ) -> Result<(), ServiceError> {
        Err(ServiceError::Unsupported("password reset".to_string()))
    }

    pub async fn verify_email(&self, _token: &str) -> Result<(), ServiceError> {
        Err(ServiceError::Unsupported("email verification".to_string()))
    }

    async fn resolve_tenant(
        &self,
        application: &Application,
        subdomain: Option<&str>,
    ) -> Result<Option<Tenant>, ServiceError> {
        if let Some(subdomain) = subdomain {
            let tenant = self
                .store
                .tenant_by_subdomain(subdomain)
                .await?
                .ok_or(ServiceError::InvalidCredentials)?;
            return Ok(Some(tenant));
        }
        match application.tenant_id {
            Some(id) => Ok(Some(
                self.store
                    .tenant_by_id(id)
                    .await?
                    .ok_or(ServiceError::NotFound("tenant"))?,
            )),
            None => Ok(None),
        }
    }

    async fn password_policy_for(
        &self,
        tenant_id: Option<Uuid>,
    ) -> Result<crate::models::PasswordPolicy, ServiceError> {
        match tenant_id {
            Some(id) => Ok(self
                .store
                .tenant_by_id(id)
                .await?
                .ok_or(ServiceError::NotFound("tenant"))?
                .password_policy),
            None => Ok(crate::models::PasswordPolicy::default()),
        }
    }

    async fn audit_login_failure(
        &self,
        tenant_id: Option<Uuid>,
        user_id: Option<Uuid>,
        application: &Application,
        request: &LoginRequest,
        detail: &str,
    ) {
        let mut event = AuditEvent::failure(AuditEventType::LoginFailed, detail)
            .with_tenant(tenant_id)
            .with_application(application.id)
            .with_ip(request.ip_address.clone())
            .with_user_agent(request.user_agent.clone());
        if let Some(id) = user_id {
            event = event.with_user(id);
        }
        self.audit.record(event).await;
    }
}
