mod common;

use auth_core::models::AuditEventType;
use auth_core::services::{RefreshRequest, ServiceError};
use auth_core::store::AuthStore;

use common::{harness, login_request, seed_application, seed_tenant, seed_user};

#[tokio::test]
async fn change_password_swaps_the_credential() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    let user = seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    h.auth
        .change_password(user.id, "Pass1word", "NewPass2word")
        .await
        .unwrap();

    assert!(matches!(
        h.auth
            .login(login_request("alice@example.com", "Pass1word", "web"))
            .await,
        Err(ServiceError::InvalidCredentials)
    ));
    assert!(h
        .auth
        .login(login_request("alice@example.com", "NewPass2word", "web"))
        .await
        .is_ok());

    let events = h.audit.events().await;
    assert!(events
        .iter()
        .any(|e| e.event_type == AuditEventType::PasswordChanged && e.success));
}

#[tokio::test]
async fn change_password_invalidates_every_outstanding_refresh_token() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    let user = seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let first = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();
    let second = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    h.auth
        .change_password(user.id, "Pass1word", "NewPass2word")
        .await
        .unwrap();

    for token in [&first.tokens.refresh_token, &second.tokens.refresh_token] {
        let err = h
            .auth
            .refresh(RefreshRequest {
                refresh_token: token.clone(),
                client_id: "web".to_string(),
                ip_address: None,
                user_agent: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
    }
}

#[tokio::test]
async fn change_password_rotates_the_security_stamp() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    let user = seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;
    let stamp_before = user.security_stamp.clone();

    h.auth
        .change_password(user.id, "Pass1word", "NewPass2word")
        .await
        .unwrap();

    let stored = h.store.user_by_id(user.id).await.unwrap().unwrap();
    assert_ne!(stored.security_stamp, stamp_before);
}

#[tokio::test]
async fn wrong_current_password_is_rejected() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    let user = seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let err = h
        .auth
        .change_password(user.id, "not-the-password", "NewPass2word")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
}

#[tokio::test]
async fn tenant_policy_gates_the_new_password() {
    let h = harness();
    let mut tenant = seed_tenant(&h.store).await;
    tenant.password_policy.min_length = 12;
    h.store.insert_tenant(&tenant).await.unwrap();
    let user = seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let err = h
        .auth
        .change_password(user.id, "Pass1word", "Short1pass")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PasswordPolicy(_)));
}
