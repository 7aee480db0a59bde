mod common;

use auth_core::models::{AuditEventType, RefreshToken};
use auth_core::services::{RefreshRequest, ServiceError};
use auth_core::store::AuthStore;

use common::{harness, login_request, seed_application, seed_tenant, seed_user};

fn refresh_request(token: &str, client_id: &str) -> RefreshRequest {
    RefreshRequest {
        refresh_token: token.to_string(),
        client_id: client_id.to_string(),
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("integration-tests".to_string()),
    }
}

#[tokio::test]
async fn rotation_issues_a_new_pair_and_links_the_chain() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    let rotated = h
        .auth
        .refresh(refresh_request(&login.tokens.refresh_token, "web"))
        .await
        .unwrap();
    assert_ne!(rotated.refresh_token, login.tokens.refresh_token);

    let old_row = h
        .store
        .refresh_token_by_hash(&RefreshToken::hash_token(&login.tokens.refresh_token))
        .await
        .unwrap()
        .unwrap();
    let new_row = h
        .store
        .refresh_token_by_hash(&RefreshToken::hash_token(&rotated.refresh_token))
        .await
        .unwrap()
        .unwrap();
    assert!(old_row.is_used);
    assert_eq!(new_row.parent_token_id, Some(old_row.id));

    let events = h.audit.events().await;
    assert!(events
        .iter()
        .any(|e| e.event_type == AuditEventType::TokenRefreshed && e.success));
}

#[tokio::test]
async fn a_used_token_is_rejected_on_reuse() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();
    h.auth
        .refresh(refresh_request(&login.tokens.refresh_token, "web"))
        .await
        .unwrap();

    let err = h
        .auth
        .refresh(refresh_request(&login.tokens.refresh_token, "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));

    let events = h.audit.events().await;
    assert!(events
        .iter()
        .any(|e| e.event_type == AuditEventType::TokenRefreshFailed));
}

#[tokio::test]
async fn concurrent_duplicate_rotation_has_exactly_one_winner() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let auth = h.auth.clone();
        let request = refresh_request(&login.tokens.refresh_token, "web");
        handles.push(tokio::spawn(async move { auth.refresh(request).await }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn refresh_is_bound_to_the_issuing_client() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    seed_application(&h.store, "mobile", Some(tenant.id)).await;
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    let err = h
        .auth
        .refresh(refresh_request(&login.tokens.refresh_token, "mobile"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidClient));
}

#[tokio::test]
async fn expired_refresh_token_is_rejected() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    let mut app = seed_application(&h.store, "web", Some(tenant.id)).await;
    app.refresh_token_lifetime_secs = Some(-120);
    h.store.insert_application(&app).await.unwrap();
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    let err = h
        .auth
        .refresh(refresh_request(&login.tokens.refresh_token, "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn garbage_refresh_token_is_rejected() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;

    let err = h
        .auth
        .refresh(refresh_request("not-a-jwt-at-all", "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));
}

#[tokio::test]
async fn logout_revokes_and_repeats_harmlessly() {
    let h = harness();
    let tenant = seed_tenant(&h.store).await;
    seed_application(&h.store, "web", Some(tenant.id)).await;
    seed_user(&h.store, Some(tenant.id), "alice@example.com", "Pass1word").await;

    let login = h
        .auth
        .login(login_request("alice@example.com", "Pass1word", "web"))
        .await
        .unwrap();

    h.auth
        .logout(&login.tokens.refresh_token, None)
        .await
        .unwrap();

    let err = h
        .auth
        .refresh(refresh_request(&login.tokens.refresh_token, "web"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::InvalidOrExpiredToken));

    // Logging out again is not an error, and both attempts are audited.
    h.auth
        .logout(&login.tokens.refresh_token, None)
        .await
        .unwrap();
    let events = h.audit.events().await;
    assert_eq!(
        events
            .iter()
            .filter(|e| e.event_type == AuditEventType::Logout)
            .count(),
        2
    );
}
