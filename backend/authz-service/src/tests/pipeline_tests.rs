/// AuthorizationPipeline: each decision path and its single audit record
use crate::error::AuthzError;
use crate::middleware::{AuthContext, RequestInfo};
use crate::models::AuditLogEntry;
use crate::tests::fixtures::*;
use chrono::Utc;
use jwt_security::{TokenConfig, TokenService};
use std::time::{Duration, Instant};

fn request(token: Option<&str>) -> RequestInfo {
    RequestInfo {
        client_address: TEST_CLIENT.to_string(),
        user_agent: Some("pipeline-test".to_string()),
        authorization: token.map(|t| format!("Bearer {}", t)),
    }
}

fn only_entry(env: &TestEnv) -> AuditLogEntry {
    let entries = env.db.audit_entries();
    assert_eq!(entries.len(), 1, "expected exactly one audit record");
    entries.into_iter().next().unwrap()
}

/// A user holding orders:read plus an access token for them.
async fn granted_env() -> (TestEnv, i64, i64, String) {
    let env = TestEnv::new();
    let app = env.seed_application("storefront").await;
    let user = env.seed_user("alice").await;
    env.grant(user.id, app.id, "orders", "read").await;

    let pair = token_service()
        .issue_pair(&user.token_user(), app.id)
        .unwrap();

    (env, user.id, app.id, pair.access_token)
}

fn audit_count(env: &TestEnv) -> usize {
    env.db.audit_entries().len()
}

#[tokio::test]
async fn test_granted_request_yields_context_and_one_audit() {
    let (env, user_id, app_id, token) = granted_env().await;
    let before = audit_count(&env);

    let ctx = env
        .state
        .pipeline
        .authorize(&request(Some(&token)), "orders", "read")
        .await
        .unwrap();

    assert_eq!(
        ctx,
        AuthContext {
            user_id,
            application_id: app_id
        }
    );
    let entries = env.db.audit_entries();
    assert_eq!(entries.len(), before + 1);
    let entry = entries.last().unwrap();
    assert_eq!(entry.action, "access_granted");
    assert_eq!(entry.status, "success");
    assert_eq!(entry.resource, "orders");
    assert_eq!(entry.user_id, Some(user_id));
    assert_eq!(entry.application_id, Some(app_id));
    assert_eq!(entry.ip_address, TEST_CLIENT);
    assert_eq!(entry.details["requested_action"], "read");
    assert_eq!(env.state.metrics.decision_count("granted"), 1);
}

#[tokio::test]
async fn test_missing_grant_is_forbidden_and_audited() {
    let (env, user_id, app_id, token) = granted_env().await;
    let before = audit_count(&env);

    let result = env
        .state
        .pipeline
        .authorize(&request(Some(&token)), "orders", "delete")
        .await;

    assert!(matches!(result, Err(AuthzError::Forbidden)));
    let entries = env.db.audit_entries();
    assert_eq!(entries.len(), before + 1);
    let entry = entries.last().unwrap();
    assert_eq!(entry.action, "access_denied");
    assert_eq!(entry.status, "denied");
    assert_eq!(entry.user_id, Some(user_id));
    assert_eq!(entry.application_id, Some(app_id));
    assert_eq!(entry.details["reason"], "insufficient_permissions");
    assert_eq!(env.state.metrics.decision_count("denied"), 1);
}

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let env = TestEnv::new();

    let result = env
        .state
        .pipeline
        .authorize(&request(None), "orders", "read")
        .await;

    match result {
        Err(AuthzError::Unauthenticated(reason)) => assert_eq!(reason, "missing_token"),
        other => panic!("expected Unauthenticated, got {:?}", other),
    }
    let entry = only_entry(&env);
    assert_eq!(entry.action, "auth_error");
    assert_eq!(entry.application_id, None);
    assert_eq!(entry.details["reason"], "missing_token");
}

#[tokio::test]
async fn test_non_bearer_scheme_is_unauthenticated() {
    let env = TestEnv::new();
    let info = RequestInfo {
        authorization: Some("Basic YWxpY2U6c2VjcmV0".to_string()),
        ..request(None)
    };

    let result = env.state.pipeline.authorize(&info, "orders", "read").await;

    assert!(matches!(result, Err(AuthzError::Unauthenticated(_))));
    assert_eq!(only_entry(&env).details["reason"], "missing_token");
}

#[tokio::test]
async fn test_refresh_token_is_refused() {
    let env = TestEnv::new();
    let app = env.seed_application("storefront").await;
    let user = env.seed_user("mallory").await;
    env.grant(user.id, app.id, "orders", "read").await;
    let pair = token_service()
        .issue_pair(&user.token_user(), app.id)
        .unwrap();
    let before = audit_count(&env);

    let result = env
        .state
        .pipeline
        .authorize(&request(Some(&pair.refresh_token)), "orders", "read")
        .await;

    match result {
        Err(AuthzError::Unauthenticated(reason)) => {
            assert_eq!(reason, "refresh_token_not_allowed")
        }
        other => panic!("expected Unauthenticated, got {:?}", other),
    }
    let entries = env.db.audit_entries();
    assert_eq!(entries.len(), before + 1);
    assert_eq!(entries.last().unwrap().action, "auth_error");
    // The permission check was never reached
    assert_eq!(env.db.permission_checks(), 0);
}

#[tokio::test]
async fn test_expired_token_is_refused() {
    let env = TestEnv::new();
    let app = env.seed_application("storefront").await;
    let user = env.seed_user("oscar").await;
    let two_hours_ago = Utc::now().timestamp() - 7200;
    let pair = token_service()
        .issue_pair_at(&user.token_user(), app.id, two_hours_ago)
        .unwrap();

    let result = env
        .state
        .pipeline
        .authorize(&request(Some(&pair.access_token)), "orders", "read")
        .await;

    match result {
        Err(AuthzError::Unauthenticated(reason)) => assert_eq!(reason, "token_expired"),
        other => panic!("expected Unauthenticated, got {:?}", other),
    }
    assert_eq!(only_entry(&env).details["reason"], "token_expired");
}

#[tokio::test]
async fn test_foreign_signature_is_refused() {
    let env = TestEnv::new();
    let app = env.seed_application("storefront").await;
    let user = env.seed_user("trent").await;
    let forger = TokenService::new(TokenConfig {
        secret: "a-completely-different-signing-secret-0123456789".to_string(),
        ..token_config()
    })
    .unwrap();
    let pair = forger.issue_pair(&user.token_user(), app.id).unwrap();

    let result = env
        .state
        .pipeline
        .authorize(&request(Some(&pair.access_token)), "orders", "read")
        .await;

    match result {
        Err(AuthzError::Unauthenticated(reason)) => assert_eq!(reason, "bad_signature"),
        other => panic!("expected Unauthenticated, got {:?}", other),
    }
    assert_eq!(env.state.metrics.decision_count("unauthenticated"), 1);
}

#[tokio::test]
async fn test_garbage_token_is_malformed() {
    let env = TestEnv::new();

    let result = env
        .state
        .pipeline
        .authorize(&request(Some("not.a.jwt")), "orders", "read")
        .await;

    match result {
        Err(AuthzError::Unauthenticated(reason)) => assert_eq!(reason, "malformed_token"),
        other => panic!("expected Unauthenticated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limit_precedes_token_checks() {
    // GIVEN: two requests per window
    let env = TestEnv::with_rate_limit(2);

    for _ in 0..2 {
        let result = env
            .state
            .pipeline
            .authorize(&request(None), "orders", "read")
            .await;
        assert!(matches!(result, Err(AuthzError::Unauthenticated(_))));
    }
    let audited = audit_count(&env);

    // WHEN: the third arrives
    let result = env
        .state
        .pipeline
        .authorize(&request(None), "orders", "read")
        .await;

    // THEN: it is throttled before token handling and not audited
    assert!(matches!(result, Err(AuthzError::RateLimited)));
    assert_eq!(audit_count(&env), audited);
    assert_eq!(env.state.metrics.decision_count("rate_limited"), 1);
}

#[tokio::test]
async fn test_audit_outage_does_not_block_decision() {
    let (env, user_id, _, token) = granted_env().await;
    env.db.set_audit_unavailable(true);

    let ctx = env
        .state
        .pipeline
        .authorize(&request(Some(&token)), "orders", "read")
        .await
        .unwrap();

    assert_eq!(ctx.user_id, user_id);
}

#[tokio::test]
async fn test_stalled_audit_store_is_bounded_by_write_timeout() {
    let (env, user_id, _, token) = granted_env().await;
    env.db.set_audit_delay(Duration::from_secs(5));

    let started = Instant::now();
    let ctx = env
        .state
        .pipeline
        .authorize(&request(Some(&token)), "orders", "read")
        .await
        .unwrap();

    assert_eq!(ctx.user_id, user_id);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(audit_count(&env), 0);
}

#[tokio::test]
async fn test_cache_outage_fails_open() {
    let (env, user_id, _, token) = granted_env().await;
    env.cache.set_unavailable(true);

    // Limiter fails open and the permission read falls back to the store
    let ctx = env
        .state
        .pipeline
        .authorize(&request(Some(&token)), "orders", "read")
        .await
        .unwrap();

    assert_eq!(ctx.user_id, user_id);
    assert_eq!(env.db.permission_checks(), 1);
}
