mod common;

use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, header},
};
use canine_canaan::{
    AppConfig, AppError,
    auth::{AuthError, AuthUser, Claims, encode_claims},
    models::Role,
};
use common::{InMemoryRepo, create_test_state, send, test_app, token_for};
use serde_json::{Value, json};
use std::sync::atomic::Ordering;

// --- Helper Functions ---

async fn extract(state: &canine_canaan::AppState, auth: Option<&str>) -> Result<AuthUser, AppError> {
    let mut builder = Request::builder().method(Method::GET).uri("/protected");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();
    AuthUser::from_request_parts(&mut parts, state).await
}

fn unauthorized(result: Result<AuthUser, AppError>) -> AuthError {
    match result {
        Err(AppError::Unauthorized(err)) => err,
        other => panic!("expected a 401, got {other:?}"),
    }
}

async fn register(app: &axum::Router, email: &str, password: &str, role: &str) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({ "email": email, "password": password, "role": role })),
    )
    .await
}

// --- Extractor ---

#[tokio::test]
async fn test_extractor_accepts_valid_token() {
    let state = create_test_state(InMemoryRepo::new());
    let token = token_for(Role::Breeder);

    let user = extract(&state, Some(&format!("Bearer {token}"))).await.unwrap();

    assert_eq!(user.email, "breeder@kennel.test");
    assert_eq!(user.role, Role::Breeder);
    assert!(!user.jti.is_empty());
}

#[tokio::test]
async fn test_extractor_distinguishes_failure_reasons() {
    let repo = InMemoryRepo::new();
    let state = create_test_state(repo.clone());
    let config = AppConfig::default();

    // Missing header
    assert_eq!(unauthorized(extract(&state, None).await), AuthError::MissingToken);

    // Wrong scheme
    assert_eq!(
        unauthorized(extract(&state, Some("Basic dXNlcjpwYXNz")).await),
        AuthError::InvalidHeader
    );

    // Garbage token
    assert_eq!(
        unauthorized(extract(&state, Some("Bearer abc.def.ghi")).await),
        AuthError::Malformed
    );

    // Expired
    let mut claims = Claims::access("a@b.com", Role::Admin, 1);
    claims.iat -= 3 * 3600;
    claims.nbf -= 3 * 3600;
    claims.exp = claims.iat + 3600;
    let expired = encode_claims(&config, &claims).unwrap();
    assert_eq!(
        unauthorized(extract(&state, Some(&format!("Bearer {expired}"))).await),
        AuthError::Expired
    );

    // Wrong type
    let mut claims = Claims::access("a@b.com", Role::Admin, 1);
    claims.token_type = "refresh".to_string();
    let refresh = encode_claims(&config, &claims).unwrap();
    assert_eq!(
        unauthorized(extract(&state, Some(&format!("Bearer {refresh}"))).await),
        AuthError::WrongType
    );

    // Revoked
    let claims = Claims::access("a@b.com", Role::Admin, 1);
    repo.revoke_at(&claims.jti, chrono::Utc::now() + chrono::Duration::hours(1));
    let revoked = encode_claims(&config, &claims).unwrap();
    assert_eq!(
        unauthorized(extract(&state, Some(&format!("Bearer {revoked}"))).await),
        AuthError::Revoked
    );
}

#[tokio::test]
async fn test_blacklist_lookup_failure_fails_closed() {
    let repo = InMemoryRepo::new();
    repo.fail_revocation_lookup.store(true, Ordering::SeqCst);
    let app = test_app(repo);

    let (status, body) = send(&app, Method::GET, "/protected", Some(&token_for(Role::Admin)), None).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "database error occurred");
}

// --- Register / Login ---

#[tokio::test]
async fn test_register_issues_token() {
    let app = test_app(InMemoryRepo::new());

    let (status, body) = register(&app, "a@b.com", "pw", "admin").await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "account is registered successfully");
    assert_eq!(body["rows_affected"], 1);

    let token = body["access_token"].as_str().expect("access_token string");
    let (status, body) = send(&app, Method::GET, "/protected", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "logged_in_as": "a@b.com", "role": "admin" }));
}

#[tokio::test]
async fn test_register_rejects_missing_or_empty_fields() {
    let app = test_app(InMemoryRepo::new());

    for payload in [
        json!({ "email": "a@b.com", "password": "pw" }),
        json!({ "email": "", "password": "pw", "role": "vet" }),
        json!({ "email": "   ", "password": "pw", "role": "vet" }),
        json!({ "email": "a@b.com", "password": " \t ", "role": "vet" }),
        json!({}),
    ] {
        let (status, body) = send(&app, Method::POST, "/auth/register", None, Some(payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "email, password, and role are required");
    }
}

#[tokio::test]
async fn test_register_rejects_unknown_role_and_duplicates() {
    let repo = InMemoryRepo::new();
    let app = test_app(repo);

    let (status, _) = register(&app, "a@b.com", "pw", "superuser").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = register(&app, "a@b.com", "pw", "buyer").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = register(&app, "a@b.com", "other", "vet").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email is already registered");
}

#[tokio::test]
async fn test_login_flow() {
    let app = test_app(InMemoryRepo::new());
    register(&app, "a@b.com", "pw", "vet").await;

    // Missing password
    let (status, body) = send(&app, Method::POST, "/auth/login", None, Some(json!({ "email": "a@b.com" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email and password are required");

    // Blank password
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "email and password are required");

    // Unknown email
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "nobody@b.com", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "user not found");

    // Wrong password
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "invalid password");

    // Success: the token carries the stored role
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "a@b.com", "password": "pw" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap();
    let (_, body) = send(&app, Method::GET, "/protected", Some(token), None).await;
    assert_eq!(body["role"], "vet");
}

#[tokio::test]
async fn test_malformed_json_body_is_a_validation_error() {
    let app = test_app(InMemoryRepo::new());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let response = tower::util::ServiceExt::oneshot(app, request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- Logout ---

#[tokio::test]
async fn test_logout_revokes_token() {
    let repo = InMemoryRepo::new();
    let app = test_app(repo.clone());
    let token = token_for(Role::Breeder);

    let (status, _) = send(&app, Method::GET, "/dogs", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::POST, "/auth/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "successfully logged out");
    assert_eq!(repo.revoked_count(), 1);

    // Signature and expiry are still fine, the blacklist alone rejects it now.
    for (method, uri) in [(Method::GET, "/dogs"), (Method::GET, "/protected"), (Method::POST, "/auth/logout")] {
        let (status, body) = send(&app, method, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["message"], "token has been revoked. Please log in again.");
        assert_eq!(body["error"], "token_revoked");
    }

    // A fresh token for the same account is unaffected.
    let (status, _) = send(&app, Method::GET, "/dogs", Some(&token_for(Role::Breeder)), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_requires_token_and_reports_store_failure() {
    let repo = InMemoryRepo::new();
    let app = test_app(repo.clone());

    let (status, body) = send(&app, Method::POST, "/auth/logout", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        body["message"],
        "authorization token is missing. Please include it in the header."
    );

    repo.fail_revoke.store(true, Ordering::SeqCst);
    let (status, body) = send(&app, Method::POST, "/auth/logout", Some(&token_for(Role::Vet)), None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "An error occurred during logout");
}

#[tokio::test]
async fn test_purge_drops_only_expired_revocations() {
    use canine_canaan::repository::Repository;

    let repo = InMemoryRepo::new();
    let now = chrono::Utc::now();
    repo.revoke_at("old", now - chrono::Duration::hours(1));
    repo.revoke_at("live", now + chrono::Duration::hours(1));

    assert_eq!(repo.purge_expired_revocations(now).await.unwrap(), 1);
    assert!(!repo.is_revoked_now("old"));
    assert!(repo.is_revoked_now("live"));
}
