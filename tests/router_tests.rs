use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use guard_market::{
    AppConfig, AppState, MemoryRepository,
    auth::issue_token,
    create_router,
    models::{NewAccount, Role, User, UserStatus},
    repository::UserRepository,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> (AppState, Router) {
    let state = AppState {
        repo: Arc::new(MemoryRepository::new()),
        config: AppConfig::default(),
    };
    (state.clone(), create_router(state))
}

async fn seed(state: &AppState, email: &str, role: Role, status: UserStatus) -> User {
    state
        .repo
        .create_account(NewAccount {
            name: "Seeded".to_string(),
            email: email.to_string(),
            password_hash: "unused".to_string(),
            phone: None,
            role,
            status,
        })
        .await
        .unwrap()
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    (parts.status, parts.headers, bytes.to_vec())
}

#[tokio::test]
async fn health_is_public_and_tagged_with_request_id() {
    let (_, app) = test_app();
    let (status, headers, body) = call(app, get("/api/health").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let (_, app) = test_app();
    let (status, _, body) = call(app, get("/api/auth/me").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Access token required");
}

#[tokio::test]
async fn bearer_token_authenticates_active_users_only() {
    let (state, app) = test_app();
    let active = seed(&state, "root@example.com", Role::Admin, UserStatus::Active).await;
    let pending = seed(&state, "wait@example.com", Role::Guard, UserStatus::Pending).await;

    let token = issue_token(active.id, active.role, &state.config).unwrap();
    let request = get("/api/admin/stats")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["pending_users"], 1);

    let token = issue_token(pending.id, pending.role, &state.config).unwrap();
    let request = get("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let request = get("/api/auth/me")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_signed_with_another_secret_is_rejected() {
    let (state, app) = test_app();
    let user = seed(&state, "guard@example.com", Role::Guard, UserStatus::Active).await;
    let foreign = AppConfig {
        jwt_secret: "some-other-secret".to_string(),
        ..AppConfig::default()
    };
    let token = issue_token(user.id, user.role, &foreign).unwrap();

    let request = get("/api/wallet")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn local_header_bypass_resolves_existing_user() {
    let (state, app) = test_app();
    let guard = seed(&state, "guard@example.com", Role::Guard, UserStatus::Active).await;

    let request = get("/api/auth/me")
        .header("x-user-id", guard.id.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = call(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["user"]["email"], "guard@example.com");

    let request = get("/api/auth/me")
        .header("x-user-id", uuid::Uuid::new_v4().to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn guard_is_forbidden_from_admin_routes() {
    let (state, app) = test_app();
    let guard = seed(&state, "guard@example.com", Role::Guard, UserStatus::Active).await;

    let request = get("/api/admin/stats")
        .header("x-user-id", guard.id.to_string())
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn job_board_uses_camel_case_pagination() {
    let (_, app) = test_app();
    let (status, _, body) = call(app, get("/api/jobs?page=2&limit=500").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], serde_json::json!([]));
    assert_eq!(json["pagination"]["currentPage"], 2);
    assert_eq!(json["pagination"]["itemsPerPage"], 100);
    assert_eq!(json["pagination"]["totalItems"], 0);
    assert_eq!(json["pagination"]["hasPrevPage"], true);
}

#[tokio::test]
async fn public_and_protected_methods_share_a_path() {
    let (_, app) = test_app();
    let id = uuid::Uuid::new_v4();

    let (status, _, _) = call(app.clone(), get(&format!("/api/jobs/{id}")).body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method("DELETE")
        .uri(format!("/api/jobs/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = call(app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_endpoint_parses_json_body() {
    let (_, app) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"name":"Northgate","email":"ops@northgate.example","password":"hunter22","role":"agency"}"#,
        ))
        .unwrap();
    let (status, _, body) = call(app, request).await;

    assert_eq!(status, StatusCode::CREATED);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"]["user"]["role"], "agency");
    assert_eq!(json["data"]["user"]["status"], "pending");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let (_, app) = test_app();
    let (status, _, body) = call(app, get("/api-docs/openapi.json").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["paths"].get("/api/jobs").is_some());
    assert!(json["paths"].get("/api/wallet/escrow").is_some());
}

#[tokio::test]
async fn huge_page_number_returns_an_empty_page() {
    let (_, app) = test_app();
    let uri = format!("/api/jobs?page={}&limit=100", i64::MAX);
    let (status, _, body) = call(app, get(&uri).body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["data"], serde_json::json!([]));
    assert_eq!(json["pagination"]["currentPage"], guard_market::pagination::MAX_PAGE);
    assert_eq!(json["pagination"]["hasNextPage"], false);
}

fn post_json(uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn assert_failure_envelope(status: StatusCode, body: &[u8]) {
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(body).unwrap();
    assert_eq!(json["success"], false);
    assert!(!json["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_json_body_answers_with_failure_envelope() {
    let (_, app) = test_app();

    let (status, _, body) = call(app.clone(), post_json("/api/auth/register", r#"{"name":"#)).await;
    assert_failure_envelope(status, &body);

    let (status, _, body) = call(app.clone(), post_json("/api/auth/register", r#"{"name":"Sam"}"#)).await;
    assert_failure_envelope(status, &body);

    let request = Request::builder()
        .method("POST")
        .uri("/api/auth/login")
        .body(Body::from(r#"{"email":"a@b.c","password":"x"}"#))
        .unwrap();
    let (status, _, body) = call(app, request).await;
    assert_failure_envelope(status, &body);
}

#[tokio::test]
async fn bad_path_and_query_answer_with_failure_envelope() {
    let (_, app) = test_app();

    let (status, _, body) = call(app.clone(), get("/api/jobs/not-a-uuid").body(Body::empty()).unwrap()).await;
    assert_failure_envelope(status, &body);

    let (status, _, body) = call(app, get("/api/jobs?status=bogus").body(Body::empty()).unwrap()).await;
    assert_failure_envelope(status, &body);
}
