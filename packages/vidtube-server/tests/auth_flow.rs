//! End-to-end account flows driven through the router.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use vidtube_server::{
    auth::{TokenConfig, TokenIssuer},
    build_router,
    config::{MediaHostConfig, ServerConfig, StoreBackend},
    media::{MediaError, MediaHost, StoredMedia},
    state::ServerState,
    storage::{MemoryUserStore, UserStore},
};

const BOUNDARY: &str = "vidtube-test-boundary";
const ACCESS_SECRET: &str = "access-secret-for-tests-0123456789abcdef";
const REFRESH_SECRET: &str = "refresh-secret-for-tests-0123456789abcdef";

/// Hands back a URL built from the file name; names containing "broken" fail
struct StubMediaHost;

#[async_trait]
impl MediaHost for StubMediaHost {
    async fn upload(&self, local_path: &Path) -> Result<StoredMedia, MediaError> {
        let name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if name.contains("broken") {
            return Err(MediaError::Rejected("stub refused upload".to_string()));
        }
        Ok(StoredMedia {
            url: format!("https://media.test/{}", name),
        })
    }
}

struct TestApp {
    router: Router,
    store: MemoryUserStore,
    upload_dir: TempDir,
}

fn test_app() -> TestApp {
    let upload_dir = TempDir::new().unwrap();
    let config = ServerConfig {
        port: 0,
        bind_addr: "127.0.0.1".to_string(),
        store_backend: StoreBackend::Memory,
        database_url: None,
        access_token_secret: ACCESS_SECRET.to_string(),
        refresh_token_secret: REFRESH_SECRET.to_string(),
        access_token_ttl_seconds: 900,
        refresh_token_ttl_seconds: 864_000,
        cookie_secure: false,
        upload_directory: upload_dir.path().to_path_buf(),
        max_upload_size: 1024 * 1024,
        max_body_size: 16 * 1024,
        media: Some(MediaHostConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            cloud_name: "test".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        }),
    };

    let store = MemoryUserStore::new();
    let state = Arc::new(ServerState::new(
        config,
        Arc::new(store.clone()),
        Arc::new(StubMediaHost),
    ));

    TestApp {
        router: build_router(state),
        store,
        upload_dir,
    }
}

fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str)]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, filename) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"\x89PNG fake image bytes");
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    fields: &[(&str, &str)],
    files: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={BOUNDARY}"),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(multipart_body(fields, files)))
        .unwrap()
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get_request(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Vec<String>, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookies = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .collect();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookies, body)
}

async fn register(app: &TestApp, username: &str, email: &str) -> (StatusCode, Value) {
    let request = multipart_request(
        Method::POST,
        "/api/v1/users/register",
        None,
        &[
            ("username", username),
            ("email", email),
            ("fullName", "Alice Example"),
            ("password", "pw123"),
        ],
        &[("avatar", "avatar.png")],
    );
    let (status, _, body) = send(app, request).await;
    (status, body)
}

async fn login(app: &TestApp, username: &str, password: &str) -> (StatusCode, Vec<String>, Value) {
    send(
        app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "username": username, "password": password }),
        ),
    )
    .await
}

async fn refresh_with_body(app: &TestApp, token: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/users/refresh-token",
            None,
            json!({ "refreshToken": token }),
        ),
    )
    .await;
    (status, body)
}

fn tokens(body: &Value) -> (String, String) {
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

fn upload_dir_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(app.upload_dir.path())
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

#[tokio::test]
async fn test_register_returns_sanitized_user() {
    let app = test_app();

    let (status, body) = register(&app, "alice", "alice@x.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["statusCode"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["username"], "alice");
    assert!(body["data"]["avatar"]
        .as_str()
        .unwrap()
        .starts_with("https://media.test/"));
    assert_eq!(body["data"]["coverImage"], "");
    assert!(body["data"].get("password").is_none());
    assert!(body["data"].get("passwordHash").is_none());
    assert!(body["data"].get("refreshToken").is_none());

    assert_eq!(app.store.user_count(), 1);
    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_register_normalizes_identifiers() {
    let app = test_app();

    let (status, body) = register(&app, "  Alice ", "Alice@X.com").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["username"], "alice");
    assert_eq!(body["data"]["email"], "alice@x.com");

    let (status, _) = register(&app, "ALICE", "other@x.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_register_rejections() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    // Duplicate email
    let (status, body) = register(&app, "alice2", "alice@x.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "User with email or username already exists");

    // Missing avatar
    let request = multipart_request(
        Method::POST,
        "/api/v1/users/register",
        None,
        &[
            ("username", "bob"),
            ("email", "bob@x.com"),
            ("fullName", "Bob"),
            ("password", "pw123"),
        ],
        &[],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Avatar file is required");

    // Blank field, with the uploaded file cleaned up afterwards
    let request = multipart_request(
        Method::POST,
        "/api/v1/users/register",
        None,
        &[
            ("username", "bob"),
            ("email", "bob@x.com"),
            ("fullName", "   "),
            ("password", "pw123"),
        ],
        &[("avatar", "avatar.png")],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "All fields are required");
    assert!(upload_dir_is_empty(&app));

    assert_eq!(app.store.user_count(), 1);
}

#[tokio::test]
async fn test_register_avatar_upload_failure() {
    let app = test_app();

    let request = multipart_request(
        Method::POST,
        "/api/v1/users/register",
        None,
        &[
            ("username", "carol"),
            ("email", "carol@x.com"),
            ("fullName", "Carol"),
            ("password", "pw123"),
        ],
        &[("avatar", "broken.png")],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["statusCode"], 500);
    assert_eq!(app.store.user_count(), 0);
    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_register_truncated_text_field() {
    let app = test_app();

    // A complete avatar part followed by a text field cut off before its boundary
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"avatar.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"\x89PNG fake image bytes\r\n");
    body.extend_from_slice(
        format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"username\"\r\n\r\nali")
            .as_bytes(),
    );

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/register")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Failed to read field"));
    assert_eq!(app.store.user_count(), 0);
    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_register_requires_multipart_body() {
    let app = test_app();

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/register",
            None,
            json!({ "username": "alice" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["statusCode"], 400);
    assert_eq!(app.store.user_count(), 0);
}

#[tokio::test]
async fn test_login_sets_cookies_and_rejects_bad_credentials() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    let (status, _, body) = login(&app, "alice", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid user credentials");
    assert_eq!(body["success"], false);

    let (status, _, unknown) = login(&app, "nobody", "pw123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown["message"], body["message"]);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "password": "pw123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username or email is required");

    let (status, cookies, body) = login(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["username"], "alice");
    assert!(body["data"]["user"].get("refreshToken").is_none());

    let (access, refresh) = tokens(&body);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("accessToken={access}")) && c.contains("HttpOnly")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("refreshToken={refresh}")) && c.contains("HttpOnly")));
}

#[tokio::test]
async fn test_login_by_email() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/login",
            None,
            json!({ "email": "ALICE@x.com", "password": "pw123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["email"], "alice@x.com");
}

#[tokio::test]
async fn test_malformed_json_uses_envelope() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (_, refresh) = tokens(&body);

    let (status, body) = refresh_with_body(&app, &refresh).await;
    assert_eq!(status, StatusCode::OK);
    let (_, rotated) = tokens(&body);
    assert_ne!(rotated, refresh);

    let (status, body) = refresh_with_body(&app, &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Refresh token reuse or stale token");

    // Reuse ends the session; the rotated token no longer works either
    let (status, _) = refresh_with_body(&app, &rotated).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (_, fresh) = tokens(&body);
    let (status, _) = refresh_with_body(&app, &fresh).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_from_cookie() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (_, refresh) = tokens(&body);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/refresh-token")
        .header(header::COOKIE, format!("refreshToken={refresh}"))
        .body(Body::empty())
        .unwrap();
    let (status, cookies, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    let (_, rotated) = tokens(&body);
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("refreshToken={rotated}"))));
}

#[tokio::test]
async fn test_refresh_without_token() {
    let app = test_app();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/refresh-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized request");

    let (status, _) = refresh_with_body(&app, "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_concurrent_refresh_has_one_winner() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (_, refresh) = tokens(&body);

    let (first, second) = tokio::join!(
        refresh_with_body(&app, &refresh),
        refresh_with_body(&app, &refresh)
    );

    let mut statuses = vec![first.0.as_u16(), second.0.as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 401]);
}

#[tokio::test]
async fn test_logout_kills_refresh_token() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, refresh) = tokens(&body);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/users/logout")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let (status, cookies, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=")));

    let (status, _) = refresh_with_body(&app, &refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_login_invalidates_first_refresh_token() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, first) = login(&app, "alice", "pw123").await;
    let (_, _, _second) = login(&app, "alice", "pw123").await;

    let (_, first_refresh) = tokens(&first);
    let (status, _) = refresh_with_body(&app, &first_refresh).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guard_rejects_missing_and_invalid_tokens() {
    let app = test_app();

    let (status, _, body) = send(&app, get_request("/api/v1/users/current-user", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Unauthorized request");

    let (status, _, body) = send(
        &app,
        get_request("/api/v1/users/current-user", Some("not-a-jwt")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid access token");
}

#[tokio::test]
async fn test_guard_rejects_expired_access_token() {
    let app = test_app();
    let (_, body) = register(&app, "alice", "alice@x.com").await;
    let id = body["data"]["id"].as_str().unwrap().parse().unwrap();
    let user = app.store.get_user(id).await.unwrap();

    let issuer = TokenIssuer::new(TokenConfig {
        access_secret: ACCESS_SECRET.to_string(),
        refresh_secret: REFRESH_SECRET.to_string(),
        access_ttl: Duration::seconds(-30),
        refresh_ttl: Duration::days(1),
    });
    let expired = issuer.issue_access(&user).unwrap();

    let (status, _, body) = send(
        &app,
        get_request("/api/v1/users/current-user", Some(&expired)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid access token");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_refresh_token_is_not_an_access_token() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (_, refresh) = tokens(&body);

    let (status, _, _) = send(
        &app,
        get_request("/api/v1/users/current-user", Some(&refresh)),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_current_user_via_cookie_and_header() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, _) = tokens(&body);

    let (status, _, body) = send(
        &app,
        get_request("/api/v1/users/current-user", Some(&access)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "alice");

    let request = Request::builder()
        .uri("/api/v1/users/current-user")
        .header(header::COOKIE, format!("accessToken={access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, _) = tokens(&body);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&access),
            json!({ "oldPassword": "wrong", "newPassword": "pw456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid old password");

    let (status, _, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/users/change-password",
            Some(&access),
            json!({ "oldPassword": "pw123", "newPassword": "pw456" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = login(&app, "alice", "pw123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Issued access tokens stay valid until they expire
    let (status, _, _) = send(
        &app,
        get_request("/api/v1/users/current-user", Some(&access)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = login(&app, "alice", "pw456").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_account() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    register(&app, "bob", "bob@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, _) = tokens(&body);

    let (status, _, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/v1/users/update-account",
            Some(&access),
            json!({ "fullName": "Alice Liddell", "email": "Liddell@X.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["fullName"], "Alice Liddell");
    assert_eq!(body["data"]["email"], "liddell@x.com");

    let (status, _, body) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/v1/users/update-account",
            Some(&access),
            json!({ "fullName": "Alice", "email": "bob@x.com" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Email is already in use");

    let (status, _, _) = send(
        &app,
        json_request(
            Method::PATCH,
            "/api/v1/users/update-account",
            Some(&access),
            json!({ "fullName": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replace_images() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, _) = tokens(&body);

    let request = multipart_request(
        Method::PATCH,
        "/api/v1/users/cover-image",
        Some(&access),
        &[],
        &[("coverImage", "cover.png")],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["coverImage"]
        .as_str()
        .unwrap()
        .ends_with("cover.png"));

    let request = multipart_request(
        Method::PATCH,
        "/api/v1/users/avatar",
        Some(&access),
        &[],
        &[("avatar", "new-face.png")],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["avatar"]
        .as_str()
        .unwrap()
        .ends_with("new-face.png"));

    let request = multipart_request(
        Method::PATCH,
        "/api/v1/users/avatar",
        Some(&access),
        &[],
        &[],
    );
    let (status, _, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Avatar file is missing");

    let request = multipart_request(
        Method::PATCH,
        "/api/v1/users/avatar",
        Some(&access),
        &[],
        &[("avatar", "broken.png")],
    );
    let (status, _, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    assert!(upload_dir_is_empty(&app));
}

#[tokio::test]
async fn test_watch_history_starts_empty() {
    let app = test_app();
    register(&app, "alice", "alice@x.com").await;
    let (_, _, body) = login(&app, "alice", "pw123").await;
    let (access, _) = tokens(&body);

    let (status, _, body) = send(&app, get_request("/api/v1/users/history", Some(&access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_health() {
    let app = test_app();

    let (status, _, body) = send(&app, get_request("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_store_holds_no_plaintext_password() {
    let app = test_app();
    let (_, body) = register(&app, "alice", "alice@x.com").await;

    let id = body["data"]["id"].as_str().unwrap().parse().unwrap();
    let user = app.store.get_user(id).await.unwrap();
    assert_ne!(user.password_hash, "pw123");
}
