/// Router-level tests: requests go through the full middleware stack against an
/// in-memory database, in-memory sessions and a temporary disk object store.
use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use contest_backend::{
    config::ServerConfig,
    context::AppContext,
    db,
    error::ApiResult,
    probe::VideoProber,
    server::build_router,
    storage::DiskStorage,
    token::MemorySessionStore,
};
use serde_json::{json, Value};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "contest-test-boundary";

struct FixedProber;

#[async_trait]
impl VideoProber for FixedProber {
    async fn duration_ms(&self, _source: &str) -> ApiResult<i64> {
        Ok(1_500)
    }
}

struct TestApp {
    router: Router,
    _dir: tempfile::TempDir,
}

async fn app() -> TestApp {
    app_with(|_| {}).await
}

async fn app_with(configure: impl FnOnce(&mut ServerConfig)) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let objects = dir.path().join("objects");
    let mut config = ServerConfig::for_tests(dir.path().join("unused.sqlite"), objects.clone());
    configure(&mut config);

    let pool = db::create_memory_pool().await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let storage = Arc::new(DiskStorage::new(objects, config.service.public_url.clone()));
    let ctx = AppContext::from_parts(
        config,
        pool,
        Arc::new(MemorySessionStore::new()),
        storage,
        Arc::new(FixedProber),
    );

    TestApp {
        router: build_router(ctx),
        _dir: dir,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, token: Option<&str>, parts: &[Part]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, file_name, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, file_name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder().method(Method::POST).uri(uri).header(
        header::CONTENT_TYPE,
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

fn png_bytes() -> Vec<u8> {
    let img = image::ImageBuffer::from_pixel(2, 2, image::Rgb([10u8, 200, 10]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0, 0, 0, 0x18];
    bytes.extend_from_slice(b"ftypmp42");
    bytes.extend_from_slice(&[0; 32]);
    bytes
}

async fn create_admin(app: &TestApp, username: &str) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/admin/create",
            None,
            json!({"name": "Alice", "username": username, "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
}

/// Returns (access, refresh)
async fn login(app: &TestApp, username: &str) -> (String, String) {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": username, "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    (
        body["data"]["accessToken"].as_str().unwrap().to_string(),
        body["data"]["refreshToken"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_login_logout_revokes_access_token() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;

    let (status, body) = send(&app, get("/api/v1/admin/contestant/list", Some(&access))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], true);

    let (status, _) = send(&app, get("/api/v1/admin/logout", Some(&access))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, get("/api/v1/admin/contestant/list", Some(&access))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
    assert!(body["errorMsg"].is_string());
}

#[tokio::test]
async fn test_login_rejects_bad_credentials() {
    let app = app().await;
    create_admin(&app, "alice").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": "alice", "password": "wrongpassword"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errorMsg"], "invalid username or password");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": "nobody", "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_username_conflicts() {
    let app = app().await;
    create_admin(&app, "alice").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/create",
            None,
            json!({"name": "Other", "username": "alice", "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorMsg"], "Username already exist");
}

#[tokio::test]
async fn test_refresh_token_is_single_use() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (_, refresh) = login(&app, "alice").await;

    let request = || {
        json_request(
            Method::POST,
            "/api/v1/admin/refresh-token",
            None,
            json!({"refreshToken": refresh}),
        )
    };

    let (status, body) = send(&app, request()).await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["data"]["accessToken"].as_str().unwrap().to_string();
    assert!(body["data"]["refreshToken"].is_string());

    let (status, _) = send(&app, request()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/v1/admin/contestant/list", Some(&new_access))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validation_failure_leaves_store_untouched() {
    let app = app().await;

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/create",
            None,
            json!({"name": "Al", "username": "bob_1", "password": "short"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["validationError"]["name"].is_array());
    assert!(body["validationError"]["username"].is_array());
    assert!(body["validationError"]["password"].is_array());

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": "bob1", "password": "password123"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v1/contest/uploadVideo",
            None,
            &[
                Part::Text("name", "Budi Santoso"),
                Part::Text("email", "not-an-email"),
                Part::Text("school", "SMA Negeri 1 Jakarta"),
                Part::Text("title", "Lagu"),
                Part::Text("phone", "081234567890"),
                Part::File("video", "clip.mov", b"not a video"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["validationError"]["email"].is_array());
    assert!(body["validationError"]["video"].is_array());

    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;
    let (_, body) = send(&app, get("/api/v1/admin/contestant/list?limit=0", Some(&access))).await;
    assert_eq!(body["data"]["total"], 0);
}

#[tokio::test]
async fn test_change_password_requires_matching_verify() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;

    let (status, body) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/admin/profile/change-password",
            Some(&access),
            json!({"password": "newpassword1", "verify": "newpassword2"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        body["validationError"]["verify"][0],
        "Password and Verify Password not equal"
    );

    let (status, _) = send(
        &app,
        json_request(
            Method::PUT,
            "/api/v1/admin/profile/change-password",
            Some(&access),
            json!({"password": "newpassword1", "verify": "newpassword1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": "alice", "password": "newpassword1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_contestant_submission_and_listing() {
    let app = app().await;
    let video = mp4_bytes();

    for (name, school) in [("Budi Santoso", "SMA Negeri 1 Jakarta"), ("Citra Lestari", "SMA Negeri 2 Bandung")] {
        let (status, body) = send(
            &app,
            multipart_request(
                "/api/v1/contest/uploadVideo",
                None,
                &[
                    Part::Text("name", name),
                    Part::Text("email", "student@example.com"),
                    Part::Text("school", school),
                    Part::Text("title", "Lagu Daerah"),
                    Part::Text("phone", "081234567890"),
                    Part::File("video", "clip.mp4", &video),
                ],
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert!(!body["data"]["video"]["id"].as_str().unwrap().is_empty());
    }

    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;

    let (status, body) = send(
        &app,
        get("/api/v1/admin/contestant/list?sort=-1&sort_by=name&limit=1&page=1", Some(&access)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 2);
    assert_eq!(page["sort_by"], "name");
    assert_eq!(page["sort"], "-1");
    assert_eq!(page["data"].as_array().unwrap().len(), 1);
    assert_eq!(page["data"][0]["name"], "Citra Lestari");

    let (_, body) = send(
        &app,
        get("/api/v1/admin/contestant/list?sort_by=password&limit=-3&page=0", Some(&access)),
    )
    .await;
    assert_eq!(body["data"]["sort_by"], "updated_at");
    assert_eq!(body["data"]["limit"], 1);
    assert_eq!(body["data"]["page"], 1);

    let id = page["data"][0]["id"].as_str().unwrap().to_string();
    let (status, body) = send(&app, get(&format!("/api/v1/contest/video/{}", id), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Citra Lestari");
}

#[tokio::test]
async fn test_unknown_video_is_not_found() {
    let app = app().await;

    let (status, body) = send(&app, get("/api/v1/contest/video/not-a-uuid", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorMsg"], "Data Not Found");

    let (status, _) = send(
        &app,
        get(&format!("/api/v1/contest/video/{}", uuid::Uuid::new_v4()), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_gallery_upload_and_webp_asset() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;
    let png = png_bytes();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v1/admin/manage/gallery",
            Some(&access),
            &[
                Part::Text("title", "Opening"),
                Part::Text("description", "Day one"),
                Part::File("content", "photo.png", &png),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["uploader"]["username"], "alice");
    let object_id = body["data"]["content"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, get("/api/v1/gallery", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = app
        .router
        .clone()
        .oneshot(get(&format!("/api/v1/assets/{}", object_id), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "public, max-age=31536000"
    );
}

#[tokio::test]
async fn test_carousel_upload_rejects_wrong_file_type() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;
    let png = png_bytes();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v1/admin/manage/carousel",
            Some(&access),
            &[
                Part::Text("title", "In"),
                Part::File("content", "photo.png", &png),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["validationError"]["title"].is_array());
    assert!(body["validationError"]["content"].is_array());

    let (_, body) = send(&app, get("/api/v1/carousel", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_carousel_upload() {
    let app = app().await;
    create_admin(&app, "alice").await;
    let (access, _) = login(&app, "alice").await;
    let video = mp4_bytes();

    let (status, body) = send(
        &app,
        multipart_request(
            "/api/v1/admin/manage/carousel",
            Some(&access),
            &[
                Part::Text("title", "Intro"),
                Part::Text("description", "Welcome"),
                Part::File("content", "intro.mp4", &video),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["content"]["title"], "Intro");

    let (_, body) = send(&app, get("/api/v1/carousel?sort=-1", None)).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = app().await;

    let (status, body) = send(&app, get("/api/v1/admin/logout", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);

    let (status, _) = send(&app, get("/api/v1/admin/contestant/list", Some("garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_and_fallback() {
    let app = app().await;

    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, get("/api/v1/nope", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], false);
}

#[tokio::test]
async fn test_credential_rate_limit_is_per_client() {
    let app = app_with(|config| {
        config.rate_limit.enabled = true;
        config.rate_limit.credential_rps = 1;
        config.rate_limit.burst_size = 5;
    })
    .await;

    let login_from = |peer: &str| {
        let mut request = json_request(
            Method::POST,
            "/api/v1/admin/login",
            None,
            json!({"username": "nobody", "password": "password123"}),
        );
        let addr: SocketAddr = peer.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    let (status, _) = send(&app, login_from("192.0.2.1:4000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, login_from("192.0.2.1:4001")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    let (status, _) = send(&app, login_from("192.0.2.2:4000")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
