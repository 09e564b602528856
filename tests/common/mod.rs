#![allow(dead_code)]

use axum::extract::connect_info::MockConnectInfo;
use axum::http::{header, HeaderName, HeaderValue};
use axum_test::TestServer;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use taskflow::api::{self, AppState};
use taskflow::auth::AuthConfig;
use taskflow::clock::ManualClock;
use taskflow::db::init_pool;
use tempfile::TempDir;

pub const TEST_SECRET: &[u8] = b"integration-test-secret";
pub const PASSWORD: &str = "hunter22";

pub struct TestApp {
    pub server: TestServer,
    pub clock: Arc<ManualClock>,
    pub state: AppState,
    // Dropping this removes the database file.
    _dir: TempDir,
}

pub fn spawn_app() -> TestApp {
    spawn_app_with(AuthConfig::new(TEST_SECRET, false))
}

pub fn spawn_app_with(auth: AuthConfig) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let database_url = dir.path().join("taskflow.db");
    let pool = init_pool(database_url.to_str().unwrap()).expect("Failed to create pool");

    let clock = Arc::new(ManualClock::default());
    let state = AppState::new(pool, auth, clock.clone());
    let server = TestServer::new(api::create_router(state.clone())).expect("Failed to start test server");

    TestApp {
        server,
        clock,
        state,
        _dir: dir,
    }
}

/// A server over the same state whose requests arrive from `ip`.
pub fn server_from(app: &TestApp, ip: &str) -> TestServer {
    let peer: SocketAddr = format!("{ip}:40000").parse().unwrap();
    TestServer::new(api::create_router(app.state.clone()).layer(MockConnectInfo(peer)))
        .expect("Failed to start test server")
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

/// Signs up `username` and returns the token from the response body.
pub async fn signup(app: &TestApp, username: &str) -> String {
    let response = app
        .server
        .post("/auth/signup")
        .json(&json!({
            "email": format!("{username}@example.com"),
            "username": username,
            "password": PASSWORD,
        }))
        .await;
    response.assert_status(axum::http::StatusCode::CREATED);

    let body: Value = response.json();
    body["token"].as_str().unwrap().to_string()
}

pub async fn get(app: &TestApp, token: &str, path: &str) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.get(path).add_header(name, value).await
}

pub async fn post(app: &TestApp, token: &str, path: &str, body: Value) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.post(path).add_header(name, value).json(&body).await
}

pub async fn put(app: &TestApp, token: &str, path: &str, body: Value) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.put(path).add_header(name, value).json(&body).await
}

pub async fn patch(app: &TestApp, token: &str, path: &str) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.patch(path).add_header(name, value).await
}

pub async fn delete(app: &TestApp, token: &str, path: &str) -> axum_test::TestResponse {
    let (name, value) = bearer(token);
    app.server.delete(path).add_header(name, value).await
}
