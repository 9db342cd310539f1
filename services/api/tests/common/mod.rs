//! Shared helpers for the HTTP integration tests. The router is the same one
//! the binary serves, backed by the in-memory store.

#![allow(dead_code)]

use std::sync::Arc;

use api_lib::adapters::build_auth_provider;
use api_lib::config::Config;
use api_lib::web::{router, AppState};
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use drive_track_core::memory::MemoryStore;
use drive_track_core::ports::DatabaseService;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

pub const PASSWORD: &str = "hunter22";

/// Build a test `Config` for the given platform, storing nothing on disk.
pub fn test_config(platform: &str) -> Config {
    let platform = platform.to_string();
    Config::from_lookup(move |key| match key {
        "STORAGE" => Some("memory".to_string()),
        "CLIENT_PLATFORM" => Some(platform.clone()),
        "JWT_SECRET" => Some("integration-test-secret".to_string()),
        _ => None,
    })
    .expect("test config should load")
}

pub fn build_test_app_for(platform: &str) -> Router {
    let config = Arc::new(test_config(platform));
    let db: Arc<dyn DatabaseService> = Arc::new(MemoryStore::new());
    let auth = build_auth_provider(&config, db.clone()).expect("auth provider should build");
    router(Arc::new(AppState { db, auth, config }))
}

/// The web-platform app: cookie sessions.
pub fn build_test_app() -> Router {
    build_test_app_for("web")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone()
        .oneshot(request)
        .await
        .expect("router should not fail")
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be UTF-8")
}

/// How a request proves who sent it.
#[derive(Clone, Debug)]
pub enum Credential {
    Cookie(String),
    Bearer(String),
}

fn authorize(builder: axum::http::request::Builder, cred: Option<&Credential>) -> axum::http::request::Builder {
    match cred {
        Some(Credential::Cookie(c)) => builder.header(header::COOKIE, c),
        Some(Credential::Bearer(t)) => builder.header(header::AUTHORIZATION, format!("Bearer {}", t)),
        None => builder,
    }
}

pub fn get(uri: &str, cred: Option<&Credential>) -> Request<Body> {
    authorize(Request::builder().method("GET").uri(uri), cred)
        .body(Body::empty())
        .expect("request should build")
}

pub fn delete(uri: &str, cred: Option<&Credential>) -> Request<Body> {
    authorize(Request::builder().method("DELETE").uri(uri), cred)
        .body(Body::empty())
        .expect("request should build")
}

pub fn json(method: &str, uri: &str, body: Value, cred: Option<&Credential>) -> Request<Body> {
    authorize(Request::builder().method(method).uri(uri), cred)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request should build")
}

/// Signs up on the web platform and returns the session cookie.
pub async fn signup(app: &Router, email: &str) -> Credential {
    let response = send(
        app,
        json(
            "POST",
            "/auth/signup",
            serde_json::json!({ "email": email, "password": PASSWORD }),
            None,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("signup should set a session cookie")
        .to_string();
    Credential::Cookie(cookie)
}

/// Logs a manual session and returns the stored record.
pub async fn log_session(
    app: &Router,
    cred: &Credential,
    date: &str,
    minutes: u32,
    miles: f64,
    time_of_day: &str,
) -> Value {
    let response = send(
        app,
        json(
            "POST",
            "/sessions",
            serde_json::json!({
                "date": date,
                "duration_minutes": minutes,
                "miles": miles,
                "weather": "Sunny",
                "road_types": ["Highway", "Arterial"],
                "time_of_day": time_of_day,
            }),
            Some(cred),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["session"].clone()
}
