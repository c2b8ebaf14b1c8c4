//! Shared harness: a router over a throwaway database and upload directory.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use clap::Parser;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wardline::app::{self, AppState};
use wardline::config::Config;

pub const BOUNDARY: &str = "wardline-test-boundary";

pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Response {
    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: AppState,
    pub app: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_args(&[])
    }

    /// Like [`TestApp::new`], with extra command-line flags.
    pub fn with_args(extra: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let database = dir.path().join("hospital.db");
        let uploads = dir.path().join("uploads");
        let mut args = vec![
            "wardline",
            "--database",
            database.to_str().unwrap(),
            "--upload-dir",
            uploads.to_str().unwrap(),
            "--bcrypt-cost",
            "4",
        ];
        args.extend_from_slice(extra);
        let config = Config::parse_from(args);

        let state = AppState::from_config(&config);
        state.db.init_db(config.bcrypt_cost).unwrap();
        let app = app::router(state.clone());
        Self { dir, state, app }
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        Response {
            status,
            headers,
            body,
        }
    }

    /// Files currently in the upload directory.
    pub fn uploaded_files(&self) -> Vec<String> {
        match std::fs::read_dir(self.state.uploads.dir()) {
            Ok(entries) => entries
                .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::GET, uri, cookie, None).await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>, body: Value) -> Response {
        self.send(Method::POST, uri, cookie, Some(body)).await
    }

    pub async fn put(&self, uri: &str, cookie: Option<&str>, body: Value) -> Response {
        self.send(Method::PUT, uri, cookie, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response {
        self.send(Method::DELETE, uri, cookie, None).await
    }

    /// Logs in and returns the `Cookie` header value for the new session.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post(
                "/api/auth/login",
                None,
                json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.body);
        format!("session_id={}", response.body["sessionId"].as_str().unwrap())
    }

    pub async fn admin(&self) -> String {
        self.login("admin@hospital.com", "admin123").await
    }

    /// Creates a staff member through the admin API and returns its id.
    pub async fn create_staff(&self, admin: &str, name: &str, role: &str, email: &str) -> i64 {
        let response = self
            .post(
                "/api/admin/staff",
                Some(admin),
                json!({ "name": name, "role": role, "email": email, "password": "x" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        response.body["staff"]["id"].as_i64().unwrap()
    }

    /// Registers a patient and returns its id with a signed-in cookie.
    pub async fn register_patient(&self, name: &str, email: &str) -> (i64, String) {
        let response = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": "secret", "role": "patient" }),
            )
            .await;
        assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        let id = response.body["user"]["id"].as_i64().unwrap();
        let cookie = format!("session_id={}", response.body["sessionId"].as_str().unwrap());
        (id, cookie)
    }
}

/// Encodes a multipart form. Each part is `(name, file name, contents)`.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, file_name, contents) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(contents);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(uri: &str, cookie: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}
