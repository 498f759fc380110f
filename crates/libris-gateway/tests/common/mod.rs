#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, header};
use axum::response::Response;
use libris_core::access::{AccessControl, Role};
use libris_core::config::AuthConfig;
use libris_gateway::{AuthState, User, UserStore, router};

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub app: Router,
    pub auth: Arc<AuthState>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AuthConfig::builder().secret_key("integration-test-secret").build())
    }

    pub fn with_config(config: AuthConfig) -> Self {
        let auth = Arc::new(AuthState::new(
            config,
            AccessControl::standard(),
            UserStore::open_temporary().expect("store"),
        ));
        Self {
            app: router(Arc::clone(&auth), false),
            auth,
        }
    }

    pub fn seed(&self, username: &str, role: Role) -> User {
        let user = User::new(username, format!("{username}@example.org"), PASSWORD, role)
            .expect("user");
        self.auth.users.create(user).expect("create")
    }

    pub fn token_for(&self, user: &User) -> String {
        self.auth
            .tokens
            .issue_for_user(&user.username, user.role, Some(user.id))
            .expect("token")
            .token
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        tower::ServiceExt::oneshot(self.app.clone(), request)
            .await
            .expect("response")
    }
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

pub fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().expect("header"),
    );
    request
}

pub fn with_cookie(mut request: Request<Body>, cookie: &str) -> Request<Body> {
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().expect("header"));
    request
}

pub async fn read_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}
