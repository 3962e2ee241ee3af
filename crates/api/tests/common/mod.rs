#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use todo_api::auth::jwt::{generate_access_token, JwtConfig};
use todo_api::config::ServerConfig;
use todo_api::router::build_app_router;
use todo_api::state::AppState;
use todo_core::types::DbId;
use todo_undo::gateway::memory::MemoryGateway;
use todo_undo::store::MemoryTokenStore;
use todo_undo::UndoConfig;

pub const ALICE: DbId = 1;
pub const BOB: DbId = 2;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        redis_url: None,
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        undo: UndoConfig::default(),
    }
}

/// An application wired to in-memory stores. The gateway handle is kept so
/// tests can change data behind the API's back.
pub struct TestApp {
    pub router: Router,
    pub gateway: Arc<MemoryGateway>,
    config: ServerConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let gateway = Arc::new(MemoryGateway::new());
        let state = AppState::new(
            gateway.clone(),
            Arc::new(MemoryTokenStore::new()),
            config.clone(),
        );
        Self {
            router: build_app_router(state),
            gateway,
            config,
        }
    }

    pub fn bearer(&self, user_id: DbId) -> String {
        let token = generate_access_token(user_id, &self.config.jwt).unwrap();
        format!("Bearer {token}")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        user_id: Option<DbId>,
        body: Option<serde_json::Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("authorization", self.bearer(user_id));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send as `user_id` and return status plus parsed body.
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        user_id: DbId,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let response = self.send(method, uri, Some(user_id), body).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    pub async fn undo(&self, user_id: DbId, token: &str) -> (StatusCode, serde_json::Value) {
        self.call(Method::POST, &format!("/api/v1/undo/{token}"), user_id, None)
            .await
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// The undo token carried in a success envelope.
pub fn undo_token(body: &serde_json::Value) -> String {
    body["meta"]["undoToken"]
        .as_str()
        .expect("response should carry an undo token")
        .to_string()
}
