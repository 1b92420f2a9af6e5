//! In-process stand-in for the platform backend, used by the net tests.

use std::sync::{Arc, Mutex, PoisonError};

use axum::Json;
use axum::Router;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub(crate) const VALID_TOKEN: &str = "good-token";
pub(crate) const PASSWORD: &str = "secret";
pub(crate) const IMAGE_BYTES: &[u8] = b"\x89PNG fake image";

#[derive(Clone, Debug)]
pub(crate) struct Hit {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

impl Hit {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone, Default)]
struct Shared {
    hits: Arc<Mutex<Vec<Hit>>>,
}

pub(crate) struct FakeBackend {
    pub base_url: String,
    shared: Shared,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn spawn() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Shared::default();
        let app = Router::new().fallback(handle).with_state(shared.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Self { base_url: format!("http://{addr}"), shared, handle }
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.shared.hits.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last_hit(&self) -> Hit {
        self.hits().pop().expect("backend was not called")
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn ok(body: Value) -> Response {
    reply(StatusCode::OK, body)
}

async fn handle(State(shared): State<Shared>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default().to_vec();
    let authorization = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);
    let path = parts.uri.path().to_owned();
    let method = parts.method.as_str().to_owned();

    shared.hits.lock().unwrap_or_else(PoisonError::into_inner).push(Hit {
        method: method.clone(),
        path: path.clone(),
        query: parts.uri.query().map(str::to_owned),
        authorization: authorization.clone(),
        body: body.clone(),
    });

    let public = matches!(path.as_str(), "/api/login" | "/api/register" | "/api/reset-password");
    let expected = format!("Bearer {VALID_TOKEN}");
    if !public && authorization.as_deref() != Some(expected.as_str()) {
        return reply(StatusCode::UNAUTHORIZED, json!({ "message": "token expired" }));
    }

    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    match (method.as_str(), segments.as_slice()) {
        ("POST", ["api", "login"]) => {
            let sent: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            if sent["password"] == PASSWORD {
                ok(json!({ "token": VALID_TOKEN, "user_id": 7, "message": "login ok" }))
            } else {
                reply(StatusCode::UNAUTHORIZED, json!({ "message": "wrong password" }))
            }
        }
        ("POST", ["api", "register"]) => ok(json!({ "message": "registered" })),
        ("POST", ["api", "reset-password"]) => ok(json!({ "message": "password reset" })),
        ("GET", ["api", "profile"]) => ok(json!({
            "username": "ada",
            "phone": "13800000000",
            "email": "ada@example.test",
            "role": "admin",
            "created_at": "2024-01-01 00:00:00"
        })),
        ("PUT", ["api", "profile"]) => ok(json!({ "message": "profile updated" })),
        ("GET", ["api", "model", "list"]) => ok(json!({
            "models": [
                {
                    "id": 1,
                    "model_name": "er",
                    "dataset": ["seq-cifar10"],
                    "train_time": 3661,
                    "accuracy": { "Class-IL": [80.0, 60.0], "Task-IL": [90.0, 80.0] }
                }
            ]
        })),
        ("DELETE", ["api", "model", "delete", "404"]) => {
            reply(StatusCode::NOT_FOUND, json!({ "message": "model not found" }))
        }
        ("DELETE", ["api", "model", "delete", _]) => ok(json!({ "message": "model deleted" })),
        ("POST", ["api", "model", "predict"]) => ok(json!({ "result": "cat", "time_taken": 0.12 })),
        ("GET", ["api", "task", "list"]) => ok(json!({
            "tasks": [
                { "id": 1, "model_name": "er", "dataset": "seq-cifar10", "status": "running" },
                { "id": 2, "model_name": "der", "dataset": "seq-cifar100", "status": "success" }
            ]
        })),
        ("GET", ["api", "task", "info", "1"]) => ok(json!({ "training_logs": "epoch 1/200", "error_logs": "" })),
        ("GET", ["api", "task", "info", "2"]) => {
            ok(json!({ "training_logs": "epoch 200/200\nTraining completed", "error_logs": null }))
        }
        ("GET", ["api", "task", "info", _]) => ok(json!({ "training_logs": "", "error_logs": "boom" })),
        ("POST", ["api", "task", "train"]) => ok(json!({ "task_id": 11, "message": "started" })),
        ("DELETE", ["api", "task", "stop", _]) => ok(json!({ "message": "task stopped" })),
        ("GET", ["api", "resource", "list", scope]) => {
            let all = json!([
                { "id": 1, "name": "cat.png", "type": "image", "description": "a cat" },
                { "id": 2, "name": "cifar.zip", "type": "dataset" },
                { "id": 3, "name": "notes.txt", "type": "others" }
            ]);
            let resources: Vec<Value> = all
                .as_array()
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|r| *scope == "all" || r["type"] == *scope)
                .collect();
            ok(json!({ "resources": resources }))
        }
        ("GET", ["api", "resource", "dashboard"]) => ok(json!({
            "resources": {
                "image": { "file_count": 1, "total_size": 0.5 },
                "dataset": { "file_count": 1, "total_size": 170 },
                "others": { "file_count": 1, "total_size": 0.1 }
            }
        })),
        ("GET", ["api", "resource", "image", _]) => (StatusCode::OK, IMAGE_BYTES.to_vec()).into_response(),
        ("POST", ["api", "resource", "upload"]) => ok(json!({ "message": "uploaded" })),
        ("DELETE", ["api", "resource", "delete", _]) => ok(json!({ "message": "resource deleted" })),
        ("GET", ["api", "broken"]) => (StatusCode::OK, "not json").into_response(),
        _ => reply(StatusCode::NOT_FOUND, json!({ "message": "no such route" })),
    }
}

/// Client wired to `backend` with an in-memory session store, starting on
/// the dashboard.
pub(crate) fn client_for(
    backend: &FakeBackend,
    token: Option<&str>,
) -> (crate::ApiClient, Arc<crate::MemorySessionStore>, crate::Navigator) {
    let store = Arc::new(match token {
        Some(token) => crate::MemorySessionStore::with_session(crate::Session {
            token: token.to_owned(),
            user_id: records::Id::from(7),
        }),
        None => crate::MemorySessionStore::default(),
    });
    let navigator = crate::Navigator::new(crate::Route::Dashboard);
    let config = crate::ConsoleConfig::default().with_base_url(&backend.base_url);
    let dispatcher = crate::Dispatcher::new(&config, store.clone(), navigator.clone()).unwrap();
    (crate::ApiClient::new(dispatcher), store, navigator)
}
