#![allow(dead_code)]

use axum::{
    extract::{OriginalUri, Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use oa_session::{
    ChannelNotifier, ClientConfig, MemoryStorage, OaClient, Storage, StorageError, UiEvent,
};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "pw";

/// Canned replies, one per endpoint. `protected` is consumed in order by any
/// path without a dedicated route, falling back to `{code:200,data:[]}`.
#[derive(Clone)]
pub struct Script {
    pub login: (u16, Value),
    pub refresh: (u16, Value),
    pub perms: (u16, Value),
    pub user_info: (u16, Value),
    pub validate: (u16, Value),
    pub logout: (u16, Value),
    pub users: (u16, Value),
    pub protected: VecDeque<(u16, Value)>,
    pub login_delay: Duration,
    pub refresh_delay: Duration,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            login: (200, admin_login_body()),
            refresh: (200, json!({"code": 200, "data": {"token": "t2", "refreshToken": "r2"}})),
            perms: (200, json!(["user:read", "role:read"])),
            user_info: (
                200,
                json!({"code": 200, "data": {"username": "admin", "role": "ADMIN", "email": "admin@oa.local", "password": null}}),
            ),
            validate: (200, json!({"code": 200, "data": true})),
            logout: (200, json!({"code": 200, "data": "Logout successful"})),
            users: (
                200,
                json!({"code": 200, "data": [{"username": "admin"}, {"username": "kim"}]}),
            ),
            protected: VecDeque::new(),
            login_delay: Duration::ZERO,
            refresh_delay: Duration::ZERO,
        }
    }
}

/// What the backend saw
#[derive(Default, Debug, Clone)]
pub struct Recorded {
    pub login_calls: usize,
    pub logout_calls: usize,
    pub refresh_calls: usize,
    pub refresh_queries: Vec<String>,
    pub refresh_bodies: Vec<Value>,
    pub login_bodies: Vec<Value>,
    pub added_users: Vec<HashMap<String, String>>,
    /// (path below /api, Authorization header) for every request
    pub requests: Vec<(String, Option<String>)>,
}

impl Recorded {
    pub fn auth_for(&self, path: &str) -> Vec<Option<String>> {
        self.requests
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, a)| a.clone())
            .collect()
    }
}

struct MockState {
    script: Script,
    recorded: Recorded,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockBackend {
    pub base_url: String,
    state: Shared,
}

impl MockBackend {
    pub fn recorded(&self) -> Recorded {
        self.state.lock().unwrap().recorded.clone()
    }

    pub fn set_script(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.state.lock().unwrap().script);
    }
}

pub async fn spawn_backend(script: Script) -> MockBackend {
    let state: Shared = Arc::new(Mutex::new(MockState {
        script,
        recorded: Recorded::default(),
    }));

    let api = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
        .route("/auth/user", get(user_info))
        .route("/auth/validate", get(validate))
        .route("/auth/users", get(list_users).post(add_user))
        .route(
            "/platform/external/users/username/:username/permissions",
            get(permissions),
        )
        .fallback(protected)
        .with_state(state.clone());

    let app = Router::new().nest("/api", api);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockBackend {
        base_url: format!("http://{}/api", addr),
        state,
    }
}

fn reply((status, body): (u16, Value)) -> (StatusCode, Json<Value>) {
    (StatusCode::from_u16(status).unwrap(), Json(body))
}

fn record(state: &Shared, path: &str, headers: &HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .lock()
        .unwrap()
        .recorded
        .requests
        .push((path.to_string(), auth));
}

async fn login(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/login", &headers);
    let (delay, response) = {
        let mut s = state.lock().unwrap();
        s.recorded.login_calls += 1;
        s.recorded.login_bodies.push(body);
        (s.script.login_delay, s.script.login.clone())
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply(response)
}

async fn logout(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/logout", &headers);
    let mut s = state.lock().unwrap();
    s.recorded.logout_calls += 1;
    reply(s.script.logout.clone())
}

async fn refresh(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/refresh", &headers);
    let (delay, response) = {
        let mut s = state.lock().unwrap();
        s.recorded.refresh_calls += 1;
        if let Some(token) = query.get("refreshToken") {
            s.recorded.refresh_queries.push(token.clone());
        }
        s.recorded.refresh_bodies.push(body);
        (s.script.refresh_delay, s.script.refresh.clone())
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    reply(response)
}

async fn list_users(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/users", &headers);
    reply(state.lock().unwrap().script.users.clone())
}

async fn add_user(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/users", &headers);
    let mut s = state.lock().unwrap();
    let username = query.get("username").cloned().unwrap_or_default();
    s.recorded.added_users.push(query);
    reply((200, json!({"code": 200, "data": {"username": username}})))
}

async fn user_info(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/user", &headers);
    reply(state.lock().unwrap().script.user_info.clone())
}

async fn validate(State(state): State<Shared>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    record(&state, "/auth/validate", &headers);
    reply(state.lock().unwrap().script.validate.clone())
}

async fn permissions(
    State(state): State<Shared>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let path = format!("/platform/external/users/username/{}/permissions", username);
    record(&state, &path, &headers);
    reply(state.lock().unwrap().script.perms.clone())
}

async fn protected(
    State(state): State<Shared>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().trim_start_matches("/api");
    record(&state, path, &headers);
    let next = state.lock().unwrap().script.protected.pop_front();
    reply(next.unwrap_or((200, json!({"code": 200, "data": []}))))
}

//----------------
// FIXTURES
//----------------

pub fn admin_login_body() -> Value {
    json!({
        "code": 200,
        "data": {
            "token": "t1",
            "refreshToken": "r1",
            "username": "admin",
            "role": "ADMIN"
        }
    })
}

pub fn config_for(backend: &MockBackend) -> ClientConfig {
    ClientConfig {
        base_url: backend.base_url.clone(),
        timeout_secs: 5,
        ..ClientConfig::default()
    }
}

pub async fn client_with(
    config: &ClientConfig,
    storage: Arc<dyn Storage>,
) -> (OaClient, UnboundedReceiver<UiEvent>) {
    let (notifier, events) = ChannelNotifier::new();
    let client = OaClient::connect(config, storage, Arc::new(notifier))
        .await
        .expect("client should build");
    (client, events)
}

/// Backend + client over fresh in-memory storage
pub async fn setup(script: Script) -> (MockBackend, OaClient, MemoryStorage, UnboundedReceiver<UiEvent>) {
    let backend = spawn_backend(script).await;
    let storage = MemoryStorage::new();
    let (client, events) = client_with(&config_for(&backend), Arc::new(storage.clone())).await;
    (backend, client, storage, events)
}

pub fn drain(events: &mut UnboundedReceiver<UiEvent>) -> Vec<UiEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

/// Backend that refuses every write
pub struct FailingStorage;

#[async_trait::async_trait]
impl Storage for FailingStorage {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded").into())
    }

    async fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "quota exceeded").into())
    }
}
