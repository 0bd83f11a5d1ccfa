//! Shared fixtures: an in-process fake backend and a scripted identity provider

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stockwatch_lib::config::Config;
use stockwatch_lib::db::sqlite::SqliteDb;
use stockwatch_lib::error::{AppError, Result};
use stockwatch_lib::security::SecurityManager;
use stockwatch_lib::session::{
    Identity, IdentityBus, IdentityEvent, IdentityProvider, IdentitySubscription,
    SqliteCredentialCache,
};
use stockwatch_lib::state::AppState;
use tempfile::TempDir;

pub const TABLES: [&str; 6] = [
    "stock_analysis",
    "american_bull_info",
    "barchart_opinion_info",
    "market_beat_info",
    "congress_trades",
    "insider_trades",
];

/// One request as the fake backend saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
pub struct BackendState {
    pub stocks: Vec<String>,
    pub requests: Vec<Recorded>,
    /// Endpoint names answered with HTTP 500
    pub failing: HashSet<String>,
    /// When set, only this bearer token is accepted
    pub accepted_token: Option<String>,
    pub analysis_delay: Option<Duration>,
    pub generation: u64,
    /// Brokerage logins saved by successful validations
    pub broker_credentials: HashMap<String, Value>,
    /// Identity toolkit: refresh token -> uid
    pub refresh_tokens: HashMap<String, String>,
    pub minted: u64,
}

/// Fake stock backend plus identity endpoints on 127.0.0.1
#[derive(Clone)]
pub struct FakeBackend {
    pub state: Arc<Mutex<BackendState>>,
    pub url: String,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(BackendState::default()));
        let app = Router::new()
            .fallback(handle)
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            url: format!("http://{}", addr),
        }
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().requests.clone()
    }

    /// Paths of recorded requests, e.g. `["add_stock", "stocks"]`
    pub fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    pub fn fail(&self, path: &str) {
        self.state.lock().failing.insert(path.to_string());
    }

    pub fn heal(&self, path: &str) {
        self.state.lock().failing.remove(path);
    }

    pub fn config(&self, data_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.backend_url = self.url.clone();
        config.data_dir = data_dir.path().to_path_buf();
        config.request_timeout_secs = 5;
        config.identity.api_key = "test-key".to_string();
        config.identity.auth_url = format!("{}/v1", self.url);
        config.identity.token_url = format!("{}/v1/token", self.url);
        config
    }
}

async fn handle(
    State(state): State<Arc<Mutex<BackendState>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().trim_start_matches('/').to_string();
    let query: HashMap<String, String> = uri
        .query()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let Some(rest) = path.strip_prefix("v1/") {
        return identity_endpoint(&state, rest, &body);
    }

    let delay = {
        let mut s = state.lock();
        s.requests.push(Recorded {
            method: method.to_string(),
            path: path.clone(),
            query: query.clone(),
            authorization: authorization.clone(),
        });

        if let Some(accepted) = &s.accepted_token {
            if authorization.as_deref() != Some(format!("Bearer {}", accepted).as_str()) {
                return error(StatusCode::UNAUTHORIZED, "Invalid or expired token.");
            }
        }
        if s.failing.contains(&path) {
            return error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
        if path == "execute_analysis" {
            s.analysis_delay
        } else {
            None
        }
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut s = state.lock();
    match (method.as_str(), path.as_str()) {
        ("GET", "stocks") => Json(json!({ "stocks": s.stocks })).into_response(),
        ("POST", "add_stock") => {
            let symbol = query.get("stock_symbol").cloned().unwrap_or_default();
            if symbol.is_empty() || symbol == "ZZZZ" {
                return error(
                    StatusCode::BAD_REQUEST,
                    &format!("Invalid stock symbol: {}", symbol),
                );
            }
            if s.stocks.contains(&symbol) {
                return error(
                    StatusCode::BAD_REQUEST,
                    &format!("Stock {} already exists", symbol),
                );
            }
            s.stocks.push(symbol.clone());
            Json(json!({ "message": format!("Stock {} added successfully", symbol) }))
                .into_response()
        }
        ("POST", "remove_stock") => {
            let symbol = query.get("stock_symbol").cloned().unwrap_or_default();
            s.stocks.retain(|stock| stock != &symbol);
            Json(json!({ "message": format!("Stock {} removed successfully", symbol) }))
                .into_response()
        }
        ("POST", "delete_all_stocks") => {
            s.stocks.clear();
            Json(json!({ "message": "All stocks deleted successfully" })).into_response()
        }
        ("POST", "execute_analysis") => {
            if s.stocks.is_empty() {
                return Json(json!({ "status": "No stocks to analyze" })).into_response();
            }
            s.generation += 1;
            Json(json!({ "status": "Analysis executed" })).into_response()
        }
        ("GET", table) if TABLES.contains(&table) => {
            let generation = s.generation;
            let rows: Vec<Value> = s
                .stocks
                .iter()
                .map(|stock| {
                    let row = json!({ "Stock Name": stock, "generation": generation });
                    if table == "congress_trades" {
                        json!([row])
                    } else {
                        row
                    }
                })
                .collect();
            Json(json!({ table: rows })).into_response()
        }
        ("POST", "validate_and_fetch_trades") => {
            let creds: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
            if creds["password"] != "pw" {
                return Json(json!({
                    "isValid": false,
                    "error": "Invalid credentials. Please try again."
                }))
                .into_response();
            }
            let username = creds["username"].as_str().unwrap_or_default().to_string();
            s.broker_credentials.insert(username, creds);
            Json(json!({
                "isValid": true,
                "message": "Login successful. Trades fetched.",
                "trades": [
                    {"symbol": "AAPL", "side": "buy", "quantity": 2.0, "price": 180.5,
                     "date": "2024-03-01T15:00:00Z"},
                    {"symbol": "TSLA", "side": "sell", "quantity": 1.0, "price": 250.0,
                     "date": "2024-05-10T09:30:00Z"}
                ],
                "balance": 1500.0,
                "buying_power": 900.0,
                "cash": 600.0,
                "recommendations": [
                    {"symbol": "AAPL", "reason": "Strong quarterly earnings growth."}
                ]
            }))
            .into_response()
        }
        ("GET", "get_credentials") => {
            let username = query.get("username").cloned().unwrap_or_default();
            match s.broker_credentials.get(&username) {
                Some(creds) => Json(creds.clone()).into_response(),
                None => Json(json!({ "error": "No credentials found for this user." }))
                    .into_response(),
            }
        }
        _ => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

/// Identity toolkit subset: password sign-in/sign-up and token refresh
fn identity_endpoint(state: &Arc<Mutex<BackendState>>, path: &str, body: &Bytes) -> Response {
    let mut s = state.lock();
    match path {
        "accounts:signInWithPassword" | "accounts:signUp" => {
            let request: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
            let email = request["email"].as_str().unwrap_or_default().to_string();
            if request["password"] != "secret" {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "code": 400, "message": "INVALID_LOGIN_CREDENTIALS" } })),
                )
                    .into_response();
            }
            let uid = format!("uid-{}", email.split('@').next().unwrap_or_default());
            let refresh = format!("refresh-{}", uid);
            s.refresh_tokens.insert(refresh.clone(), uid.clone());
            Json(json!({
                "localId": uid,
                "email": email,
                "idToken": "unused",
                "refreshToken": refresh,
            }))
            .into_response()
        }
        "token" => {
            let form: HashMap<String, String> =
                url::form_urlencoded::parse(body).into_owned().collect();
            let refresh = form.get("refresh_token").cloned().unwrap_or_default();
            let Some(uid) = s.refresh_tokens.get(&refresh).cloned() else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": { "code": 400, "message": "INVALID_REFRESH_TOKEN" } })),
                )
                    .into_response();
            };
            s.minted += 1;
            Json(json!({
                "id_token": format!("id-{}", s.minted),
                "refresh_token": refresh,
                "user_id": uid,
            }))
            .into_response()
        }
        _ => error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

/// Identity provider driven by the test; credentials are `tok1`, `tok2`, ...
#[derive(Default)]
pub struct TestProvider {
    pub bus: IdentityBus,
    minted: AtomicUsize,
    pub sign_outs: AtomicUsize,
}

impl TestProvider {
    /// Provider that has not reported any state yet
    pub fn unresolved() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn signed_in(uid: &str) -> Arc<Self> {
        let provider = Self::unresolved();
        provider.emit(IdentityEvent::SignedIn(user(uid)));
        provider
    }

    pub fn signed_out() -> Arc<Self> {
        let provider = Self::unresolved();
        provider.emit(IdentityEvent::SignedOut);
        provider
    }

    pub fn emit(&self, event: IdentityEvent) {
        self.bus.publish(event);
    }

    pub fn minted(&self) -> usize {
        self.minted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for TestProvider {
    async fn subscribe(&self) -> IdentitySubscription {
        self.bus.subscribe()
    }

    async fn fresh_credential(&self, _identity: &Identity) -> Result<String> {
        let n = self.minted.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("tok{}", n))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        if password != "secret" {
            return Err(AppError::Auth("Invalid email or password".to_string()));
        }
        let identity = Identity::new(format!("uid-{}", email), Some(email.to_string()));
        self.emit(IdentityEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        self.sign_in_with_password(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.emit(IdentityEvent::SignedOut);
        Ok(())
    }
}

pub fn user(uid: &str) -> Identity {
    Identity::new(uid, Some(format!("{}@example.com", uid)))
}

/// App state over the fake backend with an injected provider
pub struct Harness {
    pub backend: FakeBackend,
    pub provider: Arc<TestProvider>,
    pub state: AppState,
    pub data_dir: TempDir,
}

impl Harness {
    pub async fn new(provider: Arc<TestProvider>) -> Self {
        Self::with_config(provider, |_| {}).await
    }

    pub async fn with_config(provider: Arc<TestProvider>, tweak: impl FnOnce(&mut Config)) -> Self {
        let backend = FakeBackend::start().await;
        let data_dir = tempfile::tempdir().unwrap();
        let mut config = backend.config(&data_dir);
        tweak(&mut config);

        let sqlite = Arc::new(SqliteDb::new(&data_dir.path().join("stockwatch.db")).unwrap());
        let security = Arc::new(SecurityManager::new(data_dir.path().to_path_buf()).unwrap());
        let cache = Arc::new(SqliteCredentialCache::new(
            Arc::clone(&sqlite),
            Arc::clone(&security),
        ));

        let state = AppState::from_parts(
            config,
            sqlite,
            security,
            provider.clone(),
            cache,
            None,
        )
        .unwrap();

        Self {
            backend,
            provider,
            state,
            data_dir,
        }
    }

    /// Sign `uid` in by applying the provider event directly (no listener task)
    pub async fn sign_in(&self, uid: &str) {
        self.state
            .session
            .handle_event(IdentityEvent::SignedIn(user(uid)))
            .await;
    }

    pub fn persisted_token(&self) -> Option<String> {
        self.state
            .sqlite
            .get_secret("token", &self.state.security)
            .unwrap()
    }
}
