//! Firebase-style identity provider over the identity toolkit REST API
//!
//! Password sign-in and sign-up go to `{auth_url}/accounts:*`, ID tokens are
//! re-minted from the refresh token at `{token_url}`. The refresh token is
//! persisted (encrypted) so a restarted process resolves to the same user.

use super::events::{Identity, IdentityBus, IdentityEvent, IdentitySubscription};
use super::provider::IdentityProvider;
use crate::api::map_transport_error;
use crate::config::IdentityConfig;
use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use crate::security::SecurityManager;
use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Storage key of the persisted provider session
const IDENTITY_KEY: &str = "identity";
const MIN_PASSWORD_LEN: usize = 6;

/// Provider-side session kept in memory and on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredUser {
    uid: String,
    email: Option<String>,
    refresh_token: String,
}

impl StoredUser {
    fn identity(&self) -> Identity {
        Identity::new(self.uid.clone(), self.email.clone())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordAuthResponse {
    local_id: String,
    email: Option<String>,
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    id_token: String,
    refresh_token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct FirebaseIdentityProvider {
    client: Client,
    config: IdentityConfig,
    db: Arc<SqliteDb>,
    security: Arc<SecurityManager>,
    current: RwLock<Option<StoredUser>>,
    bus: IdentityBus,
    restored: OnceCell<()>,
}

impl FirebaseIdentityProvider {
    pub fn new(
        config: IdentityConfig,
        timeout: Duration,
        db: Arc<SqliteDb>,
        security: Arc<SecurityManager>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            db,
            security,
            current: RwLock::new(None),
            bus: IdentityBus::new(),
            restored: OnceCell::new(),
        })
    }

    /// Resolve the persisted session (once) and publish the outcome
    async fn restore(&self) {
        let stored = match self.load_user() {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Failed to read persisted identity: {}", e);
                None
            }
        };

        let Some(stored) = stored else {
            self.bus.publish(IdentityEvent::SignedOut);
            return;
        };

        match self.exchange_refresh_token(&stored.refresh_token).await {
            Ok(token) => {
                let user = StoredUser {
                    uid: token.user_id,
                    email: stored.email,
                    refresh_token: token.refresh_token,
                };
                info!("Restored identity {}", user.uid);
                self.remember(user.clone());
                self.bus.publish(IdentityEvent::SignedIn(user.identity()));
            }
            Err(e) if e.is_auth() => {
                info!("Persisted identity is no longer valid: {}", e);
                self.forget();
                self.bus.publish(IdentityEvent::SignedOut);
            }
            Err(e) => {
                // Keep the refresh token so the next start can try again
                warn!("Could not restore identity: {}", e);
                self.bus.publish(IdentityEvent::SignedOut);
            }
        }
    }

    async fn password_auth(&self, endpoint: &str, email: &str, password: &str) -> Result<Identity> {
        let url = format!("{}/accounts:{}", self.config.auth_url.trim_end_matches('/'), endpoint);
        debug!("Identity request: accounts:{}", endpoint);

        let response = self
            .client
            .post(url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "returnSecureToken": true,
            }))
            .send()
            .await
            .map_err(|e| map_transport_error(e, "identity provider"))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        let body: PasswordAuthResponse = response.json().await?;
        let user = StoredUser {
            uid: body.local_id,
            email: body.email.or_else(|| Some(email.to_string())),
            refresh_token: body.refresh_token,
        };
        let identity = user.identity();

        self.remember(user);
        self.bus.publish(IdentityEvent::SignedIn(identity.clone()));
        Ok(identity)
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&self.config.token_url)
            .query(&[("key", self.config.api_key.as_str())])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| map_transport_error(e, "identity provider"))?;

        if !response.status().is_success() {
            return Err(provider_error(response).await);
        }

        Ok(response.json().await?)
    }

    fn remember(&self, user: StoredUser) {
        match serde_json::to_string(&user) {
            Ok(json) => {
                if let Err(e) = self.db.store_secret(IDENTITY_KEY, &json, &self.security) {
                    warn!("Failed to persist identity: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode identity: {}", e),
        }
        *self.current.write() = Some(user);
    }

    fn forget(&self) {
        if let Err(e) = self.db.delete_secret(IDENTITY_KEY) {
            warn!("Failed to remove persisted identity: {}", e);
        }
        *self.current.write() = None;
    }

    fn load_user(&self) -> Result<Option<StoredUser>> {
        self.db
            .get_secret(IDENTITY_KEY, &self.security)?
            .map(|json| serde_json::from_str(&json).map_err(AppError::from))
            .transpose()
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn subscribe(&self) -> IdentitySubscription {
        self.restored.get_or_init(|| self.restore()).await;
        self.bus.subscribe()
    }

    async fn fresh_credential(&self, identity: &Identity) -> Result<String> {
        let refresh_token = self
            .current
            .read()
            .as_ref()
            .filter(|user| user.uid == identity.uid)
            .map(|user| user.refresh_token.clone())
            .ok_or_else(|| AppError::Auth(format!("{} is not signed in", identity.uid)))?;

        let token = self.exchange_refresh_token(&refresh_token).await?;

        self.remember(StoredUser {
            uid: token.user_id,
            email: identity.email.clone(),
            refresh_token: token.refresh_token,
        });

        Ok(token.id_token)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }
        self.password_auth("signInWithPassword", email, password).await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity> {
        let email = email.trim();
        validate_sign_up(email, password)?;
        self.password_auth("signUp", email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        self.forget();
        self.bus.publish(IdentityEvent::SignedOut);
        Ok(())
    }
}

fn validate_sign_up(email: &str, password: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Valid email is required".to_string()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

async fn provider_error(response: reqwest::Response) -> AppError {
    let status = response.status().as_u16();
    match response.json::<ErrorEnvelope>().await {
        Ok(envelope) => map_provider_error(&envelope.error.message),
        Err(_) => AppError::Auth(format!("Identity provider returned HTTP {}", status)),
    }
}

/// Translate provider error codes into user-facing errors
fn map_provider_error(message: &str) -> AppError {
    // Codes may carry a suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let code = message.split_whitespace().next().unwrap_or(message);

    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            AppError::Auth("Invalid email or password".to_string())
        }
        "USER_DISABLED" => AppError::Auth("This account has been disabled".to_string()),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            AppError::Auth("Session expired, please sign in again".to_string())
        }
        "TOO_MANY_ATTEMPTS_TRY_LATER" => {
            AppError::Auth("Too many attempts, try again later".to_string())
        }
        "EMAIL_EXISTS" => {
            AppError::Validation("An account with this email already exists".to_string())
        }
        "INVALID_EMAIL" => AppError::Validation("Invalid email address".to_string()),
        "WEAK_PASSWORD" => AppError::Validation(format!(
            "Password should be at least {} characters",
            MIN_PASSWORD_LEN
        )),
        _ => AppError::Auth(message.to_string()),
    }
}
