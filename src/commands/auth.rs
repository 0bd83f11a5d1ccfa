//! Authentication commands

use crate::error::{AppError, Result};
use crate::guard::{evaluate, login_redirect, GuardState};
use crate::session::Identity;
use crate::state::AppState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub uid: String,
    pub email: Option<String>,
}

impl From<Identity> for UserInfo {
    fn from(identity: Identity) -> Self {
        Self {
            uid: identity.uid,
            email: identity.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub state: GuardState,
    pub authenticated: bool,
    pub user: Option<UserInfo>,
    /// Set when the login page should forward to this path instead
    pub redirect: Option<String>,
}

/// Sign in with email and password
///
/// Returns once the session store has picked up the new identity, so the
/// caller can immediately open protected views.
pub async fn login(state: &AppState, request: LoginRequest) -> Result<UserInfo> {
    tracing::info!("Login attempt for {}", request.email.trim());

    let identity = state
        .provider
        .sign_in_with_password(&request.email, &request.password)
        .await?;
    wait_for_identity(state, &identity).await?;

    tracing::info!("User {} logged in", identity.uid);
    Ok(identity.into())
}

/// Create an account; the new user is signed in
pub async fn signup(state: &AppState, request: LoginRequest) -> Result<UserInfo> {
    tracing::info!("Signup for {}", request.email.trim());

    let identity = state
        .provider
        .sign_up(&request.email, &request.password)
        .await?;
    wait_for_identity(state, &identity).await?;

    Ok(identity.into())
}

/// Logout current user
pub async fn logout(state: &AppState) -> Result<()> {
    tracing::info!("User logout");
    let result = state.session.logout().await;
    state.watchlist.reset();
    result
}

/// Get current user info
pub fn get_current_user(state: &AppState) -> Option<UserInfo> {
    state.session.snapshot().identity.map(UserInfo::from)
}

/// Check whether the session admits protected views
pub fn check_session(state: &AppState) -> SessionStatus {
    let session = state.session.snapshot();
    SessionStatus {
        state: evaluate(&session),
        authenticated: session.is_authenticated(),
        redirect: login_redirect(&session).map(str::to_string),
        user: session.identity.map(UserInfo::from),
    }
}

async fn wait_for_identity(state: &AppState, identity: &Identity) -> Result<()> {
    let mut sessions = state.session.subscribe();
    let admitted = async {
        sessions
            .wait_for(|session| {
                evaluate(session) == GuardState::Admitted
                    && session.identity.as_ref().map(|i| &i.uid) == Some(&identity.uid)
            })
            .await
            .map(|_| ())
    };

    let outcome = tokio::time::timeout(state.config.request_timeout(), admitted).await;
    match outcome {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(AppError::Internal("Session store stopped".to_string())),
        Err(_) => Err(AppError::Timeout(
            "session did not pick up the signed-in identity".to_string(),
        )),
    }
}
