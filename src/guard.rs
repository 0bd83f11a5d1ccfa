//! Route guard for protected views
//!
//! Derived entirely from the session snapshot: while the session is loading
//! nothing is decided, afterwards the presence of an identity admits or denies.

use crate::session::Session;
use serde::Serialize;
use tokio::sync::watch;

/// Path of the protected dashboard view
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GuardState {
    Pending,
    Denied,
    Admitted,
}

/// What the view layer should do for a protected route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "to", rename_all = "lowercase")]
pub enum GuardDecision {
    /// Show a neutral waiting indicator, do not navigate
    Wait,
    Redirect(String),
    Render,
}

pub fn evaluate(session: &Session) -> GuardState {
    if session.is_loading {
        GuardState::Pending
    } else if session.identity.is_some() {
        GuardState::Admitted
    } else {
        GuardState::Denied
    }
}

/// Where an admitted user opening the login page should be sent
pub fn login_redirect(session: &Session) -> Option<&'static str> {
    match evaluate(session) {
        GuardState::Admitted => Some(DASHBOARD_PATH),
        _ => None,
    }
}

pub struct RouteGuard {
    session: watch::Receiver<Session>,
    login_path: String,
}

impl RouteGuard {
    pub fn new(session: watch::Receiver<Session>, login_path: impl Into<String>) -> Self {
        Self {
            session,
            login_path: login_path.into(),
        }
    }

    pub fn state(&self) -> GuardState {
        evaluate(&self.session.borrow())
    }

    pub fn decision(&self) -> GuardDecision {
        match self.state() {
            GuardState::Pending => GuardDecision::Wait,
            GuardState::Denied => GuardDecision::Redirect(self.login_path.clone()),
            GuardState::Admitted => GuardDecision::Render,
        }
    }

    /// Wait until the session has finished loading, then decide
    ///
    /// If the session store goes away while still loading, the guard stays
    /// `Pending` and `Wait` is returned.
    pub async fn resolved(&mut self) -> GuardDecision {
        if self.session.wait_for(|s| !s.is_loading).await.is_err() {
            return GuardDecision::Wait;
        }
        self.decision()
    }
}
