//! Credential session store
//!
//! Owns the authoritative `Session` snapshot: who is signed in, the bearer
//! credential minted for them, and whether the provider has reported its
//! first state yet. The snapshot only changes in response to provider
//! events (plus explicit logout and periodic credential refresh) and is
//! published through a `watch` channel so consumers observe it instead of
//! reading ambient globals.

mod cache;
mod events;
mod firebase;
mod provider;

pub use cache::{CredentialCache, MemoryCredentialCache, SqliteCredentialCache, CREDENTIAL_KEY};
pub use events::{Identity, IdentityBus, IdentityEvent, IdentitySubscription};
pub use firebase::FirebaseIdentityProvider;
pub use provider::IdentityProvider;

use crate::error::Result;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Snapshot of the authentication state
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub identity: Option<Identity>,
    #[serde(skip)]
    pub credential: Option<String>,
    /// True until the provider's first identity event has been handled
    pub is_loading: bool,
}

impl Session {
    /// State at process start, before the provider has spoken
    pub fn loading() -> Self {
        Self {
            identity: None,
            credential: None,
            is_loading: true,
        }
    }

    fn signed_out() -> Self {
        Self {
            identity: None,
            credential: None,
            is_loading: false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.is_loading && self.identity.is_some()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity)
            .field("credential", &self.credential.as_ref().map(|_| "<redacted>"))
            .field("is_loading", &self.is_loading)
            .finish()
    }
}

/// Single source of truth for identity and credential
pub struct SessionStore {
    provider: Arc<dyn IdentityProvider>,
    cache: Arc<dyn CredentialCache>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn IdentityProvider>, cache: Arc<dyn CredentialCache>) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            provider,
            cache,
            state,
        }
    }

    /// Subscribe to the provider and handle its events on a background task
    pub async fn start(self: &Arc<Self>) -> SessionListener {
        let mut subscription = self.provider.subscribe().await;
        let store = Arc::clone(self);

        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                store.handle_event(event).await;
            }
            info!("Identity provider closed the subscription");
        });

        SessionListener { task }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    /// Current bearer credential, read at call time
    pub fn credential(&self) -> Option<String> {
        self.state.borrow().credential.clone()
    }

    /// Observe snapshot changes
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Apply one provider event to the snapshot
    pub async fn handle_event(&self, event: IdentityEvent) {
        match event {
            IdentityEvent::SignedIn(identity) => {
                match self.provider.fresh_credential(&identity).await {
                    Ok(credential) => {
                        if let Err(e) = self.cache.store(&credential) {
                            warn!("Failed to persist credential: {}", e);
                        }
                        info!("Session established for {}", identity.uid);
                        self.state.send_replace(Session {
                            identity: Some(identity),
                            credential: Some(credential),
                            is_loading: false,
                        });
                    }
                    Err(e) => {
                        warn!("Error refreshing credential for {}: {}", identity.uid, e);
                        let mut other_user = false;
                        self.state.send_modify(|session| {
                            let same_user = session
                                .identity
                                .as_ref()
                                .is_some_and(|current| current.uid == identity.uid);
                            if !same_user {
                                session.credential = None;
                                other_user = true;
                            }
                            session.identity = Some(identity);
                            session.is_loading = false;
                        });

                        // Whatever token is persisted does not belong to this user
                        if other_user {
                            if let Err(e) = self.cache.clear() {
                                warn!("Failed to remove persisted credential: {}", e);
                            }
                        }
                    }
                }
            }
            IdentityEvent::SignedOut => {
                self.clear_local();
            }
        }
    }

    /// Re-mint the credential for the current identity
    ///
    /// Returns `Ok(None)` when nobody is signed in. A result that arrives after
    /// the identity changed is discarded.
    pub async fn refresh_credential(&self) -> Result<Option<String>> {
        let Some(identity) = self.snapshot().identity else {
            return Ok(None);
        };

        let credential = self.provider.fresh_credential(&identity).await?;

        let applied = self.state.send_if_modified(|session| {
            let still_current = session
                .identity
                .as_ref()
                .is_some_and(|current| current.uid == identity.uid);
            if still_current {
                session.credential = Some(credential.clone());
            }
            still_current
        });

        if !applied {
            return Ok(None);
        }

        if let Err(e) = self.cache.store(&credential) {
            warn!("Failed to persist refreshed credential: {}", e);
        }
        Ok(Some(credential))
    }

    /// Ask the provider to end the session and clear local state
    ///
    /// Local state is cleared even when the provider call fails; that error is
    /// still returned. The provider's own `SignedOut` event arrives later and
    /// is idempotent.
    pub async fn logout(&self) -> Result<()> {
        let result = self.provider.sign_out().await;
        if let Err(e) = &result {
            warn!("Provider sign-out failed: {}", e);
        }
        self.clear_local();
        result
    }

    fn clear_local(&self) {
        if let Err(e) = self.cache.clear() {
            warn!("Failed to remove persisted credential: {}", e);
        }
        let was_signed_in = self.state.borrow().identity.is_some();
        self.state.send_replace(Session::signed_out());
        if was_signed_in {
            info!("Session cleared");
        }
    }
}

/// Handle to the background listener; shutting it down drops the subscription
pub struct SessionListener {
    task: JoinHandle<()>,
}

impl SessionListener {
    pub fn shutdown(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
