//! Application state management

use crate::api::{ApiClient, StockApi};
use crate::brokers::robinhood::RobinhoodBroker;
use crate::config::Config;
use crate::db::sqlite::SqliteDb;
use crate::error::Result;
use crate::guard::RouteGuard;
use crate::scheduler::TokenRefreshScheduler;
use crate::security::SecurityManager;
use crate::services::{AnalysisSync, BrokerageService, WatchlistService};
use crate::session::{
    CredentialCache, FirebaseIdentityProvider, IdentityProvider, Session, SessionListener,
    SessionStore, SqliteCredentialCache,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Application state shared across all commands
pub struct AppState {
    pub config: Config,

    /// SQLite database connection
    pub sqlite: Arc<SqliteDb>,

    /// Security manager for encryption
    pub security: Arc<SecurityManager>,

    /// Identity provider
    pub provider: Arc<dyn IdentityProvider>,

    /// Single source of truth for identity and credential
    pub session: Arc<SessionStore>,

    /// Backend API, reads the credential from `session` per request
    pub api: Arc<dyn StockApi>,

    pub analysis: Arc<AnalysisSync>,
    pub watchlist: Arc<WatchlistService>,
    pub brokerage: Arc<BrokerageService>,

    listener: Mutex<Option<SessionListener>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    /// Create production state: SQLite + secrets in `data_dir`, identity REST
    /// provider and the reqwest backend client
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        info!("Data directory: {:?}", config.data_dir);

        let sqlite = Arc::new(SqliteDb::new(&config.data_dir.join("stockwatch.db"))?);
        let security = Arc::new(SecurityManager::new(config.data_dir.clone())?);

        let provider = Arc::new(FirebaseIdentityProvider::new(
            config.identity.clone(),
            config.request_timeout(),
            Arc::clone(&sqlite),
            Arc::clone(&security),
        )?);
        let cache = Arc::new(SqliteCredentialCache::new(
            Arc::clone(&sqlite),
            Arc::clone(&security),
        ));

        Self::from_parts(config, sqlite, security, provider, cache, None)
    }

    /// Assemble state from injected parts
    ///
    /// Without an explicit `api`, an `ApiClient` for `config.backend_url` is
    /// built over the session store's credential.
    pub fn from_parts(
        config: Config,
        sqlite: Arc<SqliteDb>,
        security: Arc<SecurityManager>,
        provider: Arc<dyn IdentityProvider>,
        cache: Arc<dyn CredentialCache>,
        api: Option<Arc<dyn StockApi>>,
    ) -> Result<Self> {
        let session = Arc::new(SessionStore::new(Arc::clone(&provider), cache));

        let api: Arc<dyn StockApi> = match api {
            Some(api) => api,
            None => {
                let store = Arc::clone(&session);
                Arc::new(ApiClient::new(
                    config.backend_base()?,
                    config.request_timeout(),
                    config.analysis_timeout(),
                    Arc::new(move || store.credential()),
                )?)
            }
        };

        let analysis = Arc::new(AnalysisSync::new(Arc::clone(&api)));
        let watchlist = Arc::new(WatchlistService::new(Arc::clone(&api), Arc::clone(&analysis)));
        let broker = Arc::new(RobinhoodBroker::new(Arc::clone(&api)));
        let brokerage = Arc::new(BrokerageService::new(broker, Arc::clone(&sqlite)));

        Ok(Self {
            config,
            sqlite,
            security,
            provider,
            session,
            api,
            analysis,
            watchlist,
            brokerage,
            listener: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Start the session listener, credential refresh and dashboard sync
    pub async fn start(&self) {
        if self.listener.lock().is_some() {
            return;
        }

        // Subscribe before the listener runs so the first resolved state is seen
        let sessions = self.session.subscribe();
        let listener = self.session.start().await;
        *self.listener.lock() = Some(listener);

        let refresh = TokenRefreshScheduler::new(
            Arc::clone(&self.session),
            self.config.token_refresh_interval(),
        )
        .start();

        let sync = spawn_dashboard_sync(
            sessions,
            Arc::clone(&self.watchlist),
            Arc::clone(&self.analysis),
        );

        self.tasks.lock().extend([refresh, sync]);
    }

    /// Stop background tasks and drop the provider subscription
    pub fn shutdown(&self) {
        if let Some(listener) = self.listener.lock().take() {
            listener.shutdown();
        }
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Background tasks stopped");
    }

    /// Guard for protected views over the live session
    pub fn route_guard(&self) -> RouteGuard {
        RouteGuard::new(self.session.subscribe(), self.config.login_path.clone())
    }

    pub fn session_snapshot(&self) -> Session {
        self.session.snapshot()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reload the dashboard whenever an admitted session gets a new credential,
/// and drop cached data on sign-out
fn spawn_dashboard_sync(
    mut sessions: watch::Receiver<Session>,
    watchlist: Arc<WatchlistService>,
    analysis: Arc<AnalysisSync>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_credential: Option<String> = None;

        loop {
            let current = sessions.borrow_and_update().clone();

            if current.is_authenticated() {
                if current.credential.is_some() && current.credential != last_credential {
                    last_credential = current.credential.clone();
                    if let Err(e) = watchlist.list().await {
                        warn!("Failed to fetch stocks: {}", e);
                    }
                    if let Err(e) = analysis.reload().await {
                        warn!("Failed to fetch analysis data: {}", e);
                    }
                }
            } else if !current.is_loading && last_credential.take().is_some() {
                watchlist.reset();
            }

            if sessions.changed().await.is_err() {
                break;
            }
        }
    })
}
