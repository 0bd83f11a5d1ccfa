//! Stockwatch - watch-list and analysis client
//!
//! Headless client for the stock analysis backend: identity session and
//! credential lifecycle, authenticated backend calls, the watch-list, the
//! analysis result tables and the Robinhood bot page.

pub mod api;
pub mod brokers;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod scheduler;
pub mod security;
pub mod services;
pub mod session;
pub mod state;

use config::Config;
use guard::GuardDecision;
use state::AppState;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_CONFIG_FILE: &str = "stockwatch.toml";

/// Initialize tracing/logging; `RUST_LOG` overrides the default filter
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockwatch_lib=debug,stockwatch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Run the client once: resolve the session, load the dashboard, report, exit
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    tracing::info!("Starting Stockwatch...");

    let config_path = std::env::var("STOCKWATCH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = Config::load(&config_path)?;
    tracing::info!("Backend: {}", config.backend_url);

    let state = AppState::new(config)?;
    state.start().await;
    tracing::info!("Session listener and token refresh started");

    if let (Ok(email), Ok(password)) = (
        std::env::var("STOCKWATCH_EMAIL"),
        std::env::var("STOCKWATCH_PASSWORD"),
    ) {
        let request = commands::auth::LoginRequest { email, password };
        if let Err(e) = commands::auth::login(&state, request).await {
            tracing::error!("Sign-in failed: {}", e);
        }
    }

    let mut guard = state.route_guard();
    match guard.resolved().await {
        GuardDecision::Render => {
            let view = commands::dashboard::load_dashboard(&state).await;
            tracing::info!(
                "Watch-list: {} ({} analysis rows)",
                if view.stocks.is_empty() {
                    "<empty>".to_string()
                } else {
                    view.stocks.join(", ")
                },
                view.tables.total_rows()
            );
            if let Some(error) = &view.notice.error {
                tracing::warn!("{}", error);
            }

            if let Err(e) = commands::bot::reconnect_brokerage(&state).await {
                tracing::warn!("Brokerage reconnect failed: {}", e);
            }
            match commands::bot::get_brokerage_status(&state) {
                Ok(status) => tracing::info!(
                    "Brokerage: {} (auto-trading {})",
                    if status.connected { "connected" } else { "not connected" },
                    if status.auto_trading { "on" } else { "off" }
                ),
                Err(e) => tracing::warn!("Could not read brokerage status: {}", e),
            }
        }
        GuardDecision::Redirect(path) => {
            tracing::info!("Not signed in, redirecting to {}", path);
        }
        GuardDecision::Wait => {
            tracing::warn!("Session never finished loading");
        }
    }

    state.shutdown();
    tracing::info!("Stockwatch stopped");
    Ok(())
}
