//! Watch-list Service
//!
//! CRUD over the user's ticker symbols. The local list is a read-through
//! cache: it is only replaced by a successful refetch (or emptied by a
//! successful delete-all), never patched locally.

use super::analysis_service::{AnalysisSync, RefreshStatus};
use crate::api::StockApi;
use crate::error::{AppError, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of a successful add/remove and of the follow-up sync
#[derive(Debug)]
pub struct MutationReport {
    /// Normalised symbol that was sent
    pub symbol: String,
    /// Server confirmation message
    pub message: String,
    /// Set when the follow-up watch-list refetch failed
    pub list_error: Option<AppError>,
    pub refresh: RefreshStatus,
}

/// Trim and upper-case a user-entered ticker; `None` when nothing is left
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol.to_uppercase())
    }
}

pub struct WatchlistService {
    api: Arc<dyn StockApi>,
    analysis: Arc<AnalysisSync>,
    stocks: RwLock<Vec<String>>,
}

impl WatchlistService {
    pub fn new(api: Arc<dyn StockApi>, analysis: Arc<AnalysisSync>) -> Self {
        Self {
            api,
            analysis,
            stocks: RwLock::new(Vec::new()),
        }
    }

    /// Fetch the watch-list and replace the cached copy
    pub async fn list(&self) -> Result<Vec<String>> {
        let stocks = self.api.list_stocks().await?;
        *self.stocks.write() = stocks.clone();
        Ok(stocks)
    }

    /// Cached watch-list
    pub fn stocks(&self) -> Vec<String> {
        self.stocks.read().clone()
    }

    /// Add a symbol, then refetch the list and refresh analysis
    ///
    /// Blank input is a no-op (`Ok(None)`) and sends nothing.
    pub async fn add(&self, raw: &str) -> Result<Option<MutationReport>> {
        let Some(symbol) = normalize_symbol(raw) else {
            return Ok(None);
        };

        if self.stocks.read().iter().any(|s| s.eq_ignore_ascii_case(&symbol)) {
            return Err(AppError::Validation(format!(
                "{} is already in your watch-list",
                symbol
            )));
        }

        info!("Adding {} to watch-list", symbol);
        let message = self.api.add_stock(&symbol).await?;
        Ok(Some(self.after_mutation(symbol, message).await))
    }

    /// Remove a symbol, then refetch the list and refresh analysis
    pub async fn remove(&self, raw: &str) -> Result<Option<MutationReport>> {
        let Some(symbol) = normalize_symbol(raw) else {
            return Ok(None);
        };

        info!("Removing {} from watch-list", symbol);
        let message = self.api.remove_stock(&symbol).await?;
        Ok(Some(self.after_mutation(symbol, message).await))
    }

    /// Delete every symbol; on success the local list and all tables are emptied
    pub async fn delete_all(&self) -> Result<String> {
        let message = self.api.delete_all_stocks().await?;
        self.stocks.write().clear();
        self.analysis.clear();
        info!("Watch-list cleared");
        Ok(message)
    }

    /// Drop cached data without touching the server (sign-out)
    pub fn reset(&self) {
        self.stocks.write().clear();
        self.analysis.clear();
    }

    async fn after_mutation(&self, symbol: String, message: String) -> MutationReport {
        let list_error = match self.list().await {
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to refetch watch-list after {} changed: {}", symbol, e);
                Some(e)
            }
        };

        let refresh = RefreshStatus::from_result(self.analysis.refresh().await);

        MutationReport {
            symbol,
            message,
            list_error,
            refresh,
        }
    }
}
