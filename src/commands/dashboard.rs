//! Dashboard commands
//!
//! These are the error boundary for the dashboard: every failure is turned
//! into a `Notice` the view can display, nothing is returned as `Err`.

use crate::error::AppError;
use crate::services::{AnalysisTables, MutationReport, RefreshStatus};
use crate::state::AppState;
use serde::Serialize;
use tracing::{error, info};

const FETCH_STOCKS_FAILED: &str = "Failed to fetch stocks.";
const FETCH_ANALYSIS_FAILED: &str = "Failed to fetch analysis data.";
const EXECUTE_ANALYSIS_FAILED: &str = "Failed to execute analysis.";
const ADD_STOCK_FAILED: &str = "Error adding stock. Please try again.";
const REMOVE_STOCK_FAILED: &str = "Could not remove stock.";
const DELETE_ALL_FAILED: &str = "Failed to delete all stocks.";

/// User-visible outcome of a dashboard operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub message: Option<String>,
    pub error: Option<String>,
    /// The backend rejected the credential; the view should send the user to login
    pub auth_required: bool,
}

impl Notice {
    fn message(text: impl Into<String>) -> Self {
        Self {
            message: Some(text.into()),
            ..Default::default()
        }
    }

    fn fail(&mut self, err: &AppError, text: impl Into<String>) {
        self.error = Some(text.into());
        self.auth_required |= err.is_auth();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub stocks: Vec<String>,
    pub tables: AnalysisTables,
    pub is_busy: bool,
    pub notice: Notice,
}

/// Fetch the watch-list and the current tables
pub async fn load_dashboard(state: &AppState) -> DashboardView {
    let mut notice = Notice::default();

    if let Err(e) = state.watchlist.list().await {
        error!("Error fetching stocks: {}", e);
        notice.fail(&e, FETCH_STOCKS_FAILED);
    }
    if let Err(e) = state.analysis.reload().await {
        error!("Error fetching analysis data: {}", e);
        notice.fail(&e, FETCH_ANALYSIS_FAILED);
    }

    view(state, notice)
}

/// Cached dashboard, no network
pub fn get_dashboard(state: &AppState) -> DashboardView {
    view(state, Notice::default())
}

pub async fn add_stock(state: &AppState, symbol: &str) -> Notice {
    match state.watchlist.add(symbol).await {
        Ok(Some(report)) => mutation_notice(report),
        Ok(None) => Notice::default(),
        Err(e) => {
            error!("Error adding stock: {}", e);
            let text = match &e {
                AppError::Validation(msg) | AppError::Auth(msg) => msg.clone(),
                _ => e
                    .server_detail()
                    .map(str::to_string)
                    .unwrap_or_else(|| ADD_STOCK_FAILED.to_string()),
            };
            let mut notice = Notice::default();
            notice.fail(&e, text);
            notice
        }
    }
}

pub async fn remove_stock(state: &AppState, symbol: &str) -> Notice {
    match state.watchlist.remove(symbol).await {
        Ok(Some(report)) => mutation_notice(report),
        Ok(None) => Notice::default(),
        Err(e) => {
            error!("Error removing stock: {}", e);
            let mut notice = Notice::default();
            notice.fail(&e, REMOVE_STOCK_FAILED);
            notice
        }
    }
}

pub async fn delete_all_stocks(state: &AppState) -> Notice {
    match state.watchlist.delete_all().await {
        Ok(message) => Notice::message(message),
        Err(e) => {
            error!("Error deleting all stocks: {}", e);
            let mut notice = Notice::default();
            notice.fail(&e, DELETE_ALL_FAILED);
            notice
        }
    }
}

/// Explicit "run analysis"; a click while a refresh is running is ignored
pub async fn refresh_analysis(state: &AppState) -> Notice {
    match RefreshStatus::from_result(state.analysis.refresh().await) {
        RefreshStatus::Completed(status) => Notice::message(status),
        RefreshStatus::Skipped => Notice::default(),
        RefreshStatus::Failed(e) => {
            error!("Error executing analysis: {}", e);
            let mut notice = Notice::default();
            notice.fail(&e, EXECUTE_ANALYSIS_FAILED);
            notice
        }
    }
}

/// The follow-up refresh reports last, so its outcome wins
fn mutation_notice(report: MutationReport) -> Notice {
    info!("{}: {}", report.symbol, report.message);
    let mut notice = Notice::message(report.message);

    if let Some(e) = &report.list_error {
        notice.fail(e, FETCH_STOCKS_FAILED);
    }

    match report.refresh {
        RefreshStatus::Completed(status) => notice.message = Some(status),
        RefreshStatus::Skipped => {}
        RefreshStatus::Failed(e) => {
            notice.message = None;
            notice.fail(&e, EXECUTE_ANALYSIS_FAILED);
        }
    }

    notice
}

fn view(state: &AppState, notice: Notice) -> DashboardView {
    DashboardView {
        stocks: state.watchlist.stocks(),
        tables: (*state.analysis.tables()).clone(),
        is_busy: state.analysis.is_busy(),
        notice,
    }
}
