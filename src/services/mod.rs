//! Services Layer
//!
//! Business logic behind the UI-facing commands.
//!
//! # Architecture
//!
//! ```text
//! Commands ──> Services ──> StockApi (backend) / Broker / SQLite
//! ```
//!
//! # Services
//!
//! - `WatchlistService` - List, add, remove, delete-all ticker symbols
//! - `AnalysisSync` - Run analysis and replace the result tables atomically
//! - `BrokerageService` - Brokerage connection and the auto-trading switch

pub mod analysis_service;
pub mod brokerage_service;
pub mod watchlist_service;

pub use analysis_service::{AnalysisSync, AnalysisTables, RefreshStatus};
pub use brokerage_service::{BrokerageService, BrokerageStatus};
pub use watchlist_service::{normalize_symbol, MutationReport, WatchlistService};
