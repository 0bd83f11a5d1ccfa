//! SQLite database models

use serde::{Deserialize, Serialize};

/// Client settings (single row)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Automated trading switch shown on the brokerage page
    pub auto_trading: bool,
    /// Brokerage username used to reconnect on the next start
    pub broker_username: Option<String>,
    pub updated_at: String,
}
