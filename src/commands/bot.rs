//! Brokerage bot commands

use crate::api::BrokerCredentials;
use crate::brokers::types::BrokerageAccount;
use crate::error::Result;
use crate::services::BrokerageStatus;
use crate::state::AppState;

/// Validate brokerage credentials and load the account
pub async fn connect_brokerage(
    state: &AppState,
    credentials: BrokerCredentials,
) -> Result<BrokerageAccount> {
    tracing::info!("Connecting brokerage account {}", credentials.username.trim());
    state.brokerage.connect(&credentials).await
}

/// Reconnect the last used account from server-stored credentials
pub async fn reconnect_brokerage(state: &AppState) -> Result<Option<BrokerageAccount>> {
    state.brokerage.reconnect().await
}

pub fn disconnect_brokerage(state: &AppState) -> Result<()> {
    state.brokerage.disconnect()
}

pub fn get_brokerage_status(state: &AppState) -> Result<BrokerageStatus> {
    state.brokerage.status()
}

/// Returns the stored value of the switch
pub fn toggle_auto_trading(state: &AppState, enabled: bool) -> Result<bool> {
    state.brokerage.set_auto_trading(enabled)
}
