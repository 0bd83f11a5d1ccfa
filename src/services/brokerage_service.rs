//! Brokerage Service
//!
//! Connects the brokerage account shown on the bot page and owns the
//! auto-trading switch. The last connected username is persisted so the
//! account can be reconnected from server-stored credentials.

use crate::api::BrokerCredentials;
use crate::brokers::types::BrokerageAccount;
use crate::brokers::Broker;
use crate::db::sqlite::SqliteDb;
use crate::error::{AppError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Connection state for the bot page
#[derive(Debug, Clone, Serialize)]
pub struct BrokerageStatus {
    pub broker: String,
    pub connected: bool,
    pub auto_trading: bool,
    pub account: Option<BrokerageAccount>,
}

pub struct BrokerageService {
    broker: Arc<dyn Broker>,
    db: Arc<SqliteDb>,
    account: RwLock<Option<BrokerageAccount>>,
}

impl BrokerageService {
    pub fn new(broker: Arc<dyn Broker>, db: Arc<SqliteDb>) -> Self {
        Self {
            broker,
            db,
            account: RwLock::new(None),
        }
    }

    /// Log in with explicit credentials
    pub async fn connect(&self, credentials: &BrokerCredentials) -> Result<BrokerageAccount> {
        info!("BrokerageService::connect ({})", self.broker.name());

        let account = self.broker.authenticate(credentials).await?;
        self.db
            .update_settings(None, Some(Some(account.username.clone())))?;
        *self.account.write() = Some(account.clone());
        Ok(account)
    }

    /// Log in again as the last connected user
    ///
    /// `Ok(None)` when no username is remembered or the backend holds no
    /// credentials for it.
    pub async fn reconnect(&self) -> Result<Option<BrokerageAccount>> {
        let Some(username) = self.db.get_settings()?.broker_username else {
            return Ok(None);
        };

        let Some(credentials) = self.broker.stored_credentials(&username).await? else {
            info!("No stored brokerage credentials for {}", username);
            return Ok(None);
        };

        self.connect(&credentials).await.map(Some)
    }

    /// Drop the account snapshot, forget the username and stop auto-trading
    pub fn disconnect(&self) -> Result<()> {
        *self.account.write() = None;
        self.db.update_settings(Some(false), Some(None))?;
        info!("Brokerage disconnected");
        Ok(())
    }

    pub fn account(&self) -> Option<BrokerageAccount> {
        self.account.read().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.account.read().is_some()
    }

    /// Flip the auto-trading switch; enabling needs a connected account
    pub fn set_auto_trading(&self, enabled: bool) -> Result<bool> {
        if enabled && !self.is_connected() {
            return Err(AppError::Broker(
                "Connect a brokerage account before enabling auto-trading".to_string(),
            ));
        }

        let settings = self.db.update_settings(Some(enabled), None)?;
        info!(
            "Auto-trading {}",
            if settings.auto_trading { "enabled" } else { "disabled" }
        );
        Ok(settings.auto_trading)
    }

    pub fn auto_trading(&self) -> Result<bool> {
        Ok(self.db.get_settings()?.auto_trading)
    }

    pub fn status(&self) -> Result<BrokerageStatus> {
        let account = self.account();
        Ok(BrokerageStatus {
            broker: self.broker.id().to_string(),
            connected: account.is_some(),
            auto_trading: self.auto_trading()?,
            account,
        })
    }
}
