//! Robinhood broker adapter
//!
//! The brokerage login itself runs on the backend (username, password and a
//! TOTP code derived from the stored seed); this adapter calls those endpoints.

use crate::api::{BrokerCredentials, CredentialsLookup, StockApi};
use crate::brokers::types::{sort_newest_first, BrokerageAccount};
use crate::brokers::{validate_credentials, Broker};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

const REJECTED_LOGIN: &str = "Invalid credentials. Please try again.";

/// Robinhood broker implementation
pub struct RobinhoodBroker {
    api: Arc<dyn StockApi>,
}

impl RobinhoodBroker {
    pub fn new(api: Arc<dyn StockApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Broker for RobinhoodBroker {
    fn id(&self) -> &'static str {
        "robinhood"
    }

    fn name(&self) -> &'static str {
        "Robinhood"
    }

    fn requires_totp(&self) -> bool {
        true
    }

    async fn authenticate(&self, credentials: &BrokerCredentials) -> Result<BrokerageAccount> {
        let credentials = validate_credentials(credentials, self.requires_totp())?;

        let response = self.api.validate_and_fetch_trades(&credentials).await?;
        if !response.is_valid {
            let reason = response
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| REJECTED_LOGIN.to_string());
            return Err(AppError::Broker(reason));
        }

        let mut trades = response.trades;
        sort_newest_first(&mut trades);
        info!("Robinhood login ok, {} filled trades", trades.len());

        Ok(BrokerageAccount {
            broker_id: self.id().to_string(),
            username: credentials.username,
            trades,
            balance: response.balance.unwrap_or(0.0),
            buying_power: response.buying_power.unwrap_or(0.0),
            cash: response.cash.unwrap_or(0.0),
            recommendations: response.recommendations,
            message: response.message,
            connected_at: Utc::now(),
        })
    }

    async fn stored_credentials(&self, username: &str) -> Result<Option<BrokerCredentials>> {
        match self.api.get_credentials(username).await? {
            CredentialsLookup::Found(credentials) => Ok(Some(credentials)),
            CredentialsLookup::Missing { error } => {
                debug!("No stored credentials for {}: {}", username, error);
                Ok(None)
            }
        }
    }
}
