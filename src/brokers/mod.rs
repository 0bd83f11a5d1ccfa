//! Broker adapters module

pub mod robinhood;
pub mod types;

use crate::api::BrokerCredentials;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use types::BrokerageAccount;

/// Broker trait that all broker implementations must implement
#[async_trait]
pub trait Broker: Send + Sync {
    /// Broker ID (e.g., "robinhood")
    fn id(&self) -> &'static str;

    /// Broker display name
    fn name(&self) -> &'static str;

    /// Whether this broker requires TOTP for login
    fn requires_totp(&self) -> bool;

    /// Log in and load the account snapshot
    async fn authenticate(&self, credentials: &BrokerCredentials) -> Result<BrokerageAccount>;

    /// Credentials saved by an earlier successful login, if any
    async fn stored_credentials(&self, username: &str) -> Result<Option<BrokerCredentials>>;
}

/// Trim every field and reject blanks
pub fn validate_credentials(
    credentials: &BrokerCredentials,
    requires_totp: bool,
) -> Result<BrokerCredentials> {
    let cleaned = BrokerCredentials {
        username: credentials.username.trim().to_string(),
        password: credentials.password.trim().to_string(),
        totp_secret: credentials.totp_secret.trim().replace(' ', ""),
    };

    if cleaned.username.is_empty() {
        return Err(AppError::Validation("Username is required".to_string()));
    }
    if cleaned.password.is_empty() {
        return Err(AppError::Validation("Password is required".to_string()));
    }
    if requires_totp && cleaned.totp_secret.is_empty() {
        return Err(AppError::Validation("TOTP secret is required".to_string()));
    }

    Ok(cleaned)
}
