//! Backend API
//!
//! `StockApi` is the port the services talk to; `ApiClient` is the reqwest
//! implementation that injects the session's bearer credential per request.

mod client;
pub mod types;

pub use client::{ApiClient, CredentialAccessor};
pub(crate) use client::map_transport_error;
pub use types::{
    AnalysisTable, BrokerCredentials, CredentialsLookup, Recommendation, Record, Trade,
    TradeValidationResponse,
};

use crate::error::Result;
use async_trait::async_trait;

/// Backend operations used by the dashboard
#[async_trait]
pub trait StockApi: Send + Sync {
    /// `GET /stocks`
    async fn list_stocks(&self) -> Result<Vec<String>>;

    /// `POST /add_stock?stock_symbol=X`, returns the server message
    async fn add_stock(&self, symbol: &str) -> Result<String>;

    /// `POST /remove_stock?stock_symbol=X`, returns the server message
    async fn remove_stock(&self, symbol: &str) -> Result<String>;

    /// `POST /delete_all_stocks`, returns the server message
    async fn delete_all_stocks(&self) -> Result<String>;

    /// `POST /execute_analysis`, long-running; returns the status text
    async fn execute_analysis(&self) -> Result<String>;

    /// `GET /<table>`, rows of one analysis table
    async fn fetch_table(&self, table: AnalysisTable) -> Result<Vec<Record>>;

    /// `POST /validate_and_fetch_trades`
    async fn validate_and_fetch_trades(
        &self,
        credentials: &BrokerCredentials,
    ) -> Result<TradeValidationResponse>;

    /// `GET /get_credentials?username=X`
    async fn get_credentials(&self, username: &str) -> Result<CredentialsLookup>;
}
