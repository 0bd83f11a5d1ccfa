//! Authenticated HTTP client

use super::types::*;
use super::StockApi;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Reads the current bearer credential; called once per outbound request
pub type CredentialAccessor = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Backend client
///
/// Holds an accessor rather than a token so a long-lived client always sends
/// the credential that is current at call time.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    credential: CredentialAccessor,
    analysis_timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        request_timeout: Duration,
        analysis_timeout: Duration,
        credential: CredentialAccessor,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: with_trailing_slash(base_url),
            credential,
            analysis_timeout,
        })
    }

    /// Build a request to `path` with the current credential attached
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::Internal(format!("Invalid endpoint '{}': {}", path, e)))?;

        let builder = self.client.request(method, url);
        Ok(match (self.credential)() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder, what: &str) -> Result<T> {
        debug!("Backend request: {}", what);
        let response = builder
            .send()
            .await
            .map_err(|e| map_transport_error(e, what))?;
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| map_transport_error(e, what))
    }
}

#[async_trait]
impl StockApi for ApiClient {
    async fn list_stocks(&self) -> Result<Vec<String>> {
        let builder = self.request(Method::GET, "stocks")?;
        let body: StocksResponse = self.send(builder, "stocks").await?;
        Ok(body.stocks)
    }

    async fn add_stock(&self, symbol: &str) -> Result<String> {
        let builder = self
            .request(Method::POST, "add_stock")?
            .query(&[("stock_symbol", symbol)]);
        let body: MessageResponse = self.send(builder, "add_stock").await?;
        Ok(body.message)
    }

    async fn remove_stock(&self, symbol: &str) -> Result<String> {
        let builder = self
            .request(Method::POST, "remove_stock")?
            .query(&[("stock_symbol", symbol)]);
        let body: MessageResponse = self.send(builder, "remove_stock").await?;
        Ok(body.message)
    }

    async fn delete_all_stocks(&self) -> Result<String> {
        let builder = self.request(Method::POST, "delete_all_stocks")?;
        let body: MessageResponse = self.send(builder, "delete_all_stocks").await?;
        Ok(body.message)
    }

    async fn execute_analysis(&self) -> Result<String> {
        let builder = self
            .request(Method::POST, "execute_analysis")?
            .timeout(self.analysis_timeout);
        let body: StatusResponse = self.send(builder, "execute_analysis").await?;
        Ok(body.status)
    }

    async fn fetch_table(&self, table: AnalysisTable) -> Result<Vec<Record>> {
        let builder = self.request(Method::GET, table.path())?;
        let body: Value = self.send(builder, table.field()).await?;
        extract_rows(body, table)
    }

    async fn validate_and_fetch_trades(
        &self,
        credentials: &BrokerCredentials,
    ) -> Result<TradeValidationResponse> {
        let builder = self
            .request(Method::POST, "validate_and_fetch_trades")?
            .json(credentials);
        self.send(builder, "validate_and_fetch_trades").await
    }

    async fn get_credentials(&self, username: &str) -> Result<CredentialsLookup> {
        let builder = self
            .request(Method::GET, "get_credentials")?
            .query(&[("username", username)]);
        self.send(builder, "get_credentials").await
    }
}

/// Map a reqwest failure, keeping timeouts distinguishable
pub(crate) fn map_transport_error(err: reqwest::Error, what: &str) -> AppError {
    if err.is_timeout() {
        AppError::Timeout(format!("{} did not respond in time", what))
    } else {
        AppError::Http(err)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = error_detail(&body)
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Auth(detail),
        _ => AppError::Api {
            status: status.as_u16(),
            detail,
        },
    })
}

/// Pull the human-readable message out of an error body
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(trimmed.to_string());
    };

    for key in ["detail", "message", "error"] {
        match value.get(key) {
            Some(Value::String(text)) => return Some(text.clone()),
            Some(Value::Null) | None => continue,
            Some(other) => return Some(other.to_string()),
        }
    }

    Some(trimmed.to_string())
}

/// Rows of `{<field>: [...]}`; an absent or null field is an empty table
fn extract_rows(body: Value, table: AnalysisTable) -> Result<Vec<Record>> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::Internal(format!(
            "Unexpected {} payload: expected an object",
            table
        )));
    };

    match fields.remove(table.field()) {
        Some(Value::Array(rows)) => Ok(rows),
        Some(Value::Null) | None => Ok(Vec::new()),
        Some(_) => Err(AppError::Internal(format!(
            "Unexpected {} payload: field is not a list",
            table
        ))),
    }
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
