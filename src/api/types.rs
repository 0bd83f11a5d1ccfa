//! Backend wire types

use serde::{Deserialize, Serialize};
use std::fmt;

/// One loosely-typed row of an analysis table, keyed by server field names
pub type Record = serde_json::Value;

/// Server-computed tables refreshed by `execute_analysis`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisTable {
    /// Stochastic %K/%D, zone and decision per ticker
    StockAnalysis,
    /// American Bull buy/sell signals
    AmericanBull,
    /// Barchart opinion
    BarchartOpinion,
    /// MarketBeat ratings
    MarketBeat,
    /// Congressional trades; each record is the trade list of one ticker
    CongressTrades,
    /// Insider trades
    InsiderTrades,
}

impl AnalysisTable {
    pub const ALL: [AnalysisTable; 6] = [
        AnalysisTable::StockAnalysis,
        AnalysisTable::AmericanBull,
        AnalysisTable::BarchartOpinion,
        AnalysisTable::MarketBeat,
        AnalysisTable::CongressTrades,
        AnalysisTable::InsiderTrades,
    ];

    /// Response field holding the rows; also the endpoint name
    pub fn field(&self) -> &'static str {
        match self {
            AnalysisTable::StockAnalysis => "stock_analysis",
            AnalysisTable::AmericanBull => "american_bull_info",
            AnalysisTable::BarchartOpinion => "barchart_opinion_info",
            AnalysisTable::MarketBeat => "market_beat_info",
            AnalysisTable::CongressTrades => "congress_trades",
            AnalysisTable::InsiderTrades => "insider_trades",
        }
    }

    /// Endpoint path relative to the backend base URL
    pub fn path(&self) -> &'static str {
        self.field()
    }
}

impl fmt::Display for AnalysisTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StocksResponse {
    #[serde(default)]
    pub stocks: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    #[serde(default)]
    pub status: String,
}

/// Brokerage login, including the TOTP seed used for MFA
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerCredentials {
    pub username: String,
    pub password: String,
    pub totp_secret: String,
}

impl fmt::Debug for BrokerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("totp_secret", &"<redacted>")
            .finish()
    }
}

/// Filled brokerage order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Option<String>,
    pub side: String,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub price: f64,
    /// RFC 3339 timestamp of the last transaction
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub symbol: String,
    pub reason: String,
}

/// Raw `/validate_and_fetch_trades` response
#[derive(Debug, Clone, Deserialize)]
pub struct TradeValidationResponse {
    #[serde(rename = "isValid", default)]
    pub is_valid: bool,
    pub message: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub trades: Vec<Trade>,
    pub balance: Option<f64>,
    pub buying_power: Option<f64>,
    pub cash: Option<f64>,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

/// Raw `/get_credentials` response: either credentials or `{error}`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CredentialsLookup {
    Found(BrokerCredentials),
    Missing { error: String },
}
