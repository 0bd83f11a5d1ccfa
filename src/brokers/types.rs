//! Common broker types

use crate::api::{Recommendation, Trade};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Snapshot of a connected brokerage account
#[derive(Debug, Clone, Serialize)]
pub struct BrokerageAccount {
    pub broker_id: String,
    pub username: String,
    /// Filled orders, newest first
    pub trades: Vec<Trade>,
    pub balance: f64,
    pub buying_power: f64,
    pub cash: f64,
    pub recommendations: Vec<Recommendation>,
    pub message: Option<String>,
    pub connected_at: DateTime<Utc>,
}

/// Order trades newest first; undated trades sink to the end
pub fn sort_newest_first(trades: &mut [Trade]) {
    trades.sort_by(|a, b| b.date.cmp(&a.date));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(symbol: &str, date: Option<&str>) -> Trade {
        Trade {
            symbol: Some(symbol.to_string()),
            side: "buy".to_string(),
            quantity: 1.0,
            price: 10.0,
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn test_sort_newest_first() {
        let mut trades = vec![
            trade("AAPL", Some("2024-03-01T15:00:00Z")),
            trade("MSFT", None),
            trade("TSLA", Some("2024-05-10T09:30:00Z")),
        ];

        sort_newest_first(&mut trades);

        let order: Vec<_> = trades.iter().map(|t| t.symbol.clone().unwrap()).collect();
        assert_eq!(order, vec!["TSLA", "AAPL", "MSFT"]);
    }
}
