//! Analysis Sync Service
//!
//! Runs the server-side analysis and replaces every cached result table in
//! one observable update. Only one refresh may be in flight; a second call
//! while busy is rejected, not queued.

use crate::api::{AnalysisTable, Record, StockApi};
use crate::error::{AppError, Result};
use futures_util::future::try_join_all;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Cached contents of every analysis table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisTables {
    pub stock_analysis: Vec<Record>,
    pub american_bull_info: Vec<Record>,
    pub barchart_opinion_info: Vec<Record>,
    pub market_beat_info: Vec<Record>,
    pub congress_trades: Vec<Record>,
    pub insider_trades: Vec<Record>,
}

impl AnalysisTables {
    pub fn get(&self, table: AnalysisTable) -> &[Record] {
        match table {
            AnalysisTable::StockAnalysis => &self.stock_analysis,
            AnalysisTable::AmericanBull => &self.american_bull_info,
            AnalysisTable::BarchartOpinion => &self.barchart_opinion_info,
            AnalysisTable::MarketBeat => &self.market_beat_info,
            AnalysisTable::CongressTrades => &self.congress_trades,
            AnalysisTable::InsiderTrades => &self.insider_trades,
        }
    }

    fn slot(&mut self, table: AnalysisTable) -> &mut Vec<Record> {
        match table {
            AnalysisTable::StockAnalysis => &mut self.stock_analysis,
            AnalysisTable::AmericanBull => &mut self.american_bull_info,
            AnalysisTable::BarchartOpinion => &mut self.barchart_opinion_info,
            AnalysisTable::MarketBeat => &mut self.market_beat_info,
            AnalysisTable::CongressTrades => &mut self.congress_trades,
            AnalysisTable::InsiderTrades => &mut self.insider_trades,
        }
    }

    fn from_rows(rows: Vec<(AnalysisTable, Vec<Record>)>) -> Self {
        let mut tables = Self::default();
        for (table, records) in rows {
            *tables.slot(table) = records;
        }
        tables
    }

    pub fn is_empty(&self) -> bool {
        AnalysisTable::ALL.iter().all(|t| self.get(*t).is_empty())
    }

    pub fn total_rows(&self) -> usize {
        AnalysisTable::ALL.iter().map(|t| self.get(*t).len()).sum()
    }
}

/// How a triggered refresh ended, as seen by the mutation that triggered it
#[derive(Debug)]
pub enum RefreshStatus {
    /// Tables replaced; carries the server's analysis status text
    Completed(String),
    /// Another refresh was already running
    Skipped,
    Failed(AppError),
}

impl RefreshStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, RefreshStatus::Completed(_))
    }

    pub fn from_result(result: Result<String>) -> Self {
        match result {
            Ok(status) => RefreshStatus::Completed(status),
            Err(AppError::Busy(_)) => RefreshStatus::Skipped,
            Err(e) => RefreshStatus::Failed(e),
        }
    }
}

/// Clears the busy flag however the refresh ends, including cancellation
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct AnalysisSync {
    api: Arc<dyn StockApi>,
    busy: AtomicBool,
    /// Bumped on every refresh or clear, under the `tables` lock
    generation: AtomicU64,
    tables: watch::Sender<Arc<AnalysisTables>>,
}

impl AnalysisSync {
    pub fn new(api: Arc<dyn StockApi>) -> Self {
        let (tables, _) = watch::channel(Arc::new(AnalysisTables::default()));
        Self {
            api,
            busy: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            tables,
        }
    }

    /// Run analysis, then fetch and replace every table
    ///
    /// Returns the server status text. Fails with `Busy` if a refresh is
    /// already in flight; any other failure leaves the cached tables as they were.
    pub async fn refresh(&self) -> Result<String> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            info!("Analysis refresh already in flight, ignoring request");
            return Err(AppError::Busy("analysis refresh".to_string()));
        };

        let run_id = Uuid::new_v4();
        let span = info_span!("analysis_refresh", %run_id);

        async {
            info!("Executing analysis");
            let status = self.api.execute_analysis().await.map_err(|e| {
                warn!("Analysis execution failed: {}", e);
                e
            })?;
            info!("Analysis status: {}", status);

            let tables = self.fetch_all().await.map_err(partial_failure)?;
            info!("Analysis tables refreshed ({} rows)", tables.total_rows());
            self.replace(tables);
            Ok::<_, AppError>(status)
        }
        .instrument(span)
        .await
    }

    /// Fetch the current tables without running analysis
    ///
    /// The result is dropped if a refresh or clear landed while the fetch was
    /// in flight, so a slow reload never overwrites newer tables.
    pub async fn reload(&self) -> Result<()> {
        let started = self.generation.load(Ordering::Acquire);
        let tables = self.fetch_all().await?;

        let applied = self.tables.send_if_modified(|current| {
            if self.generation.load(Ordering::Acquire) != started {
                return false;
            }
            *current = Arc::new(tables);
            true
        });
        if !applied {
            debug!("Discarding reload, tables changed while it was in flight");
        }
        Ok(())
    }

    /// Empty every table locally
    pub fn clear(&self) {
        self.replace(AnalysisTables::default());
    }

    fn replace(&self, tables: AnalysisTables) {
        self.tables.send_modify(|current| {
            self.generation.fetch_add(1, Ordering::AcqRel);
            *current = Arc::new(tables);
        });
    }

    pub fn tables(&self) -> Arc<AnalysisTables> {
        Arc::clone(&self.tables.borrow())
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<AnalysisTables>> {
        self.tables.subscribe()
    }

    /// All-or-nothing concurrent fetch of every table
    async fn fetch_all(&self) -> Result<AnalysisTables> {
        let fetches = AnalysisTable::ALL.into_iter().map(|table| {
            let api = Arc::clone(&self.api);
            async move {
                let rows = api.fetch_table(table).await.map_err(|e| {
                    warn!("Failed to fetch {}: {}", table, e);
                    e
                })?;
                Ok::<_, AppError>((table, rows))
            }
        });

        let rows = try_join_all(fetches).await?;
        Ok(AnalysisTables::from_rows(rows))
    }
}

/// A failed table fetch fails the whole refresh; rejected credentials stay `Auth`
fn partial_failure(err: AppError) -> AppError {
    if err.is_auth() {
        err
    } else {
        AppError::Analysis(format!("Failed to fetch analysis results: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BrokerCredentials, CredentialsLookup, TradeValidationResponse};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeApi {
        executions: AtomicUsize,
        fail_tables: Mutex<HashSet<AnalysisTable>>,
        fail_execute: AtomicBool,
        generation: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fetch_gate: Mutex<Option<Arc<Notify>>>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl StockApi for FakeApi {
        async fn list_stocks(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        async fn add_stock(&self, _symbol: &str) -> Result<String> {
            unimplemented!()
        }
        async fn remove_stock(&self, _symbol: &str) -> Result<String> {
            unimplemented!()
        }
        async fn delete_all_stocks(&self) -> Result<String> {
            unimplemented!()
        }
        async fn execute_analysis(&self) -> Result<String> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail_execute.load(Ordering::SeqCst) {
                return Err(AppError::Api {
                    status: 500,
                    detail: "Internal Server Error".into(),
                });
            }
            self.generation.fetch_add(1, Ordering::SeqCst);
            Ok("Analysis executed".into())
        }
        async fn fetch_table(&self, table: AnalysisTable) -> Result<Vec<Record>> {
            if self.fail_tables.lock().contains(&table) {
                return Err(AppError::Timeout(table.to_string()));
            }
            let generation = self.generation.load(Ordering::SeqCst);
            let gate = self.fetch_gate.lock().clone();
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            Ok(vec![json!({"table": table.field(), "generation": generation})])
        }
        async fn validate_and_fetch_trades(
            &self,
            _credentials: &BrokerCredentials,
        ) -> Result<TradeValidationResponse> {
            unimplemented!()
        }
        async fn get_credentials(&self, _username: &str) -> Result<CredentialsLookup> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn test_refresh_replaces_all_tables() {
        let api = Arc::new(FakeApi::default());
        let sync = AnalysisSync::new(api.clone());

        let status = sync.refresh().await.unwrap();

        assert_eq!(status, "Analysis executed");
        let tables = sync.tables();
        for table in AnalysisTable::ALL {
            assert_eq!(tables.get(table)[0]["generation"], 1);
        }
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_partial_fetch_failure_keeps_previous_tables() {
        let api = Arc::new(FakeApi::default());
        let sync = AnalysisSync::new(api.clone());
        sync.refresh().await.unwrap();
        let before = sync.tables();

        api.fail_tables.lock().insert(AnalysisTable::CongressTrades);
        let err = sync.refresh().await.unwrap_err();

        assert!(matches!(err, AppError::Analysis(_)));
        assert_eq!(*sync.tables(), *before);
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_execute_failure_skips_fetch() {
        let api = Arc::new(FakeApi::default());
        api.fail_execute.store(true, Ordering::SeqCst);
        let sync = AnalysisSync::new(api.clone());

        assert!(sync.refresh().await.is_err());
        assert!(sync.tables().is_empty());
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_concurrent_refresh_is_rejected() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        let sync = Arc::new(AnalysisSync::new(api.clone()));

        let first = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.refresh().await }
        });
        while api.executions.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert!(sync.is_busy());

        let second = sync.refresh().await;
        assert!(matches!(second, Err(AppError::Busy(_))));
        assert_eq!(api.executions.load(Ordering::SeqCst), 1);

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_refresh_releases_busy_flag() {
        let gate = Arc::new(Notify::new());
        let api = Arc::new(FakeApi {
            gate: Some(gate),
            ..Default::default()
        });
        let sync = AnalysisSync::new(api);

        let result =
            tokio::time::timeout(std::time::Duration::from_millis(20), sync.refresh()).await;

        assert!(result.is_err());
        assert!(!sync.is_busy());
    }

    #[tokio::test]
    async fn test_clear_and_reload() {
        let api = Arc::new(FakeApi::default());
        let sync = AnalysisSync::new(api.clone());
        let rx = sync.subscribe();

        sync.reload().await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(sync.tables().total_rows(), 6);
        assert_eq!(api.executions.load(Ordering::SeqCst), 0);

        sync.clear();
        assert!(sync.tables().is_empty());
    }

    #[tokio::test]
    async fn test_late_reload_does_not_overwrite_refresh() {
        let api = Arc::new(FakeApi::default());
        let sync = Arc::new(AnalysisSync::new(api.clone()));
        let gate = Arc::new(Notify::new());
        *api.fetch_gate.lock() = Some(gate.clone());

        let reload = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.reload().await }
        });
        while api.fetches.load(Ordering::SeqCst) < AnalysisTable::ALL.len() {
            tokio::task::yield_now().await;
        }

        *api.fetch_gate.lock() = None;
        sync.refresh().await.unwrap();
        assert_eq!(sync.tables().stock_analysis[0]["generation"], 1);

        gate.notify_waiters();
        reload.await.unwrap().unwrap();

        let tables = sync.tables();
        for table in AnalysisTable::ALL {
            assert_eq!(tables.get(table)[0]["generation"], 1);
        }
    }

    #[tokio::test]
    async fn test_reload_after_clear_is_discarded_if_started_before() {
        let api = Arc::new(FakeApi::default());
        let sync = Arc::new(AnalysisSync::new(api.clone()));
        let gate = Arc::new(Notify::new());
        *api.fetch_gate.lock() = Some(gate.clone());

        let reload = tokio::spawn({
            let sync = Arc::clone(&sync);
            async move { sync.reload().await }
        });
        while api.fetches.load(Ordering::SeqCst) < AnalysisTable::ALL.len() {
            tokio::task::yield_now().await;
        }

        sync.clear();
        gate.notify_waiters();
        reload.await.unwrap().unwrap();

        assert!(sync.tables().is_empty());
    }

    #[test]
    fn test_refresh_status_mapping() {
        assert!(RefreshStatus::from_result(Ok("done".into())).is_completed());
        assert!(matches!(
            RefreshStatus::from_result(Err(AppError::Busy("x".into()))),
            RefreshStatus::Skipped
        ));
        assert!(matches!(
            RefreshStatus::from_result(Err(AppError::Auth("x".into()))),
            RefreshStatus::Failed(_)
        ));
    }
}
