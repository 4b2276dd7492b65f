use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use async_trait::async_trait;
use tokio::sync::RwLock;
use serde::Serialize;

use crate::dto::Source;
use crate::metrics::MetricsProvider;

const MAX_RECENT_ERRORS: usize = 100;

/// In-process counters for the sync layer
#[derive(Debug, Clone)]
pub struct SyncStats {
    inner: Arc<RwLock<StatsData>>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct StatsData {
    loads_by_source: HashMap<Source, u64>,
    delivered_sends: u64,
    undelivered_sends: u64,
    errors_by_type: HashMap<String, u64>,
    recent_errors: VecDeque<(Instant, String)>,
}

impl SyncStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StatsData::default())),
            start_time: Instant::now(),
        }
    }

    /// Get a serializable snapshot of all counters
    pub async fn snapshot(&self) -> StatsSnapshot {
        let data = self.inner.read().await;

        StatsSnapshot {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            loads_by_source: data.loads_by_source.clone(),
            delivered_sends: data.delivered_sends,
            undelivered_sends: data.undelivered_sends,
            errors_by_type: data.errors_by_type.clone(),
        }
    }

    /// Get recent errors as (age in seconds, error type)
    pub async fn recent_errors(&self) -> Vec<(u64, String)> {
        let data = self.inner.read().await;
        let now = Instant::now();

        data.recent_errors
            .iter()
            .map(|(time, kind)| (now.duration_since(*time).as_secs(), kind.clone()))
            .collect()
    }
}

impl Default for SyncStats {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsProvider for SyncStats {
    async fn record_load(&self, source: Source) {
        let mut data = self.inner.write().await;
        *data.loads_by_source.entry(source).or_insert(0) += 1;
    }

    async fn record_delivery(&self, delivered: bool) {
        let mut data = self.inner.write().await;
        if delivered {
            data.delivered_sends += 1;
        } else {
            data.undelivered_sends += 1;
        }
    }

    async fn record_error(&self, error_type: &str) {
        let mut data = self.inner.write().await;
        *data.errors_by_type.entry(error_type.to_string()).or_insert(0) += 1;

        data.recent_errors.push_back((Instant::now(), error_type.to_string()));
        if data.recent_errors.len() > MAX_RECENT_ERRORS {
            data.recent_errors.pop_front();
        }
    }
}

/// Counter snapshot for logging or a diagnostics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub timestamp: u64,
    pub uptime_seconds: u64,
    pub loads_by_source: HashMap<Source, u64>,
    pub delivered_sends: u64,
    pub undelivered_sends: u64,
    pub errors_by_type: HashMap<String, u64>,
}

impl StatsSnapshot {
    pub fn loads(&self, source: Source) -> u64 {
        self.loads_by_source.get(&source).copied().unwrap_or(0)
    }
}
