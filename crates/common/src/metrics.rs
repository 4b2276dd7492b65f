use async_trait::async_trait;
use crate::dto::Source;

/// Trait for metrics collection
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Record a published snapshot and where it came from
    async fn record_load(&self, source: Source);

    /// Record the outcome of a remote delivery attempt
    async fn record_delivery(&self, delivered: bool);

    /// Record an error
    async fn record_error(&self, error_type: &str);
}

/// No-op implementation for when metrics are disabled
pub struct NoOpMetrics;

#[async_trait]
impl MetricsProvider for NoOpMetrics {
    async fn record_load(&self, _source: Source) {}
    async fn record_delivery(&self, _delivered: bool) {}
    async fn record_error(&self, _error_type: &str) {}
}
