pub mod dto;
pub mod error;
pub mod metrics;
pub mod observability;


pub use dto::*;
pub use error::{Error, Result, ErrorResponse};
pub use metrics::{MetricsProvider, NoOpMetrics};
pub use observability::{StatsSnapshot, SyncStats};
