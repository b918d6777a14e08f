//! Monitoring Module
//!
//! Provides observability for federated runs:
//! - Prometheus-style metrics
//! - Structured logging setup

pub mod logging;
pub mod metrics;

pub use logging::{init_tracing, LogFormat, LogLevel, LoggingConfig};
pub use metrics::{Counter, FederationMetrics, Histogram, MetricsSnapshot};
