//! Prometheus-style metrics for federated runs.
//!
//! Provides counters, a latency histogram and the federation metric set.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric (monotonically increasing).
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    /// Create a new counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A histogram with cumulative buckets.
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<f64>,
    bucket_counts: Vec<AtomicU64>,
    sum_bits: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a histogram with latency buckets in seconds.
    pub fn new() -> Self {
        Self::with_buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0])
    }

    /// Create with custom buckets.
    pub fn with_buckets(buckets: Vec<f64>) -> Self {
        let bucket_counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            bucket_counts,
            sum_bits: AtomicU64::new(0f64.to_bits()),
            count: AtomicU64::new(0),
        }
    }

    /// Observe a value.
    pub fn observe(&self, value: f64) {
        for (bound, count) in self.buckets.iter().zip(&self.bucket_counts) {
            if value <= *bound {
                count.fetch_add(1, Ordering::Relaxed);
            }
        }

        // CAS loop: concurrent observations are never lost
        let _ = self
            .sum_bits
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + value).to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get observation count.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get sum of observations.
    pub fn sum(&self) -> f64 {
        f64::from_bits(self.sum_bits.load(Ordering::Relaxed))
    }

    /// Cumulative count for each bucket bound.
    pub fn bucket_counts(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .zip(&self.bucket_counts)
            .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the federation metrics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub rounds_completed: u64,
    pub rounds_aborted: u64,
    pub site_calls: u64,
    pub site_failures: u64,
    pub site_latency_seconds_sum: f64,
    pub site_latency_seconds_count: u64,
}

/// Metrics recorded by the round driver.
#[derive(Debug, Default)]
pub struct FederationMetrics {
    /// Rounds that committed an update
    pub rounds_completed: Counter,
    /// Rounds abandoned because a site or reduction failed
    pub rounds_aborted: Counter,
    /// Site calls issued
    pub site_calls: Counter,
    /// Site calls that failed or timed out
    pub site_failures: Counter,
    /// Latency of site calls in seconds
    pub site_latency: Histogram,
}

impl FederationMetrics {
    /// Create an empty metric set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rounds_completed: self.rounds_completed.get(),
            rounds_aborted: self.rounds_aborted.get(),
            site_calls: self.site_calls.get(),
            site_failures: self.site_failures.get(),
            site_latency_seconds_sum: self.site_latency.sum(),
            site_latency_seconds_count: self.site_latency.count(),
        }
    }

    /// Export metrics in Prometheus text format.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();
        let counters = [
            ("fedstat_rounds_completed_total", "Rounds committed", &self.rounds_completed),
            ("fedstat_rounds_aborted_total", "Rounds abandoned", &self.rounds_aborted),
            ("fedstat_site_calls_total", "Site calls issued", &self.site_calls),
            ("fedstat_site_failures_total", "Site calls failed", &self.site_failures),
        ];
        for (name, help, counter) in counters {
            output.push_str(&format!("# HELP {} {}\n", name, help));
            output.push_str(&format!("# TYPE {} counter\n", name));
            output.push_str(&format!("{} {}\n", name, counter.get()));
        }

        let name = "fedstat_site_latency_seconds";
        output.push_str(&format!("# HELP {} Latency of site calls\n", name));
        output.push_str(&format!("# TYPE {} histogram\n", name));
        for (bound, count) in self.site_latency.bucket_counts() {
            output.push_str(&format!("{}_bucket{{le=\"{}\"}} {}\n", name, bound, count));
        }
        output.push_str(&format!(
            "{}_bucket{{le=\"+Inf\"}} {}\n",
            name,
            self.site_latency.count()
        ));
        output.push_str(&format!("{}_sum {}\n", name, self.site_latency.sum()));
        output.push_str(&format!("{}_count {}\n", name, self.site_latency.count()));

        output
    }
}
