//! Federated Round Protocol
//!
//! Provides the coordinator side of federated computation:
//! - Pure reduction of per-site partial results
//! - Round driver with all-or-nothing rounds
//! - Ledger of committed rounds

pub mod aggregator;
pub mod algorithm;
pub mod driver;
pub mod ledger;

pub use aggregator::{sum_counts, AggregationMethod, Aggregator};
pub use algorithm::{FederatedAlgorithm, SiteResult, SiteShape};
pub use driver::{DriverConfig, RoundDriver};
pub use ledger::{RoundLedger, RoundRecord};
