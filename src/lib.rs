//! # fedstat - Federated statistics over autonomous data sites
//!
//! Sites keep their rows; a coordinator sends parameters out, gets bounded
//! numeric summaries back and reduces them:
//! - **k-means** clustering by expectation-maximization
//! - **Logistic regression** by synchronous gradient averaging
//! - **Pearson correlation** from pooled sufficient statistics
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fedstat::algorithms::{run_pearson, PearsonConfig};
//! use fedstat::federated::RoundDriver;
//! use fedstat::site::{synthetic, LocalSiteProxy};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let (sites, partitions) = synthetic::toy_sites(3, 8080).unwrap();
//!     let proxy = LocalSiteProxy::from_partitions(sites.clone(), partitions).unwrap();
//!     let mut driver = RoundDriver::new(Arc::new(proxy));
//!
//!     let result = run_pearson(&mut driver, &sites, &PearsonConfig::default())
//!         .await
//!         .unwrap();
//!     println!("N = {}, r = {:.4}", result.total_rows, result.r);
//! }
//! ```

pub mod algorithms;
pub mod config;
pub mod core;
pub mod federated;
pub mod monitoring;
pub mod site;

pub use crate::core::error::{Error, Result};
