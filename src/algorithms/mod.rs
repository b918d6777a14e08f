//! Federated Algorithms
//!
//! Adapters that plug into the round driver:
//! - k-means clustering by expectation-maximization
//! - Logistic regression by synchronous gradient averaging
//! - One-shot Pearson correlation from pooled moments

pub mod coordinator;
pub mod kmeans;
pub mod logreg;
pub mod pearson;

pub use coordinator::Coordinator;
pub use kmeans::{run_kmeans, ClusterPartial, KMeans, KMeansConfig};
pub use logreg::{run_logistic_regression, GradientPartial, LogRegConfig, LogisticRegression};
pub use pearson::{run_pearson, Moments, Pearson, PearsonConfig, PearsonResult};
