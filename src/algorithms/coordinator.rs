//! Coordinator: one federation, several analyses.
//!
//! Binds a site proxy, a site list and the algorithm settings from a
//! [`FederationConfig`], and shares one driver (with its metrics and ledger)
//! across every run.

use crate::algorithms::kmeans::run_kmeans;
use crate::algorithms::logreg::run_logistic_regression;
use crate::algorithms::pearson::{run_pearson, PearsonResult};
use crate::config::FederationConfig;
use crate::core::{Result, SiteDescriptor};
use crate::federated::driver::RoundDriver;
use crate::federated::ledger::RoundLedger;
use crate::monitoring::metrics::FederationMetrics;
use crate::site::proxy::SiteProxy;
use std::sync::Arc;
use tracing::info;

/// Runs the federated analyses of one configuration.
pub struct Coordinator {
    config: FederationConfig,
    driver: RoundDriver,
}

impl Coordinator {
    /// Create a coordinator from a validated configuration.
    pub fn from_config(proxy: Arc<dyn SiteProxy>, config: FederationConfig) -> Result<Self> {
        config.validate()?;
        let driver = RoundDriver::new(proxy).with_config(config.driver.clone());
        info!(sites = config.sites.len(), "coordinator ready");
        Ok(Self { config, driver })
    }

    /// Share a metric set with other components.
    pub fn with_metrics(mut self, metrics: Arc<FederationMetrics>) -> Self {
        self.driver = self.driver.with_metrics(metrics);
        self
    }

    /// Federation the coordinator was built from.
    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    /// Sites taking part, in round order.
    pub fn sites(&self) -> &[SiteDescriptor] {
        &self.config.sites
    }

    /// Counters shared with the driver.
    pub fn metrics(&self) -> &Arc<FederationMetrics> {
        self.driver.metrics()
    }

    /// Rounds committed by every run so far.
    pub fn ledger(&self) -> &RoundLedger {
        self.driver.ledger()
    }

    /// Cluster centers, k × d.
    pub async fn kmeans(&mut self) -> Result<Vec<Vec<f64>>> {
        run_kmeans(&mut self.driver, &self.config.sites, &self.config.kmeans).await
    }

    /// Weight vector, bias first.
    pub async fn logistic_regression(&mut self) -> Result<Vec<f64>> {
        run_logistic_regression(&mut self.driver, &self.config.sites, &self.config.logreg).await
    }

    /// Pooled row count and correlation coefficient.
    pub async fn pearson(&mut self) -> Result<PearsonResult> {
        run_pearson(&mut self.driver, &self.config.sites, &self.config.pearson).await
    }
}
