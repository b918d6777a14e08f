//! Round driver.
//!
//! Broadcasts parameters, collects one partial result per site, reduces
//! them and commits the update. A round either completes on every site or
//! changes nothing.

use crate::core::{Error, Result, SiteDescriptor};
use crate::federated::algorithm::{FederatedAlgorithm, SiteResult, SiteShape};
use crate::federated::ledger::RoundLedger;
use crate::monitoring::metrics::FederationMetrics;
use crate::site::proxy::{ComputeRequest, ComputeResponse, SiteProxy};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Round driver configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// How long a single site call may take before the round is abandoned
    pub site_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            site_timeout_ms: 60_000,
        }
    }
}

/// Drives federated algorithms round by round.
pub struct RoundDriver {
    proxy: Arc<dyn SiteProxy>,
    config: DriverConfig,
    metrics: Arc<FederationMetrics>,
    ledger: RoundLedger,
}

impl RoundDriver {
    /// Create a driver that reaches sites through `proxy`.
    pub fn new(proxy: Arc<dyn SiteProxy>) -> Self {
        Self {
            proxy,
            config: DriverConfig::default(),
            metrics: Arc::new(FederationMetrics::new()),
            ledger: RoundLedger::new(),
        }
    }

    /// Set configuration.
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Share a metric set with other components.
    pub fn with_metrics(mut self, metrics: Arc<FederationMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Metrics recorded by this driver.
    pub fn metrics(&self) -> &Arc<FederationMetrics> {
        &self.metrics
    }

    /// Committed rounds.
    pub fn ledger(&self) -> &RoundLedger {
        &self.ledger
    }

    /// Ask every site for its partition shape (round 0).
    pub async fn describe(
        &self,
        algorithm: &'static str,
        sites: &[SiteDescriptor],
    ) -> Result<Vec<SiteShape>> {
        ensure_sites(sites)?;

        let calls = sites.iter().map(|site| async move {
            let shape = self
                .call(algorithm, 0, site, ComputeRequest::Describe)
                .await
                .and_then(|response| response.into_shape(site))
                .and_then(|shape| {
                    if shape.rows == 0 {
                        Err(Error::NoDataOnSite {
                            site: site.id(),
                            reason: "partition has zero rows".to_string(),
                        })
                    } else {
                        Ok(shape)
                    }
                })
                .map_err(|e| Error::round_aborted(algorithm, 0, Some(site.id()), e))?;

            Ok::<_, Error>(SiteShape {
                site: site.clone(),
                shape,
            })
        });

        try_join_all(calls).await
    }

    /// Describe all sites and build the initial parameters.
    pub async fn initialize<A: FederatedAlgorithm>(
        &self,
        algorithm: &A,
        sites: &[SiteDescriptor],
    ) -> Result<A::Params> {
        let shapes = self.describe(algorithm.name(), sites).await?;
        algorithm.initialize(&shapes).map_err(|e| {
            let site = e.site().map(str::to_string);
            Error::round_aborted(algorithm.name(), 0, site, e)
        })
    }

    /// Fan out one round and collect every site's partial result, in site order.
    ///
    /// The first failing site abandons the round; calls still in flight are dropped.
    pub async fn run_round<A: FederatedAlgorithm>(
        &self,
        algorithm: &A,
        sites: &[SiteDescriptor],
        params: &A::Params,
        round: usize,
    ) -> Result<Vec<SiteResult<A::Partial>>> {
        ensure_sites(sites)?;
        let name = algorithm.name();

        let calls = sites.iter().enumerate().map(|(index, site)| async move {
            self.collect(algorithm, site, params, round, index)
                .await
                .map(|value| SiteResult {
                    site: site.clone(),
                    value,
                })
                .map_err(|e| Error::round_aborted(name, round, Some(site.id()), e))
        });

        try_join_all(calls).await
    }

    /// Run, reduce and commit one round.
    ///
    /// Returns the next parameters and the round's global result. On error
    /// nothing is committed and the caller's parameters stay current.
    pub async fn step<A: FederatedAlgorithm>(
        &mut self,
        run_id: Uuid,
        algorithm: &A,
        sites: &[SiteDescriptor],
        params: &A::Params,
        round: usize,
    ) -> Result<(A::Params, A::Global)> {
        let name = algorithm.name();
        let started = Instant::now();

        let outcome = self
            .run_round(algorithm, sites, params, round)
            .await
            .and_then(|partials| {
                let global = algorithm.aggregate(params, &partials)?;
                let next = algorithm.update(params, &global)?;
                Ok((next, global))
            })
            .map_err(|e| {
                let site = e.site().map(str::to_string);
                Error::round_aborted(name, round, site, e)
            });

        match outcome {
            Ok((next, global)) => {
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let record = self
                    .ledger
                    .record(run_id, name, round, sites.len(), &next, elapsed_ms)?;
                debug!(
                    round,
                    elapsed_ms,
                    digest = %record.params_digest,
                    "round committed"
                );
                self.metrics.rounds_completed.inc();
                Ok((next, global))
            }
            Err(e) => {
                self.metrics.rounds_aborted.inc();
                warn!(round, error = %e, "round aborted");
                Err(e)
            }
        }
    }

    /// Initialize and run `iterations` rounds, returning the final parameters.
    pub async fn run<A: FederatedAlgorithm>(
        &mut self,
        algorithm: &A,
        sites: &[SiteDescriptor],
        iterations: usize,
    ) -> Result<A::Params> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "federated_run",
            algorithm = algorithm.name(),
            %run_id,
            sites = sites.len()
        );

        async move {
            info!(iterations, "run started");
            let mut params = self.initialize(algorithm, sites).await?;
            for round in 1..=iterations {
                let (next, _) = self.step(run_id, algorithm, sites, &params, round).await?;
                params = next;
            }
            info!("run finished");
            Ok(params)
        }
        .instrument(span)
        .await
    }

    /// Initialize and run a single round, returning its global result.
    pub async fn run_once<A: FederatedAlgorithm>(
        &mut self,
        algorithm: &A,
        sites: &[SiteDescriptor],
    ) -> Result<A::Global> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "federated_run",
            algorithm = algorithm.name(),
            %run_id,
            sites = sites.len()
        );

        async move {
            let params = self.initialize(algorithm, sites).await?;
            let (_, global) = self.step(run_id, algorithm, sites, &params, 1).await?;
            info!("run finished");
            Ok(global)
        }
        .instrument(span)
        .await
    }

    async fn collect<A: FederatedAlgorithm>(
        &self,
        algorithm: &A,
        site: &SiteDescriptor,
        params: &A::Params,
        round: usize,
        index: usize,
    ) -> Result<A::Partial> {
        let request = algorithm.request(params, round, index);
        let response = self.call(algorithm.name(), round, site, request).await?;
        algorithm.accept(params, site, response)
    }

    async fn call(
        &self,
        algorithm: &'static str,
        round: usize,
        site: &SiteDescriptor,
        request: ComputeRequest,
    ) -> Result<ComputeResponse> {
        let function = request.function();
        let timeout = Duration::from_millis(self.config.site_timeout_ms);
        let started = Instant::now();
        self.metrics.site_calls.inc();

        let outcome = match tokio::time::timeout(timeout, self.proxy.execute(site, request)).await {
            Ok(result) => result,
            Err(_) => Err(Error::SiteUnavailable {
                site: site.id(),
                reason: format!("no answer within {} ms", self.config.site_timeout_ms),
            }),
        };

        let elapsed = started.elapsed();
        self.metrics.site_latency.observe(elapsed.as_secs_f64());
        match &outcome {
            Ok(_) => debug!(
                algorithm,
                round,
                site = %site,
                %function,
                elapsed_ms = elapsed.as_millis() as u64,
                "site answered"
            ),
            Err(e) => {
                self.metrics.site_failures.inc();
                warn!(algorithm, round, site = %site, %function, error = %e, "site call failed");
            }
        }
        outcome
    }
}

fn ensure_sites(sites: &[SiteDescriptor]) -> Result<()> {
    if sites.is_empty() {
        return Err(Error::Configuration("site list is empty".to_string()));
    }

    let mut seen = HashSet::new();
    if let Some(duplicate) = sites.iter().find(|site| !seen.insert(site.id())) {
        return Err(Error::Configuration(format!(
            "site {} listed more than once",
            duplicate
        )));
    }
    Ok(())
}
