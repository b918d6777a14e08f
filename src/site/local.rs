//! In-process site proxy.
//!
//! Holds one partition per site and runs the compute kernels next to it.
//! Requests and responses are bincode-encoded across the boundary exactly as
//! a remote transport would carry them, so only bounded summaries come back.

use crate::algorithms::{kmeans, logreg, pearson};
use crate::core::{Error, Result, SiteDescriptor};
use crate::site::cache::{CapabilityCache, Kernel};
use crate::site::envelope::{self, DEFAULT_MAX_PAYLOAD_BYTES};
use crate::site::partition::Partition;
use crate::site::proxy::{ComputeFunction, ComputeRequest, ComputeResponse, SiteProxy};
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, trace};

/// Site proxy backed by partitions held in this process.
pub struct LocalSiteProxy {
    partitions: HashMap<String, Partition>,
    cache: CapabilityCache,
    max_payload_bytes: usize,
}

impl Default for LocalSiteProxy {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalSiteProxy {
    /// Create a proxy with no sites.
    pub fn new() -> Self {
        Self {
            partitions: HashMap::new(),
            cache: CapabilityCache::new(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
        }
    }

    /// Create a proxy serving `partitions[i]` at `sites[i]`.
    pub fn from_partitions(sites: Vec<SiteDescriptor>, partitions: Vec<Partition>) -> Result<Self> {
        if sites.len() != partitions.len() {
            return Err(Error::Configuration(format!(
                "{} sites but {} partitions",
                sites.len(),
                partitions.len()
            )));
        }
        let mut proxy = Self::new();
        for (site, partition) in sites.iter().zip(partitions) {
            proxy.add_site(site, partition)?;
        }
        Ok(proxy)
    }

    /// Set the payload limit for both directions.
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Add a site, builder style.
    pub fn with_site(mut self, site: &SiteDescriptor, partition: Partition) -> Result<Self> {
        self.add_site(site, partition)?;
        Ok(self)
    }

    /// Bind a partition to a site.
    pub fn add_site(&mut self, site: &SiteDescriptor, partition: Partition) -> Result<()> {
        let id = site.id();
        if self.partitions.contains_key(&id) {
            return Err(Error::Configuration(format!("site {} already has a partition", id)));
        }
        debug!(site = %id, rows = partition.row_count(), "partition bound");
        self.partitions.insert(id, partition);
        Ok(())
    }

    /// Number of sites served.
    pub fn site_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Prepared kernels, shared across rounds.
    pub fn cache(&self) -> &CapabilityCache {
        &self.cache
    }
}

fn describe(
    site: &SiteDescriptor,
    partition: &Partition,
    request: &ComputeRequest,
) -> Result<ComputeResponse> {
    match request {
        ComputeRequest::Describe => Ok(ComputeResponse::Shape(partition.shape())),
        other => Err(other.mismatch(site, ComputeFunction::Describe)),
    }
}

fn prepare(function: ComputeFunction) -> Kernel {
    match function {
        ComputeFunction::Describe => describe,
        ComputeFunction::EStep => kmeans::kernel,
        ComputeFunction::GradStep => logreg::kernel,
        ComputeFunction::Stats => pearson::kernel,
    }
}

#[async_trait]
impl SiteProxy for LocalSiteProxy {
    async fn execute(
        &self,
        site: &SiteDescriptor,
        request: ComputeRequest,
    ) -> Result<ComputeResponse> {
        let partition = self
            .partitions
            .get(&site.id())
            .ok_or_else(|| Error::SiteUnavailable {
                site: site.id(),
                reason: "no partition bound to this site".to_string(),
            })?;

        let inbound = envelope::encode(&request, self.max_payload_bytes)?;
        let request: ComputeRequest = envelope::decode(&inbound)?;

        let kernel = self
            .cache
            .get_or_prepare(site, request.function(), prepare)
            .await;
        let response = kernel(site, partition, &request)?;

        let outbound = envelope::encode(&response, self.max_payload_bytes)?;
        trace!(
            site = %site,
            function = %request.function(),
            request_bytes = inbound.len(),
            response_bytes = outbound.len(),
            "local call"
        );
        envelope::decode(&outbound)
    }
}
