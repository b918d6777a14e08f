//! Capability cache for prepared site functions.
//!
//! A function is prepared once per (site, function) and reused across rounds.

use crate::core::{Result, SiteDescriptor};
use crate::site::partition::Partition;
use crate::site::proxy::{ComputeFunction, ComputeRequest, ComputeResponse};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A prepared compute function, run against one partition.
pub type Kernel = fn(&SiteDescriptor, &Partition, &ComputeRequest) -> Result<ComputeResponse>;

/// Cache of prepared kernels keyed by site and function.
#[derive(Default)]
pub struct CapabilityCache {
    entries: RwLock<HashMap<(String, ComputeFunction), Kernel>>,
    preparations: AtomicU64,
}

impl CapabilityCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the kernel for `(site, function)`, preparing it on first use.
    pub async fn get_or_prepare(
        &self,
        site: &SiteDescriptor,
        function: ComputeFunction,
        prepare: impl FnOnce(ComputeFunction) -> Kernel,
    ) -> Kernel {
        let key = (site.id(), function);
        if let Some(kernel) = self.entries.read().await.get(&key) {
            return *kernel;
        }

        let mut entries = self.entries.write().await;
        *entries.entry(key).or_insert_with(|| {
            self.preparations.fetch_add(1, Ordering::Relaxed);
            prepare(function)
        })
    }

    /// Number of preparations performed so far.
    pub fn preparations(&self) -> u64 {
        self.preparations.load(Ordering::Relaxed)
    }

    /// Number of cached entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Drop all prepared kernels for a site.
    pub async fn invalidate(&self, site: &SiteDescriptor) {
        let id = site.id();
        self.entries.write().await.retain(|(site_id, _), _| *site_id != id);
    }
}
