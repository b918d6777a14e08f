//! The contract between the round driver and an algorithm adapter.

use crate::core::{Result, SiteDescriptor};
use crate::site::partition::PartitionShape;
use crate::site::proxy::{ComputeRequest, ComputeResponse};
use serde::Serialize;

/// Shape reported by one site before the first round.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteShape {
    pub site: SiteDescriptor,
    pub shape: PartitionShape,
}

/// A per-site value tagged with the site that produced it.
#[derive(Clone, Debug, PartialEq)]
pub struct SiteResult<T> {
    pub site: SiteDescriptor,
    pub value: T,
}

/// An algorithm expressed as per-site compute plus a reduction and an update rule.
///
/// The driver owns the parameters between rounds; adapters only map
/// parameters to requests, responses to partial results, partial results
/// to a global result, and a global result to the next parameters.
pub trait FederatedAlgorithm: Send + Sync {
    /// Global parameters broadcast each round.
    type Params: Clone + Serialize + Send + Sync;
    /// What one site contributes to a round.
    type Partial: Send;
    /// The reduction of all partials of a round.
    type Global: Send;

    /// Algorithm name for logs, errors and the ledger.
    fn name(&self) -> &'static str;

    /// Build the initial parameters from the reported site shapes.
    fn initialize(&self, shapes: &[SiteShape]) -> Result<Self::Params>;

    /// Request for the site at `site_index` in `round`.
    fn request(&self, params: &Self::Params, round: usize, site_index: usize) -> ComputeRequest;

    /// Validate a site's response against the current parameters.
    fn accept(
        &self,
        params: &Self::Params,
        site: &SiteDescriptor,
        response: ComputeResponse,
    ) -> Result<Self::Partial>;

    /// Reduce all partials of a round.
    fn aggregate(
        &self,
        params: &Self::Params,
        partials: &[SiteResult<Self::Partial>],
    ) -> Result<Self::Global>;

    /// Next parameters from the current ones and the round's global result.
    fn update(&self, params: &Self::Params, global: &Self::Global) -> Result<Self::Params>;
}
