//! SiteProxy trait and the typed envelopes exchanged with sites.
//!
//! The aggregation core talks to sites only through this contract.

use crate::algorithms::kmeans::ClusterPartial;
use crate::algorithms::logreg::GradientPartial;
use crate::algorithms::pearson::Moments;
use crate::core::{Error, Result, SiteDescriptor};
use crate::site::partition::PartitionShape;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Named compute functions a site can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputeFunction {
    /// Report partition shape
    Describe,
    /// k-means assignment step
    EStep,
    /// Logistic-regression mini-batch gradient
    GradStep,
    /// Pearson sufficient statistics
    Stats,
}

impl ComputeFunction {
    /// Wire name of the function.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeFunction::Describe => "describe",
            ComputeFunction::EStep => "eStep",
            ComputeFunction::GradStep => "gradStep",
            ComputeFunction::Stats => "stats",
        }
    }
}

impl std::fmt::Display for ComputeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Arguments for one compute call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ComputeRequest {
    Describe,
    EStep {
        /// Current centers, k rows of d coordinates
        centers: Vec<Vec<f64>>,
    },
    GradStep {
        /// Current weights, bias first
        weights: Vec<f64>,
        /// Rows to draw without replacement
        batch_size: usize,
        /// Column holding the 0/1 label
        label_column: String,
        /// Seed for the batch draw
        seed: u64,
    },
    Stats {
        x_column: String,
        y_column: String,
    },
}

impl ComputeRequest {
    /// The function this request invokes.
    pub fn function(&self) -> ComputeFunction {
        match self {
            ComputeRequest::Describe => ComputeFunction::Describe,
            ComputeRequest::EStep { .. } => ComputeFunction::EStep,
            ComputeRequest::GradStep { .. } => ComputeFunction::GradStep,
            ComputeRequest::Stats { .. } => ComputeFunction::Stats,
        }
    }

    /// Error for a kernel handed a request it does not serve.
    pub fn mismatch(&self, site: &SiteDescriptor, expected: ComputeFunction) -> Error {
        Error::EnvelopeMismatch {
            site: site.id(),
            expected: expected.as_str(),
            actual: self.function().as_str(),
        }
    }
}

/// Result envelope returned by a site.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ComputeResponse {
    Shape(PartitionShape),
    Clusters(ClusterPartial),
    Gradient(GradientPartial),
    Moments(Moments),
}

impl ComputeResponse {
    /// Variant name, for error reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            ComputeResponse::Shape(_) => "shape",
            ComputeResponse::Clusters(_) => "clusters",
            ComputeResponse::Gradient(_) => "gradient",
            ComputeResponse::Moments(_) => "moments",
        }
    }

    /// Unwrap a shape envelope.
    pub fn into_shape(self, site: &SiteDescriptor) -> Result<PartitionShape> {
        match self {
            ComputeResponse::Shape(shape) => Ok(shape),
            other => Err(mismatch(site, "shape", &other)),
        }
    }

    /// Unwrap a clusters envelope.
    pub fn into_clusters(self, site: &SiteDescriptor) -> Result<ClusterPartial> {
        match self {
            ComputeResponse::Clusters(partial) => Ok(partial),
            other => Err(mismatch(site, "clusters", &other)),
        }
    }

    /// Unwrap a gradient envelope.
    pub fn into_gradient(self, site: &SiteDescriptor) -> Result<GradientPartial> {
        match self {
            ComputeResponse::Gradient(partial) => Ok(partial),
            other => Err(mismatch(site, "gradient", &other)),
        }
    }

    /// Unwrap a moments envelope.
    pub fn into_moments(self, site: &SiteDescriptor) -> Result<Moments> {
        match self {
            ComputeResponse::Moments(moments) => Ok(moments),
            other => Err(mismatch(site, "moments", &other)),
        }
    }
}

fn mismatch(site: &SiteDescriptor, expected: &'static str, actual: &ComputeResponse) -> Error {
    Error::EnvelopeMismatch {
        site: site.id(),
        expected,
        actual: actual.kind(),
    }
}

/// Handle to remote data partitions.
///
/// Implementations run a deterministic compute function against the
/// partition behind `site` and return only the summary it produces.
/// Retries, sessions and function caching belong to the implementation.
#[async_trait]
pub trait SiteProxy: Send + Sync {
    /// Execute one compute call on one site.
    async fn execute(&self, site: &SiteDescriptor, request: ComputeRequest)
        -> Result<ComputeResponse>;
}
