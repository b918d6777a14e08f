//! k-means clustering by federated expectation-maximization.
//!
//! Each site assigns its rows to the nearest current center and returns
//! per-cluster sums and counts. The coordinator adds them up and moves every
//! non-empty center to the mean of its rows. Empty clusters keep their
//! previous center and are never reseeded.

use crate::core::{Error, Result, SiteDescriptor};
use crate::federated::aggregator::{sum_counts, AggregationMethod, Aggregator};
use crate::federated::algorithm::{FederatedAlgorithm, SiteResult, SiteShape};
use crate::federated::driver::RoundDriver;
use crate::site::partition::Partition;
use crate::site::proxy::{ComputeFunction, ComputeRequest, ComputeResponse};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// k-means configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansConfig {
    /// Number of clusters
    pub k: usize,
    /// Number of EM rounds
    pub iterations: usize,
    /// Seed for the initial centers
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 3,
            iterations: 10,
            seed: 0,
        }
    }
}

impl KMeansConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::Configuration("k must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Per-cluster sums and row counts.
///
/// Returned by each site, and also the shape of the round's reduction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterPartial {
    /// Sum of the rows assigned to each cluster, k × d
    pub sums: Vec<Vec<f64>>,
    /// Rows assigned to each cluster
    pub counts: Vec<u64>,
}

impl ClusterPartial {
    /// Total rows across clusters.
    pub fn total_rows(&self) -> u64 {
        self.counts.iter().sum()
    }
}

/// Seeded standard-normal k × d matrix.
pub fn initial_centers(k: usize, dim: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..k)
        .map(|_| (0..dim).map(|_| rng.sample(StandardNormal)).collect())
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the nearest center; ties go to the lowest index.
pub fn nearest_center(row: &[f64], centers: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (index, center) in centers.iter().enumerate() {
        let distance = squared_distance(row, center);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Cluster label of every row.
pub fn assign_labels(partition: &Partition, centers: &[Vec<f64>]) -> Vec<usize> {
    partition
        .rows()
        .iter()
        .map(|row| nearest_center(row, centers))
        .collect()
}

/// Site-local E step: per-cluster sums and counts under the current centers.
///
/// With no centers there is nothing to assign to and the partial is empty.
pub fn e_step(partition: &Partition, centers: &[Vec<f64>]) -> ClusterPartial {
    let dim = partition.column_count();
    let mut sums = vec![vec![0.0; dim]; centers.len()];
    let mut counts = vec![0u64; centers.len()];
    if centers.is_empty() {
        return ClusterPartial { sums, counts };
    }

    for row in partition.rows() {
        let label = nearest_center(row, centers);
        for (acc, value) in sums[label].iter_mut().zip(row) {
            *acc += value;
        }
        counts[label] += 1;
    }

    ClusterPartial { sums, counts }
}

/// M step: move each non-empty center to the mean of its rows.
///
/// A center whose cluster received no rows is copied unchanged.
pub fn m_step(centers: &[Vec<f64>], totals: &ClusterPartial) -> Vec<Vec<f64>> {
    centers
        .iter()
        .zip(totals.sums.iter().zip(&totals.counts))
        .map(|(center, (sum, &count))| {
            if count == 0 {
                center.clone()
            } else {
                sum.iter().map(|s| s / count as f64).collect()
            }
        })
        .collect()
}

/// Site kernel for `eStep`.
pub(crate) fn kernel(
    site: &SiteDescriptor,
    partition: &Partition,
    request: &ComputeRequest,
) -> Result<ComputeResponse> {
    let centers = match request {
        ComputeRequest::EStep { centers } => centers,
        other => return Err(other.mismatch(site, ComputeFunction::EStep)),
    };

    if centers.is_empty() {
        return Err(Error::Configuration(format!(
            "site {}: eStep request carries no centers",
            site
        )));
    }
    if let Some(center) = centers
        .iter()
        .find(|c| c.len() != partition.column_count())
    {
        return Err(Error::DimensionMismatch {
            site: site.id(),
            expected: partition.column_count(),
            actual: center.len(),
        });
    }

    Ok(ComputeResponse::Clusters(e_step(partition, centers)))
}

/// k-means adapter for the round driver.
#[derive(Clone, Debug)]
pub struct KMeans {
    config: KMeansConfig,
}

impl KMeans {
    /// Create an adapter.
    pub fn new(config: KMeansConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &KMeansConfig {
        &self.config
    }
}

impl FederatedAlgorithm for KMeans {
    type Params = Vec<Vec<f64>>;
    type Partial = ClusterPartial;
    type Global = ClusterPartial;

    fn name(&self) -> &'static str {
        "kmeans"
    }

    fn initialize(&self, shapes: &[SiteShape]) -> Result<Self::Params> {
        self.config.validate()?;
        let first = shapes
            .first()
            .ok_or_else(|| Error::Configuration("site list is empty".to_string()))?;

        if let Some(other) = shapes.iter().find(|s| s.shape.columns != first.shape.columns) {
            return Err(Error::Configuration(format!(
                "site {} has columns {:?}, site {} has {:?}",
                other.site, other.shape.columns, first.site, first.shape.columns
            )));
        }

        let dim = first.shape.columns.len();
        if dim == 0 {
            return Err(Error::NoDataOnSite {
                site: first.site.id(),
                reason: "partition has no columns".to_string(),
            });
        }

        Ok(initial_centers(self.config.k, dim, self.config.seed))
    }

    fn request(&self, params: &Self::Params, _round: usize, _site_index: usize) -> ComputeRequest {
        ComputeRequest::EStep {
            centers: params.clone(),
        }
    }

    fn accept(
        &self,
        params: &Self::Params,
        site: &SiteDescriptor,
        response: ComputeResponse,
    ) -> Result<Self::Partial> {
        let partial = response.into_clusters(site)?;
        let k = params.len();
        let dim = params.first().map(Vec::len).unwrap_or(0);

        for actual in [partial.sums.len(), partial.counts.len()] {
            if actual != k {
                return Err(Error::DimensionMismatch {
                    site: site.id(),
                    expected: k,
                    actual,
                });
            }
        }
        if let Some(row) = partial.sums.iter().find(|row| row.len() != dim) {
            return Err(Error::DimensionMismatch {
                site: site.id(),
                expected: dim,
                actual: row.len(),
            });
        }
        if partial.sums.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::NumericDegeneracy(format!(
                "site {} returned non-finite cluster sums",
                site
            )));
        }

        Ok(partial)
    }

    fn aggregate(
        &self,
        params: &Self::Params,
        partials: &[SiteResult<Self::Partial>],
    ) -> Result<Self::Global> {
        let k = params.len();
        let dim = params.first().map(Vec::len).unwrap_or(0);

        let mut sums = Aggregator::new(AggregationMethod::Sum, k * dim);
        for partial in partials {
            sums.submit(&partial.site, partial.value.sums.concat())?;
        }
        let flat = sums.aggregate()?;
        let counts = sum_counts(k, partials.iter().map(|p| p.value.counts.as_slice()))?;

        Ok(ClusterPartial {
            sums: flat.chunks(dim.max(1)).map(<[f64]>::to_vec).collect(),
            counts,
        })
    }

    fn update(&self, params: &Self::Params, global: &Self::Global) -> Result<Self::Params> {
        Ok(m_step(params, global))
    }
}

/// Federated k-means: returns the k × d center matrix after `config.iterations` rounds.
pub async fn run_kmeans(
    driver: &mut RoundDriver,
    sites: &[SiteDescriptor],
    config: &KMeansConfig,
) -> Result<Vec<Vec<f64>>> {
    config.validate()?;
    driver
        .run(&KMeans::new(config.clone()), sites, config.iterations)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition(rows: Vec<Vec<f64>>) -> Partition {
        Partition::new(vec!["a".to_string(), "b".to_string()], rows).unwrap()
    }

    fn site(port: u16) -> SiteDescriptor {
        SiteDescriptor::new("localhost", port)
    }

    #[test]
    fn test_ties_go_to_lowest_index() {
        let centers = vec![vec![1.0, 0.0], vec![-1.0, 0.0], vec![0.0, 1.0]];
        // equidistant from all three
        assert_eq!(nearest_center(&[0.0, 0.0], &centers), 0);
        assert_eq!(nearest_center(&[0.0, 1.0], &centers), 2);
    }

    #[test]
    fn test_e_step_sums_and_counts() {
        let data = partition(vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![10.0, 10.0],
            vec![11.0, 9.0],
        ]);
        let centers = vec![vec![0.0, 0.0], vec![10.0, 10.0]];

        let partial = e_step(&data, &centers);
        assert_eq!(partial.counts, vec![2, 2]);
        assert_eq!(partial.sums, vec![vec![1.0, 1.0], vec![21.0, 19.0]]);
        assert_eq!(partial.total_rows(), 4);
        assert_eq!(assign_labels(&data, &centers), vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_empty_cluster_keeps_center_bits() {
        let centers = vec![vec![0.1, 0.2], vec![0.30000000000000004, -7.25e-300]];
        let totals = ClusterPartial {
            sums: vec![vec![4.0, 6.0], vec![0.0, 0.0]],
            counts: vec![2, 0],
        };

        let next = m_step(&centers, &totals);
        assert_eq!(next[0], vec![2.0, 3.0]);
        assert_eq!(next[1][0].to_bits(), centers[1][0].to_bits());
        assert_eq!(next[1][1].to_bits(), centers[1][1].to_bits());
    }

    #[test]
    fn test_initial_centers_are_seeded() {
        let a = initial_centers(3, 4, 0);
        let b = initial_centers(3, 4, 0);
        let c = initial_centers(3, 4, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 3);
        assert!(a.iter().all(|row| row.len() == 4));
    }

    #[test]
    fn test_kernel_rejects_wrong_dimension() {
        let data = partition(vec![vec![1.0, 2.0]]);
        let request = ComputeRequest::EStep {
            centers: vec![vec![0.0, 0.0, 0.0]],
        };
        let err = kernel(&site(1), &data, &request).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 2,
                actual: 3,
                ..
            }
        ));

        let err = kernel(&site(1), &data, &ComputeRequest::Describe).unwrap_err();
        assert!(matches!(err, Error::EnvelopeMismatch { .. }));
    }

    #[test]
    fn test_aggregate_counts_cover_all_rows() {
        let kmeans = KMeans::new(KMeansConfig {
            k: 2,
            ..Default::default()
        });
        let centers = vec![vec![0.0, 0.0], vec![5.0, 5.0]];
        let a = partition(vec![vec![0.0, 1.0], vec![5.0, 4.0], vec![6.0, 6.0]]);
        let b = partition(vec![vec![-1.0, 0.0], vec![1.0, 0.0]]);

        let partials = vec![
            SiteResult {
                site: site(1),
                value: e_step(&a, &centers),
            },
            SiteResult {
                site: site(2),
                value: e_step(&b, &centers),
            },
        ];
        let totals = kmeans.aggregate(&centers, &partials).unwrap();

        assert_eq!(totals.total_rows(), 5);
        assert_eq!(totals.counts, vec![3, 2]);
        assert_eq!(totals.sums, vec![vec![0.0, 1.0], vec![11.0, 10.0]]);

        let next = kmeans.update(&centers, &totals).unwrap();
        assert_eq!(next[1], vec![5.5, 5.0]);
    }

    #[test]
    fn test_accept_rejects_short_partial() {
        let kmeans = KMeans::new(KMeansConfig::default());
        let centers = vec![vec![0.0, 0.0]; 3];
        let response = ComputeResponse::Clusters(ClusterPartial {
            sums: vec![vec![0.0, 0.0]; 2],
            counts: vec![1, 1],
        });
        let err = kmeans.accept(&centers, &site(1), response).unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_kernel_rejects_empty_centers() {
        let data = partition(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let request = ComputeRequest::EStep { centers: vec![] };
        let err = kernel(&site(7), &data, &request).unwrap_err();
        match err {
            Error::Configuration(reason) => assert!(reason.contains("localhost:7")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(e_step(&data, &[]), ClusterPartial::default());
    }

    #[test]
    fn test_accept_rejects_non_finite_sums() {
        let kmeans = KMeans::new(KMeansConfig {
            k: 2,
            ..Default::default()
        });
        let centers = vec![vec![0.0, 0.0]; 2];
        let response = ComputeResponse::Clusters(ClusterPartial {
            sums: vec![vec![f64::NAN, 1.0], vec![0.0, 0.0]],
            counts: vec![1, 0],
        });
        let err = kmeans.accept(&centers, &site(3), response).unwrap_err();
        assert!(matches!(err, Error::NumericDegeneracy(_)));
        assert!(err.to_string().contains("localhost:3"));
    }

    #[test]
    fn test_zero_k_rejected() {
        let config = KMeansConfig {
            k: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
