//! Logistic regression by synchronous federated averaging.
//!
//! Every epoch each site draws a mini-batch without replacement, computes the
//! logistic-loss gradient against the broadcast weights and returns it. The
//! coordinator takes the unweighted mean of the site gradients and applies one
//! gradient-descent step. Weights carry the bias at index 0.

use crate::core::{Error, Result, SiteDescriptor};
use crate::federated::aggregator::{AggregationMethod, Aggregator};
use crate::federated::algorithm::{FederatedAlgorithm, SiteResult, SiteShape};
use crate::federated::driver::RoundDriver;
use crate::site::partition::Partition;
use crate::site::proxy::{ComputeFunction, ComputeRequest, ComputeResponse};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Logistic-regression configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogRegConfig {
    /// Number of gradient rounds
    pub epochs: usize,
    /// Step size applied to the averaged gradient
    pub learning_rate: f64,
    /// Rows per site per epoch
    pub batch_size: usize,
    /// Column holding the 0/1 label; every other column is a feature
    pub label_column: String,
    /// Seed for the batch-draw schedule
    pub seed: u64,
}

impl Default for LogRegConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            learning_rate: 0.1,
            batch_size: 32,
            label_column: "y".to_string(),
            seed: 0,
        }
    }
}

impl LogRegConfig {
    /// Check the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "batch size must be at least 1".to_string(),
            ));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(Error::Configuration(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.label_column.is_empty() {
            return Err(Error::Configuration("label column is empty".to_string()));
        }
        Ok(())
    }
}

/// Gradient of one site's mini-batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientPartial {
    pub gradient: Vec<f64>,
    pub batch_size: usize,
}

/// Seed of the batch drawn by `site_index` in `epoch`.
pub fn batch_seed(seed: u64, epoch: usize, site_index: usize) -> u64 {
    let mut z = seed
        ^ (epoch as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (site_index as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Row indices of a uniform batch drawn without replacement.
pub fn draw_batch(rows: usize, batch_size: usize, seed: u64) -> Result<Vec<usize>> {
    if batch_size == 0 || batch_size > rows {
        return Err(Error::Configuration(format!(
            "batch size {} does not fit a partition of {} rows",
            batch_size, rows
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    Ok(index::sample(&mut rng, rows, batch_size).into_vec())
}

/// Logistic function.
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Feature columns: every column except the label, in partition order.
pub fn feature_columns<'a>(columns: &'a [String], label_column: &str) -> Vec<&'a str> {
    columns
        .iter()
        .map(String::as_str)
        .filter(|c| *c != label_column)
        .collect()
}

/// Logistic-loss gradient over the given rows, bias column prepended.
///
/// `Xbᵀ(σ(Xb·w) − yb) / |batch|`
pub fn batch_gradient(
    partition: &Partition,
    label_column: &str,
    weights: &[f64],
    batch: &[usize],
) -> Option<Vec<f64>> {
    let label = partition.column_index(label_column)?;
    let features: Vec<usize> = (0..partition.column_count())
        .filter(|&i| i != label)
        .collect();
    if weights.len() != features.len() + 1 || batch.is_empty() {
        return None;
    }

    let mut gradient = vec![0.0; weights.len()];
    for &row_index in batch {
        let row = partition.rows().get(row_index)?;
        let z = weights[0]
            + features
                .iter()
                .zip(&weights[1..])
                .map(|(&f, w)| row[f] * w)
                .sum::<f64>();
        let residual = sigmoid(z) - row[label];

        gradient[0] += residual;
        for (g, &f) in gradient[1..].iter_mut().zip(&features) {
            *g += residual * row[f];
        }
    }

    let n = batch.len() as f64;
    gradient.iter_mut().for_each(|g| *g /= n);
    Some(gradient)
}

/// Site-local gradient step.
pub fn gradient_step(
    site: &SiteDescriptor,
    partition: &Partition,
    weights: &[f64],
    batch_size: usize,
    label_column: &str,
    seed: u64,
) -> Result<GradientPartial> {
    if partition.column_index(label_column).is_none() {
        return Err(Error::NoDataOnSite {
            site: site.id(),
            reason: format!("missing label column '{}'", label_column),
        });
    }
    let expected = partition.column_count();
    if weights.len() != expected {
        return Err(Error::DimensionMismatch {
            site: site.id(),
            expected,
            actual: weights.len(),
        });
    }

    let batch = draw_batch(partition.row_count(), batch_size, seed).map_err(|e| match e {
        Error::Configuration(reason) => {
            Error::Configuration(format!("site {}: {}", site.id(), reason))
        }
        other => other,
    })?;

    let gradient = batch_gradient(partition, label_column, weights, &batch)
        .ok_or_else(|| Error::Internal(format!("gradient failed on site {}", site.id())))?;

    Ok(GradientPartial {
        gradient,
        batch_size,
    })
}

/// Site kernel for `gradStep`.
pub(crate) fn kernel(
    site: &SiteDescriptor,
    partition: &Partition,
    request: &ComputeRequest,
) -> Result<ComputeResponse> {
    match request {
        ComputeRequest::GradStep {
            weights,
            batch_size,
            label_column,
            seed,
        } => gradient_step(site, partition, weights, *batch_size, label_column, *seed)
            .map(ComputeResponse::Gradient),
        other => Err(other.mismatch(site, ComputeFunction::GradStep)),
    }
}

/// Logistic-regression adapter for the round driver.
#[derive(Clone, Debug)]
pub struct LogisticRegression {
    config: LogRegConfig,
}

impl LogisticRegression {
    /// Create an adapter.
    pub fn new(config: LogRegConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LogRegConfig {
        &self.config
    }
}

impl FederatedAlgorithm for LogisticRegression {
    type Params = Vec<f64>;
    type Partial = GradientPartial;
    type Global = Vec<f64>;

    fn name(&self) -> &'static str {
        "logistic_regression"
    }

    fn initialize(&self, shapes: &[SiteShape]) -> Result<Self::Params> {
        self.config.validate()?;
        let label = self.config.label_column.as_str();

        let first = shapes
            .first()
            .ok_or_else(|| Error::Configuration("site list is empty".to_string()))?;
        let expected = feature_columns(&first.shape.columns, label);

        for entry in shapes {
            if !entry.shape.has_column(label) {
                return Err(Error::NoDataOnSite {
                    site: entry.site.id(),
                    reason: format!("missing label column '{}'", label),
                });
            }
            if self.config.batch_size > entry.shape.rows {
                return Err(Error::Configuration(format!(
                    "batch size {} exceeds the {} rows of site {}",
                    self.config.batch_size, entry.shape.rows, entry.site
                )));
            }

            let features = feature_columns(&entry.shape.columns, label);
            if features != expected {
                return Err(Error::Configuration(format!(
                    "site {} has features {:?}, site {} has {:?}",
                    entry.site, features, first.site, expected
                )));
            }
        }

        Ok(vec![0.0; expected.len() + 1])
    }

    fn request(&self, params: &Self::Params, round: usize, site_index: usize) -> ComputeRequest {
        ComputeRequest::GradStep {
            weights: params.clone(),
            batch_size: self.config.batch_size,
            label_column: self.config.label_column.clone(),
            seed: batch_seed(self.config.seed, round, site_index),
        }
    }

    fn accept(
        &self,
        params: &Self::Params,
        site: &SiteDescriptor,
        response: ComputeResponse,
    ) -> Result<Self::Partial> {
        let partial = response.into_gradient(site)?;
        if partial.gradient.len() != params.len() {
            return Err(Error::DimensionMismatch {
                site: site.id(),
                expected: params.len(),
                actual: partial.gradient.len(),
            });
        }
        if partial.gradient.iter().any(|g| !g.is_finite()) {
            return Err(Error::NumericDegeneracy(format!(
                "site {} returned a non-finite gradient",
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
        // unweighted: every site counts once regardless of its row count
        let mut mean = Aggregator::new(AggregationMethod::Mean, params.len());
        for partial in partials {
            mean.submit(&partial.site, partial.value.gradient.clone())?;
        }
        mean.aggregate()
    }

    fn update(&self, params: &Self::Params, global: &Self::Global) -> Result<Self::Params> {
        let rate = self.config.learning_rate;
        Ok(params
            .iter()
            .zip(global)
            .map(|(w, g)| w - rate * g)
            .collect())
    }
}

/// Federated logistic regression: returns the weight vector, bias first.
pub async fn run_logistic_regression(
    driver: &mut RoundDriver,
    sites: &[SiteDescriptor],
    config: &LogRegConfig,
) -> Result<Vec<f64>> {
    config.validate()?;
    driver
        .run(&LogisticRegression::new(config.clone()), sites, config.epochs)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::partition::PartitionShape;

    fn site() -> SiteDescriptor {
        SiteDescriptor::new("localhost", 8080)
    }

    fn data() -> Partition {
        Partition::from_columns(vec![
            ("x", vec![1.0, -1.0, 2.0, -2.0]),
            ("y", vec![1.0, 0.0, 1.0, 0.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!(sigmoid(800.0) <= 1.0);
    }

    #[test]
    fn test_gradient_at_zero_weights() {
        let partition = data();
        let gradient = batch_gradient(&partition, "y", &[0.0, 0.0], &[0, 1, 2, 3]).unwrap();
        // residuals are -0.5, 0.5, -0.5, 0.5
        assert!((gradient[0] - 0.0).abs() < 1e-15);
        assert!((gradient[1] - (-0.5 - 0.5 - 1.0 - 1.0) / 4.0).abs() < 1e-15);
    }

    #[test]
    fn test_draw_batch_without_replacement() {
        let batch = draw_batch(50, 20, 7).unwrap();
        let mut sorted = batch.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 20);
        assert!(batch.iter().all(|&i| i < 50));
        assert_eq!(batch, draw_batch(50, 20, 7).unwrap());
    }

    #[test]
    fn test_batch_larger_than_partition() {
        let err = gradient_step(&site(), &data(), &[0.0, 0.0], 5, "y", 1).unwrap_err();
        match err {
            Error::Configuration(reason) => assert!(reason.contains("localhost:8080")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_label_column() {
        let err = gradient_step(&site(), &data(), &[0.0, 0.0], 2, "label", 1).unwrap_err();
        assert!(matches!(err, Error::NoDataOnSite { .. }));
    }

    #[test]
    fn test_batch_seed_varies() {
        assert_ne!(batch_seed(0, 1, 0), batch_seed(0, 2, 0));
        assert_ne!(batch_seed(0, 1, 0), batch_seed(0, 1, 1));
        assert_ne!(batch_seed(0, 1, 0), batch_seed(1, 1, 0));
        assert_eq!(batch_seed(3, 4, 5), batch_seed(3, 4, 5));
    }

    #[test]
    fn test_unweighted_mean_and_update() {
        let logreg = LogisticRegression::new(LogRegConfig {
            learning_rate: 0.5,
            ..Default::default()
        });
        let params = vec![1.0, 1.0];
        let partials = vec![
            SiteResult {
                site: SiteDescriptor::new("localhost", 1),
                value: GradientPartial {
                    gradient: vec![2.0, 0.0],
                    batch_size: 500,
                },
            },
            SiteResult {
                site: SiteDescriptor::new("localhost", 2),
                value: GradientPartial {
                    gradient: vec![0.0, 4.0],
                    batch_size: 5,
                },
            },
        ];

        let mean = logreg.aggregate(&params, &partials).unwrap();
        assert_eq!(mean, vec![1.0, 2.0]);
        assert_eq!(logreg.update(&params, &mean).unwrap(), vec![0.5, 0.0]);
    }

    #[test]
    fn test_initialize_checks_sites() {
        let logreg = LogisticRegression::new(LogRegConfig {
            batch_size: 10,
            ..Default::default()
        });
        let shape = |rows: usize, columns: &[&str]| PartitionShape {
            rows,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        };
        let entry = |port: u16, shape: PartitionShape| SiteShape {
            site: SiteDescriptor::new("localhost", port),
            shape,
        };

        let weights = logreg
            .initialize(&[
                entry(1, shape(20, &["a", "b", "y"])),
                entry(2, shape(30, &["a", "b", "y"])),
            ])
            .unwrap();
        assert_eq!(weights, vec![0.0; 3]);

        let err = logreg
            .initialize(&[entry(1, shape(20, &["a", "y"])), entry(2, shape(30, &["b", "y"]))])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = logreg
            .initialize(&[entry(1, shape(5, &["a", "y"]))])
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));

        let err = logreg
            .initialize(&[entry(1, shape(20, &["a", "b"]))])
            .unwrap_err();
        assert_eq!(err.site(), Some("localhost:1"));
    }
}
