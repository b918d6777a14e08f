//! Reduction of per-site partial results.
//!
//! Pure and local: no site is contacted here.

use crate::core::{Error, Result, SiteDescriptor};
use serde::{Deserialize, Serialize};

/// Reduction operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    /// Elementwise sum
    Sum,
    /// Unweighted elementwise arithmetic mean
    Mean,
}

/// One site's contribution to a round.
#[derive(Clone, Debug)]
struct Contribution {
    site_id: String,
    values: Vec<f64>,
}

/// Collects fixed-length vectors from sites and reduces them.
///
/// Contributions are reduced in submission order so a round reduces to the
/// same bits regardless of which site answered first.
#[derive(Clone, Debug)]
pub struct Aggregator {
    /// Reduction operator
    pub method: AggregationMethod,
    dim: usize,
    contributions: Vec<Contribution>,
}

impl Aggregator {
    /// Create an aggregator for vectors of length `dim`.
    pub fn new(method: AggregationMethod, dim: usize) -> Self {
        Self {
            method,
            dim,
            contributions: Vec::new(),
        }
    }

    /// Submit one site's vector.
    pub fn submit(&mut self, site: &SiteDescriptor, values: Vec<f64>) -> Result<()> {
        if values.len() != self.dim {
            return Err(Error::DimensionMismatch {
                site: site.id(),
                expected: self.dim,
                actual: values.len(),
            });
        }

        let site_id = site.id();
        if self.contributions.iter().any(|c| c.site_id == site_id) {
            return Err(Error::Configuration(format!(
                "site {} contributed twice in one round",
                site_id
            )));
        }

        self.contributions.push(Contribution { site_id, values });
        Ok(())
    }

    /// Reduce all contributions.
    pub fn aggregate(&self) -> Result<Vec<f64>> {
        if self.contributions.is_empty() {
            return Err(Error::Configuration(
                "nothing to aggregate: no site contributed".to_string(),
            ));
        }

        let mut reduced = vec![0.0; self.dim];
        for contribution in &self.contributions {
            for (acc, value) in reduced.iter_mut().zip(&contribution.values) {
                *acc += value;
            }
        }

        if self.method == AggregationMethod::Mean {
            let n = self.contributions.len() as f64;
            for acc in &mut reduced {
                *acc /= n;
            }
        }

        Ok(reduced)
    }

    /// Number of contributions so far.
    pub fn contribution_count(&self) -> usize {
        self.contributions.len()
    }

    /// Vector length this aggregator accepts.
    pub fn dim(&self) -> usize {
        self.dim
    }
}

/// Elementwise sum of integer count vectors of equal length.
pub fn sum_counts<'a, I>(dim: usize, counts: I) -> Result<Vec<u64>>
where
    I: IntoIterator<Item = &'a [u64]>,
{
    let mut total = vec![0u64; dim];
    for partial in counts {
        if partial.len() != dim {
            return Err(Error::Internal(format!(
                "count vector of length {} in a reduction of length {}",
                partial.len(),
                dim
            )));
        }
        for (acc, count) in total.iter_mut().zip(partial) {
            *acc += count;
        }
    }
    Ok(total)
}
