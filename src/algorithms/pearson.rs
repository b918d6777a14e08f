//! Pearson correlation from pooled sufficient statistics.
//!
//! Sites return exact moments of a column pair. The coordinator adds them
//! and computes r once on the pooled totals, so the result does not depend
//! on how rows are split across sites.

use crate::core::{Error, Result, SiteDescriptor};
use crate::federated::algorithm::{FederatedAlgorithm, SiteResult, SiteShape};
use crate::federated::driver::RoundDriver;
use crate::site::partition::Partition;
use crate::site::proxy::{ComputeFunction, ComputeRequest, ComputeResponse};
use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::Add;

/// Centered variance at or below this fraction of Σv² is rounding noise.
const ROUNDING_FLOOR: f64 = 4.0 * f64::EPSILON;

/// Pearson configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PearsonConfig {
    /// First column of the pair
    pub x_column: String,
    /// Second column of the pair
    pub y_column: String,
}

impl Default for PearsonConfig {
    fn default() -> Self {
        Self {
            x_column: "x".to_string(),
            y_column: "y".to_string(),
        }
    }
}

/// Sufficient statistics `(n, Σx, Σy, Σx², Σy², Σxy)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub n: u64,
    pub sx: f64,
    pub sy: f64,
    pub sxx: f64,
    pub syy: f64,
    pub sxy: f64,
}

impl Moments {
    /// Statistics of paired samples.
    pub fn from_pairs<I: IntoIterator<Item = (f64, f64)>>(pairs: I) -> Self {
        pairs.into_iter().fold(Moments::default(), |mut m, (x, y)| {
            m.n += 1;
            m.sx += x;
            m.sy += y;
            m.sxx += x * x;
            m.syy += y * y;
            m.sxy += x * y;
            m
        })
    }
}

impl Add for Moments {
    type Output = Moments;

    fn add(self, other: Moments) -> Moments {
        Moments {
            n: self.n + other.n,
            sx: self.sx + other.sx,
            sy: self.sy + other.sy,
            sxx: self.sxx + other.sxx,
            syy: self.syy + other.syy,
            sxy: self.sxy + other.sxy,
        }
    }
}

impl Sum for Moments {
    fn sum<I: Iterator<Item = Moments>>(iter: I) -> Moments {
        iter.fold(Moments::default(), Add::add)
    }
}

/// Global result of a correlation run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PearsonResult {
    /// Pooled row count across all sites
    pub total_rows: u64,
    /// Correlation coefficient
    pub r: f64,
}

/// Site-local statistics of the configured column pair.
pub fn local_stats(
    site: &SiteDescriptor,
    partition: &Partition,
    x_column: &str,
    y_column: &str,
) -> Result<Moments> {
    let index = |name: &str| {
        partition.column_index(name).ok_or_else(|| Error::NoDataOnSite {
            site: site.id(),
            reason: format!("missing column '{}'", name),
        })
    };
    let (x, y) = (index(x_column)?, index(y_column)?);

    Ok(Moments::from_pairs(
        partition.rows().iter().map(|row| (row[x], row[y])),
    ))
}

/// Correlation coefficient of pooled statistics.
pub fn pearson_r(m: &Moments) -> Result<f64> {
    if m.n == 0 {
        return Err(Error::NumericDegeneracy(
            "no rows to correlate".to_string(),
        ));
    }
    let n = m.n as f64;
    let cov = m.sxy - m.sx * m.sy / n;
    let var_x = m.sxx - m.sx * m.sx / n;
    let var_y = m.syy - m.sy * m.sy / n;

    for (name, var, scale) in [("x", var_x, m.sxx), ("y", var_y, m.syy)] {
        if var.is_nan() || var <= ROUNDING_FLOOR * scale {
            return Err(Error::NumericDegeneracy(format!(
                "column {} has zero variance",
                name
            )));
        }
    }

    let r = cov / (var_x * var_y).sqrt();
    if !r.is_finite() {
        return Err(Error::NumericDegeneracy(format!(
            "correlation is not finite ({})",
            r
        )));
    }
    Ok(r.clamp(-1.0, 1.0))
}

/// Site kernel for `stats`.
pub(crate) fn kernel(
    site: &SiteDescriptor,
    partition: &Partition,
    request: &ComputeRequest,
) -> Result<ComputeResponse> {
    match request {
        ComputeRequest::Stats { x_column, y_column } => {
            local_stats(site, partition, x_column, y_column).map(ComputeResponse::Moments)
        }
        other => Err(other.mismatch(site, ComputeFunction::Stats)),
    }
}

/// One-shot correlation adapter for the round driver.
#[derive(Clone, Debug)]
pub struct Pearson {
    config: PearsonConfig,
}

impl Pearson {
    /// Create an adapter.
    pub fn new(config: PearsonConfig) -> Self {
        Self { config }
    }
}

impl FederatedAlgorithm for Pearson {
    type Params = ();
    type Partial = Moments;
    type Global = PearsonResult;

    fn name(&self) -> &'static str {
        "pearson"
    }

    fn initialize(&self, shapes: &[SiteShape]) -> Result<Self::Params> {
        for entry in shapes {
            for column in [&self.config.x_column, &self.config.y_column] {
                if !entry.shape.has_column(column) {
                    return Err(Error::NoDataOnSite {
                        site: entry.site.id(),
                        reason: format!("missing column '{}'", column),
                    });
                }
            }
        }
        Ok(())
    }

    fn request(&self, _params: &(), _round: usize, _site_index: usize) -> ComputeRequest {
        ComputeRequest::Stats {
            x_column: self.config.x_column.clone(),
            y_column: self.config.y_column.clone(),
        }
    }

    fn accept(
        &self,
        _params: &(),
        site: &SiteDescriptor,
        response: ComputeResponse,
    ) -> Result<Moments> {
        let moments = response.into_moments(site)?;
        if moments.n == 0 {
            return Err(Error::NoDataOnSite {
                site: site.id(),
                reason: "site reported n = 0".to_string(),
            });
        }
        let sums = [moments.sx, moments.sy, moments.sxx, moments.syy, moments.sxy];
        if sums.iter().any(|v| !v.is_finite()) {
            return Err(Error::NumericDegeneracy(format!(
                "site {} returned non-finite moments",
                site
            )));
        }
        Ok(moments)
    }

    fn aggregate(&self, _params: &(), partials: &[SiteResult<Moments>]) -> Result<PearsonResult> {
        let pooled: Moments = partials.iter().map(|p| p.value).sum();
        Ok(PearsonResult {
            total_rows: pooled.n,
            r: pearson_r(&pooled)?,
        })
    }

    fn update(&self, _params: &(), _global: &PearsonResult) -> Result<()> {
        Ok(())
    }
}

/// Federated Pearson correlation over one round.
pub async fn run_pearson(
    driver: &mut RoundDriver,
    sites: &[SiteDescriptor],
    config: &PearsonConfig,
) -> Result<PearsonResult> {
    driver.run_once(&Pearson::new(config.clone()), sites).await
}
