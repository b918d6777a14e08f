//! Seeded toy datasets for local federations.

use crate::algorithms::logreg::sigmoid;
use crate::config::local_sites;
use crate::core::{Error, Result, SiteDescriptor};
use crate::site::partition::Partition;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Normal, StandardNormal};

/// Rows held by toy site `index`.
pub fn toy_rows(index: usize) -> usize {
    200 + 100 * index
}

/// Independent standard-normal `x` and `y` columns.
pub fn toy_xy(rows: usize, seed: u64) -> Result<Partition> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut x = Vec::with_capacity(rows);
    let mut y = Vec::with_capacity(rows);
    for _ in 0..rows {
        x.push(rng.sample::<f64, _>(StandardNormal));
        y.push(rng.sample::<f64, _>(StandardNormal));
    }
    Partition::from_columns(vec![("x", x), ("y", y)])
}

/// `n` local sites with their toy partitions: site `i` listens on
/// `base_port + i` and holds `200 + 100·i` rows drawn with seed `i`.
pub fn toy_sites(n: usize, base_port: u16) -> Result<(Vec<SiteDescriptor>, Vec<Partition>)> {
    let sites = local_sites(n, base_port)?;
    let partitions = (0..n)
        .map(|i| toy_xy(toy_rows(i), i as u64))
        .collect::<Result<Vec<_>>>()?;
    Ok((sites, partitions))
}

/// Isotropic Gaussian blobs, `rows_per_blob` rows around each mean.
///
/// Columns are named `f0..f{d-1}`; rows are grouped by blob.
pub fn gaussian_blobs(
    means: &[Vec<f64>],
    rows_per_blob: usize,
    std_dev: f64,
    seed: u64,
) -> Result<Partition> {
    let dim = means
        .first()
        .map(Vec::len)
        .ok_or_else(|| Error::Configuration("no blob means given".to_string()))?;
    if means.iter().any(|m| m.len() != dim) {
        return Err(Error::Configuration("blob means differ in dimension".to_string()));
    }
    let noise = Normal::new(0.0, std_dev)
        .map_err(|e| Error::Configuration(format!("invalid blob spread {}: {}", std_dev, e)))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let rows: Vec<Vec<f64>> = means
        .iter()
        .flat_map(|mean| std::iter::repeat(mean).take(rows_per_blob))
        .map(|mean| mean.iter().map(|m| m + rng.sample(noise)).collect())
        .collect();
    let columns = (0..dim).map(|i| format!("f{}", i)).collect();
    Partition::new(columns, rows)
}

/// Standard-normal features `x1..xd` with a Bernoulli label `y` drawn
/// from the logistic model with `weights` (bias first).
pub fn labeled_logistic(rows: usize, weights: &[f64], seed: u64) -> Result<Partition> {
    let (bias, coefficients) = weights
        .split_first()
        .ok_or_else(|| Error::Configuration("weights need a bias term".to_string()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let data = (0..rows)
        .map(|_| {
            let mut row: Vec<f64> = coefficients
                .iter()
                .map(|_| rng.sample(StandardNormal))
                .collect();
            let z = bias + row.iter().zip(coefficients).map(|(x, w)| x * w).sum::<f64>();
            let label = if rng.gen::<f64>() < sigmoid(z) { 1.0 } else { 0.0 };
            row.push(label);
            row
        })
        .collect();

    let mut columns: Vec<String> = (1..=coefficients.len()).map(|i| format!("x{}", i)).collect();
    columns.push("y".to_string());
    Partition::new(columns, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toy_sites_layout() {
        let (sites, partitions) = toy_sites(3, 8080).unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[2].port, 8082);
        let rows: Vec<usize> = partitions.iter().map(Partition::row_count).collect();
        assert_eq!(rows, vec![200, 300, 400]);
        assert_eq!(partitions[0], toy_xy(200, 0).unwrap());
    }

    #[test]
    fn test_blobs_center_on_means() {
        let means = vec![vec![-5.0, 0.0], vec![5.0, 2.0]];
        let blobs = gaussian_blobs(&means, 400, 0.5, 3).unwrap();
        assert_eq!(blobs.row_count(), 800);

        let first: f64 = blobs.rows()[..400].iter().map(|r| r[0]).sum::<f64>() / 400.0;
        let second: f64 = blobs.rows()[400..].iter().map(|r| r[1]).sum::<f64>() / 400.0;
        assert!((first + 5.0).abs() < 0.1);
        assert!((second - 2.0).abs() < 0.1);
    }

    #[test]
    fn test_labeled_logistic_columns() {
        let data = labeled_logistic(100, &[0.5, 2.0, -1.0], 9).unwrap();
        assert_eq!(data.columns(), &["x1", "x2", "y"]);
        let labels = data.column("y").unwrap();
        assert!(labels.iter().all(|&y| y == 0.0 || y == 1.0));
        assert!(labels.iter().any(|&y| y == 1.0));
        assert!(labels.iter().any(|&y| y == 0.0));
    }

    #[test]
    fn test_negative_spread_rejected() {
        assert!(gaussian_blobs(&[vec![0.0]], 10, -1.0, 0).is_err());
    }
}
