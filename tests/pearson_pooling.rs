//! Pooled Pearson correlation is independent of how rows are split.

use fedstat::algorithms::pearson::{local_stats, pearson_r, run_pearson, PearsonConfig};
use fedstat::config::local_sites;
use fedstat::core::SiteDescriptor;
use fedstat::federated::RoundDriver;
use fedstat::site::synthetic::toy_xy;
use fedstat::site::{LocalSiteProxy, Partition};
use fedstat::Error;
use std::sync::Arc;

fn correlated(rows: usize, seed: u64) -> Partition {
    let base = toy_xy(rows, seed).unwrap();
    let x = base.column("x").unwrap();
    let noise = base.column("y").unwrap();
    let y = x
        .iter()
        .zip(&noise)
        .map(|(x, e)| 0.6 * x + 0.8 * e + 3.0)
        .collect();
    Partition::from_columns(vec![("x", x), ("y", y)]).unwrap()
}

fn driver_for(partitions: Vec<Partition>) -> (Vec<SiteDescriptor>, RoundDriver) {
    let sites = local_sites(partitions.len(), 8080).unwrap();
    let proxy = LocalSiteProxy::from_partitions(sites.clone(), partitions).unwrap();
    (sites, RoundDriver::new(Arc::new(proxy)))
}

#[tokio::test]
async fn test_split_invariance() {
    let data = correlated(503, 4);
    let whole = local_stats(&SiteDescriptor::new("localhost", 1), &data, "x", "y").unwrap();
    let expected = pearson_r(&whole).unwrap();

    for parts in [1, 2, 5] {
        let (sites, mut driver) = driver_for(data.split_rows(parts).unwrap());
        let result = run_pearson(&mut driver, &sites, &PearsonConfig::default())
            .await
            .unwrap();

        assert_eq!(result.total_rows, 503);
        assert!(
            (result.r - expected).abs() < 1e-9,
            "{} sites: {} vs {}",
            parts,
            result.r,
            expected
        );
    }
    assert!(expected > 0.4);
}

#[tokio::test]
async fn test_empty_site_raises_no_data() {
    let empty = Partition::new(vec!["x".to_string(), "y".to_string()], vec![]).unwrap();
    let (sites, mut driver) = driver_for(vec![correlated(50, 1), empty]);

    let err = run_pearson(&mut driver, &sites, &PearsonConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.site(), Some("org2"));
    assert!(matches!(err.root_cause(), Error::NoDataOnSite { .. }));
}

#[tokio::test]
async fn test_constant_column_is_degenerate() {
    let constant = |rows: usize| {
        Partition::from_columns(vec![
            ("x", (0..rows).map(|i| i as f64).collect()),
            ("y", vec![2.5; rows]),
        ])
        .unwrap()
    };
    let (sites, mut driver) = driver_for(vec![constant(10), constant(20)]);

    let err = run_pearson(&mut driver, &sites, &PearsonConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.round(), Some(1));
    assert!(matches!(err.root_cause(), Error::NumericDegeneracy(_)));
    assert!(driver.ledger().is_empty());
}

#[tokio::test]
async fn test_missing_column_named() {
    let (sites, mut driver) = driver_for(vec![correlated(30, 2)]);
    let config = PearsonConfig {
        x_column: "x".to_string(),
        y_column: "income".to_string(),
    };

    let err = run_pearson(&mut driver, &sites, &config).await.unwrap_err();
    assert_eq!(err.round(), Some(0));
    match err.root_cause() {
        Error::NoDataOnSite { site, reason } => {
            assert_eq!(site, "org1");
            assert!(reason.contains("income"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
