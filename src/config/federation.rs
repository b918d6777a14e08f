//! Federation configuration.
//!
//! One JSON document describes the sites, the driver, logging and the
//! settings of every algorithm. The site list can be overridden from the
//! `FED_SITES` environment variable.

use crate::algorithms::kmeans::KMeansConfig;
use crate::algorithms::logreg::LogRegConfig;
use crate::algorithms::pearson::PearsonConfig;
use crate::core::{Error, Result, SiteDescriptor};
use crate::federated::driver::DriverConfig;
use crate::monitoring::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Environment variable holding a JSON array of site descriptors.
pub const SITES_ENV: &str = "FED_SITES";

/// Complete coordinator configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FederationConfig {
    /// Participating sites, in round order
    pub sites: Vec<SiteDescriptor>,
    pub driver: DriverConfig,
    pub logging: LoggingConfig,
    pub kmeans: KMeansConfig,
    pub logreg: LogRegConfig,
    pub pearson: PearsonConfig,
}

impl FederationConfig {
    /// Default settings for the given sites.
    pub fn for_sites(sites: Vec<SiteDescriptor>) -> Self {
        Self {
            sites,
            ..Default::default()
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Replace the site list with `FED_SITES` when it is set.
    pub fn with_env_sites(self) -> Result<Self> {
        let value = std::env::var(SITES_ENV).ok();
        self.with_sites_override(value.as_deref())
    }

    /// Replace the site list with a JSON array of descriptors, if given.
    pub fn with_sites_override(mut self, value: Option<&str>) -> Result<Self> {
        if let Some(json) = value {
            self.sites = serde_json::from_str(json).map_err(|e| {
                Error::Configuration(format!("{} is not a site list: {}", SITES_ENV, e))
            })?;
        }
        Ok(self)
    }

    /// Check the whole configuration before any site is contacted.
    pub fn validate(&self) -> Result<()> {
        if self.sites.is_empty() {
            return Err(Error::Configuration("site list is empty".to_string()));
        }
        let mut seen = HashSet::new();
        for site in &self.sites {
            if !seen.insert(site.id()) {
                return Err(Error::Configuration(format!(
                    "site {} listed more than once",
                    site
                )));
            }
        }

        if self.driver.site_timeout_ms == 0 {
            return Err(Error::Configuration(
                "site timeout must be positive".to_string(),
            ));
        }
        self.kmeans.validate()?;
        self.logreg.validate()?;
        if self.pearson.x_column.is_empty() || self.pearson.y_column.is_empty() {
            return Err(Error::Configuration(
                "pearson columns must be named".to_string(),
            ));
        }
        Ok(())
    }
}

/// `n` sites on localhost, `org1..orgN` at ports `base_port..base_port + n`.
pub fn local_sites(n: usize, base_port: u16) -> Result<Vec<SiteDescriptor>> {
    if n == 0 {
        return Err(Error::Configuration("need at least one site".to_string()));
    }
    (0..n)
        .map(|i| {
            let port = u16::try_from(i)
                .ok()
                .and_then(|offset| base_port.checked_add(offset))
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "{} sites do not fit above port {}",
                        n, base_port
                    ))
                })?;
            Ok(SiteDescriptor::new("localhost", port).with_name(&format!("org{}", i + 1)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::logging::LogLevel;

    #[test]
    fn test_defaults_match_reference_scripts() {
        let config = FederationConfig::default();
        assert_eq!(config.kmeans.k, 3);
        assert_eq!(config.kmeans.iterations, 10);
        assert_eq!(config.logreg.epochs, 20);
        assert_eq!(config.logreg.learning_rate, 0.1);
        assert_eq!(config.logreg.batch_size, 32);
        assert_eq!(config.logreg.label_column, "y");
        assert_eq!(config.pearson.x_column, "x");
        assert_eq!(config.driver.site_timeout_ms, 60_000);
    }

    #[test]
    fn test_partial_json() {
        let config = FederationConfig::from_json_str(
            r#"{
                "sites": [{"host": "10.0.0.5", "port": 8080, "name": "org1"}],
                "kmeans": {"k": 5},
                "logging": {"level": "debug"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.sites[0].id(), "org1");
        assert_eq!(config.kmeans.k, 5);
        assert_eq!(config.kmeans.iterations, 10);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_sites_override() {
        let config = FederationConfig::default()
            .with_sites_override(Some(r#"[{"host": "a", "port": 1}, {"host": "b", "port": 2}]"#))
            .unwrap();
        assert_eq!(config.sites.len(), 2);
        assert_eq!(config.sites[1].id(), "b:2");

        let config = FederationConfig::for_sites(local_sites(1, 9000).unwrap())
            .with_sites_override(None)
            .unwrap();
        assert_eq!(config.sites[0].port, 9000);

        let err = FederationConfig::default()
            .with_sites_override(Some("not json"))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(FederationConfig::default().validate().is_err());

        let site = SiteDescriptor::new("localhost", 8080);
        let duplicated = FederationConfig::for_sites(vec![site.clone(), site.clone()]);
        assert!(duplicated.validate().is_err());

        let mut zero_batch = FederationConfig::for_sites(vec![site]);
        zero_batch.logreg.batch_size = 0;
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_local_sites() {
        let sites = local_sites(3, 8080).unwrap();
        let ports: Vec<u16> = sites.iter().map(|s| s.port).collect();
        assert_eq!(ports, vec![8080, 8081, 8082]);
        assert_eq!(sites[0].id(), "org1");
        assert_eq!(sites[2].url(), "http://localhost:8082");

        assert!(local_sites(0, 8080).is_err());
        assert!(local_sites(3, u16::MAX - 1).is_err());
    }

    #[test]
    fn test_from_missing_file() {
        let err = FederationConfig::from_file("/nonexistent/fedstat.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
