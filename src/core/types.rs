//! Common types used across fedstat modules.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

/// Identity of a data-holding site.
///
/// The descriptor is opaque to the aggregation core; only the site proxy
/// knows how to reach the partition behind it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteDescriptor {
    /// Host name or address
    pub host: String,
    /// Port the datasite listens on
    pub port: u16,
    /// Optional human readable name (e.g. `org1`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SiteDescriptor {
    /// Create a new descriptor.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            name: None,
        }
    }

    /// Set the site name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Stable identifier: the name if present, `host:port` otherwise.
    pub fn id(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Base URL of the datasite.
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for SiteDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// A 256-bit SHA3 digest.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest256(pub [u8; 32]);

impl Digest256 {
    /// Digest arbitrary bytes.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Digest the bincode encoding of a value.
    pub fn of_value<T: Serialize>(value: &T) -> crate::core::Result<Self> {
        let bytes = bincode::serialize(value)?;
        Ok(Self::of(&bytes))
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for Digest256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Timestamp wrapper for consistent serialization.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Get current UTC timestamp.
pub fn now() -> Timestamp {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_id_prefers_name() {
        let site = SiteDescriptor::new("gaia2-vm-2.imsi.athenarc.gr", 8080);
        assert_eq!(site.id(), "gaia2-vm-2.imsi.athenarc.gr:8080");
        assert_eq!(site.url(), "http://gaia2-vm-2.imsi.athenarc.gr:8080");

        let named = site.with_name("org1");
        assert_eq!(named.id(), "org1");
        assert_eq!(named.to_string(), "org1");
    }

    #[test]
    fn test_site_descriptor_json_without_name() {
        let site: SiteDescriptor =
            serde_json::from_str(r#"{"host":"localhost","port":8090}"#).unwrap();
        assert_eq!(site, SiteDescriptor::new("localhost", 8090));
    }

    #[test]
    fn test_digest_is_deterministic() {
        let a = Digest256::of_value(&vec![1.0f64, 2.0]).unwrap();
        let b = Digest256::of_value(&vec![1.0f64, 2.0]).unwrap();
        let c = Digest256::of_value(&vec![1.0f64, 2.5]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_hex().len(), 64);
    }
}
