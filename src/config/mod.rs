//! Configuration loading.

pub mod federation;

pub use federation::{local_sites, FederationConfig, SITES_ENV};
