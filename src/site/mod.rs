//! Site Layer
//!
//! Everything on the far side of the site boundary:
//! - The SiteProxy contract and its typed envelopes
//! - Bounded bincode encoding of what crosses the boundary
//! - A per-site capability cache
//! - An in-process proxy over local partitions
//! - Seeded toy datasets

pub mod cache;
pub mod envelope;
pub mod local;
pub mod partition;
pub mod proxy;
pub mod synthetic;

pub use cache::CapabilityCache;
pub use local::LocalSiteProxy;
pub use partition::{Partition, PartitionShape};
pub use proxy::{ComputeFunction, ComputeRequest, ComputeResponse, SiteProxy};
