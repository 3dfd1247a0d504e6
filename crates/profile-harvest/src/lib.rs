//! Adaptive outbound identity pool and multi-strategy profile extraction.
//!
//! The [`pool`] tracks outbound identities with performance statistics and
//! selects among the best of them. The [`extraction`] pipeline tries its
//! strategies in order, reporting every attempt back to the pool. A
//! [`Harvester`] ties both together with a short-lived result cache and a
//! background [`Refresher`] that imports identities from external lists.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod extraction;
pub mod http_client;
pub mod pool;
pub mod types;

pub use cache::ResultCache;
pub use config::HarvestConfig;
pub use context::Harvester;
pub use error::{ErrorKind, HarvestError, HarvestResult};
pub use extraction::{ExtractionPipeline, Strategy, StrategyOutcome};
pub use pool::{IdentityEntry, IdentityPool, Origin, PoolStats, RefreshReport, Refresher};
pub use types::{
    ConnectionStatus, ProbeStatus, Profile, ProfileIdentity, ProfileResult, ProfileStatistics,
    ScrapeFailure, ScrapeOutcome,
};
