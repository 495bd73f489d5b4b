//! Per-tenant resource accounting for offloaded ShadowPods.
//!
//! - [`PeeringCache`]: tenant user name to [`PeeringInfo`] map with a readiness flag
//! - [`PeeringInfo`]: quota ledger of one tenant
//! - [`Description`]: footprint and lifecycle of one admitted ShadowPod
//! - [`CacheRefresher`]: background reconciliation against the cluster

pub mod description;
pub mod errors;
pub mod footprint;
pub mod peering_cache;
pub mod peering_info;
pub mod refresher;
pub mod resources;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

pub use description::Description;
pub use description::NamespacedName;
pub use errors::QuotaError;
pub use footprint::compute_footprint;
pub use peering_cache::PeeringCache;
pub use peering_info::PeeringInfo;
pub use refresher::CacheRefresher;
pub use resources::MilliQuantity;
pub use resources::Resources;
pub use traits::ClusterReader;
