use std::time::Duration;

pub mod cli;
pub mod webhook;

/// Quota enforcement settings shared by the validator and the cache refresher.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    /// When false, admissions are never checked against the quota cache.
    pub enable_resource_validation: bool,
    pub refresh_interval: Duration,
    /// How long a cached ShadowPod missing from the cluster is kept before
    /// its quota is released.
    pub grace_period: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enable_resource_validation: true,
            refresh_interval: Duration::from_secs(10),
            grace_period: Duration::from_secs(30),
        }
    }
}

impl From<&webhook::WebhookArgs> for QuotaConfig {
    fn from(args: &webhook::WebhookArgs) -> Self {
        Self {
            enable_resource_validation: args.enable_resource_validation,
            refresh_interval: Duration::from_secs(args.cache_refresh_interval_secs.max(1)),
            grace_period: Duration::from_secs(args.grace_period_secs),
        }
    }
}

pub use cli::*;
pub use webhook::*;
