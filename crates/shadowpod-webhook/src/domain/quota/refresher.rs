//! Background reconciliation of the quota cache against the cluster.
//!
//! The cache starts empty and not ready. The first successful pass seeds one
//! ledger per Quota and marks the cache ready; every later pass aligns each
//! ledger with the live ShadowPods of its tenant and the tenant set with the
//! live Quotas.

use std::collections::HashSet;
use std::sync::Arc;

use error_stack::Report;
use tokio::select;
use tokio::time::interval;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::warn;

use super::peering_cache::PeeringCache;
use super::resources::Resources;
use super::traits::ClusterReader;
use crate::config::QuotaConfig;
use crate::infrastructure::k8s::KubernetesError;

pub struct CacheRefresher {
    cache: Arc<PeeringCache>,
    reader: Arc<dyn ClusterReader>,
    config: QuotaConfig,
}

impl CacheRefresher {
    pub fn new(cache: Arc<PeeringCache>, reader: Arc<dyn ClusterReader>, config: QuotaConfig) -> Self {
        Self {
            cache,
            reader,
            config,
        }
    }

    /// Refresh the cache every `refresh_interval` until cancelled.
    ///
    /// The first tick fires immediately, so initialization starts right away.
    #[tracing::instrument(skip_all, fields(interval = ?self.config.refresh_interval))]
    pub async fn run(&self, cancellation_token: CancellationToken) {
        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                _ = cancellation_token.cancelled() => {
                    info!("Quota cache refresher cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    select! {
                        _ = cancellation_token.cancelled() => {
                            info!("Quota cache refresher cancelled during a refresh");
                            break;
                        }
                        result = self.refresh() => {
                            if let Err(e) = result {
                                error!("Quota cache refresh failed: {e:?}");
                            }
                        }
                    }
                }
            }
        }
    }

    /// Seed the cache from the cluster and mark it ready.
    ///
    /// No-op once the cache is ready.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ListFailed`] if Quotas or ShadowPods cannot be listed; the cache stays not ready
    pub async fn initialize(&self) -> Result<(), Report<KubernetesError>> {
        if self.cache.is_ready() {
            return Ok(());
        }

        info!("Initializing quota cache");
        let quotas = self.reader.list_quotas().await?;
        let mut seen_users = HashSet::new();
        for quota in &quotas {
            let user = quota.spec.user.as_str();
            if !seen_users.insert(user) {
                warn!(user = user, quota = ?quota.metadata.name, "Ignoring duplicate quota for tenant");
                continue;
            }
            let total = match Resources::from_quantities(&quota.spec.resources) {
                Ok(total) => total,
                Err(e) => {
                    warn!(user = user, "Skipping quota with invalid resources: {e:?}");
                    continue;
                }
            };
            self.track_tenant(user, total).await?;
        }

        self.cache.mark_ready();
        Ok(())
    }

    /// Run one reconciliation pass, initializing the cache first if needed.
    ///
    /// # Errors
    ///
    /// - [`KubernetesError::ListFailed`] if the Quotas cannot be listed
    pub async fn refresh(&self) -> Result<(), Report<KubernetesError>> {
        if !self.cache.is_ready() {
            return self.initialize().await;
        }

        self.align_tenants().await;
        self.reconcile_tenants().await?;
        self.log_diagnostics().await;
        Ok(())
    }

    async fn align_tenants(&self) {
        for info in self.cache.tenants() {
            let user = info.user_name();
            let live = match self.reader.list_shadow_pods_by_creator(user).await {
                Ok(live) => live,
                Err(e) => {
                    warn!(user = user, "Cannot list shadow pods of tenant, retrying next tick: {e:?}");
                    continue;
                }
            };
            info.align_existing_shadow_pods(&live).await;
            info.align_terminating_or_not_existing_shadow_pods(&live, self.config.grace_period)
                .await;
        }
    }

    async fn reconcile_tenants(&self) -> Result<(), Report<KubernetesError>> {
        let quotas = self.reader.list_quotas().await?;
        let mut live_users = HashSet::new();

        for quota in &quotas {
            let user = quota.spec.user.as_str();
            if !live_users.insert(user.to_string()) {
                warn!(user = user, quota = ?quota.metadata.name, "Ignoring duplicate quota for tenant");
                continue;
            }
            let total = match Resources::from_quantities(&quota.spec.resources) {
                Ok(total) => total,
                Err(e) => {
                    warn!(user = user, "Keeping the previous ceiling, quota has invalid resources: {e:?}");
                    continue;
                }
            };

            match self.cache.get(user) {
                Some(info) => info.update_total_quota(total).await,
                None => {
                    if let Err(e) = self.track_tenant(user, total).await {
                        warn!(user = user, "Cannot start tracking tenant, retrying next tick: {e:?}");
                    }
                }
            }
        }

        for user in self.cache.user_names() {
            if !live_users.contains(&user) {
                self.cache.remove(&user);
            }
        }
        Ok(())
    }

    /// Create the ledger of `user` seeded from its live ShadowPods. When an
    /// admission created it first, only the ceiling is reconciled.
    async fn track_tenant(&self, user: &str, total: Resources) -> Result<(), Report<KubernetesError>> {
        let live = self.reader.list_shadow_pods_by_creator(user).await?;
        let (info, loaded) = self.cache.load_or_store(user, total.clone());
        if loaded {
            info.update_total_quota(total).await;
        }
        info.align_existing_shadow_pods(&live).await;
        Ok(())
    }

    async fn log_diagnostics(&self) {
        for info in self.cache.tenants() {
            let total = info.total_quota().await;
            let used = info.used_quota().await;
            let free = info.free_quota().await;
            let shadow_pods = info.shadow_pod_count().await;
            debug!(
                user = info.user_name(),
                total = %total,
                used = %used,
                free = %free,
                shadow_pods,
                "Tenant quota usage"
            );
        }
    }
}
