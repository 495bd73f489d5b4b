//! Seam between the quota accounting logic and the cluster it reconciles against.

use std::collections::BTreeMap;

use api_types::Quota;
use api_types::ShadowPod;
use error_stack::Report;

use super::description::NamespacedName;
use crate::infrastructure::k8s::KubernetesError;

/// Read access to the cluster state the quota cache is derived from.
#[async_trait::async_trait]
pub trait ClusterReader: Send + Sync {
    /// List every tenant Quota in the cluster.
    async fn list_quotas(&self) -> Result<Vec<Quota>, Report<KubernetesError>>;

    /// List the ShadowPods created by `user`.
    async fn list_shadow_pods_by_creator(
        &self,
        user: &str,
    ) -> Result<Vec<ShadowPod>, Report<KubernetesError>>;

    /// Get a ShadowPod, `None` if it does not exist.
    async fn get_shadow_pod(
        &self,
        name: &NamespacedName,
    ) -> Result<Option<ShadowPod>, Report<KubernetesError>>;

    /// Get the labels of a Namespace.
    async fn get_namespace_labels(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, String>, Report<KubernetesError>>;

    /// Find the Quota granted to `user`.
    async fn get_quota_for_user(&self, user: &str) -> Result<Option<Quota>, Report<KubernetesError>> {
        let quotas = self.list_quotas().await?;
        let mut matching = quotas.into_iter().filter(|quota| quota.spec.user == user);
        let quota = matching.next();
        if matching.next().is_some() {
            tracing::warn!(user = user, "Multiple quotas found for user, using the first one");
        }
        Ok(quota)
    }
}
