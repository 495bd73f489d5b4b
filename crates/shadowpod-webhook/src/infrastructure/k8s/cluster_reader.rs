use std::collections::BTreeMap;

use api_types::Quota;
use api_types::ShadowPod;
use api_types::CREATOR_USER_LABEL;
use error_stack::Report;
use error_stack::ResultExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::ListParams;
use kube::Api;
use kube::Client;
use kube::ResourceExt;
use tracing::debug;

use super::types::KubernetesError;
use crate::domain::quota::ClusterReader;
use crate::domain::quota::NamespacedName;

/// [`ClusterReader`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterReader {
    client: Client,
}

impl KubeClusterReader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn creator_selector(user: &str) -> String {
    format!("{CREATOR_USER_LABEL}={user}")
}

#[async_trait::async_trait]
impl ClusterReader for KubeClusterReader {
    async fn list_quotas(&self) -> Result<Vec<Quota>, Report<KubernetesError>> {
        let api: Api<Quota> = Api::all(self.client.clone());
        let quotas = api
            .list(&ListParams::default())
            .await
            .change_context(KubernetesError::ListFailed {
                resource: "quotas".to_string(),
                message: "cluster-wide list failed".to_string(),
            })?;
        debug!(count = quotas.items.len(), "Listed quotas");
        Ok(quotas.items)
    }

    async fn list_shadow_pods_by_creator(
        &self,
        user: &str,
    ) -> Result<Vec<ShadowPod>, Report<KubernetesError>> {
        let api: Api<ShadowPod> = Api::all(self.client.clone());
        let params = ListParams::default().labels(&creator_selector(user));
        let shadow_pods = api
            .list(&params)
            .await
            .change_context_lazy(|| KubernetesError::ListFailed {
                resource: "shadowpods".to_string(),
                message: format!("list by creator {user} failed"),
            })?;
        Ok(shadow_pods.items)
    }

    async fn get_shadow_pod(
        &self,
        name: &NamespacedName,
    ) -> Result<Option<ShadowPod>, Report<KubernetesError>> {
        let api: Api<ShadowPod> = Api::namespaced(self.client.clone(), &name.namespace);
        api.get_opt(&name.name)
            .await
            .change_context_lazy(|| KubernetesError::GetFailed {
                resource: "shadowpod".to_string(),
                name: name.to_string(),
                message: "get failed".to_string(),
            })
    }

    async fn get_namespace_labels(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, String>, Report<KubernetesError>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = api
            .get(namespace)
            .await
            .change_context_lazy(|| KubernetesError::GetFailed {
                resource: "namespace".to_string(),
                name: namespace.to_string(),
                message: "get failed".to_string(),
            })?;
        Ok(namespace.labels().clone())
    }
}
