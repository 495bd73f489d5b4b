//! In-memory cluster used by the quota and webhook tests.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Mutex;

use api_types::LimitsEnforcement;
use api_types::Quota;
use api_types::QuotaSpec;
use api_types::ShadowPod;
use api_types::ShadowPodSpec;
use api_types::CREATOR_USER_LABEL;
use error_stack::Report;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;

use super::description::NamespacedName;
use super::traits::ClusterReader;
use crate::infrastructure::k8s::KubernetesError;

/// Build a ShadowPod with one container per `(cpu, memory)` request pair.
pub fn shadow_pod(
    namespace: &str,
    name: &str,
    uid: &str,
    creator: &str,
    containers: &[(&str, &str)],
) -> ShadowPod {
    let containers = containers
        .iter()
        .enumerate()
        .map(|(i, (cpu, memory))| Container {
            name: format!("container-{i}"),
            resources: Some(ResourceRequirements {
                requests: Some(BTreeMap::from([
                    ("cpu".to_string(), Quantity(cpu.to_string())),
                    ("memory".to_string(), Quantity(memory.to_string())),
                ])),
                ..Default::default()
            }),
            ..Default::default()
        })
        .collect();

    let mut sp = ShadowPod::new(
        name,
        ShadowPodSpec {
            pod: PodSpec {
                containers,
                ..Default::default()
            },
        },
    );
    sp.metadata.namespace = Some(namespace.to_string());
    sp.metadata.uid = Some(uid.to_string());
    sp.labels_mut()
        .insert(CREATOR_USER_LABEL.to_string(), creator.to_string());
    sp
}

pub fn quota(user: &str, resources: &[(&str, &str)]) -> Quota {
    let mut quota = Quota::new(
        &format!("quota-{user}"),
        QuotaSpec {
            user: user.to_string(),
            resources: resources
                .iter()
                .map(|(name, value)| (name.to_string(), Quantity(value.to_string())))
                .collect(),
            cordoned: false,
            limits_enforcement: LimitsEnforcement::None,
        },
    );
    quota.metadata.namespace = Some("liqo".to_string());
    quota
}

#[derive(Default)]
struct State {
    quotas: Vec<Quota>,
    shadow_pods: Vec<ShadowPod>,
    namespaces: HashMap<String, BTreeMap<String, String>>,
    fail_lists: bool,
}

/// Mock cluster reader backed by plain vectors
#[derive(Default)]
pub struct MockClusterReader {
    state: Mutex<State>,
}

impl MockClusterReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_quota(&self, quota: Quota) {
        self.state.lock().unwrap().quotas.push(quota);
    }

    pub fn remove_quota(&self, user: &str) {
        self.state
            .lock()
            .unwrap()
            .quotas
            .retain(|quota| quota.spec.user != user);
    }

    pub fn add_shadow_pod(&self, shadow_pod: ShadowPod) {
        self.state.lock().unwrap().shadow_pods.push(shadow_pod);
    }

    pub fn remove_shadow_pod(&self, namespace: &str, name: &str) {
        self.state.lock().unwrap().shadow_pods.retain(|sp| {
            sp.namespace().as_deref() != Some(namespace) || sp.name_any() != name
        });
    }

    pub fn set_namespace_labels(&self, namespace: &str, labels: &[(&str, &str)]) {
        self.state.lock().unwrap().namespaces.insert(
            namespace.to_string(),
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
    }

    /// Make every list call fail, to exercise error paths
    pub fn set_fail_lists(&self, fail: bool) {
        self.state.lock().unwrap().fail_lists = fail;
    }

    fn list_error(&self, resource: &str) -> Result<(), Report<KubernetesError>> {
        if self.state.lock().unwrap().fail_lists {
            return Err(Report::new(KubernetesError::ListFailed {
                resource: resource.to_string(),
                message: "mock failure".to_string(),
            }));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClusterReader for MockClusterReader {
    async fn list_quotas(&self) -> Result<Vec<Quota>, Report<KubernetesError>> {
        self.list_error("quotas")?;
        Ok(self.state.lock().unwrap().quotas.clone())
    }

    async fn list_shadow_pods_by_creator(
        &self,
        user: &str,
    ) -> Result<Vec<ShadowPod>, Report<KubernetesError>> {
        self.list_error("shadowpods")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .shadow_pods
            .iter()
            .filter(|sp| sp.labels().get(CREATOR_USER_LABEL).map(String::as_str) == Some(user))
            .cloned()
            .collect())
    }

    async fn get_shadow_pod(
        &self,
        name: &NamespacedName,
    ) -> Result<Option<ShadowPod>, Report<KubernetesError>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .shadow_pods
            .iter()
            .find(|sp| NamespacedName::of(sp) == *name)
            .cloned())
    }

    async fn get_namespace_labels(
        &self,
        namespace: &str,
    ) -> Result<BTreeMap<String, String>, Report<KubernetesError>> {
        self.state
            .lock()
            .unwrap()
            .namespaces
            .get(namespace)
            .cloned()
            .ok_or_else(|| {
                Report::new(KubernetesError::GetFailed {
                    resource: "namespace".to_string(),
                    name: namespace.to_string(),
                    message: "not found".to_string(),
                })
            })
    }
}
