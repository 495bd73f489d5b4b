//! Shared API type definitions
//!
//! This crate contains the custom resources consumed by the ShadowPod admission
//! webhooks: the `ShadowPod` wrapper around an offloaded pod and the per-tenant
//! `Quota` describing how many resources a remote user may consume, together
//! with the well-known labels used to tie them to clusters and users.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::PodSpec;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;

/// Label carrying the ID of the cluster that originated a ShadowPod.
pub const ORIGIN_CLUSTER_ID_LABEL: &str = "liqo.io/origin-cluster-id";

/// Label set on tenant namespaces with the ID of the remote cluster owning them.
pub const REMOTE_CLUSTER_ID_LABEL: &str = "liqo.io/remote-cluster-id";

/// Label stamped by the mutating webhook with the user that created a ShadowPod.
pub const CREATOR_USER_LABEL: &str = "liqo.io/creator-user";

/// How strictly container resource declarations are checked at admission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum LimitsEnforcement {
    /// No validation, the footprint is computed on a best-effort basis.
    #[default]
    None,
    /// Every container must declare both cpu and memory.
    Soft,
    /// As `Soft`, and requests must equal limits for every declared resource.
    Hard,
}

impl std::fmt::Display for LimitsEnforcement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Resource ceiling granted to a remote user.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "offloading.liqo.io",
    version = "v1beta1",
    kind = "Quota",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct QuotaSpec {
    /// User the quota applies to
    pub user: String,
    /// Maximum amount of each resource the user may consume
    #[serde(default)]
    pub resources: BTreeMap<String, Quantity>,
    /// Cordoned users cannot create new ShadowPods
    #[serde(default)]
    pub cordoned: bool,
    /// Enforcement level applied to container resource declarations
    #[serde(default)]
    pub limits_enforcement: LimitsEnforcement,
}

/// A pod offloaded by a remote cluster, reflected locally as a ShadowPod.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "offloading.liqo.io",
    version = "v1beta1",
    kind = "ShadowPod",
    namespaced
)]
pub struct ShadowPodSpec {
    pub pod: PodSpec,
}
