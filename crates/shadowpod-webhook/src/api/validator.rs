//! Validating webhook for ShadowPods.

use std::sync::Arc;

use api_types::ShadowPod;
use api_types::CREATOR_USER_LABEL;
use api_types::ORIGIN_CLUSTER_ID_LABEL;
use api_types::REMOTE_CLUSTER_ID_LABEL;
use kube::core::admission::AdmissionRequest;
use kube::core::admission::AdmissionResponse;
use kube::core::admission::Operation;
use kube::core::DynamicObject;
use kube::ResourceExt;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::response::allowed;
use super::response::decode_shadow_pod;
use super::response::denied;
use super::response::errored;
use super::update_check::check_benign_update;
use crate::config::QuotaConfig;
use crate::domain::quota::ClusterReader;
use crate::domain::quota::NamespacedName;
use crate::domain::quota::PeeringCache;
use crate::domain::quota::Resources;

/// Admits ShadowPod creations against the tenant quota and keeps the quota
/// cache in sync with deletions.
pub struct ShadowPodValidator {
    cache: Arc<PeeringCache>,
    reader: Arc<dyn ClusterReader>,
    config: QuotaConfig,
}

impl ShadowPodValidator {
    pub fn new(cache: Arc<PeeringCache>, reader: Arc<dyn ClusterReader>, config: QuotaConfig) -> Self {
        Self {
            cache,
            reader,
            config,
        }
    }

    /// Whether admissions can currently be evaluated.
    pub fn is_ready(&self) -> bool {
        !self.config.enable_resource_validation || self.cache.is_ready()
    }

    #[tracing::instrument(skip_all, fields(operation = ?req.operation, namespace = ?req.namespace, name = %req.name, dry_run = req.dry_run))]
    pub async fn handle(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        if !self.is_ready() {
            warn!("Rejecting admission, quota cache initialization in progress");
            return errored(req, 500, "quota cache initialization in progress, retry later");
        }

        match req.operation {
            Operation::Create => self.handle_create(req).await,
            Operation::Update => self.handle_update(req),
            Operation::Delete => self.handle_delete(req).await,
            _ => allowed(req),
        }
    }

    async fn handle_create(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let shadow_pod = match decode_shadow_pod(req.object.as_ref(), req.namespace.as_deref()) {
            Ok(shadow_pod) => shadow_pod,
            Err(message) => return errored(req, 400, message),
        };

        let Some(origin) = shadow_pod.labels().get(ORIGIN_CLUSTER_ID_LABEL) else {
            return denied(req, format!("missing {ORIGIN_CLUSTER_ID_LABEL} label"));
        };
        let namespace = shadow_pod.namespace().unwrap_or_default();

        let namespace_labels = match self.reader.get_namespace_labels(&namespace).await {
            Ok(labels) => labels,
            Err(e) => {
                warn!("Cannot get namespace {namespace}: {e:?}");
                return errored(req, 400, format!("cannot get namespace {namespace}"));
            }
        };
        if namespace_labels.get(REMOTE_CLUSTER_ID_LABEL) != Some(origin) {
            return denied(
                req,
                format!("namespace {namespace} is not assigned to cluster {origin}"),
            );
        }

        if !self.config.enable_resource_validation {
            return allowed(req);
        }

        self.admit_creation(req, &shadow_pod).await
    }

    async fn admit_creation(
        &self,
        req: &AdmissionRequest<DynamicObject>,
        shadow_pod: &ShadowPod,
    ) -> AdmissionResponse {
        let Some(creator) = shadow_pod.labels().get(CREATOR_USER_LABEL) else {
            return denied(req, format!("missing {CREATOR_USER_LABEL} label"));
        };

        let quota = match self.reader.get_quota_for_user(creator).await {
            Ok(Some(quota)) => quota,
            Ok(None) => return denied(req, format!("no quota found for user {creator}")),
            Err(e) => {
                warn!(user = %creator, "Cannot list quotas: {e:?}");
                return errored(req, 500, format!("cannot get the quota of user {creator}"));
            }
        };
        if quota.spec.cordoned {
            return denied(req, format!("user {creator} is cordoned"));
        }
        let total = match Resources::from_quantities(&quota.spec.resources) {
            Ok(total) => total,
            Err(e) => {
                warn!(user = %creator, "Quota has invalid resources: {e:?}");
                return denied(req, e.current_context().to_string());
            }
        };

        let (info, _) = self.cache.load_or_store(creator, total);
        match info
            .test_and_update_creation(
                self.reader.as_ref(),
                shadow_pod,
                quota.spec.limits_enforcement,
                req.dry_run,
            )
            .await
        {
            Ok(()) => allowed(req),
            Err(e) => {
                info!(user = %creator, "Shadow pod rejected: {e:?}");
                denied(req, e.current_context().to_string())
            }
        }
    }

    fn handle_update(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        let namespace = req.namespace.as_deref();
        let (old, new) = match (
            decode_shadow_pod(req.old_object.as_ref(), namespace),
            decode_shadow_pod(req.object.as_ref(), namespace),
        ) {
            (Ok(old), Ok(new)) => (old, new),
            (Err(message), _) | (_, Err(message)) => return errored(req, 400, message),
        };

        if old.labels().get(ORIGIN_CLUSTER_ID_LABEL) != new.labels().get(ORIGIN_CLUSTER_ID_LABEL) {
            return denied(req, format!("the {ORIGIN_CLUSTER_ID_LABEL} label cannot be changed"));
        }

        match check_benign_update(&old.spec.pod, &new.spec.pod) {
            Ok(()) => allowed(req),
            Err(message) => denied(req, message),
        }
    }

    async fn handle_delete(&self, req: &AdmissionRequest<DynamicObject>) -> AdmissionResponse {
        if !self.config.enable_resource_validation {
            return allowed(req);
        }

        let shadow_pod = match decode_shadow_pod(req.old_object.as_ref(), req.namespace.as_deref()) {
            Ok(shadow_pod) => shadow_pod,
            Err(message) => {
                warn!("Allowing deletion of undecodable shadow pod: {message}");
                return allowed(req);
            }
        };
        let name = NamespacedName::of(&shadow_pod);

        let Some(creator) = shadow_pod.labels().get(CREATOR_USER_LABEL) else {
            warn!(shadow_pod = %name, "Deleted shadow pod has no creator, quota not released");
            return allowed(req);
        };
        let Some(info) = self.cache.get(creator) else {
            warn!(shadow_pod = %name, user = %creator, "Deleted shadow pod belongs to an untracked tenant");
            return allowed(req);
        };

        match info.update_deletion(&shadow_pod, req.dry_run).await {
            Ok(()) => debug!(shadow_pod = %name, "Deletion accounted"),
            Err(e) if e.current_context().is_consistency_error() => {
                warn!(shadow_pod = %name, "Quota cache out of sync, the next refresh heals it: {e:?}");
            }
            Err(e) => warn!(shadow_pod = %name, "Cannot release quota: {e:?}"),
        }
        allowed(req)
    }
}
