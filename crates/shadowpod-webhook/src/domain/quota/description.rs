use std::fmt;
use std::time::Duration;

use api_types::LimitsEnforcement;
use api_types::ShadowPod;
use chrono::DateTime;
use chrono::Utc;
use error_stack::Report;
use kube::ResourceExt;

use super::errors::QuotaError;
use super::footprint::compute_footprint;
use super::resources::Resources;

/// Stable identity of a namespaced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn of(shadow_pod: &ShadowPod) -> Self {
        Self::new(shadow_pod.namespace().unwrap_or_default(), shadow_pod.name_any())
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Resource footprint and lifecycle state of one admitted ShadowPod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    namespaced_name: NamespacedName,
    uid: String,
    quota: Resources,
    running: bool,
    /// When this record was created, not when the object was.
    creation_timestamp: DateTime<Utc>,
}

impl Description {
    pub fn new(namespaced_name: NamespacedName, uid: impl Into<String>, quota: Resources) -> Self {
        Self {
            namespaced_name,
            uid: uid.into(),
            quota,
            running: true,
            creation_timestamp: Utc::now(),
        }
    }

    /// Build a running description, computing the footprint of the pod spec.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::Validation`] if the pod resources violate `enforcement`
    pub fn from_shadow_pod(
        shadow_pod: &ShadowPod,
        enforcement: LimitsEnforcement,
    ) -> Result<Self, Report<QuotaError>> {
        let quota = compute_footprint(&shadow_pod.spec.pod, enforcement)?;
        Ok(Self::new(
            NamespacedName::of(shadow_pod),
            shadow_pod.uid().unwrap_or_default(),
            quota,
        ))
    }

    pub(crate) fn with_creation_timestamp(mut self, creation_timestamp: DateTime<Utc>) -> Self {
        self.creation_timestamp = creation_timestamp;
        self
    }

    pub fn namespaced_name(&self) -> &NamespacedName {
        &self.namespaced_name
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn quota(&self) -> &Resources {
        &self.quota
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn creation_timestamp(&self) -> DateTime<Utc> {
        self.creation_timestamp
    }

    pub fn terminate(&mut self) {
        self.running = false;
    }

    /// Record the UID of an entry admitted before the API server assigned one.
    pub(crate) fn adopt_uid(&mut self, uid: impl Into<String>) {
        if self.uid.is_empty() {
            self.uid = uid.into();
        }
    }

    /// Whether the record was created more than `grace_period` before `now`.
    pub fn is_older_than(&self, grace_period: Duration, now: DateTime<Utc>) -> bool {
        match chrono::Duration::from_std(grace_period) {
            Ok(grace_period) => now - self.creation_timestamp > grace_period,
            Err(_) => false,
        }
    }
}
