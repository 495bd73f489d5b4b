//! Per-tenant quota ledger.

use std::collections::HashMap;
use std::collections::HashSet;
use std::time::Duration;

use api_types::LimitsEnforcement;
use api_types::ShadowPod;
use chrono::Utc;
use error_stack::Report;
use error_stack::ResultExt;
use kube::ResourceExt;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::description::Description;
use super::description::NamespacedName;
use super::errors::QuotaError;
use super::resources::Resources;
use super::traits::ClusterReader;

/// Accounting state of one tenant. Always accessed through the lock in
/// [`PeeringInfo`].
#[derive(Debug, Default)]
struct Ledger {
    shadow_pods: HashMap<NamespacedName, Description>,
    total_quota: Resources,
    /// Sum of the footprints of the running descriptions.
    used_quota: Resources,
}

impl Ledger {
    fn add(&mut self, description: Description) -> Result<(), Report<QuotaError>> {
        if description.is_running() {
            self.used_quota.add(description.quota())?;
        }
        self.shadow_pods
            .insert(description.namespaced_name().clone(), description);
        Ok(())
    }

    fn terminate(&mut self, name: &NamespacedName) {
        let Some(description) = self.shadow_pods.get_mut(name) else {
            return;
        };
        if !description.is_running() {
            return;
        }
        description.terminate();
        self.used_quota.subtract(description.quota());

        let negative = self.used_quota.negative_resources();
        if !negative.is_empty() {
            warn!(
                shadow_pod = %name,
                resources = ?negative,
                "Used quota dropped below zero, the cache is inconsistent"
            );
        }
    }

    fn remove(&mut self, name: &NamespacedName) -> Option<Description> {
        self.terminate(name);
        self.shadow_pods.remove(name)
    }

    fn check(&self, requested: &Resources) -> Result<(), Report<QuotaError>> {
        for (resource, amount) in requested.iter() {
            let Some(total) = self.total_quota.get(resource) else {
                return Err(Report::new(QuotaError::UnknownResource {
                    resource: resource.to_string(),
                }));
            };
            let free = total - self.used_quota.get(resource).unwrap_or_default();
            if free < amount {
                return Err(Report::new(QuotaError::QuotaExceeded {
                    resource: resource.to_string(),
                    free,
                    requested: amount,
                }));
            }
        }
        Ok(())
    }

    fn free_quota(&self) -> Resources {
        self.total_quota
            .iter()
            .map(|(resource, total)| {
                (
                    resource,
                    total - self.used_quota.get(resource).unwrap_or_default(),
                )
            })
            .collect()
    }
}

/// Quota ledger of a single tenant.
///
/// All mutations take the write lock, so admissions for the same tenant are
/// fully serialized while different tenants never contend.
#[derive(Debug)]
pub struct PeeringInfo {
    user_name: String,
    ledger: RwLock<Ledger>,
}

impl PeeringInfo {
    pub fn new(user_name: impl Into<String>, total_quota: Resources) -> Self {
        Self {
            user_name: user_name.into(),
            ledger: RwLock::new(Ledger {
                total_quota,
                ..Default::default()
            }),
        }
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// Check whether a new ShadowPod fits in the tenant quota and, unless
    /// `dry_run`, account for it.
    ///
    /// A terminated entry with the same name is only replaced once the old
    /// object is gone from the cluster.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::AlreadyRunning`] if the ShadowPod is already accounted for
    /// - [`QuotaError::StillExists`] if a previous object with the same name is still being deleted
    /// - [`QuotaError::ClusterAccess`] if the existence check fails
    /// - [`QuotaError::Validation`] if the pod resources are invalid
    /// - [`QuotaError::UnknownResource`] if a requested resource is not in the quota
    /// - [`QuotaError::QuotaExceeded`] if there is not enough free quota
    #[tracing::instrument(skip_all, fields(user = %self.user_name, shadow_pod = %NamespacedName::of(shadow_pod), dry_run = dry_run))]
    pub async fn test_and_update_creation(
        &self,
        reader: &dyn ClusterReader,
        shadow_pod: &ShadowPod,
        enforcement: LimitsEnforcement,
        dry_run: bool,
    ) -> Result<(), Report<QuotaError>> {
        let name = NamespacedName::of(shadow_pod);
        let mut ledger = self.ledger.write().await;

        let description = match ledger.shadow_pods.get(&name) {
            Some(existing) if existing.is_running() => {
                return Err(Report::new(QuotaError::AlreadyRunning {
                    name: name.to_string(),
                }));
            }
            Some(_) => {
                let live = reader.get_shadow_pod(&name).await.change_context_lazy(|| {
                    QuotaError::ClusterAccess {
                        message: format!("cannot check whether {name} still exists"),
                    }
                })?;
                if live.is_some() {
                    return Err(Report::new(QuotaError::StillExists {
                        name: name.to_string(),
                    }));
                }
                debug!("Replacing terminated entry of a deleted shadow pod");
                Description::from_shadow_pod(shadow_pod, enforcement)?
            }
            None => Description::from_shadow_pod(shadow_pod, enforcement)?,
        };

        ledger.check(description.quota())?;

        if !dry_run {
            ledger.remove(&name);
            info!(footprint = %description.quota(), "Shadow pod admitted");
            ledger.add(description)?;
        }
        Ok(())
    }

    /// Release the quota of a deleted ShadowPod.
    ///
    /// The entry stays in the ledger, marked as terminated, until the
    /// reconciliation pass observes the object is gone.
    ///
    /// # Errors
    ///
    /// - [`QuotaError::NotFound`] if the ShadowPod is not in the ledger
    /// - [`QuotaError::UidMismatch`] if the ledger refers to another object with the same name
    #[tracing::instrument(skip_all, fields(user = %self.user_name, shadow_pod = %NamespacedName::of(shadow_pod), dry_run = dry_run))]
    pub async fn update_deletion(
        &self,
        shadow_pod: &ShadowPod,
        dry_run: bool,
    ) -> Result<(), Report<QuotaError>> {
        let name = NamespacedName::of(shadow_pod);
        let uid = shadow_pod.uid().unwrap_or_default();
        let mut ledger = self.ledger.write().await;

        let Some(description) = ledger.shadow_pods.get(&name) else {
            return Err(Report::new(QuotaError::NotFound {
                name: name.to_string(),
            }));
        };
        // Objects are admitted before the API server assigns their UID.
        if !description.uid().is_empty() && description.uid() != uid {
            return Err(Report::new(QuotaError::UidMismatch {
                name: name.to_string(),
                cached: description.uid().to_string(),
                received: uid,
            }));
        }

        if !dry_run {
            ledger.terminate(&name);
            info!("Shadow pod quota released");
        }
        Ok(())
    }

    pub async fn update_total_quota(&self, total_quota: Resources) {
        let mut ledger = self.ledger.write().await;
        if ledger.total_quota != total_quota {
            info!(
                user = %self.user_name,
                old = %ledger.total_quota,
                new = %total_quota,
                "Updating tenant quota"
            );
            ledger.total_quota = total_quota;
        }
    }

    /// Account for live ShadowPods missing from the ledger, e.g. admitted
    /// while this replica was not running.
    pub async fn align_existing_shadow_pods(&self, live: &[ShadowPod]) {
        let mut ledger = self.ledger.write().await;
        for shadow_pod in live {
            let name = NamespacedName::of(shadow_pod);
            let uid = shadow_pod.uid().unwrap_or_default();

            match ledger.shadow_pods.get_mut(&name) {
                Some(cached) if cached.uid() == uid || uid.is_empty() => continue,
                Some(cached) if cached.uid().is_empty() => {
                    cached.adopt_uid(uid);
                    continue;
                }
                Some(cached) => {
                    warn!(
                        user = %self.user_name,
                        shadow_pod = %name,
                        cached_uid = cached.uid(),
                        live_uid = %uid,
                        "Cached shadow pod refers to a previous object, replacing it"
                    );
                }
                None => {
                    info!(user = %self.user_name, shadow_pod = %name, "Adding shadow pod missing from the cache");
                }
            }

            match Description::from_shadow_pod(shadow_pod, LimitsEnforcement::None) {
                Ok(description) => {
                    ledger.remove(&name);
                    if let Err(e) = ledger.add(description) {
                        warn!(user = %self.user_name, shadow_pod = %name, "Cannot account for shadow pod: {e:?}");
                    }
                }
                Err(e) => {
                    warn!(user = %self.user_name, shadow_pod = %name, "Cannot account for shadow pod: {e:?}");
                }
            }
        }
    }

    /// Drop ledger entries whose ShadowPod is gone from the cluster.
    ///
    /// Terminated entries are removed right away. Running entries are only
    /// terminated and removed once older than `grace_period`, so that a create
    /// still propagating to the cluster is not mistaken for a lost delete.
    pub async fn align_terminating_or_not_existing_shadow_pods(
        &self,
        live: &[ShadowPod],
        grace_period: Duration,
    ) {
        let live_names: HashSet<NamespacedName> = live.iter().map(NamespacedName::of).collect();
        let now = Utc::now();
        let mut ledger = self.ledger.write().await;

        let stale: Vec<(NamespacedName, bool)> = ledger
            .shadow_pods
            .values()
            .filter(|d| !live_names.contains(d.namespaced_name()))
            .filter(|d| !d.is_running() || d.is_older_than(grace_period, now))
            .map(|d| (d.namespaced_name().clone(), d.is_running()))
            .collect();

        for (name, running) in stale {
            if running {
                warn!(user = %self.user_name, shadow_pod = %name, "Shadow pod vanished without a delete, releasing its quota");
            } else {
                debug!(user = %self.user_name, shadow_pod = %name, "Removing terminated shadow pod");
            }
            ledger.remove(&name);
        }
    }

    pub async fn total_quota(&self) -> Resources {
        self.ledger.read().await.total_quota.clone()
    }

    pub async fn used_quota(&self) -> Resources {
        self.ledger.read().await.used_quota.clone()
    }

    pub async fn free_quota(&self) -> Resources {
        self.ledger.read().await.free_quota()
    }

    pub async fn shadow_pod(&self, name: &NamespacedName) -> Option<Description> {
        self.ledger.read().await.shadow_pods.get(name).cloned()
    }

    pub async fn shadow_pod_count(&self) -> usize {
        self.ledger.read().await.shadow_pods.len()
    }

    #[cfg(test)]
    pub(crate) async fn insert_description(&self, description: Description) {
        self.ledger
            .write()
            .await
            .add(description)
            .expect("test description fits the ledger");
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use test_log::test;

    use super::*;
    use crate::domain::quota::mock::shadow_pod;
    use crate::domain::quota::mock::MockClusterReader;
    use crate::domain::quota::resources::MilliQuantity;

    const GRACE: Duration = Duration::from_secs(30);

    fn resources(values: &[(&str, &str)]) -> Resources {
        values
            .iter()
            .map(|(name, value)| (*name, MilliQuantity::parse(value).expect("valid quantity")))
            .collect()
    }

    fn peering_info(cpu: &str, memory: &str) -> PeeringInfo {
        PeeringInfo::new("alice", resources(&[("cpu", cpu), ("memory", memory)]))
    }

    async fn sum_of_running(info: &PeeringInfo) -> Resources {
        let ledger = info.ledger.read().await;
        let mut sum = Resources::new();
        for description in ledger.shadow_pods.values().filter(|d| d.is_running()) {
            sum.add(description.quota()).expect("sum in range");
        }
        sum
    }

    #[test(tokio::test)]
    async fn full_quota_scenario() {
        let reader = MockClusterReader::new();
        let info = peering_info("1000000", "1000000");

        let a = shadow_pod("ns", "a", "uid-a", "alice", &[("1000000", "1000000")]);
        info.test_and_update_creation(&reader, &a, LimitsEnforcement::None, false)
            .await
            .expect("a fits");
        assert_eq!(info.used_quota().await, info.total_quota().await);
        assert_eq!(info.free_quota().await, resources(&[("cpu", "0"), ("memory", "0")]));

        let b = shadow_pod("ns", "b", "uid-b", "alice", &[("1", "0")]);
        let err = info
            .test_and_update_creation(&reader, &b, LimitsEnforcement::None, false)
            .await
            .expect_err("no free cpu");
        match err.current_context() {
            QuotaError::QuotaExceeded { resource, .. } => assert_eq!(resource, "cpu"),
            other => panic!("unexpected error {other}"),
        }
        assert!(err.to_string().contains("cpu"));

        info.update_deletion(&a, false).await.expect("a is cached");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "0"), ("memory", "0")]));
    }

    #[test(tokio::test)]
    async fn negative_requests_cannot_free_capacity() {
        // Arrange
        let reader = MockClusterReader::new();
        let info = peering_info("2", "2Gi");
        let negative = shadow_pod("ns", "neg", "uid-neg", "alice", &[("-2", "1Gi")]);
        let big = shadow_pod("ns", "big", "uid-big", "alice", &[("4", "1Gi")]);

        // Act
        let negative_err = info
            .test_and_update_creation(&reader, &negative, LimitsEnforcement::None, false)
            .await
            .expect_err("negative cpu");
        let big_err = info
            .test_and_update_creation(&reader, &big, LimitsEnforcement::None, false)
            .await
            .expect_err("4 cpu on a 2 cpu quota");

        // Assert
        assert!(matches!(negative_err.current_context(), QuotaError::Validation { .. }));
        assert!(matches!(big_err.current_context(), QuotaError::QuotaExceeded { .. }));
        assert_eq!(info.used_quota().await, Resources::new());
        assert_eq!(info.shadow_pod_count().await, 0);
    }

    #[test(tokio::test)]
    async fn oversized_quantities_are_denied_without_accounting() {
        let reader = MockClusterReader::new();
        let info = peering_info("2", "2Gi");
        let huge = shadow_pod("ns", "huge", "uid-huge", "alice", &[("1e35", "1Mi"), ("1e35", "1Mi")]);

        let err = info
            .test_and_update_creation(&reader, &huge, LimitsEnforcement::None, false)
            .await
            .expect_err("quantity out of range");

        assert!(matches!(err.current_context(), QuotaError::Validation { .. }));
        assert_eq!(info.shadow_pod_count().await, 0);
    }

    #[test(tokio::test)]
    async fn duplicate_creation_is_rejected() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let sp = shadow_pod("ns", "web", "uid-1", "alice", &[("1", "1Gi")]);

        info.test_and_update_creation(&reader, &sp, LimitsEnforcement::None, false)
            .await
            .expect("first admission");
        let err = info
            .test_and_update_creation(&reader, &sp, LimitsEnforcement::None, false)
            .await
            .expect_err("second admission");

        assert!(matches!(err.current_context(), QuotaError::AlreadyRunning { .. }));
        assert_eq!(info.used_quota().await, resources(&[("cpu", "1"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn dry_run_never_mutates_the_ledger() {
        let reader = MockClusterReader::new();
        let info = peering_info("2", "2Gi");
        let fits = shadow_pod("ns", "fits", "uid-1", "alice", &[("1", "1Gi")]);
        let too_big = shadow_pod("ns", "too-big", "uid-2", "alice", &[("3", "1Gi")]);

        for _ in 0..3 {
            info.test_and_update_creation(&reader, &fits, LimitsEnforcement::None, true)
                .await
                .expect("fits");
            assert!(info
                .test_and_update_creation(&reader, &too_big, LimitsEnforcement::None, true)
                .await
                .is_err());
        }

        assert_eq!(info.shadow_pod_count().await, 0);
        assert_eq!(info.used_quota().await, Resources::new());

        info.test_and_update_creation(&reader, &fits, LimitsEnforcement::None, false)
            .await
            .expect("fits");
        info.update_deletion(&fits, true).await.expect("cached");
        let cached = info
            .shadow_pod(&NamespacedName::new("ns", "fits"))
            .await
            .expect("still cached");
        assert!(cached.is_running());
        assert_eq!(info.used_quota().await, resources(&[("cpu", "1"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn unknown_resource_is_rejected() {
        let reader = MockClusterReader::new();
        let info = PeeringInfo::new("alice", resources(&[("cpu", "4")]));
        let sp = shadow_pod("ns", "web", "uid-1", "alice", &[("1", "1Gi")]);

        let err = info
            .test_and_update_creation(&reader, &sp, LimitsEnforcement::None, false)
            .await
            .expect_err("memory is not in the quota");
        assert_eq!(
            err.current_context(),
            &QuotaError::UnknownResource {
                resource: "memory".to_string()
            }
        );
    }

    #[test(tokio::test)]
    async fn deletion_errors_leave_usage_untouched() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let sp = shadow_pod("ns", "web", "uid-1", "alice", &[("1", "1Gi")]);

        let err = info.update_deletion(&sp, false).await.expect_err("not cached");
        assert!(matches!(err.current_context(), QuotaError::NotFound { .. }));

        info.test_and_update_creation(&reader, &sp, LimitsEnforcement::None, false)
            .await
            .expect("admitted");
        let recreated = shadow_pod("ns", "web", "uid-2", "alice", &[("1", "1Gi")]);
        let err = info.update_deletion(&recreated, false).await.expect_err("other uid");
        assert!(matches!(err.current_context(), QuotaError::UidMismatch { .. }));
        assert_eq!(info.used_quota().await, resources(&[("cpu", "1"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn deleted_entry_is_kept_until_the_object_is_gone() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let sp = shadow_pod("ns", "web", "uid-1", "alice", &[("1", "1Gi")]);
        reader.add_shadow_pod(sp.clone());

        info.test_and_update_creation(&reader, &sp, LimitsEnforcement::None, false)
            .await
            .expect("admitted");
        info.update_deletion(&sp, false).await.expect("cached");

        let cached = info
            .shadow_pod(&NamespacedName::new("ns", "web"))
            .await
            .expect("kept after deletion");
        assert!(!cached.is_running());

        let recreated = shadow_pod("ns", "web", "uid-2", "alice", &[("2", "1Gi")]);
        let err = info
            .test_and_update_creation(&reader, &recreated, LimitsEnforcement::None, false)
            .await
            .expect_err("old object still exists");
        assert!(matches!(err.current_context(), QuotaError::StillExists { .. }));

        reader.remove_shadow_pod("ns", "web");
        info.test_and_update_creation(&reader, &recreated, LimitsEnforcement::None, false)
            .await
            .expect("old object is gone");
        let cached = info
            .shadow_pod(&NamespacedName::new("ns", "web"))
            .await
            .expect("replaced");
        assert_eq!(cached.uid(), "uid-2");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "2"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn used_quota_matches_running_descriptions() {
        let reader = MockClusterReader::new();
        let info = peering_info("3", "3Gi");
        let pods: Vec<ShadowPod> = (0..5)
            .map(|i| shadow_pod("ns", &format!("pod-{i}"), &format!("uid-{i}"), "alice", &[("1", "512Mi")]))
            .collect();

        for (step, sp) in pods.iter().enumerate() {
            let _ = info
                .test_and_update_creation(&reader, sp, LimitsEnforcement::None, false)
                .await;
            if step % 2 == 1 {
                let _ = info.update_deletion(&pods[step - 1], false).await;
            }
            let used = info.used_quota().await;
            assert_eq!(used, sum_of_running(&info).await);
            let total = info.total_quota().await;
            for (resource, amount) in used.iter() {
                assert!(amount <= total.get(resource).expect("known resource"));
                assert!(!amount.is_negative());
            }
        }
    }

    #[test(tokio::test)]
    async fn align_existing_is_idempotent() {
        let info = peering_info("4", "4Gi");
        let live = vec![
            shadow_pod("ns", "a", "uid-a", "alice", &[("1", "1Gi")]),
            shadow_pod("ns", "b", "uid-b", "alice", &[("500m", "1Gi")]),
        ];

        info.align_existing_shadow_pods(&live).await;
        let used_once = info.used_quota().await;
        let count_once = info.shadow_pod_count().await;

        info.align_existing_shadow_pods(&live).await;
        assert_eq!(info.used_quota().await, used_once);
        assert_eq!(info.shadow_pod_count().await, count_once);
        assert_eq!(used_once, resources(&[("cpu", "1500m"), ("memory", "2Gi")]));
    }

    #[test(tokio::test)]
    async fn align_existing_replaces_previous_generation() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let old = shadow_pod("ns", "a", "uid-old", "alice", &[("1", "1Gi")]);
        info.test_and_update_creation(&reader, &old, LimitsEnforcement::None, false)
            .await
            .expect("admitted");

        let new = shadow_pod("ns", "a", "uid-new", "alice", &[("2", "1Gi")]);
        info.align_existing_shadow_pods(&[new]).await;

        let cached = info
            .shadow_pod(&NamespacedName::new("ns", "a"))
            .await
            .expect("cached");
        assert_eq!(cached.uid(), "uid-new");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "2"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn entries_admitted_without_uid_adopt_the_live_one() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let admitted = shadow_pod("ns", "a", "", "alice", &[("1", "1Gi")]);
        info.test_and_update_creation(&reader, &admitted, LimitsEnforcement::None, false)
            .await
            .expect("admitted");

        let live = shadow_pod("ns", "a", "uid-a", "alice", &[("1", "1Gi")]);
        info.align_existing_shadow_pods(std::slice::from_ref(&live)).await;

        let cached = info
            .shadow_pod(&NamespacedName::new("ns", "a"))
            .await
            .expect("cached");
        assert_eq!(cached.uid(), "uid-a");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "1"), ("memory", "1Gi")]));

        info.update_deletion(&live, false).await.expect("uid matches");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "0"), ("memory", "0")]));
    }

    #[test(tokio::test)]
    async fn deletion_matches_entries_admitted_without_uid() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let admitted = shadow_pod("ns", "a", "", "alice", &[("1", "1Gi")]);
        info.test_and_update_creation(&reader, &admitted, LimitsEnforcement::None, false)
            .await
            .expect("admitted");

        let deleted = shadow_pod("ns", "a", "uid-a", "alice", &[("1", "1Gi")]);
        info.update_deletion(&deleted, false).await.expect("empty cached uid matches");
        assert_eq!(info.used_quota().await, resources(&[("cpu", "0"), ("memory", "0")]));
    }

    #[test(tokio::test)]
    async fn missing_running_entries_respect_the_grace_period() {
        let info = peering_info("4", "4Gi");
        let footprint = resources(&[("cpu", "1"), ("memory", "1Gi")]);
        let old = Description::new(NamespacedName::new("ns", "old"), "uid-old", footprint.clone())
            .with_creation_timestamp(Utc::now() - chrono::Duration::seconds(31));
        let young = Description::new(NamespacedName::new("ns", "young"), "uid-young", footprint);
        info.insert_description(old).await;
        info.insert_description(young).await;

        info.align_terminating_or_not_existing_shadow_pods(&[], GRACE)
            .await;

        assert!(info.shadow_pod(&NamespacedName::new("ns", "old")).await.is_none());
        let young = info
            .shadow_pod(&NamespacedName::new("ns", "young"))
            .await
            .expect("young entry is kept");
        assert!(young.is_running());
        assert_eq!(info.used_quota().await, resources(&[("cpu", "1"), ("memory", "1Gi")]));
    }

    #[test(tokio::test)]
    async fn terminated_entries_are_removed_once_gone() {
        let reader = MockClusterReader::new();
        let info = peering_info("4", "4Gi");
        let gone = shadow_pod("ns", "gone", "uid-1", "alice", &[("1", "1Gi")]);
        let alive = shadow_pod("ns", "alive", "uid-2", "alice", &[("1", "1Gi")]);
        for sp in [&gone, &alive] {
            info.test_and_update_creation(&reader, sp, LimitsEnforcement::None, false)
                .await
                .expect("admitted");
            info.update_deletion(sp, false).await.expect("cached");
        }

        info.align_terminating_or_not_existing_shadow_pods(std::slice::from_ref(&alive), GRACE)
            .await;

        assert!(info.shadow_pod(&NamespacedName::new("ns", "gone")).await.is_none());
        assert!(info.shadow_pod(&NamespacedName::new("ns", "alive")).await.is_some());
        assert_eq!(info.used_quota().await, resources(&[("cpu", "0"), ("memory", "0")]));
    }

    #[test(tokio::test)]
    async fn concurrent_admissions_never_overcommit() {
        let reader = std::sync::Arc::new(MockClusterReader::new());
        let info = std::sync::Arc::new(peering_info("3", "3Gi"));

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let reader = reader.clone();
                let info = info.clone();
                tokio::spawn(async move {
                    let sp = shadow_pod("ns", &format!("pod-{i}"), &format!("uid-{i}"), "alice", &[("1", "1Gi")]);
                    info.test_and_update_creation(reader.as_ref(), &sp, LimitsEnforcement::None, false)
                        .await
                        .is_ok()
                })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.expect("task completes") {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 3);
        assert_eq!(info.used_quota().await, info.total_quota().await);
    }
}
