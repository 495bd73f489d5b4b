//! Tenant-keyed collection of quota ledgers.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use super::peering_info::PeeringInfo;
use super::resources::Resources;

/// Concurrent map from tenant user name to its [`PeeringInfo`].
///
/// Lookups hand out `Arc` clones so that no map guard is ever held while a
/// ledger is locked or awaited on.
#[derive(Debug, Default)]
pub struct PeeringCache {
    tenants: DashMap<String, Arc<PeeringInfo>>,
    /// Set once the first full refresh has completed.
    ready: AtomicBool,
}

impl PeeringCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        if !self.ready.swap(true, Ordering::AcqRel) {
            info!(tenants = self.tenants.len(), "Quota cache is ready");
        }
    }

    pub fn get(&self, user_name: &str) -> Option<Arc<PeeringInfo>> {
        self.tenants.get(user_name).map(|entry| entry.value().clone())
    }

    /// Get the ledger of `user_name`, creating an empty one with
    /// `total_quota` if missing. The second value is `true` when the ledger
    /// already existed.
    pub fn load_or_store(&self, user_name: &str, total_quota: Resources) -> (Arc<PeeringInfo>, bool) {
        match self.tenants.entry(user_name.to_string()) {
            Entry::Occupied(entry) => (entry.get().clone(), true),
            Entry::Vacant(entry) => {
                info!(user = user_name, quota = %total_quota, "Tracking new tenant");
                let info = Arc::new(PeeringInfo::new(user_name, total_quota));
                entry.insert(info.clone());
                (info, false)
            }
        }
    }

    pub fn remove(&self, user_name: &str) -> Option<Arc<PeeringInfo>> {
        let removed = self.tenants.remove(user_name).map(|(_, info)| info);
        if removed.is_some() {
            info!(user = user_name, "Stopped tracking tenant");
        }
        removed
    }

    /// Snapshot of the tracked tenants.
    pub fn tenants(&self) -> Vec<Arc<PeeringInfo>> {
        self.tenants.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn user_names(&self) -> Vec<String> {
        self.tenants.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}
