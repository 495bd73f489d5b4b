use std::sync::Arc;

use crate::api::ShadowPodMutator;
use crate::api::ShadowPodValidator;
use crate::domain::quota::CacheRefresher;
use crate::domain::quota::PeeringCache;

/// Application dependencies, shared by the background tasks and the webhook server
pub struct ApplicationServices {
    pub cache: Arc<PeeringCache>,
    pub refresher: Arc<CacheRefresher>,
    pub validator: Arc<ShadowPodValidator>,
    pub mutator: Arc<ShadowPodMutator>,
}
