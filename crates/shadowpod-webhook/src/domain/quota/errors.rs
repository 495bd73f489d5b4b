use core::error::Error;

use super::resources::MilliQuantity;

/// Errors returned by the quota accounting layer.
///
/// The webhook maps each variant onto an admission outcome: validation and
/// quota errors are denials, consistency errors are logged and never block a
/// deletion, cluster access errors are transient.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum QuotaError {
    #[display("invalid shadow pod resources: {message}")]
    Validation { message: String },
    #[display("shadow pod {name} is already running")]
    AlreadyRunning { name: String },
    #[display("shadow pod {name} still exists in the cluster, retry once its deletion completes")]
    StillExists { name: String },
    #[display("quota exceeded for resource {resource}: free {free}, requested {requested}")]
    QuotaExceeded {
        resource: String,
        free: MilliQuantity,
        requested: MilliQuantity,
    },
    #[display("resource {resource} is not part of the tenant quota")]
    UnknownResource { resource: String },
    #[display("shadow pod {name} not found in the quota cache")]
    NotFound { name: String },
    #[display("shadow pod {name} UID mismatch: cached {cached}, received {received}")]
    UidMismatch {
        name: String,
        cached: String,
        received: String,
    },
    #[display("failed to query the cluster: {message}")]
    ClusterAccess { message: String },
}

impl Error for QuotaError {}

impl QuotaError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Consistency errors signal drift between the cache and the cluster and
    /// are healed by the next reconciliation pass.
    pub fn is_consistency_error(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::UidMismatch { .. })
    }
}
