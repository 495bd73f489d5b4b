//! Admission webhook HTTP API.
//!
//! Exposes the validating and mutating ShadowPod webhooks as `AdmissionReview`
//! endpoints, plus liveness and readiness probes.

pub mod errors;
pub mod handlers;
pub mod mutator;
pub mod response;
pub mod server;
pub mod update_check;
pub mod validator;

#[cfg(test)]
pub(crate) mod fixtures;

pub use errors::ApiError;
pub use mutator::ShadowPodMutator;
pub use server::WebhookServer;
pub use validator::ShadowPodValidator;
