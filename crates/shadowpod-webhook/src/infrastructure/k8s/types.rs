use core::error::Error;

/// Errors that can occur during Kubernetes operations.
#[derive(Debug, derive_more::Display)]
pub enum KubernetesError {
    #[display("Failed to connect to Kubernetes API: {message}")]
    ConnectionFailed { message: String },
    #[display("Failed to list {resource}: {message}")]
    ListFailed { resource: String, message: String },
    #[display("Failed to get {resource} {name}: {message}")]
    GetFailed {
        resource: String,
        name: String,
        message: String,
    },
}

impl Error for KubernetesError {}
