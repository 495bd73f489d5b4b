//! Kubernetes integration.
//!
//! [`KubeClusterReader`] implements the quota cache's cluster seam on top of
//! a `kube` client.

pub mod cluster_reader;
pub mod types;

pub use cluster_reader::KubeClusterReader;
pub use types::KubernetesError;
