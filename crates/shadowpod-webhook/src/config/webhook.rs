use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
pub struct WebhookArgs {
    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to kubeconfig file (defaults to cluster config or ~/.kube/config)"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "WEBHOOK_LISTEN_ADDR",
        default_value = "0.0.0.0:9443",
        help = "Admission webhook listen address"
    )]
    pub listen_addr: String,

    #[arg(
        long,
        env = "WEBHOOK_TLS_CERT",
        value_hint = clap::ValueHint::FilePath,
        requires = "tls_key",
        help = "PEM certificate served by the webhook, plain HTTP when omitted"
    )]
    pub tls_cert: Option<PathBuf>,

    #[arg(
        long,
        env = "WEBHOOK_TLS_KEY",
        value_hint = clap::ValueHint::FilePath,
        requires = "tls_cert",
        help = "PEM private key matching --tls-cert"
    )]
    pub tls_key: Option<PathBuf>,

    #[arg(
        long,
        env = "ENABLE_RESOURCE_VALIDATION",
        help = "Check ShadowPod creations against the tenant quota",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub enable_resource_validation: bool,

    #[arg(
        long,
        env = "CACHE_REFRESH_INTERVAL_SECS",
        default_value = "10",
        help = "Interval in seconds between quota cache reconciliations"
    )]
    pub cache_refresh_interval_secs: u64,

    #[arg(
        long,
        env = "GRACE_PERIOD_SECS",
        default_value = "30",
        help = "Seconds a cached ShadowPod missing from the cluster is kept before its quota is released"
    )]
    pub grace_period_secs: u64,
}
