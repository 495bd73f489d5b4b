use std::sync::Arc;

use anyhow::Result;

use crate::api::ShadowPodMutator;
use crate::api::ShadowPodValidator;
use crate::app::Application;
use crate::app::ApplicationServices;
use crate::config::QuotaConfig;
use crate::config::WebhookArgs;
use crate::domain::quota::CacheRefresher;
use crate::domain::quota::ClusterReader;
use crate::domain::quota::PeeringCache;
use crate::infrastructure::k8s::KubeClusterReader;
use crate::infrastructure::kube_client::init_kube_client;

/// Application builder
pub struct ApplicationBuilder {
    webhook_args: WebhookArgs,
}

impl ApplicationBuilder {
    pub fn new(webhook_args: WebhookArgs) -> Self {
        Self { webhook_args }
    }

    /// Connect to the cluster and wire the services
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let client = init_kube_client(self.webhook_args.kubeconfig.clone())
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize Kubernetes client: {e:?}"))?;
        let reader: Arc<dyn ClusterReader> = Arc::new(KubeClusterReader::new(client));

        let services = Self::create_services(reader, QuotaConfig::from(&self.webhook_args));
        Ok(Application::new(services, self.webhook_args))
    }

    /// Wire the services around a cluster reader
    pub fn create_services(reader: Arc<dyn ClusterReader>, config: QuotaConfig) -> ApplicationServices {
        tracing::info!(
            enable_resource_validation = config.enable_resource_validation,
            refresh_interval = ?config.refresh_interval,
            grace_period = ?config.grace_period,
            "Quota enforcement configuration"
        );

        let cache = Arc::new(PeeringCache::new());
        let refresher = Arc::new(CacheRefresher::new(
            cache.clone(),
            reader.clone(),
            config.clone(),
        ));
        let validator = Arc::new(ShadowPodValidator::new(cache.clone(), reader, config));
        let mutator = Arc::new(ShadowPodMutator::new());

        ApplicationServices {
            cache,
            refresher,
            validator,
            mutator,
        }
    }
}
