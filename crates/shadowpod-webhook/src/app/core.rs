use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::tasks::Tasks;
use crate::config::WebhookArgs;

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    webhook_args: WebhookArgs,
}

impl Application {
    pub fn new(services: ApplicationServices, webhook_args: WebhookArgs) -> Self {
        Self {
            services,
            webhook_args,
        }
    }

    pub fn services(&self) -> &ApplicationServices {
        &self.services
    }

    pub fn webhook_args(&self) -> &WebhookArgs {
        &self.webhook_args
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new();
        tasks.spawn_all_tasks(self);

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }

    /// Log the final state of the quota cache
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application...");

        for info in self.services.cache.tenants() {
            let used = info.used_quota().await;
            let total = info.total_quota().await;
            tracing::info!(
                user = info.user_name(),
                used = %used,
                total = %total,
                "Final tenant quota usage"
            );
        }

        tracing::info!("Application shutdown completed");
        Ok(())
    }
}
