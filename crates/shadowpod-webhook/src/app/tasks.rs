use std::time::Duration;

use anyhow::anyhow;
use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::server::TlsFiles;
use crate::api::WebhookServer;
use crate::app::core::Application;

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<Result<()>>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, app: &Application) {
        let refresher_task = self.spawn_cache_refresher_task(app);
        self.tasks.push(refresher_task);

        let webhook_server_task = self.spawn_webhook_server_task(app);
        self.tasks.push(webhook_server_task);
    }

    /// Wait for tasks to complete or receive shutdown signal.
    ///
    /// Any task ending before shutdown is an error: the process must not keep
    /// running, or exit successfully, with half of its services gone.
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {e}");
                    }
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();

                self.wait_for_tasks_with_timeout(Duration::from_secs(30)).await;
            }
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, index, _remaining) = result;
                self.cancellation_token.cancel();
                return match result {
                    Ok(Ok(())) => {
                        tracing::error!(task = index, "Task completed before shutdown");
                        Err(anyhow!("task {index} completed before shutdown"))
                    }
                    Ok(Err(e)) => {
                        tracing::error!(task = index, "Task failed: {e:#}");
                        Err(e)
                    }
                    Err(e) => {
                        tracing::error!(task = index, "Task panicked or was aborted: {e}");
                        Err(e.into())
                    }
                };
            }
        }

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                match task.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!("Task failed during shutdown: {e:#}"),
                    Err(e) => tracing::error!("Task failed during shutdown: {e}"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_cache_refresher_task(&self, app: &Application) -> JoinHandle<Result<()>> {
        let refresher = app.services().refresher.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting quota cache refresher task");
            refresher.run(token).await;
            tracing::info!("Quota cache refresher task completed");
            Ok(())
        })
    }

    fn spawn_webhook_server_task(&self, app: &Application) -> JoinHandle<Result<()>> {
        let args = app.webhook_args();
        let tls = match (&args.tls_cert, &args.tls_key) {
            (Some(cert), Some(key)) => Some(TlsFiles {
                cert: cert.clone(),
                key: key.clone(),
            }),
            _ => None,
        };
        let server = WebhookServer::new(
            args.listen_addr.clone(),
            tls,
            app.services().validator.clone(),
            app.services().mutator.clone(),
        );
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            match server.run(token).await {
                Ok(()) => {
                    tracing::info!("Webhook server completed");
                    Ok(())
                }
                Err(e) => Err(anyhow!("webhook server failed: {e:?}")),
            }
        })
    }
}
