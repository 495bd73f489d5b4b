use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use error_stack::Report;
use error_stack::ResultExt;
use poem::get;
use poem::listener::Listener;
use poem::listener::RustlsCertificate;
use poem::listener::RustlsConfig;
use poem::listener::TcpListener;
use poem::middleware::Tracing;
use poem::post;
use poem::Endpoint;
use poem::EndpointExt;
use poem::Route;
use poem::Server;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::errors::ApiError;
use super::handlers::healthz;
use super::handlers::mutate_shadow_pod;
use super::handlers::readyz;
use super::handlers::validate_shadow_pod;
use super::mutator::ShadowPodMutator;
use super::validator::ShadowPodValidator;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// PEM files served by the webhook.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Build the webhook routes.
pub fn routes(validator: Arc<ShadowPodValidator>, mutator: Arc<ShadowPodMutator>) -> impl Endpoint {
    Route::new()
        .at("/validate/shadowpods", post(validate_shadow_pod))
        .at("/mutate/shadowpods", post(mutate_shadow_pod))
        .at("/healthz", get(healthz))
        .at("/readyz", get(readyz))
        .data(validator)
        .data(mutator)
        .with(Tracing)
}

/// HTTPS server for the ShadowPod admission webhooks
pub struct WebhookServer {
    listen_addr: String,
    tls: Option<TlsFiles>,
    validator: Arc<ShadowPodValidator>,
    mutator: Arc<ShadowPodMutator>,
}

impl WebhookServer {
    pub fn new(
        listen_addr: String,
        tls: Option<TlsFiles>,
        validator: Arc<ShadowPodValidator>,
        mutator: Arc<ShadowPodMutator>,
    ) -> Self {
        Self {
            listen_addr,
            tls,
            validator,
            mutator,
        }
    }

    /// Serve until `cancellation_token` is cancelled.
    ///
    /// # Errors
    ///
    /// - [`ApiError::TlsConfig`] if the certificate or key cannot be read
    /// - [`ApiError::ServerError`] if the server fails to start or bind to the address
    pub async fn run(self, cancellation_token: CancellationToken) -> Result<(), Report<ApiError>> {
        let app = routes(self.validator, self.mutator);
        let listener = TcpListener::bind(self.listen_addr.clone());
        let shutdown = cancellation_token.cancelled();

        let result = match &self.tls {
            Some(tls) => {
                info!("Starting admission webhook server on https://{}", self.listen_addr);
                let config = load_tls_config(tls).await?;
                Server::new(listener.rustls(config))
                    .run_with_graceful_shutdown(app, shutdown, Some(SHUTDOWN_TIMEOUT))
                    .await
            }
            None => {
                info!("Starting admission webhook server on http://{}", self.listen_addr);
                Server::new(listener)
                    .run_with_graceful_shutdown(app, shutdown, Some(SHUTDOWN_TIMEOUT))
                    .await
            }
        };

        result.change_context(ApiError::ServerError {
            message: format!("webhook server on {} failed", self.listen_addr),
        })?;
        info!("Admission webhook server stopped");
        Ok(())
    }
}

async fn load_tls_config(tls: &TlsFiles) -> Result<RustlsConfig, Report<ApiError>> {
    let cert = tokio::fs::read(&tls.cert)
        .await
        .change_context_lazy(|| ApiError::TlsConfig {
            message: format!("cannot read certificate {}", tls.cert.display()),
        })?;
    let key = tokio::fs::read(&tls.key)
        .await
        .change_context_lazy(|| ApiError::TlsConfig {
            message: format!("cannot read private key {}", tls.key.display()),
        })?;
    Ok(RustlsConfig::new().fallback(RustlsCertificate::new().cert(cert).key(key)))
}
