use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use shadowpod_webhook::app::ApplicationBuilder;
use shadowpod_webhook::config::Cli;
use shadowpod_webhook::config::Commands;
use shadowpod_webhook::config::WebhookArgs;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(webhook_args) => run_webhook(*webhook_args).await,
    }
}

async fn run_webhook(webhook_args: WebhookArgs) -> Result<()> {
    let log_path = std::env::var_os(logging::LOG_PATH_ENV_VAR).map(PathBuf::from);
    let _guard = logging::init(log_path.as_deref());

    tracing::info!("Starting ShadowPod admission webhook {}", &**version::VERSION);

    let app = ApplicationBuilder::new(webhook_args).build().await?;

    app.run().await?;
    app.shutdown().await?;

    Ok(())
}
