use anyhow::Context;
use mailgun_rs::api::ApiServer;
use mailgun_rs::config::{Config, LoggingConfig};
use mailgun_rs::outbound::DomainKeyRegistry;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.clone()));

    if logging.format == "json" {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config path from argv or MAILGUN_CONFIG
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("MAILGUN_CONFIG").ok())
        .map(PathBuf::from);

    let config = Config::load(path.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    config.validate().context("Invalid configuration")?;

    info!("Starting mailgun-rs");
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Webhook path: {}", config.server.webhook_path);
    info!("  Provider: {}", config.mailgun.base_url);
    info!("  Outbound transport: {:?}", config.mailgun.transport);

    let registry = DomainKeyRegistry::from_config(&config.mailgun.domain_keys)
        .context("Invalid domain key")?;
    info!("  Sending domains: {:?}", registry.domains());

    let server = ApiServer::logging(&config)?;
    server.run().await.context("API server failed")?;

    Ok(())
}
