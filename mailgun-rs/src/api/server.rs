//! API Server - webhook receiver and domain inventory

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState, LoggingSink, MessageSink};
use crate::api::MailgunClient;
use crate::config::Config;
use crate::error::Result;
use crate::webhook::{InboundWebhookProcessor, MAX_MULTIPART_BYTES};

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    webhook_path: String,
}

impl ApiServer {
    /// Server that hands verified messages to `sink`
    pub fn new(config: &Config, sink: Arc<dyn MessageSink>) -> Result<Self> {
        let state = Arc::new(AppState {
            processor: InboundWebhookProcessor::with_signing_key(
                config.mailgun.webhook_signing_key.as_bytes(),
            ),
            client: MailgunClient::new(&config.mailgun)?,
            sink,
        });

        Ok(Self::with_state(
            state,
            config.server.listen_addr.clone(),
            config.server.webhook_path.clone(),
        ))
    }

    /// Server whose verified messages are only logged
    pub fn logging(config: &Config) -> Result<Self> {
        Self::new(config, Arc::new(LoggingSink))
    }

    pub fn with_state(state: Arc<AppState>, addr: String, webhook_path: String) -> Self {
        Self {
            state,
            addr,
            webhook_path,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let webhook_routes = Router::new()
            .route(&self.webhook_path, post(handlers::receive_webhook))
            .layer(DefaultBodyLimit::max(MAX_MULTIPART_BYTES));

        Router::new()
            .route("/health", get(handlers::health))
            .route("/domains", get(handlers::list_domains))
            .merge(webhook_routes)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!(
            "Starting API server on {} (webhook at {})",
            self.addr, self.webhook_path
        );

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
