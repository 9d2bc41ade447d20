//! API request handlers

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::api::MailgunClient;
use crate::error::{MailgunError, Result};
use crate::mime::CanonicalMessage;
use crate::webhook::{InboundRequest, InboundWebhookProcessor, Verdict};

/// Receives every message that passed webhook verification
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, message: CanonicalMessage) -> Result<()>;
}

/// Sink that only logs what arrived
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSink;

#[async_trait]
impl MessageSink for LoggingSink {
    async fn deliver(&self, message: CanonicalMessage) -> Result<()> {
        info!(
            message_id = %message.message_id,
            from = %message.from.address,
            spam = %message.spam_verdict,
            dkim = %message.dkim_verdict,
            spf = %message.spf_verdict,
            "Inbound message: {}",
            message.subject
        );
        Ok(())
    }
}

/// Shared application state
pub struct AppState {
    pub processor: InboundWebhookProcessor,
    pub client: MailgunClient,
    pub sink: Arc<dyn MessageSink>,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

/// HTTP status for a failed request
pub fn status_for(err: &MailgunError) -> StatusCode {
    match err {
        MailgunError::UnauthenticatedWebhook(_) => StatusCode::UNAUTHORIZED,
        e if e.is_validation() || e.is_parse() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &MailgunError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        error!("Request failed: {}", err);
    } else {
        warn!("Request rejected ({}): {}", status, err);
    }
    (status, Json(ApiError::new(&err.to_string()))).into_response()
}

/// Reply to an accepted webhook
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookSummary {
    pub message_id: String,
    pub subject: String,
    pub from: String,
    pub spam_verdict: Verdict,
    pub dkim_verdict: Verdict,
    pub spf_verdict: Verdict,
}

impl From<&CanonicalMessage> for WebhookSummary {
    fn from(message: &CanonicalMessage) -> Self {
        Self {
            message_id: message.message_id.clone(),
            subject: message.subject.clone(),
            from: message.from.address.clone(),
            spam_verdict: message.spam_verdict,
            dkim_verdict: message.dkim_verdict,
            spf_verdict: message.spf_verdict,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DomainsResponse {
    pub domains: Vec<String>,
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST {webhook_path} - inbound MIME webhook
pub async fn receive_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let message = match state
        .processor
        .receive(InboundRequest::new(content_type, body))
        .await
    {
        Ok(message) => message,
        Err(e) => return error_response(&e),
    };

    let summary = WebhookSummary::from(&message);
    if let Err(e) = state.sink.deliver(message).await {
        return error_response(&e);
    }

    (StatusCode::OK, Json(summary)).into_response()
}

/// GET /domains - active sending domains
pub async fn list_domains(State(state): State<Arc<AppState>>) -> Response {
    match state.client.list_domains().await {
        Ok(domains) => Json(DomainsResponse { domains }).into_response(),
        Err(e) => error_response(&e),
    }
}
