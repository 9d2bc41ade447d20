use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::warn;

use super::dispatcher::{Dispatch, Transport};
use crate::api::types::SendResponse;
use crate::api::API_USER;
use crate::config::MailgunConfig;
use crate::error::{MailgunError, Result};

/// Multipart upload of the raw MIME to `messages.mime`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &MailgunConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MailgunError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, domain: &str) -> String {
        format!("{}/{}/messages.mime", self.base_url, domain)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn transmit(&self, dispatch: Dispatch<'_>) -> Result<String> {
        let api_key = dispatch
            .api_key
            .ok_or_else(|| MailgunError::UnknownDomain(dispatch.domain.to_string()))?;

        let envelope = dispatch.envelope;
        let form = Form::new()
            .part(
                "message",
                Part::bytes(envelope.raw_mime().to_vec()).file_name("message"),
            )
            .text("to", envelope.recipients_joined());

        let response = self
            .http
            .post(self.endpoint(dispatch.domain))
            .basic_auth(API_USER, Some(api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Send for {} failed with {}", dispatch.domain, status);
            return Err(MailgunError::provider_status(status.as_u16(), body));
        }

        SendResponse::parse_id(&body)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
