//! Provider REST client
//!
//! Account-level calls (domain inventory) and the streamed MIME send used by
//! the SDK transport.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

use super::types::{DomainList, SendResponse};
use crate::config::MailgunConfig;
use crate::error::{MailgunError, Result};

/// Basic auth user for every provider call
pub const API_USER: &str = "api";

/// Upper bound on domains returned by one listing call
const DOMAIN_PAGE_LIMIT: u32 = 500;

/// Raw MIME plus the recipients it goes to
pub struct MimeMessage {
    reader: Box<dyn AsyncRead + Send + Sync + Unpin>,
    to: Vec<String>,
}

impl MimeMessage {
    pub fn new<R>(reader: R, to: Vec<String>) -> Self
    where
        R: AsyncRead + Send + Sync + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            to,
        }
    }

    pub fn recipients(&self) -> &[String] {
        &self.to
    }
}

impl std::fmt::Debug for MimeMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MimeMessage").field("to", &self.to).finish()
    }
}

#[derive(Debug, Clone)]
pub struct MailgunClient {
    http: Client,
    base_url: String,
    domains_url: String,
    api_key: String,
    timeout: Duration,
}

impl MailgunClient {
    pub fn new(config: &MailgunConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailgunError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            domains_url: config.domains_url.clone(),
            api_key: config.api_key.clone(),
            timeout,
        })
    }

    /// Names of the account's active domains, in provider order
    pub async fn list_domains(&self) -> Result<Vec<String>> {
        if self.api_key.is_empty() {
            return Err(MailgunError::Config(
                "mailgun.api_key is required to list domains".to_string(),
            ));
        }

        let limit = DOMAIN_PAGE_LIMIT.to_string();
        let response = self
            .http
            .get(&self.domains_url)
            .basic_auth(API_USER, Some(&self.api_key))
            .query(&[("limit", limit.as_str()), ("state", "active")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Domain listing failed with {}", status);
            return Err(MailgunError::provider_status(status.as_u16(), body));
        }

        let list: DomainList = serde_json::from_str(&body)?;
        debug!("Provider reports {} domain(s)", list.total_count);
        Ok(list.names())
    }

    /// Stream `message` to `{base_url}/{domain}/messages.mime`
    ///
    /// The whole call, response included, is bounded by the configured timeout.
    pub async fn send_mime(
        &self,
        domain: &str,
        api_key: &str,
        message: MimeMessage,
    ) -> Result<SendResponse> {
        let url = format!("{}/{}/messages.mime", self.base_url, domain);
        let to = message.to.join(",");
        let body = Body::wrap_stream(ReaderStream::new(message.reader));
        let form = Form::new()
            .part("message", Part::stream(body).file_name("message"))
            .text("to", to);

        let response = tokio::time::timeout(self.timeout, self.post_form(&url, api_key, form))
            .await
            .map_err(|_| {
                MailgunError::transport(format!(
                    "send to {} timed out after {:?}",
                    domain, self.timeout
                ))
            })??;

        info!("Provider accepted message for {}", domain);
        Ok(response)
    }

    async fn post_form(&self, url: &str, api_key: &str, form: Form) -> Result<SendResponse> {
        let response = self
            .http
            .post(url)
            .basic_auth(API_USER, Some(api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MailgunError::provider_status(status.as_u16(), body));
        }

        let id = SendResponse::parse_id(&body)?;
        let message = serde_json::from_str::<SendResponse>(&body)
            .ok()
            .and_then(|r| r.message);
        Ok(SendResponse {
            id: Some(id),
            message,
        })
    }
}
