use std::io::Cursor;

use async_trait::async_trait;

use super::dispatcher::{Dispatch, Transport};
use crate::api::{MailgunClient, MimeMessage};
use crate::error::{MailgunError, Result};

/// Send through the typed API client's MIME message call
#[derive(Debug, Clone)]
pub struct SdkTransport {
    client: MailgunClient,
}

impl SdkTransport {
    pub fn new(client: MailgunClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for SdkTransport {
    async fn transmit(&self, dispatch: Dispatch<'_>) -> Result<String> {
        let api_key = dispatch
            .api_key
            .ok_or_else(|| MailgunError::UnknownDomain(dispatch.domain.to_string()))?;

        let envelope = dispatch.envelope;
        let message = MimeMessage::new(
            Cursor::new(envelope.raw_mime().clone()),
            envelope.recipient_addresses(),
        );

        let response = self.client.send_mime(dispatch.domain, api_key, message).await?;
        response
            .id
            .ok_or_else(|| MailgunError::transport("send response has no id"))
    }

    fn name(&self) -> &'static str {
        "sdk"
    }
}
