use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::dispatcher::{Dispatch, Transport};
use crate::error::Result;
use crate::mime::MimeParse;
use crate::smtp::SmtpClient;

/// Direct SMTP relay through the provider's submission endpoint
///
/// The relay answers with no provider id, so the Message-ID header of the
/// outgoing MIME stands in for it. Failures after that point carry the id.
pub struct SmtpRelayTransport {
    client: SmtpClient,
    parser: Arc<dyn MimeParse>,
}

impl SmtpRelayTransport {
    pub fn new(client: SmtpClient, parser: Arc<dyn MimeParse>) -> Self {
        Self { client, parser }
    }
}

#[async_trait]
impl Transport for SmtpRelayTransport {
    async fn transmit(&self, dispatch: Dispatch<'_>) -> Result<String> {
        let envelope = dispatch.envelope;
        let parsed = self.parser.parse(envelope.raw_mime())?;
        let message_id = parsed.message_id;
        if message_id.is_empty() {
            warn!("Relaying message without a Message-ID header");
        }

        let recipients = envelope.recipient_addresses();
        self.client
            .send_mail(&envelope.from().address, &recipients, envelope.raw_mime())
            .await
            .map_err(|e| e.undelivered(message_id.clone()))?;

        info!("Relayed {}", message_id);
        Ok(message_id)
    }

    fn requires_domain_key(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}
