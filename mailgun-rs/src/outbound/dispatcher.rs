use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::registry::DomainKeyRegistry;
use super::types::{OutboundEnvelope, MAX_RECIPIENTS};
use super::{HttpTransport, SdkTransport, SmtpRelayTransport};
use crate::api::MailgunClient;
use crate::config::{Config, TransportKind};
use crate::error::{MailgunError, Result};
use crate::mime::MailParser;
use crate::smtp::SmtpClient;

/// A validated send handed to a transport
#[derive(Debug, Clone, Copy)]
pub struct Dispatch<'a> {
    pub envelope: &'a OutboundEnvelope,
    /// Sender domain, taken from the `from` address
    pub domain: &'a str,
    /// Present whenever the transport requires a domain key
    pub api_key: Option<&'a str>,
}

/// One way of carrying a message to the provider
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver the message and return the provider message id
    async fn transmit(&self, dispatch: Dispatch<'_>) -> Result<String>;

    /// Whether the sender domain must have a registered key
    fn requires_domain_key(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str;
}

/// Validates envelopes and routes them through the configured transport
pub struct OutboundDispatcher {
    registry: Arc<DomainKeyRegistry>,
    transport: Arc<dyn Transport>,
}

impl OutboundDispatcher {
    pub fn new(registry: Arc<DomainKeyRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    /// Build the transport selected by `kind` and a registry filled from config
    pub fn from_config(config: &Config, kind: TransportKind) -> Result<Self> {
        let registry = Arc::new(DomainKeyRegistry::from_config(&config.mailgun.domain_keys)?);

        let transport: Arc<dyn Transport> = match kind {
            TransportKind::Http => Arc::new(HttpTransport::new(&config.mailgun)?),
            TransportKind::Smtp => Arc::new(SmtpRelayTransport::new(
                SmtpClient::new(&config.smtp),
                Arc::new(MailParser::new()),
            )),
            TransportKind::Sdk => Arc::new(SdkTransport::new(MailgunClient::new(&config.mailgun)?)),
        };

        info!("Outbound dispatcher using {} transport", transport.name());
        Ok(Self::new(registry, transport))
    }

    pub fn registry(&self) -> &Arc<DomainKeyRegistry> {
        &self.registry
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    /// Send one message, returning the provider message id
    ///
    /// # Errors
    /// Returns error if:
    /// - There are no recipients or more than [`MAX_RECIPIENTS`]
    /// - The sender address has no domain
    /// - The transport needs a key and none is registered for the domain
    /// - The transport fails
    pub async fn send(&self, envelope: &OutboundEnvelope) -> Result<String> {
        let count = envelope.to().len();
        if count == 0 {
            return Err(MailgunError::Validation(
                "at least one recipient is required".to_string(),
            ));
        }
        if count > MAX_RECIPIENTS {
            return Err(MailgunError::RecipientLimitExceeded {
                count,
                max: MAX_RECIPIENTS,
            });
        }

        let domain = envelope.from().domain()?;

        let api_key = if self.transport.requires_domain_key() {
            match self.registry.lookup(domain) {
                Some(key) => Some(key),
                None => {
                    warn!("No sending key registered for {}", domain);
                    return Err(MailgunError::UnknownDomain(domain.to_string()));
                }
            }
        } else {
            None
        };

        debug!(
            "Dispatching {} bytes from {} to {} recipient(s) via {}",
            envelope.raw_mime().len(),
            envelope.from().address,
            count,
            self.transport.name()
        );

        let id = self
            .transport
            .transmit(Dispatch {
                envelope,
                domain,
                api_key: api_key.as_deref(),
            })
            .await?;

        info!("Message {} accepted via {}", id, self.transport.name());
        Ok(id)
    }
}
