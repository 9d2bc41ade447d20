//! Inbound webhook processing
//!
//! Steps, fail-fast:
//! 1. Keep the body as shared [`Bytes`] so it can be logged and parsed
//! 2. Decode the form (url-encoded or multipart)
//! 3. Verify the signature; nothing past this point runs on an
//!    unauthenticated request
//! 4. Hand `body-mime` to the MIME parser
//! 5. Attach the spam, DKIM and SPF verdicts

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use crate::error::{MailgunError, Result};
use crate::mime::{CanonicalMessage, MailParser, MimeParse};
use crate::webhook::form::{WebhookFields, WebhookForm};
use crate::webhook::signature::SignatureVerifier;
use crate::webhook::verdict::{normalize_verdict, spam_verdict};

/// The parts of an HTTP request the processor needs
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl InboundRequest {
    pub fn new(content_type: Option<String>, body: impl Into<Bytes>) -> Self {
        Self {
            content_type,
            body: body.into(),
        }
    }
}

/// Authenticates and decodes provider webhooks
#[derive(Clone)]
pub struct InboundWebhookProcessor {
    verifier: SignatureVerifier,
    parser: Arc<dyn MimeParse>,
}

impl InboundWebhookProcessor {
    pub fn new(verifier: SignatureVerifier, parser: Arc<dyn MimeParse>) -> Self {
        Self { verifier, parser }
    }

    /// Processor using the `mail-parser` backed [`MailParser`]
    pub fn with_signing_key(signing_key: impl Into<Vec<u8>>) -> Self {
        Self::new(SignatureVerifier::new(signing_key), Arc::new(MailParser::new()))
    }

    pub async fn receive(&self, request: InboundRequest) -> Result<CanonicalMessage> {
        let body = request.body;
        debug!(bytes = body.len(), "Received webhook");
        trace!("Webhook body: {}", String::from_utf8_lossy(&body));

        let form = WebhookForm::parse(request.content_type.as_deref(), body.clone()).await?;
        debug!(fields = form.len(), "Decoded webhook form");
        let fields = WebhookFields::extract(&form);

        match self.verifier.verify(&fields.signature) {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    timestamp = %fields.signature.timestamp,
                    "Rejected webhook: signature mismatch"
                );
                return Err(MailgunError::UnauthenticatedWebhook(
                    "failed to verify webhook signature".to_string(),
                ));
            }
            Err(e) => {
                warn!("Rejected webhook: {}", e);
                return Err(MailgunError::UnauthenticatedWebhook(format!(
                    "unreadable webhook signature: {}",
                    e
                )));
            }
        }

        let mime = fields
            .body_mime
            .ok_or_else(|| MailgunError::Validation("webhook has no body-mime field".to_string()))?;

        let mut message = self.parser.parse(&mime)?;
        message.spam_verdict = spam_verdict(&fields.spam_flag);
        message.dkim_verdict = normalize_verdict(&fields.dkim_result);
        message.spf_verdict = normalize_verdict(&fields.spf_result);

        info!(
            message_id = %message.message_id,
            spam = %message.spam_verdict,
            dkim = %message.dkim_verdict,
            spf = %message.spf_verdict,
            "Accepted inbound message"
        );
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mime::parser::MockMimeParse;
    use crate::webhook::sign_webhook;
    use crate::webhook::Verdict;

    const KEY: &str = "webhook-key";
    const FORM: &str = "application/x-www-form-urlencoded";

    fn form_body(signature: &str, extra: &str) -> Bytes {
        Bytes::from(format!(
            "timestamp=1234567&token=token&signature={}&body-mime=From%3A+a%40b.io{}",
            signature, extra
        ))
    }

    fn processor(parser: MockMimeParse) -> InboundWebhookProcessor {
        InboundWebhookProcessor::new(SignatureVerifier::new(KEY), Arc::new(parser))
    }

    #[tokio::test]
    async fn test_verdicts_attached() {
        let mut parser = MockMimeParse::new();
        parser
            .expect_parse()
            .times(1)
            .returning(|_| Ok(CanonicalMessage::default()));

        let signature = sign_webhook("1234567", "token", KEY.as_bytes()).unwrap();
        let body = form_body(
            &signature,
            "&X-Mailgun-Sflag=true&X-Mailgun-Dkim-Check-Result=fail&X-Mailgun-Spf-Mailgun=Pass",
        );

        let msg = processor(parser)
            .receive(InboundRequest::new(Some(FORM.into()), body))
            .await
            .unwrap();
        assert_eq!(msg.spam_verdict, Verdict::Fail);
        assert_eq!(msg.dkim_verdict, Verdict::Fail);
        assert_eq!(msg.spf_verdict, Verdict::Pass);
    }

    #[tokio::test]
    async fn test_missing_verdict_fields() {
        let mut parser = MockMimeParse::new();
        parser
            .expect_parse()
            .returning(|_| Ok(CanonicalMessage::default()));

        let signature = sign_webhook("1234567", "token", KEY.as_bytes()).unwrap();
        let msg = processor(parser)
            .receive(InboundRequest::new(Some(FORM.into()), form_body(&signature, "")))
            .await
            .unwrap();
        assert_eq!(msg.spam_verdict, Verdict::Pass);
        assert_eq!(msg.dkim_verdict, Verdict::NotAvailable);
        assert_eq!(msg.spf_verdict, Verdict::NotAvailable);
    }

    #[tokio::test]
    async fn test_bad_signature_never_parses() {
        let mut parser = MockMimeParse::new();
        parser.expect_parse().times(0);
        let processor = processor(parser);

        let wrong = sign_webhook("1234567", "token", b"other-key").unwrap();
        let err = processor
            .receive(InboundRequest::new(Some(FORM.into()), form_body(&wrong, "")))
            .await
            .unwrap_err();
        assert!(matches!(err, MailgunError::UnauthenticatedWebhook(_)));

        let err = processor
            .receive(InboundRequest::new(Some(FORM.into()), form_body("not-hex", "")))
            .await
            .unwrap_err();
        assert!(matches!(err, MailgunError::UnauthenticatedWebhook(_)));

        let err = processor
            .receive(InboundRequest::new(
                Some(FORM.into()),
                Bytes::from_static(b"body-mime=x"),
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, MailgunError::UnauthenticatedWebhook(_)));
    }

    #[tokio::test]
    async fn test_missing_body_mime() {
        let mut parser = MockMimeParse::new();
        parser.expect_parse().times(0);

        let signature = sign_webhook("1", "t", KEY.as_bytes()).unwrap();
        let body = Bytes::from(format!("timestamp=1&token=t&signature={}", signature));
        let err = processor(parser)
            .receive(InboundRequest::new(Some(FORM.into()), body))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_parser_error_propagates() {
        let mut parser = MockMimeParse::new();
        parser
            .expect_parse()
            .times(1)
            .returning(|_| Err(MailgunError::Parse("broken".into())));

        let signature = sign_webhook("1234567", "token", KEY.as_bytes()).unwrap();
        let err = processor(parser)
            .receive(InboundRequest::new(Some(FORM.into()), form_body(&signature, "")))
            .await
            .unwrap_err();
        assert!(err.is_parse());
    }
}
